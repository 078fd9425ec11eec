use anyhow::{Context, Result};
use bangumi_resolver::config::{find_config_file, get_config, load_config, Config};
use bangumi_resolver::models::{BookFormat, ResolveRequest};
use bangumi_resolver::resolve::{Resolver, CATALOG_ID_KEY};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Bangumi Resolver - Resolve comic and light-novel metadata from the Bangumi catalog
#[derive(Parser, Debug)]
#[command(name = "bangumi-resolver")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve comic and light-novel metadata from the Bangumi catalog", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn parse_format(hint: &str) -> Result<BookFormat, String> {
    BookFormat::from_hint(hint)
        .ok_or_else(|| format!("unknown format '{}', expected comic or novel", hint))
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve one book and print the merged record as JSON
    #[command(alias = "r")]
    Resolve {
        /// Title as the library knows it, e.g. "オーバーロード (3)"
        #[arg(default_value = "")]
        title: String,

        /// ISBN of the book
        #[arg(long)]
        isbn: Option<String>,

        /// Expected printed format (comic, manga, novel, ln)
        #[arg(long, short, value_parser = parse_format)]
        format: Option<BookFormat>,

        /// Known catalog subject id; skips the search
        #[arg(long)]
        id: Option<u64>,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn load(cli: &Cli) -> Result<Config> {
    let config = if let Some(path) = &cli.config {
        load_config(path).with_context(|| format!("loading {}", path.display()))?
    } else if let Some(path) = find_config_file() {
        load_config(&path).with_context(|| format!("loading {}", path.display()))?
    } else {
        get_config()?
    };
    Ok(config)
}

fn init_logging(cli: &Cli, config: &Config) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => config.logging.level.as_str(),
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("bangumi_resolver={}", level)),
    );
    let json = config.logging.format.as_deref() == Some("json");

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load(&cli)?;
    init_logging(&cli, &config);

    match &cli.command {
        Commands::Resolve {
            title,
            isbn,
            format,
            id,
        } => {
            let mut request = ResolveRequest::new(title.clone());
            if let Some(isbn) = isbn {
                request = request.isbn(isbn.clone());
            }
            if let Some(format) = format {
                request = request.hint(*format);
            }
            if let Some(id) = id {
                request = request.identifier(CATALOG_ID_KEY, id.to_string());
            }

            let resolver = Resolver::new(&config)?;
            let record = resolver.resolve(&request).await?;

            if record.is_low_confidence() {
                tracing::warn!("Low-confidence match (score {:.3})", record.score);
            }
            if record.is_partial() {
                tracing::warn!(
                    "Incomplete record: {} of {} volumes fetched",
                    record.volumes_fetched,
                    record.volumes_total
                );
            }
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
