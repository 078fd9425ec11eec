//! # Bangumi Resolver
//!
//! Resolves comic and light-novel metadata from the Bangumi subject catalog
//! for a book-management host, one book per request.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (requests, subjects, fetch reports, records)
//! - [`catalog`]: Transport abstraction, rate-limited client, search and subject endpoints
//! - [`resolve`]: Query planning, ranking, volume fan-out and merging
//! - [`utils`]: Rate limiting, retry with backoff, title similarity
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```rust,no_run
//! use bangumi_resolver::{Config, ResolveRequest, Resolver};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let resolver = Resolver::new(&Config::default())?;
//! let record = resolver.resolve(&ResolveRequest::new("オーバーロード (3)")).await?;
//! println!("{} ({:?})", record.title, record.isbn);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod models;
pub mod resolve;
pub mod utils;

// Re-export commonly used types
pub use catalog::{CatalogError, Transport};
pub use config::Config;
pub use models::{MetadataRecord, ResolveRequest};
pub use resolve::Resolver;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
