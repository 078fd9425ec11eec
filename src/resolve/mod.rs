//! The resolution pipeline.
//!
//! [`Resolver::resolve`] runs, in order:
//!
//! 1. [`QueryPlanner`] - request to normalized query
//! 2. [`SearchClient`](crate::catalog::SearchClient) - candidate search
//! 3. [`CandidateRanker`] - select one candidate
//! 4. [`SubjectFetcher`](crate::catalog::SubjectFetcher) - main subject with relations
//! 5. [`VolumeDiscoverer`] - volumes from the relations
//! 6. [`FetchOrchestrator`] - concurrent volume fetches
//! 7. [`MetadataMerger`] - one record, with identifiers from [`IdentifierMapper`]
//!
//! Steps 2 and 3 are skipped when the host already knows the catalog id.

mod identifiers;
mod merger;
mod orchestrator;
mod planner;
mod ranker;
mod volumes;

pub use identifiers::{IdentifierMapper, CATALOG_ID_KEY, ISBN_KEY};
pub use merger::{MatchQuality, MetadataMerger};
pub use orchestrator::{FetchOptions, FetchOrchestrator};
pub use planner::QueryPlanner;
pub use ranker::{CandidateRanker, RankedCandidate, Selection};
pub use volumes::VolumeDiscoverer;

use std::sync::Arc;

use crate::catalog::{
    CatalogClient, CatalogError, HttpTransport, SearchClient, SubjectFetcher, Transport,
    TransportError,
};
use crate::config::{Config, ConfigError};
use crate::models::{MetadataRecord, ResolveRequest, SearchQuery};
use crate::utils::CatalogRateLimiter;

/// Errors raised while assembling a [`Resolver`]
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP transport: {0}")]
    Transport(#[from] TransportError),
}

/// Resolves host requests into metadata records
///
/// Holds one transport and one rate limiter for its whole life; every
/// component, including every fetch worker, goes through them.
#[derive(Debug, Clone)]
pub struct Resolver {
    planner: QueryPlanner,
    search: SearchClient,
    ranker: CandidateRanker,
    fetcher: SubjectFetcher,
    discoverer: VolumeDiscoverer,
    orchestrator: FetchOrchestrator,
    merger: MetadataMerger,
    mapper: IdentifierMapper,
}

impl Resolver {
    /// Build a resolver talking to the configured catalog over HTTP
    pub fn new(config: &Config) -> Result<Self, SetupError> {
        let transport = HttpTransport::new(&config.catalog)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a resolver over any transport
    pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> Result<Self, SetupError> {
        config.validate()?;

        let limiter = Arc::new(CatalogRateLimiter::from_config(&config.rate_limits)?);
        let client = CatalogClient::new(transport, limiter, config.catalog.api_base.clone());
        let fetcher = SubjectFetcher::new(client.clone(), config.tags.clone());
        let mapper = IdentifierMapper::from_config(&config.catalog);
        let scorer = config.ranking.similarity.scorer();

        Ok(Self {
            planner: QueryPlanner::new(),
            search: SearchClient::new(
                client,
                config.catalog.search_limit,
                config.catalog.include_nsfw,
            ),
            ranker: CandidateRanker::from_config(&config.ranking),
            orchestrator: FetchOrchestrator::new(
                fetcher.clone(),
                FetchOptions::from_config(&config.fetch),
            ),
            fetcher,
            discoverer: VolumeDiscoverer::new(),
            merger: MetadataMerger::new(scorer, config.ranking.confidence_threshold, mapper.clone()),
            mapper,
        })
    }

    /// Resolve one request into a merged record
    ///
    /// Volume fetch failures only lower the record's completeness; search,
    /// ranking and main-subject failures are returned as errors.
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<MetadataRecord, CatalogError> {
        let pinned_id = self.mapper.catalog_id(&request.identifiers);

        let query = match (self.planner.plan(request), pinned_id) {
            (Ok(query), _) => query,
            (Err(CatalogError::InvalidQuery(_)), Some(_)) => {
                SearchQuery::new(String::new(), String::new(), None, None, request.hint)
            }
            (Err(e), _) => return Err(e),
        };

        let (subject_id, quality) = match pinned_id {
            Some(id) => {
                tracing::info!("Resolving catalog subject {} directly", id);
                (id, MatchQuality::exact())
            }
            None => {
                tracing::info!("Searching catalog for '{}'", query.keyword());
                let candidates = self.search.search(&query).await.map_err(|e| match e {
                    CatalogError::EmptyResult(keyword) => {
                        CatalogError::NotFound(format!("no search results for '{}'", keyword))
                    }
                    other => other,
                })?;
                let selection = self.ranker.rank(&query, candidates)?;
                tracing::info!(
                    "Selected subject {} ({}) with score {:.3}",
                    selection.best.candidate.id,
                    selection.best.candidate.name,
                    selection.best.score
                );
                (
                    selection.best.candidate.id,
                    MatchQuality {
                        confidence: selection.confidence,
                        score: selection.best.score,
                    },
                )
            }
        };

        let main = self.fetcher.fetch_with_relations(subject_id).await?;
        let volumes = self.discoverer.discover(&main);
        let report = self.orchestrator.fetch_all(&volumes).await;

        Ok(self.merger.merge(&main, &report, &query, quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MockReply, MockTransport};

    fn config() -> Config {
        let mut config = Config::default();
        config.catalog.api_base = "https://api.example.test".to_string();
        config.rate_limits.requests_per_second = 1000.0;
        config.rate_limits.burst = 100;
        config
    }

    fn subject_body(id: u64, name: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id, "type": 1, "name": name, "name_cn": "", "summary": "s",
            "platform": "漫画", "tags": []
        })
    }

    #[test]
    fn test_setup_rejects_vanishing_rate() {
        let mut config = config();
        config.rate_limits.requests_per_second = 1e-20;
        let result = Resolver::with_transport(&config, Arc::new(MockTransport::new()));
        assert!(matches!(result, Err(SetupError::Config(ConfigError::InvalidValue(_)))));
    }

    #[tokio::test]
    async fn test_pinned_id_skips_search() {
        let transport = Arc::new(MockTransport::new());
        transport.respond("GET", "/v0/subjects/42", MockReply::ok(&subject_body(42, "寄生獣")));

        let resolver = Resolver::with_transport(&config(), transport.clone()).unwrap();
        let record = resolver
            .resolve(&ResolveRequest::new("").identifier("bgm", "42"))
            .await
            .unwrap();

        assert_eq!(record.catalog_id, 42);
        assert_eq!(record.score, 1.0);
        assert!(record.complete);
        assert_eq!(transport.call_count("/v0/search/subjects"), 0);
    }

    #[tokio::test]
    async fn test_empty_search_is_not_found() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            "POST",
            "/v0/search/subjects",
            MockReply::ok(&serde_json::json!({"total": 0, "data": []})),
        );

        let resolver = Resolver::with_transport(&config(), transport).unwrap();
        let result = resolver.resolve(&ResolveRequest::new("存在しない本")).await;
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_blank_request_is_invalid() {
        let resolver = Resolver::with_transport(&config(), Arc::new(MockTransport::new())).unwrap();
        let result = resolver.resolve(&ResolveRequest::new("   ")).await;
        assert!(matches!(result, Err(CatalogError::InvalidQuery(_))));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = config();
        config.fetch.max_concurrent = 0;
        let result = Resolver::with_transport(&config, Arc::new(MockTransport::new()));
        assert!(matches!(result, Err(SetupError::Config(_))));
    }
}
