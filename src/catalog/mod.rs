//! Access to the Bangumi subject catalog.
//!
//! Every request goes through one [`CatalogClient`], which pairs the
//! [`Transport`] with the shared rate limiter. [`SearchClient`] and
//! [`SubjectFetcher`] are thin typed layers over it.
//!
//! Endpoints used:
//!
//! - `POST /v0/search/subjects` - keyword search, filtered to books
//! - `GET /v0/subjects/{id}` - subject detail
//! - `GET /v0/subjects/{id}/subjects` - related subjects (volumes, adaptations, ...)

mod client;
pub mod mock;
mod search;
mod subject;
mod transport;

pub use client::CatalogClient;
pub use mock::{MockCall, MockReply, MockTransport};
pub use search::SearchClient;
pub use subject::{normalize_isbn, parse_release_date, SubjectFetcher};
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};

/// Errors that can occur when resolving against the catalog
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// The request cannot be turned into a query
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Network failure, timeout or an unexpected HTTP status
    #[error("Transport error: {0}")]
    Transport(String),

    /// No candidate or subject exists
    #[error("Not found: {0}")]
    NotFound(String),

    /// The catalog answered with something we cannot interpret
    #[error("Parse error: {0}")]
    Parse(String),

    /// The search endpoint returned zero candidates
    #[error("No search results for '{0}'")]
    EmptyResult(String),
}

impl From<TransportError> for CatalogError {
    fn from(err: TransportError) -> Self {
        CatalogError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Parse(format!("JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_conversion() {
        let err: CatalogError = TransportError::Timeout("30s".to_string()).into();
        assert_eq!(err, CatalogError::Transport("Request timed out: 30s".to_string()));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<u64>("nope").unwrap_err();
        let err: CatalogError = json_err.into();
        assert!(matches!(err, CatalogError::Parse(_)));
    }
}
