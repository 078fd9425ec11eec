//! Shared catalog client: transport, rate limiter and endpoint layout.

use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::{CatalogError, Transport, TransportResponse};
use crate::utils::CatalogRateLimiter;

/// The one transport + rate limiter pair used by every component of a resolver
///
/// Cloning is cheap and every clone shares the same limiter.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    transport: Arc<dyn Transport>,
    limiter: Arc<CatalogRateLimiter>,
    api_base: String,
}

impl CatalogClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        limiter: Arc<CatalogRateLimiter>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            limiter,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build request URL
    pub fn build_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_base, endpoint)
    }

    /// GET an endpoint and decode its JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<T, CatalogError> {
        let url = self.build_url(endpoint);
        self.limiter.acquire().await;
        tracing::debug!("GET {}", url);

        let response = self.transport.get(&url, params).await?;
        Self::decode(&url, response)
    }

    /// POST a JSON body to an endpoint and decode its JSON response
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        body: &serde_json::Value,
    ) -> Result<T, CatalogError> {
        let url = self.build_url(endpoint);
        self.limiter.acquire().await;
        tracing::debug!("POST {}", url);

        let response = self.transport.post_json(&url, params, body).await?;
        Self::decode(&url, response)
    }

    fn decode<T: DeserializeOwned>(url: &str, response: TransportResponse) -> Result<T, CatalogError> {
        match response.status {
            404 => Err(CatalogError::NotFound(url.to_string())),
            status if !response.is_success() => Err(CatalogError::Transport(format!(
                "{} returned HTTP {}",
                url, status
            ))),
            _ => serde_json::from_str(&response.body)
                .map_err(|e| CatalogError::Parse(format!("{}: {}", url, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MockReply, MockTransport};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Probe {
        id: u64,
    }

    fn client(transport: MockTransport) -> CatalogClient {
        CatalogClient::new(
            Arc::new(transport),
            Arc::new(CatalogRateLimiter::default()),
            "https://api.example.test/",
        )
    }

    #[test]
    fn test_build_url_trims_trailing_slash() {
        let client = client(MockTransport::new());
        assert_eq!(
            client.build_url("/v0/subjects/1"),
            "https://api.example.test/v0/subjects/1"
        );
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let transport = MockTransport::new();
        transport.respond("GET", "/ok", MockReply::json(200, r#"{"id": 7}"#));
        transport.respond("GET", "/missing", MockReply::json(404, "{}"));
        transport.respond("GET", "/busy", MockReply::json(503, "busy"));
        transport.respond("GET", "/garbled", MockReply::json(200, "<html>"));
        let client = client(transport);

        let ok: Probe = client.get_json("/ok", &[]).await.unwrap();
        assert_eq!(ok.id, 7);

        let missing = client.get_json::<Probe>("/missing", &[]).await;
        assert!(matches!(missing, Err(CatalogError::NotFound(_))));

        let busy = client.get_json::<Probe>("/busy", &[]).await;
        assert!(matches!(busy, Err(CatalogError::Transport(_))));

        let garbled = client.get_json::<Probe>("/garbled", &[]).await;
        assert!(matches!(garbled, Err(CatalogError::Parse(_))));
    }

    #[tokio::test]
    async fn test_transport_failure_maps_to_transport_error() {
        let transport = MockTransport::new();
        transport.respond("GET", "/down", MockReply::connect_error());
        let client = client(transport);

        let result = client.get_json::<Probe>("/down", &[]).await;
        assert!(matches!(result, Err(CatalogError::Transport(_))));
    }
}
