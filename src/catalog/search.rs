//! Subject search against the catalog's search endpoint.

use serde::Deserialize;

use super::{CatalogClient, CatalogError};
use crate::models::{CandidateSubject, SearchQuery, SubjectType};

const SEARCH_ENDPOINT: &str = "/v0/search/subjects";

/// Calls the search endpoint and returns raw candidates
///
/// The endpoint's filters are coarse (book type only), so the result is
/// expected to contain false positives; ranking sorts them out.
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: CatalogClient,
    limit: usize,
    include_nsfw: bool,
}

impl SearchClient {
    pub fn new(client: CatalogClient, limit: usize, include_nsfw: bool) -> Self {
        Self {
            client,
            limit,
            include_nsfw,
        }
    }

    /// Search for book subjects matching the query keyword
    ///
    /// Transport failures are propagated without retry. An empty result is
    /// reported as [`CatalogError::EmptyResult`].
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateSubject>, CatalogError> {
        let params = vec![
            ("limit".to_string(), self.limit.to_string()),
            ("offset".to_string(), "0".to_string()),
        ];
        let body = serde_json::json!({
            "keyword": query.keyword(),
            "filter": {
                "type": [SubjectType::Book.code()],
                "nsfw": self.include_nsfw,
            },
        });

        let data: SearchResponse = match self.client.post_json(SEARCH_ENDPOINT, &params, &body).await {
            Ok(data) => data,
            Err(CatalogError::NotFound(_)) => {
                return Err(CatalogError::EmptyResult(query.keyword().to_string()))
            }
            Err(e) => return Err(e),
        };

        let candidates: Vec<CandidateSubject> = data.data.into_iter().map(Self::parse_candidate).collect();

        tracing::debug!(
            "Search for '{}' returned {} candidates",
            query.keyword(),
            candidates.len()
        );

        if candidates.is_empty() {
            return Err(CatalogError::EmptyResult(query.keyword().to_string()));
        }

        Ok(candidates)
    }

    fn parse_candidate(item: SearchItem) -> CandidateSubject {
        CandidateSubject {
            id: item.id,
            name: item.name,
            name_cn: item.name_cn,
            subject_type: SubjectType::from_code(item.r#type),
            platform: item.platform.filter(|p| !p.trim().is_empty()),
            popularity: item.rating.map(|r| r.total).unwrap_or(0),
        }
    }
}

// ===== Search API Types =====

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: u64,
    #[serde(default)]
    r#type: u8,
    #[serde(default)]
    name: String,
    #[serde(default)]
    name_cn: String,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    rating: Option<SearchRating>,
}

#[derive(Debug, Deserialize)]
struct SearchRating {
    #[serde(default)]
    total: u32,
}
