//! Utility modules supporting catalog resolution.
//!
//! - [`CatalogRateLimiter`]: Fair token-bucket limiter shared by all catalog requests
//! - [`RetryConfig`]: Configuration for retry logic with exponential backoff
//! - [`with_retry`]: Execute an operation with automatic retry on transient errors
//! - [`SimilarityScorer`]: Pluggable title similarity used for ranking and volume matching
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use bangumi_resolver::catalog::CatalogError;
//! use bangumi_resolver::utils::{with_retry, RetryConfig, RetryResult};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn fetch_data() -> Result<String, CatalogError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() {
//! let cancel = CancellationToken::new();
//! let config = RetryConfig::default().max_retries(3);
//! match with_retry(config, &cancel, || fetch_data()).await {
//!     RetryResult::Success { value, .. } => println!("{}", value),
//!     other => eprintln!("gave up after {} attempts", other.attempts()),
//! }
//! # }
//! ```

mod rate_limit;
mod retry;
mod similarity;

pub use rate_limit::CatalogRateLimiter;
pub(crate) use similarity::fold_full_width;
pub use retry::{is_transient, with_retry, RetryConfig, RetryResult};
pub use similarity::{
    best_similarity, normalize_title, JaroWinklerScorer, LevenshteinScorer, SimilarityMeasure,
    SimilarityScorer,
};
