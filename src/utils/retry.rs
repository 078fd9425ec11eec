//! Retry utilities with exponential backoff for resilient catalog calls.

use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::catalog::CatalogError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Set the retry budget
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return self.initial_delay.min(self.max_delay);
        }
        let exp_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powf(retry as f64 - 1.0);
        if !exp_delay.is_finite() || exp_delay >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(exp_delay)
    }
}

/// Whether an error is worth another attempt
///
/// Only transport failures are; a missing subject or a malformed body will
/// not change on retry.
pub fn is_transient(err: &CatalogError) -> bool {
    matches!(err, CatalogError::Transport(_))
}

/// Result of a retry operation
#[derive(Debug)]
pub enum RetryResult<T> {
    /// Operation succeeded
    Success { value: T, attempts: u32 },
    /// Operation kept failing with a transient error until the budget ran out
    TransientFailure { error: CatalogError, attempts: u32 },
    /// Operation failed with a permanent error
    PermanentFailure { error: CatalogError, attempts: u32 },
    /// The cancellation token fired before the operation finished
    Cancelled { attempts: u32 },
}

impl<T> RetryResult<T> {
    /// Number of attempts that were started
    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. }
            | RetryResult::TransientFailure { attempts, .. }
            | RetryResult::PermanentFailure { attempts, .. }
            | RetryResult::Cancelled { attempts } => *attempts,
        }
    }
}

/// Execute an async operation with retry logic
///
/// The token is checked before every attempt and raced against both the
/// attempt itself and the backoff sleep, so a cancelled batch stops promptly.
pub async fn with_retry<T, F, Fut>(
    config: RetryConfig,
    cancel: &CancellationToken,
    operation: F,
) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, CatalogError>>,
{
    let mut attempts = 0;
    let mut operation = operation;

    loop {
        if cancel.is_cancelled() {
            return RetryResult::Cancelled { attempts };
        }
        attempts += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return RetryResult::Cancelled { attempts },
            outcome = operation() => outcome,
        };

        match outcome {
            Ok(value) => {
                if attempts > 1 {
                    tracing::debug!(
                        "Operation succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return RetryResult::Success { value, attempts };
            }
            Err(error) if is_transient(&error) => {
                if attempts > config.max_retries {
                    tracing::warn!("Operation failed after {} attempts: {}", attempts, error);
                    return RetryResult::TransientFailure { error, attempts };
                }

                let delay = config.delay_for(attempts);
                tracing::debug!(
                    "Transient error on attempt {}: {}, retrying in {:?}",
                    attempts,
                    error,
                    delay
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return RetryResult::Cancelled { attempts },
                    _ = sleep(delay) => {}
                }
            }
            Err(error) => return RetryResult::PermanentFailure { error, attempts },
        }
    }
}
