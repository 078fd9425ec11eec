//! Shared rate limiting for catalog requests.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::{ConfigError, RateLimitConfig};

/// Token-bucket limiter shared by every worker of a resolver
///
/// Waiters queue on a FIFO mutex before asking the bucket for a token, so
/// permits are granted in arrival order and no caller starves.
pub struct CatalogRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    turnstile: Mutex<()>,
}

impl CatalogRateLimiter {
    /// Limit to `requests_per_second` (fractional rates allowed) with the given burst
    pub fn new(requests_per_second: f32, burst: NonZeroU32) -> Result<Self, ConfigError> {
        if !(requests_per_second.is_finite() && requests_per_second > 0.0) {
            return Err(ConfigError::InvalidValue(format!(
                "requests_per_second must be positive, got {}",
                requests_per_second
            )));
        }

        let period = Duration::try_from_secs_f64(1.0 / f64::from(requests_per_second)).map_err(
            |e| {
                ConfigError::InvalidValue(format!(
                    "requests_per_second {} is too low: {}",
                    requests_per_second, e
                ))
            },
        )?;
        let quota = Quota::with_period(period)
            .ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "requests_per_second {} is too high",
                    requests_per_second
                ))
            })?
            .allow_burst(burst);

        Ok(Self {
            limiter: RateLimiter::direct(quota),
            turnstile: Mutex::new(()),
        })
    }

    /// Build from configuration
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, ConfigError> {
        let burst = NonZeroU32::new(config.burst).ok_or_else(|| {
            ConfigError::InvalidValue("rate_limits.burst must be at least 1".to_string())
        })?;
        Self::new(config.requests_per_second, burst)
    }

    /// Wait until a request may be sent
    pub async fn acquire(&self) {
        let _turn = self.turnstile.lock().await;
        self.limiter.until_ready().await;
    }
}

impl Default for CatalogRateLimiter {
    /// Five requests per second, burst of five
    fn default() -> Self {
        Self {
            limiter: RateLimiter::direct(Quota::per_second(nonzero!(5u32))),
            turnstile: Mutex::new(()),
        }
    }
}

impl std::fmt::Debug for CatalogRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogRateLimiter").finish_non_exhaustive()
    }
}
