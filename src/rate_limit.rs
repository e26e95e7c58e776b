//! Honouring the provider's `Retry-After` hint on rate-limited attempts.
//!
//! When an attempt fails with a transient code and the response names a wait
//! time, the orchestrator sleeps for that long instead of the configured
//! [`Backoff`](crate::Backoff), capped by [`RateLimitConfig::max_wait`] and by
//! whatever is left of the session's timeout budget.

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Configuration for rate limit handling.
///
/// # Examples
///
/// ```
/// use shipping_api::rate_limit::RateLimitConfig;
/// use std::time::Duration;
///
/// let config = RateLimitConfig {
///     enabled: true,
///     max_wait: Duration::from_secs(2),
/// };
/// assert!(RateLimitConfig::disabled().max_wait > Duration::ZERO);
/// ```
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether to read wait hints from response headers.
    pub enabled: bool,

    /// Maximum time to wait on a single hint. Defaults to 5 seconds.
    pub max_wait: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_wait: Duration::from_secs(5),
        }
    }
}

impl RateLimitConfig {
    /// Creates a disabled rate limit configuration.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Returns the hinted wait for a response, if enabled and present.
    pub fn delay(&self, headers: &HeaderMap) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        retry_after(headers).map(|d| d.min(self.max_wait))
    }
}

/// Reads the wait hint from `Retry-After` (seconds or HTTP date), falling
/// back to `X-RateLimit-Reset` (Unix timestamp).
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(value) = headers.get("retry-after").and_then(|h| h.to_str().ok()) {
        if let Ok(seconds) = value.trim().parse::<u64>() {
            return Some(Duration::from_secs(seconds));
        }
        if let Ok(date_time) = httpdate::parse_http_date(value) {
            return date_time.duration_since(SystemTime::now()).ok();
        }
    }

    let reset = headers
        .get("x-ratelimit-reset")?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    (UNIX_EPOCH + Duration::from_secs(reset))
        .duration_since(SystemTime::now())
        .ok()
}
