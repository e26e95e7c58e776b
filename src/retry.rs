//! Retry predicates and backoff between attempts.
//!
//! The number of attempts and the wall-clock budget live on the
//! [`Session`](crate::Session). This module decides *whether* a failed
//! attempt is worth repeating and *how long* to wait before doing so.

use crate::response::ErrorDetail;
use http::StatusCode;
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;

/// The provider's rate-limit/transient error code.
pub const TRANSIENT_ERROR_CODE: &str = "PB-APIM-ERR-1003";

/// How long to wait between attempts.
///
/// # Examples
///
/// ```
/// use shipping_api::Backoff;
/// use std::time::Duration;
///
/// // Retry immediately
/// let none = Backoff::None;
///
/// // Exponential backoff: 100ms, 200ms, 400ms...
/// let exponential = Backoff::Exponential {
///     initial_delay: Duration::from_millis(100),
///     max_delay: Duration::from_secs(2),
///     jitter: true,
/// };
///
/// // Fixed: 250ms every time
/// let fixed = Backoff::Fixed { delay: Duration::from_millis(250) };
/// ```
#[derive(Debug, Clone, Default)]
pub enum Backoff {
    /// Retry immediately.
    #[default]
    None,

    /// Wait `initial_delay * 2^(attempt - 1)`, capped at `max_delay`.
    ///
    /// Optional jitter scales the delay to between 50% and 100%.
    Exponential {
        /// The delay before the first retry.
        initial_delay: Duration,
        /// The maximum delay between retries.
        max_delay: Duration,
        /// Whether to add random jitter to delays.
        jitter: bool,
    },

    /// Wait the same delay before every retry.
    Fixed {
        /// The delay between attempts.
        delay: Duration,
    },

    /// Custom delay as a function of the attempt number (1-indexed).
    Custom {
        /// Returns the delay after the given failed attempt.
        delay_fn: fn(attempt: usize) -> Duration,
    },
}

impl Backoff {
    /// Returns the delay after the given failed attempt.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt that just failed (1-indexed)
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Exponential {
                initial_delay,
                max_delay,
                jitter,
            } => {
                let multiplier = 2u64.saturating_pow(attempt.saturating_sub(1) as u32);
                let base_delay =
                    initial_delay.saturating_mul(multiplier.try_into().unwrap_or(u32::MAX));
                let delay = base_delay.min(*max_delay);

                if *jitter {
                    let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
                    delay.mul_f64(jitter_factor)
                } else {
                    delay
                }
            }
            Backoff::Fixed { delay } => *delay,
            Backoff::Custom { delay_fn } => delay_fn(attempt),
        }
    }
}

/// Decides whether a failed attempt should be repeated.
///
/// Implement this to widen or narrow what counts as transient.
///
/// # Examples
///
/// ```
/// use shipping_api::{ErrorDetail, RetryPredicate};
/// use http::StatusCode;
///
/// struct RetryOnGatewayErrors;
///
/// impl RetryPredicate for RetryOnGatewayErrors {
///     fn should_retry(
///         &self,
///         status: StatusCode,
///         _errors: &[ErrorDetail],
///         _attempt: usize,
///     ) -> bool {
///         status == StatusCode::BAD_GATEWAY || status == StatusCode::GATEWAY_TIMEOUT
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Returns `true` if the attempt that produced `status` and `errors`
    /// should be retried.
    ///
    /// # Arguments
    ///
    /// * `status` - The HTTP status of the failed attempt
    /// * `errors` - The error details of the failed attempt
    /// * `attempt` - The attempt number (1-indexed)
    fn should_retry(&self, status: StatusCode, errors: &[ErrorDetail], attempt: usize) -> bool;
}

/// Retries when any error detail carries a known transient code.
///
/// The default set holds only [`TRANSIENT_ERROR_CODE`].
#[derive(Debug, Clone)]
pub struct RetryOnTransientCode {
    codes: HashSet<String>,
}

impl RetryOnTransientCode {
    /// Creates a predicate for an explicit set of codes.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    /// The codes treated as transient.
    pub fn codes(&self) -> &HashSet<String> {
        &self.codes
    }
}

impl Default for RetryOnTransientCode {
    fn default() -> Self {
        Self::new([TRANSIENT_ERROR_CODE])
    }
}

impl RetryPredicate for RetryOnTransientCode {
    fn should_retry(&self, _status: StatusCode, errors: &[ErrorDetail], _attempt: usize) -> bool {
        errors.iter().any(|e| self.codes.contains(&e.code))
    }
}

/// Retries when the HTTP status is one of the given statuses.
#[derive(Debug, Clone)]
pub struct RetryOnStatus {
    statuses: Vec<StatusCode>,
}

impl RetryOnStatus {
    /// Creates a predicate for the given statuses.
    pub fn new(statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
        }
    }
}

impl RetryPredicate for RetryOnStatus {
    fn should_retry(&self, status: StatusCode, _errors: &[ErrorDetail], _attempt: usize) -> bool {
        self.statuses.contains(&status)
    }
}

/// Combine multiple retry predicates with OR logic.
///
/// # Examples
///
/// ```
/// use shipping_api::retry::{OrPredicate, RetryOnStatus, RetryOnTransientCode};
/// use http::StatusCode;
///
/// // Retry on the transient code OR a 503
/// let predicate = OrPredicate::new(vec![
///     Box::new(RetryOnTransientCode::default()),
///     Box::new(RetryOnStatus::new([StatusCode::SERVICE_UNAVAILABLE])),
/// ]);
/// ```
pub struct OrPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl OrPredicate {
    /// Creates a new `OrPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for OrPredicate {
    fn should_retry(&self, status: StatusCode, errors: &[ErrorDetail], attempt: usize) -> bool {
        self.predicates
            .iter()
            .any(|p| p.should_retry(status, errors, attempt))
    }
}
