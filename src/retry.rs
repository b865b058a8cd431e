//! Retry and backoff policy for the client.
//!
//! The transport performs exactly one attempt per call. Whether a failed
//! attempt is retried, and after how long, is decided here from the error
//! kind and the attempt number.

use std::time::Duration;

use rand::Rng;

use crate::error::DeribitError;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Exponential backoff with additive uniform jitter.
///
/// The delay before retry `attempt` (0-based) is
/// `unit * (base^attempt + U(jitter_min, jitter_max))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Exponential base
    pub base: f64,
    /// Lower bound of the jitter, in units
    pub jitter_min: f64,
    /// Upper bound of the jitter, in units
    pub jitter_max: f64,
    /// Length of one unit, one second in production
    pub unit: Duration,
}

impl Backoff {
    /// Create a backoff measured in seconds.
    pub const fn new(base: f64, jitter_min: f64, jitter_max: f64) -> Self {
        Self {
            base,
            jitter_min,
            jitter_max,
            unit: Duration::from_secs(1),
        }
    }

    /// Scale all delays to a different unit.
    pub const fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Smallest delay this policy can produce for `attempt`.
    pub fn min_delay(&self, attempt: u32) -> Duration {
        self.scaled(self.exponent(attempt) + self.jitter_min.min(self.jitter_max))
    }

    /// Largest delay this policy can produce for `attempt`.
    pub fn max_delay(&self, attempt: u32) -> Duration {
        self.scaled(self.exponent(attempt) + self.jitter_max.max(self.jitter_min))
    }

    /// Draw the delay before retry `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = if self.jitter_max > self.jitter_min {
            rand::thread_rng().gen_range(self.jitter_min..self.jitter_max)
        } else {
            self.jitter_min
        };
        self.scaled(self.exponent(attempt) + jitter)
    }

    fn exponent(&self, attempt: u32) -> f64 {
        self.base.powi(attempt.min(i32::MAX as u32) as i32)
    }

    fn scaled(&self, units: f64) -> Duration {
        self.unit.mul_f64(units.max(0.0))
    }
}

/// The full retry policy of a client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff after the exchange signals throttling
    pub rate_limit: Backoff,
    /// Backoff after timeouts and retryable API errors
    pub transient: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            rate_limit: Backoff::new(2.0, 0.5, 1.5),
            transient: Backoff::new(1.5, 0.1, 0.5),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
    /// Sleep, then try again.
    Backoff(Duration),
    /// Obtain a fresh token and try again without consuming an attempt.
    Reauthenticate,
    /// Give up and surface the error.
    Fail,
}

impl RetryPolicy {
    /// Same policy with a different retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Decide how to react to `error` on 0-based `attempt`.
    ///
    /// `can_reauthenticate` is true only for an authenticated call that has
    /// not re-authenticated yet.
    pub fn decide(
        &self,
        error: &DeribitError,
        attempt: u32,
        max_retries: u32,
        can_reauthenticate: bool,
    ) -> RetryDecision {
        let budget_left = attempt < max_retries;
        match error {
            DeribitError::Auth(_) if can_reauthenticate && attempt == 0 => {
                RetryDecision::Reauthenticate
            }
            DeribitError::Auth(_) | DeribitError::Config(_) => RetryDecision::Fail,
            _ if !budget_left => RetryDecision::Fail,
            DeribitError::RateLimit(_) => RetryDecision::Backoff(self.rate_limit.delay(attempt)),
            DeribitError::Timeout { .. } => RetryDecision::Backoff(self.transient.delay(attempt)),
            DeribitError::Api(e) if !e.kind().is_retryable() => RetryDecision::Fail,
            DeribitError::Api(_) => RetryDecision::Backoff(self.transient.delay(attempt)),
        }
    }
}
