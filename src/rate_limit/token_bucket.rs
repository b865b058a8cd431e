//! Continuous-refill token bucket.
//!
//! # Example
//!
//! ```rust
//! use deribit_rpc_client::rate_limit::TokenBucket;
//!
//! # #[tokio::main]
//! # async fn main() {
//! // 8 requests per second with bursts of up to 16
//! let bucket = TokenBucket::new(8.0, 16.0);
//!
//! let waited = bucket.acquire(1.0).await;
//! assert!(waited.is_zero());
//! # }
//! ```

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Rate used in place of a zero, negative or non-finite one.
pub const MIN_RATE: f64 = 1.0;

/// Token bucket gating outbound requests.
///
/// Tokens refill continuously from elapsed time, capped at `capacity`.
/// Acquirers that find the bucket short wait on an async mutex, so
/// concurrent callers are served one at a time in arrival order without
/// blocking the runtime.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket refilling at `rate` tokens per second.
    ///
    /// A `rate` that is not finite and positive is raised to [`MIN_RATE`];
    /// an invalid `capacity` falls back to one second of refill.
    pub fn new(rate: f64, capacity: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            MIN_RATE
        };
        let capacity = if capacity.is_finite() && capacity >= 0.0 {
            capacity
        } else {
            rate
        };
        Self {
            rate,
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Refill rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Maximum number of accumulated tokens.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Take `cost` tokens, waiting for them if necessary.
    ///
    /// Returns how long the caller was suspended (zero if tokens were
    /// available immediately). A negative or NaN `cost` is free.
    pub async fn acquire(&self, cost: f64) -> Duration {
        let cost = if cost > 0.0 { cost } else { 0.0 };
        let mut state = self.state.lock().await;
        state.refill(Instant::now(), self.rate, self.capacity);

        match state.try_take(cost, self.rate) {
            Ok(()) => Duration::ZERO,
            Err(wait) => {
                // The lock stays held so later acquirers queue behind us.
                tokio::time::sleep(wait).await;
                state.tokens = 0.0;
                state.last_refill = Instant::now();
                wait
            }
        }
    }

    /// Tokens currently available, including refill since the last acquire.
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        state.refill(Instant::now(), self.rate, self.capacity);
        state.tokens
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, now: Instant, rate: f64, capacity: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }

    /// Deduct `cost` tokens, or report how long until they are available.
    fn try_take(&mut self, cost: f64, rate: f64) -> Result<(), Duration> {
        if self.tokens >= cost {
            self.tokens -= cost;
            Ok(())
        } else {
            let deficit = cost - self.tokens;
            Err(Duration::try_from_secs_f64(deficit / rate).unwrap_or(Duration::MAX))
        }
    }
}
