//! Rate limiting for the Deribit API.
//!
//! Deribit meters requests per connection and answers with error `10028`
//! (`too_many_requests`) once the budget is spent. The client paces itself
//! with a [`TokenBucket`] so that throttling stays the exception.
//!
//! The bucket refills at `max_rps` tokens per second and holds up to
//! [`BURST_MULTIPLIER`] seconds' worth of tokens, letting short bursts
//! through while enforcing the long-run rate.

mod token_bucket;

pub use token_bucket::{MIN_RATE, TokenBucket};

/// Burst capacity, expressed in seconds of refill.
pub const BURST_MULTIPLIER: f64 = 2.0;

/// Build the bucket for a requests-per-second budget.
pub fn bucket_for_rps(max_rps: f64) -> TokenBucket {
    TokenBucket::new(max_rps, max_rps * BURST_MULTIPLIER)
}
