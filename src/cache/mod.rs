//! Two-tier TTL cache for successful RPC results.
//!
//! Market data is cached briefly (fast tier), instrument metadata for longer
//! (slow tier), and trading or authentication calls never. The TTL is fixed
//! when an entry is stored and is not renewed by reads.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use deribit_rpc_client::cache::ResponseCache;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut cache = ResponseCache::new(Duration::from_secs(1), Duration::from_secs(30));
//! let params = json!({ "instrument_name": "BTC-PERPETUAL" });
//!
//! cache.insert("public/ticker", &params, json!({ "mark_price": 50000.5 }));
//! assert!(cache.get("public/ticker", &params).is_some());
//!
//! // Trading calls are never cached
//! cache.insert("private/buy", &params, json!({ "order": {} }));
//! assert!(cache.get("private/buy", &params).is_none());
//! # }
//! ```

mod key;
mod method;

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

pub use key::CacheKey;
pub use method::{CacheTier, MethodClass};

/// A cached RPC result.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The `result` field of the response
    pub value: Value,
    /// When the entry stops being served
    pub expires_at: Instant,
    /// Tier the entry was stored in
    pub tier: CacheTier,
}

impl CacheEntry {
    fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Entry counts reported by [`ResponseCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// All live entries
    pub total_entries: usize,
    /// Entries in the fast tier
    pub fast_tier_entries: usize,
    /// Entries in the slow tier
    pub slow_tier_entries: usize,
}

/// Response cache keyed by method and canonicalized params.
#[derive(Debug)]
pub struct ResponseCache {
    entries: HashMap<CacheKey, CacheEntry>,
    fast_ttl: Duration,
    slow_ttl: Duration,
}

impl ResponseCache {
    /// Create an empty cache with the given tier TTLs.
    pub fn new(fast_ttl: Duration, slow_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            fast_ttl,
            slow_ttl,
        }
    }

    /// TTL applied to entries of `tier`.
    pub fn ttl(&self, tier: CacheTier) -> Duration {
        match tier {
            CacheTier::Fast => self.fast_ttl,
            CacheTier::Slow => self.slow_ttl,
        }
    }

    /// Look up a cached result.
    ///
    /// No-cache methods always miss. An expired entry is evicted and misses.
    pub fn get(&mut self, method: &str, params: &Value) -> Option<Value> {
        MethodClass::of(method).tier()?;

        let key = CacheKey::new(method, params);
        let entry = self.entries.get(&key)?;

        if entry.is_expired_at(Instant::now()) {
            self.entries.remove(&key);
            return None;
        }

        tracing::debug!(method, tier = ?entry.tier, "Cache hit");
        Some(entry.value.clone())
    }

    /// Store a result.
    ///
    /// No-op for no-cache methods and for `null` results.
    pub fn insert(&mut self, method: &str, params: &Value, value: Value) {
        let Some(tier) = MethodClass::of(method).tier() else {
            return;
        };
        if value.is_null() {
            return;
        }

        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl(tier),
            tier,
        };
        self.entries.insert(CacheKey::new(method, params), entry);
    }

    /// Remove all expired entries.
    pub fn cleanup(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
    }

    /// Count live entries per tier, sweeping expired ones first.
    pub fn stats(&mut self) -> CacheStats {
        self.cleanup();

        let mut stats = CacheStats {
            total_entries: self.entries.len(),
            ..CacheStats::default()
        };
        for entry in self.entries.values() {
            match entry.tier {
                CacheTier::Fast => stats.fast_tier_entries += 1,
                CacheTier::Slow => stats.slow_tier_entries += 1,
            }
        }
        stats
    }

    /// Get the number of entries in the cache (including expired ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all entries from the cache.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
