//! Static classification of RPC methods for caching.

use serde::Serialize;

/// Which tier a cached response lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// Quickly changing market data (tickers, order books).
    Fast,
    /// Near-static metadata (instruments, currencies).
    Slow,
}

/// How responses of a method may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodClass {
    /// Never cached: authentication and anything that mutates state.
    NoCache,
    /// Cached with the slow-tier TTL.
    Slow,
    /// Cached with the fast-tier TTL.
    Fast,
}

impl MethodClass {
    /// Classify a fully-qualified method name (e.g. `public/ticker`).
    ///
    /// This is the only place the classification lives; the read and the
    /// write path of the cache both go through it.
    pub fn of(method: &str) -> Self {
        match method {
            "public/auth"
            | "public/exchange_token"
            | "public/fork_token"
            | "private/logout"
            | "private/buy"
            | "private/sell"
            | "private/edit"
            | "private/edit_by_label"
            | "private/cancel"
            | "private/cancel_all"
            | "private/cancel_all_by_currency"
            | "private/cancel_all_by_instrument"
            | "private/cancel_by_label"
            | "private/close_position" => Self::NoCache,
            "public/get_instruments"
            | "public/get_currencies"
            | "public/get_index"
            | "public/get_index_price_names" => Self::Slow,
            _ => Self::Fast,
        }
    }

    /// The tier responses are stored in, or `None` if never cached.
    pub fn tier(self) -> Option<CacheTier> {
        match self {
            Self::NoCache => None,
            Self::Slow => Some(CacheTier::Slow),
            Self::Fast => Some(CacheTier::Fast),
        }
    }
}
