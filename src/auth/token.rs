//! Bearer tokens issued by `public/auth`.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::time::Instant;

/// A token is treated as expired this long before its real expiry so that
/// in-flight requests never carry a token the exchange has already dropped.
pub const EXPIRY_BUFFER: Duration = Duration::from_secs(30);

/// Lifetime assumed when the exchange omits `expires_in`.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(900);

/// Lifetime used when the reported one does not fit in an [`Instant`].
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cached authentication token.
#[derive(Clone)]
pub struct AuthToken {
    access_token: SecretString,
    refresh_token: SecretString,
    expires_at: Instant,
}

impl AuthToken {
    /// Create a token that expires `ttl` from now.
    ///
    /// A `ttl` too large to represent is capped at [`MAX_TOKEN_TTL`].
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>, ttl: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + MAX_TOKEN_TTL);
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
            expires_at,
        }
    }

    /// The bearer credential.
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// The refresh token, empty if the exchange did not return one.
    pub fn refresh_token(&self) -> &str {
        self.refresh_token.expose_secret()
    }

    /// Absolute expiry instant reported by the exchange.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Time until expiry, zero once expired.
    pub fn expires_in(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Whether the token may still be used at `now`.
    pub fn is_usable_at(&self, now: Instant) -> bool {
        now + EXPIRY_BUFFER < self.expires_at
    }

    /// Whether the token may still be used.
    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Instant::now())
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in())
            .finish()
    }
}

/// Result of a successful `public/auth` call.
#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl AuthResponse {
    pub(crate) fn into_token(self) -> AuthToken {
        let ttl = self
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);
        AuthToken::new(self.access_token, self.refresh_token, ttl)
    }
}
