//! Access-token acquisition shared by all concurrent callers.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::auth::{AuthResponse, AuthToken, Credentials};
use crate::error::{DeribitError, error_codes};
use crate::sanitize::truncate;

/// JSON-RPC method used for the client-credentials grant.
pub const AUTH_METHOD: &str = "public/auth";

/// Obtains and caches the bearer token.
///
/// The refresh critical section is guarded by an async mutex, so concurrent
/// callers that all find the token missing issue a single `public/auth`
/// request. Callers that queued behind an attempt observe its outcome,
/// success or failure, instead of starting one of their own.
#[derive(Debug)]
pub struct AuthManager {
    credentials: Option<Credentials>,
    slot: Mutex<TokenSlot>,
    /// Mirror of `TokenSlot::attempts`, readable without the lock.
    attempts: AtomicU64,
}

#[derive(Debug, Default)]
struct TokenSlot {
    token: Option<AuthToken>,
    attempts: u64,
    last_failure: Option<DeribitError>,
}

impl AuthManager {
    /// Create a manager for the given credentials.
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self {
            credentials,
            slot: Mutex::new(TokenSlot::default()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Whether usable credentials are configured.
    pub fn has_credentials(&self) -> bool {
        self.credentials.as_ref().is_some_and(Credentials::is_complete)
    }

    /// Get a valid access token, authenticating through `authenticate` if needed.
    ///
    /// `authenticate` receives the `public/auth` params and must perform the
    /// RPC, returning its `result`.
    pub async fn access_token<F, Fut>(&self, authenticate: F) -> Result<String, DeribitError>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<Value, DeribitError>>,
    {
        let observed = self.attempts.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;

        if let Some(token) = slot.token.as_ref().filter(|t| t.is_usable()) {
            return Ok(token.access_token().to_string());
        }

        let credentials = self
            .credentials
            .as_ref()
            .filter(|c| c.is_complete())
            .ok_or_else(|| {
                DeribitError::unauthorized(
                    "No credentials configured. Set DERIBIT_CLIENT_ID and DERIBIT_CLIENT_SECRET",
                )
            })?;

        // An attempt finished while we were queued: share its failure.
        if slot.attempts != observed {
            if let Some(error) = &slot.last_failure {
                return Err(error.clone());
            }
        }

        tracing::info!(
            client_id = %credentials.masked_client_id(),
            "Authenticating with Deribit"
        );

        let params = json!({
            "grant_type": "client_credentials",
            "client_id": credentials.client_id,
            "client_secret": credentials.expose_secret(),
        });
        let outcome = match authenticate(params).await {
            Ok(result) => parse_auth_result(result),
            Err(error @ DeribitError::Auth(_)) => Err(error),
            Err(error) => Err(DeribitError::unauthorized(format!(
                "Authentication error: {}",
                truncate(&error.to_string(), 200)
            ))),
        };

        slot.attempts += 1;
        self.attempts.store(slot.attempts, Ordering::Release);

        match outcome {
            Ok(token) => {
                tracing::info!(
                    expires_in_secs = token.expires_in().as_secs(),
                    "Authentication successful"
                );
                let access_token = token.access_token().to_string();
                slot.token = Some(token);
                slot.last_failure = None;
                Ok(access_token)
            }
            Err(error) => {
                tracing::error!(code = error.code(), "Authentication failed: {error}");
                if error.code() == error_codes::UNAUTHORIZED {
                    tracing::error!(
                        "Invalid credentials - please check DERIBIT_CLIENT_ID and DERIBIT_CLIENT_SECRET"
                    );
                }
                slot.token = None;
                slot.last_failure = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Discard the cached token so the next call re-authenticates.
    pub async fn invalidate(&self) {
        self.slot.lock().await.token = None;
    }

    /// Discard the cached token only if it is still `rejected`.
    ///
    /// A token obtained by another caller after `rejected` was handed out
    /// is kept.
    pub async fn invalidate_token(&self, rejected: &str) {
        let mut slot = self.slot.lock().await;
        if slot.token.as_ref().is_some_and(|t| t.access_token() == rejected) {
            tracing::debug!("Discarding rejected access token");
            slot.token = None;
        }
    }

    /// Remaining lifetime of the cached token, if there is one.
    pub async fn token_expires_in(&self) -> Option<Duration> {
        self.slot.lock().await.token.as_ref().map(AuthToken::expires_in)
    }
}

fn parse_auth_result(result: Value) -> Result<AuthToken, DeribitError> {
    match serde_json::from_value::<AuthResponse>(result) {
        Ok(response) if !response.access_token.is_empty() => Ok(response.into_token()),
        _ => Err(DeribitError::unauthorized(
            "Authentication response missing access_token",
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use futures_util::future::join_all;

    use super::*;
    use crate::error::RpcError;

    fn manager() -> AuthManager {
        AuthManager::new(Some(Credentials::new("client", "secret")))
    }

    async fn grant(counter: Arc<AtomicUsize>, result: Result<Value, DeribitError>) -> Result<Value, DeribitError> {
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        result
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_authentication() {
        let manager = manager();
        let calls = Arc::new(AtomicUsize::new(0));

        let tokens = join_all((0..8).map(|_| {
            let calls = calls.clone();
            manager.access_token(move |_| {
                grant(calls, Ok(json!({ "access_token": "tok", "expires_in": 900 })))
            })
        }))
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for token in tokens {
            assert_eq!(token.unwrap(), "tok");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_failure() {
        let manager = manager();
        let calls = Arc::new(AtomicUsize::new(0));

        let results = join_all((0..4).map(|_| {
            let calls = calls.clone();
            manager.access_token(move |_| {
                grant(
                    calls,
                    Err(DeribitError::Auth(RpcError::new(13004, "invalid_credentials"))),
                )
            })
        }))
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap_err().code(), 13004);
        }

        // A later caller starts a fresh attempt.
        let token = manager
            .access_token(|_| async { Ok(json!({ "access_token": "fresh" })) })
            .await
            .unwrap();
        assert_eq!(token, "fresh");
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let manager = AuthManager::new(None);
        let err = manager
            .access_token(|_| async { Ok(json!({ "access_token": "tok" })) })
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert_eq!(err.code(), error_codes::UNAUTHORIZED);
        assert!(!manager.has_credentials());
    }

    #[tokio::test]
    async fn test_missing_access_token_in_response() {
        let manager = manager();
        let err = manager
            .access_token(|_| async { Ok(json!({ "token_type": "bearer" })) })
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().contains("missing access_token"));
    }

    #[tokio::test]
    async fn test_non_auth_failure_wrapped() {
        let manager = manager();
        let err = manager
            .access_token(|_| async {
                Err(DeribitError::Timeout {
                    timeout: Duration::from_secs(10),
                })
            })
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_cached_token_reused_and_invalidated() {
        let manager = manager();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            manager
                .access_token(move |params| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(params["grant_type"], "client_credentials");
                    assert_eq!(params["client_id"], "client");
                    Ok(json!({ "access_token": "tok", "refresh_token": "ref", "expires_in": 900 }))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(manager.token_expires_in().await.is_some());

        manager.invalidate().await;
        assert!(manager.token_expires_in().await.is_none());
    }

    #[tokio::test]
    async fn test_stale_rejection_keeps_newer_token() {
        let manager = manager();
        manager
            .access_token(|_| async { Ok(json!({ "access_token": "fresh", "expires_in": 900 })) })
            .await
            .unwrap();

        manager.invalidate_token("stale").await;
        assert!(manager.token_expires_in().await.is_some());

        manager.invalidate_token("fresh").await;
        assert!(manager.token_expires_in().await.is_none());
    }
}
