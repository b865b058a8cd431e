//! The retrying Deribit JSON-RPC client.

use std::borrow::Cow;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;

use crate::auth::{AUTH_METHOD, AuthManager, Credentials};
use crate::cache::{CacheStats, ResponseCache};
use crate::config::{ClientConfig, DeribitEnv};
use crate::error::DeribitError;
use crate::rate_limit::{TokenBucket, bucket_for_rps};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::rpc::{HttpTransport, RpcTransport};

/// Namespace prefix of unauthenticated methods.
pub const PUBLIC_PREFIX: &str = "public/";

/// Namespace prefix of authenticated methods.
pub const PRIVATE_PREFIX: &str = "private/";

/// Resilient client for the Deribit JSON-RPC API.
///
/// A single client is meant to be shared (`Arc<DeribitClient>`) by every
/// task that talks to the exchange. It owns the request rate limiter, the
/// response cache and the bearer token, so all callers are paced together,
/// share cached results and trigger at most one authentication at a time.
///
/// # Example
///
/// ```rust,no_run
/// use deribit_rpc_client::DeribitClient;
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = DeribitClient::builder().build()?;
///
///     let ticker = client
///         .call_public("ticker", json!({ "instrument_name": "BTC-PERPETUAL" }))
///         .await?;
///     println!("Mark price: {}", ticker["mark_price"]);
///
///     Ok(())
/// }
/// ```
///
/// For private methods, provide credentials and enable private access:
///
/// ```rust,no_run
/// use deribit_rpc_client::DeribitClient;
/// use deribit_rpc_client::auth::Credentials;
/// use deribit_rpc_client::config::DeribitEnv;
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = DeribitClient::builder()
///         .env(DeribitEnv::Test)
///         .credentials(Credentials::new("client_id", "client_secret"))
///         .enable_private(true)
///         .build()?;
///
///     let summary = client
///         .call_private("get_account_summary", json!({ "currency": "BTC" }))
///         .await?;
///     println!("Equity: {}", summary["equity"]);
///
///     Ok(())
/// }
/// ```
pub struct DeribitClient<T = HttpTransport> {
    transport: T,
    config: ClientConfig,
    bucket: TokenBucket,
    cache: Mutex<ResponseCache>,
    auth: AuthManager,
}

impl DeribitClient<HttpTransport> {
    /// Create a client over HTTP from a configuration.
    pub fn new(config: ClientConfig) -> Result<Self, DeribitError> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create a client configured from `DERIBIT_*` environment variables.
    pub fn from_env() -> Result<Self, DeribitError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Create a new client builder.
    pub fn builder() -> DeribitClientBuilder {
        DeribitClientBuilder::new()
    }
}

impl<T: RpcTransport> DeribitClient<T> {
    /// Create a client over an arbitrary transport.
    ///
    /// The configuration is used as given, without validation.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            bucket: bucket_for_rps(config.max_rps),
            cache: Mutex::new(ResponseCache::new(config.cache_ttl_fast, config.cache_ttl_slow)),
            auth: AuthManager::new(config.credentials.clone()),
            transport,
            config,
        }
    }

    /// Call `method` with the configured retry budget.
    ///
    /// Cached results are returned without touching the rate limiter or the
    /// network. Authenticated calls send the bearer token, obtaining one first
    /// if needed.
    pub async fn call(&self, method: &str, params: Value, use_auth: bool) -> Result<Value, DeribitError> {
        self.call_with_retries(method, params, use_auth, self.config.retry.max_retries)
            .await
    }

    /// Call `method`, making at most `max_retries + 1` attempts.
    ///
    /// - Throttling and transient failures are retried with backoff.
    /// - Client errors (codes `10000..20000`) fail immediately.
    /// - A rejected token on the first attempt of an authenticated call is
    ///   replaced once without consuming an attempt.
    pub async fn call_with_retries(
        &self,
        method: &str,
        params: Value,
        use_auth: bool,
        max_retries: u32,
    ) -> Result<Value, DeribitError> {
        if use_auth {
            self.ensure_private_enabled()?;
        }

        let cached = self.cache().get(method, &params);
        if let Some(result) = cached {
            return Ok(result);
        }

        let mut token = if use_auth {
            Some(self.access_token().await?)
        } else {
            None
        };
        let mut reauthenticated = false;
        let mut attempt = 0;

        loop {
            let error = match self.execute_once(method, &params, token.as_deref()).await {
                Ok(result) => {
                    self.cache().insert(method, &params, result.clone());
                    return Ok(result);
                }
                Err(error) => error,
            };

            if let Some(rejected) = token.as_deref().filter(|_| error.is_auth()) {
                self.auth.invalidate_token(rejected).await;
            }

            let can_reauthenticate = use_auth && !reauthenticated;
            match self
                .config
                .retry
                .decide(&error, attempt, max_retries, can_reauthenticate)
            {
                RetryDecision::Reauthenticate => {
                    tracing::warn!(method, code = error.code(), "Token rejected, re-authenticating");
                    reauthenticated = true;
                    token = Some(self.access_token().await?);
                }
                RetryDecision::Backoff(delay) => {
                    tracing::warn!(
                        method,
                        attempt = attempt + 1,
                        max_attempts = max_retries + 1,
                        code = error.code(),
                        delay_ms = delay.as_millis() as u64,
                        "Request failed, retrying: {error}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::Fail => return Err(error),
            }
        }
    }

    /// Call an unauthenticated method; `public/` is prepended when absent.
    pub async fn call_public(&self, method: &str, params: Value) -> Result<Value, DeribitError> {
        let method = namespaced(PUBLIC_PREFIX, method);
        self.call(&method, params, false).await
    }

    /// Call an authenticated method; `private/` is prepended when absent.
    pub async fn call_private(&self, method: &str, params: Value) -> Result<Value, DeribitError> {
        let method = namespaced(PRIVATE_PREFIX, method);
        self.call(&method, params, true).await
    }

    /// Get a valid access token, authenticating if needed.
    ///
    /// Concurrent callers share a single `public/auth` request.
    pub async fn access_token(&self) -> Result<String, DeribitError> {
        self.auth
            .access_token(|params| async move { self.execute_once(AUTH_METHOD, &params, None).await })
            .await
    }

    /// Remaining lifetime of the cached token, if there is one.
    pub async fn token_expires_in(&self) -> Option<Duration> {
        self.auth.token_expires_in().await
    }

    /// Entry counts of the response cache, after sweeping expired entries.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.cache().clear();
        tracing::info!("Response cache cleared");
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether credentials are configured.
    pub fn has_credentials(&self) -> bool {
        self.auth.has_credentials()
    }

    /// Shut the client down, discarding cached state and releasing the
    /// HTTP connection pool.
    pub async fn close(self) {
        self.cache().clear();
        self.auth.invalidate().await;
        tracing::info!("Deribit client closed");
    }

    fn ensure_private_enabled(&self) -> Result<(), DeribitError> {
        if self.config.enable_private {
            Ok(())
        } else {
            Err(DeribitError::unauthorized(
                "Private API is disabled (DERIBIT_ENABLE_PRIVATE=false)",
            ))
        }
    }

    /// One rate-limited transport call.
    async fn execute_once(
        &self,
        method: &str,
        params: &Value,
        bearer_token: Option<&str>,
    ) -> Result<Value, DeribitError> {
        let waited = self.bucket.acquire(1.0).await;
        if !waited.is_zero() {
            tracing::debug!(method, waited_ms = waited.as_millis() as u64, "Rate limit wait");
        }
        self.transport.execute(method, params, bearer_token).await
    }

    fn cache(&self) -> MutexGuard<'_, ResponseCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> std::fmt::Debug for DeribitClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeribitClient")
            .field("env", &self.config.env)
            .field("base_url", &self.config.base_url)
            .field("enable_private", &self.config.enable_private)
            .field("has_credentials", &self.auth.has_credentials())
            .finish()
    }
}

fn namespaced<'a>(prefix: &str, method: &'a str) -> Cow<'a, str> {
    if method.starts_with(prefix) {
        Cow::Borrowed(method)
    } else {
        Cow::Owned(format!("{prefix}{method}"))
    }
}

/// Builder for [`DeribitClient`].
#[derive(Debug, Clone)]
pub struct DeribitClientBuilder {
    config: ClientConfig,
    base_url: Option<String>,
}

impl DeribitClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            base_url: None,
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        let base_url = Some(config.base_url.clone());
        Self { config, base_url }
    }

    /// Select the environment; also selects its endpoint unless
    /// [`base_url`](Self::base_url) is set.
    pub fn env(mut self, env: DeribitEnv) -> Self {
        self.config.env = env;
        self
    }

    /// Set the base URL (useful for testing with a mock server).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the client credentials.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    /// Allow or refuse `private/*` calls.
    pub fn enable_private(mut self, enabled: bool) -> Self {
        self.config.enable_private = enabled;
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the sustained request rate.
    pub fn max_rps(mut self, max_rps: f64) -> Self {
        self.config.max_rps = max_rps;
        self
    }

    /// Set the fast cache tier TTL.
    pub fn cache_ttl_fast(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl_fast = ttl;
        self
    }

    /// Set the slow cache tier TTL.
    pub fn cache_ttl_slow(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl_slow = ttl;
        self
    }

    /// Set the retry and backoff policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Set the default number of retries after the first attempt.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.retry.max_retries = retries;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// The configuration the builder would produce.
    pub fn into_config(self) -> ClientConfig {
        let mut config = self.config;
        config.base_url = self
            .base_url
            .unwrap_or_else(|| config.env.base_url().to_string());
        config
    }

    /// Validate the configuration and build an HTTP client.
    pub fn build(self) -> Result<DeribitClient, DeribitError> {
        DeribitClient::new(self.into_config())
    }

    /// Validate the configuration and build a client over `transport`.
    pub fn build_with_transport<T: RpcTransport>(
        self,
        transport: T,
    ) -> Result<DeribitClient<T>, DeribitError> {
        let config = self.into_config();
        config.validate()?;
        Ok(DeribitClient::with_transport(config, transport))
    }
}

impl Default for DeribitClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
