//! Client configuration.
//!
//! A [`ClientConfig`] is built once, from defaults, the environment or the
//! [`DeribitClientBuilder`](crate::client::DeribitClientBuilder), validated,
//! and then handed to the client. It is never mutated afterwards.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::auth::{CLIENT_ID_VAR, CLIENT_SECRET_VAR, Credentials};
use crate::error::DeribitError;
use crate::retry::RetryPolicy;
use crate::sanitize::REDACTED;

/// Production JSON-RPC endpoint.
pub const PROD_BASE_URL: &str = "https://www.deribit.com/api/v2";

/// Testnet JSON-RPC endpoint.
pub const TEST_BASE_URL: &str = "https://test.deribit.com/api/v2";

/// Environment variable names read by [`ClientConfig::from_env`].
pub mod env_vars {
    /// `prod` or `test`
    pub const ENV: &str = "DERIBIT_ENV";
    /// `true` to allow `private/*` calls
    pub const ENABLE_PRIVATE: &str = "DERIBIT_ENABLE_PRIVATE";
    /// Request timeout in seconds
    pub const TIMEOUT_S: &str = "DERIBIT_TIMEOUT_S";
    /// Requests per second
    pub const MAX_RPS: &str = "DERIBIT_MAX_RPS";
    /// Fast cache tier TTL in seconds
    pub const CACHE_TTL_FAST: &str = "DERIBIT_CACHE_TTL_FAST";
    /// Slow cache tier TTL in seconds
    pub const CACHE_TTL_SLOW: &str = "DERIBIT_CACHE_TTL_SLOW";
}

/// Deribit deployment to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeribitEnv {
    /// Production
    #[default]
    Prod,
    /// Testnet
    Test,
}

impl DeribitEnv {
    /// JSON-RPC endpoint of this environment.
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Prod => PROD_BASE_URL,
            Self::Test => TEST_BASE_URL,
        }
    }
}

impl fmt::Display for DeribitEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prod => f.write_str("prod"),
            Self::Test => f.write_str("test"),
        }
    }
}

impl FromStr for DeribitEnv {
    type Err = DeribitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" => Ok(Self::Prod),
            "test" => Ok(Self::Test),
            other => Err(DeribitError::Config(format!(
                "unknown environment {other:?}, expected \"prod\" or \"test\""
            ))),
        }
    }
}

/// Immutable configuration of a [`DeribitClient`](crate::DeribitClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Target environment
    pub env: DeribitEnv,
    /// JSON-RPC endpoint; defaults to the environment's URL
    pub base_url: String,
    /// Whether `private/*` calls are allowed
    pub enable_private: bool,
    /// Client credentials for the client-credentials grant
    pub credentials: Option<Credentials>,
    /// Per-request HTTP timeout
    pub timeout: Duration,
    /// Sustained request rate
    pub max_rps: f64,
    /// TTL of the fast cache tier (market data)
    pub cache_ttl_fast: Duration,
    /// TTL of the slow cache tier (instrument metadata)
    pub cache_ttl_slow: Duration,
    /// Retry and backoff policy
    pub retry: RetryPolicy,
    /// `User-Agent` header value
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            env: DeribitEnv::Prod,
            base_url: PROD_BASE_URL.to_string(),
            enable_private: false,
            credentials: None,
            timeout: Duration::from_secs(10),
            max_rps: 8.0,
            cache_ttl_fast: Duration::from_secs(1),
            cache_ttl_slow: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            user_agent: default_user_agent(),
        }
    }
}

/// `deribit-rpc-client/<version>`.
pub fn default_user_agent() -> String {
    format!("deribit-rpc-client/{}", env!("CARGO_PKG_VERSION"))
}

impl ClientConfig {
    /// Configuration for an environment with all other settings at defaults.
    pub fn for_env(env: DeribitEnv) -> Self {
        Self {
            env,
            base_url: env.base_url().to_string(),
            ..Self::default()
        }
    }

    /// Read the configuration from `DERIBIT_*` environment variables.
    ///
    /// Unset variables keep their defaults. The result is validated.
    pub fn from_env() -> Result<Self, DeribitError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DeribitError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = match lookup(env_vars::ENV) {
            Some(value) => value.parse()?,
            None => DeribitEnv::Prod,
        };
        let mut config = Self::for_env(env);

        if let Some(value) = lookup(env_vars::ENABLE_PRIVATE) {
            config.enable_private = parse_bool(env_vars::ENABLE_PRIVATE, &value)?;
        }
        if let Some(value) = lookup(env_vars::TIMEOUT_S) {
            config.timeout = parse_secs(env_vars::TIMEOUT_S, &value)?;
        }
        if let Some(value) = lookup(env_vars::MAX_RPS) {
            config.max_rps = parse_f64(env_vars::MAX_RPS, &value)?;
        }
        if let Some(value) = lookup(env_vars::CACHE_TTL_FAST) {
            config.cache_ttl_fast = parse_secs(env_vars::CACHE_TTL_FAST, &value)?;
        }
        if let Some(value) = lookup(env_vars::CACHE_TTL_SLOW) {
            config.cache_ttl_slow = parse_secs(env_vars::CACHE_TTL_SLOW, &value)?;
        }

        let client_id = lookup(CLIENT_ID_VAR).unwrap_or_default();
        let client_secret = lookup(CLIENT_SECRET_VAR).unwrap_or_default();
        let credentials = Credentials::new(client_id, client_secret);
        config.credentials = credentials.is_complete().then_some(credentials);

        config.validate()?;
        Ok(config)
    }

    /// Check every setting against its allowed range.
    pub fn validate(&self) -> Result<(), DeribitError> {
        check_range("timeout", self.timeout.as_secs_f64(), 1.0, 60.0)?;
        check_range("max_rps", self.max_rps, 1.0, 20.0)?;
        check_range("cache_ttl_fast", self.cache_ttl_fast.as_secs_f64(), 0.1, 10.0)?;
        check_range("cache_ttl_slow", self.cache_ttl_slow.as_secs_f64(), 5.0, 300.0)?;

        Url::parse(&self.base_url).map_err(|e| {
            DeribitError::Config(format!("invalid base URL {:?}: {e}", self.base_url))
        })?;

        Ok(())
    }

    /// Whether authenticated calls can be made at all.
    pub fn has_credentials(&self) -> bool {
        self.credentials.as_ref().is_some_and(Credentials::is_complete)
    }

    /// A loggable view of the configuration with secrets hidden.
    pub fn safe_summary(&self) -> ConfigSummary {
        ConfigSummary {
            env: self.env,
            base_url: self.base_url.clone(),
            enable_private: self.enable_private,
            client_id: self.credentials.as_ref().map(Credentials::masked_client_id),
            client_secret: self.credentials.as_ref().map(|_| REDACTED),
            timeout_secs: self.timeout.as_secs_f64(),
            max_rps: self.max_rps,
            cache_ttl_fast_secs: self.cache_ttl_fast.as_secs_f64(),
            cache_ttl_slow_secs: self.cache_ttl_slow.as_secs_f64(),
        }
    }
}

/// Serializable configuration summary returned by [`ClientConfig::safe_summary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSummary {
    /// Target environment
    pub env: DeribitEnv,
    /// JSON-RPC endpoint
    pub base_url: String,
    /// Whether authenticated methods are allowed
    pub enable_private: bool,
    /// Masked client id, if configured
    pub client_id: Option<String>,
    /// Redaction marker when a secret is configured
    pub client_secret: Option<&'static str>,
    /// Per-request timeout in seconds
    pub timeout_secs: f64,
    /// Local request budget per second
    pub max_rps: f64,
    /// TTL of the fast cache tier in seconds
    pub cache_ttl_fast_secs: f64,
    /// TTL of the slow cache tier in seconds
    pub cache_ttl_slow_secs: f64,
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<(), DeribitError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(DeribitError::Config(format!(
            "{name} must be between {min} and {max}, got {value}"
        )))
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, DeribitError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(DeribitError::Config(format!("{name}: expected a boolean, got {other:?}"))),
    }
}

fn parse_f64(name: &str, value: &str) -> Result<f64, DeribitError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DeribitError::Config(format!("{name}: expected a number, got {value:?}")))
}

fn parse_secs(name: &str, value: &str) -> Result<Duration, DeribitError> {
    let secs = parse_f64(name, value)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| DeribitError::Config(format!("{name}: invalid duration {value:?}")))
}
