//! Connectivity and credential checks.
//!
//! Each check returns a serializable report instead of an error, so that a
//! caller can print or forward the outcome of every check in one go.

use serde::Serialize;
use serde_json::{Value, json};

use crate::client::DeribitClient;
use crate::config::ConfigSummary;
use crate::error::{DeribitError, error_codes};
use crate::rpc::RpcTransport;

/// Number of token characters shown in [`AuthReport::token_preview`].
pub const TOKEN_PREVIEW_CHARS: usize = 20;

/// Outcome of [`check_public`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublicApiReport {
    /// Whether `public/get_time` answered
    pub success: bool,
    /// Failure description
    pub error: Option<String>,
    /// Result of `public/get_time` (milliseconds since the epoch)
    pub server_time: Option<Value>,
    /// Result of `public/status`, if it answered
    pub status: Option<Value>,
}

/// Outcome of [`check_authentication`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthReport {
    /// Whether a token was obtained
    pub success: bool,
    /// Failure description, with a credentials hint on `13009`
    pub error: Option<String>,
    /// First characters of the access token
    pub token_preview: Option<String>,
    /// Remaining token lifetime in seconds
    pub expires_in: Option<u64>,
}

/// Outcome of [`check_private`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrivateApiReport {
    /// Whether the account summary was fetched
    pub success: bool,
    /// Failure description
    pub error: Option<String>,
    /// Selected account fields
    pub account_summary: Option<AccountSummary>,
}

/// The fields of `private/get_account_summary` worth showing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccountSummary {
    /// Account currency
    pub currency: Option<Value>,
    /// Total equity
    pub equity: Option<Value>,
    /// Funds available for trading
    pub available_funds: Option<Value>,
}

/// Outcome of [`run_diagnostics`].
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    /// Configuration with secrets redacted
    pub config: ConfigSummary,
    /// Whether credentials are configured
    pub has_credentials: bool,
    /// Public connectivity
    pub public_api: PublicApiReport,
    /// Token acquisition
    pub authentication: AuthReport,
    /// Authenticated connectivity
    pub private_api: PrivateApiReport,
}

impl DiagnosticsReport {
    /// Public access works, and authentication works if private access is enabled.
    pub fn is_healthy(&self) -> bool {
        self.public_api.success && (!self.config.enable_private || self.authentication.success)
    }
}

/// Check public connectivity with `public/get_time` and `public/status`.
///
/// Only `public/get_time` is required to succeed.
pub async fn check_public<T: RpcTransport>(client: &DeribitClient<T>) -> PublicApiReport {
    let mut report = PublicApiReport::default();

    tracing::info!("Checking public API: get_time");
    match client.call_public("get_time", json!({})).await {
        Ok(time) => report.server_time = Some(time),
        Err(error) => {
            let message = format!("Deribit API error: {error}");
            tracing::error!(code = error.code(), "{message}");
            report.error = Some(message);
            return report;
        }
    }

    tracing::info!("Checking public API: status");
    match client.call_public("status", json!({})).await {
        Ok(status) => report.status = Some(status),
        Err(error) => tracing::warn!(code = error.code(), "Status check failed: {error}"),
    }

    report.success = true;
    report
}

/// Check that the configured credentials yield an access token.
pub async fn check_authentication<T: RpcTransport>(client: &DeribitClient<T>) -> AuthReport {
    let mut report = AuthReport::default();

    let Some(credentials) = client.config().credentials.as_ref().filter(|c| c.is_complete())
    else {
        let message =
            "No credentials configured (DERIBIT_CLIENT_ID and DERIBIT_CLIENT_SECRET)".to_string();
        tracing::error!("{message}");
        report.error = Some(message);
        return report;
    };

    tracing::info!(client_id = %credentials.masked_client_id(), "Checking authentication");

    match client.access_token().await {
        Ok(token) => {
            report.success = true;
            report.token_preview = Some(token_preview(&token));
            report.expires_in = client.token_expires_in().await.map(|d| d.as_secs());
            tracing::info!("Authentication successful");
        }
        Err(error) => {
            let message = format!("Authentication failed: {}", describe(&error));
            let hint = match error.code() {
                error_codes::UNAUTHORIZED => {
                    " (Invalid credentials - check CLIENT_ID and CLIENT_SECRET)"
                }
                error_codes::INVALID_CREDENTIALS => " (Invalid grant type or credentials)",
                _ => "",
            };
            tracing::error!(code = error.code(), "{message}");
            report.error = Some(format!("{message}{hint}"));
        }
    }

    report
}

/// Check private access with `private/get_account_summary` for BTC.
pub async fn check_private<T: RpcTransport>(client: &DeribitClient<T>) -> PrivateApiReport {
    let mut report = PrivateApiReport::default();

    if !client.config().enable_private {
        let message = "Private API is disabled (DERIBIT_ENABLE_PRIVATE=false)".to_string();
        tracing::warn!("{message}");
        report.error = Some(message);
        return report;
    }

    tracing::info!("Checking private API: get_account_summary");
    match client
        .call_private("get_account_summary", json!({ "currency": "BTC" }))
        .await
    {
        Ok(account) => {
            report.account_summary = Some(AccountSummary {
                currency: account.get("currency").cloned(),
                equity: account.get("equity").cloned(),
                available_funds: account.get("available_funds").cloned(),
            });
            report.success = true;
            tracing::info!("Private API access successful");
        }
        Err(error) => {
            let prefix = if error.is_auth() {
                "Private API authentication error"
            } else {
                "Private API error"
            };
            let message = format!("{prefix}: {}", describe(&error));
            tracing::error!(code = error.code(), "{message}");
            report.error = Some(message);
        }
    }

    report
}

/// Run every check in order: public, authentication, private.
pub async fn run_diagnostics<T: RpcTransport>(client: &DeribitClient<T>) -> DiagnosticsReport {
    let config = client.config().safe_summary();
    tracing::info!(
        env = %config.env,
        base_url = %config.base_url,
        enable_private = config.enable_private,
        has_credentials = client.has_credentials(),
        "Running Deribit diagnostics"
    );

    let report = DiagnosticsReport {
        has_credentials: client.has_credentials(),
        public_api: check_public(client).await,
        authentication: check_authentication(client).await,
        private_api: check_private(client).await,
        config,
    };

    tracing::info!(
        public_api = report.public_api.success,
        authentication = report.authentication.success,
        private_api = report.private_api.success,
        "Diagnostics finished"
    );
    report
}

fn token_preview(token: &str) -> String {
    match token.char_indices().nth(TOKEN_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &token[..idx]),
        None => token.to_string(),
    }
}

fn describe(error: &DeribitError) -> String {
    match error.rpc_error() {
        Some(rpc) => format!("{} - {}", rpc.code, rpc.message),
        None => error.to_string(),
    }
}
