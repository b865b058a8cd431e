//! Error types for the Deribit client library.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// The main error type for all Deribit client operations.
///
/// Every failure the client surfaces is one of these typed variants so that
/// callers can degrade gracefully instead of treating all errors alike.
#[derive(Error, Debug, Clone)]
pub enum DeribitError {
    /// The transport did not complete within the configured request timeout.
    #[error("Request timed out after {timeout:?}")]
    Timeout {
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// The exchange signaled throttling.
    #[error("Rate limit exceeded: {0}")]
    RateLimit(RpcError),

    /// Credentials are missing, expired or were rejected.
    #[error("Authentication error: {0}")]
    Auth(RpcError),

    /// Any other failure reported by the exchange or the HTTP layer.
    #[error("Deribit API error: {0}")]
    Api(RpcError),

    /// The client configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DeribitError {
    /// Build an authentication error with the generic "unauthorized" code.
    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::Auth(RpcError::new(error_codes::UNAUTHORIZED, message))
    }

    /// Build an API error for failures that never reached the exchange.
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Api(RpcError::new(error_codes::TRANSPORT_FAILURE, message))
    }

    /// Numeric code associated with this error.
    ///
    /// Timeouts and configuration errors report [`error_codes::TRANSPORT_FAILURE`].
    pub fn code(&self) -> i64 {
        match self {
            Self::RateLimit(e) | Self::Auth(e) | Self::Api(e) => e.code,
            Self::Timeout { .. } | Self::Config(_) => error_codes::TRANSPORT_FAILURE,
        }
    }

    /// Exchange-reported details, if the error carries any.
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            Self::RateLimit(e) | Self::Auth(e) | Self::Api(e) => Some(e),
            Self::Timeout { .. } | Self::Config(_) => None,
        }
    }

    /// Check if this is an authentication error.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimit(_))
    }

    /// Check if this is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// The error object of a JSON-RPC error response.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    /// Deribit error code, or the HTTP status for non-2xx responses
    pub code: i64,
    /// Human-readable error message (sanitized of secrets)
    pub message: String,
    /// Optional extra data attached by the exchange
    pub data: Option<Value>,
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl RpcError {
    /// Create a new RPC error from code and message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach exchange-provided data.
    pub fn with_data(mut self, data: Option<Value>) -> Self {
        self.data = data;
        self
    }

    /// The classification of this error's code.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_code(self.code)
    }
}

/// Classification of exchange error codes.
///
/// This is the single table used both when the transport turns an error
/// response into a [`DeribitError`] and when the retry policy decides
/// whether a generic API error is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Throttled by the exchange.
    RateLimit,
    /// Credentials rejected or missing.
    Auth,
    /// The request itself is wrong; retrying cannot help.
    ClientError,
    /// Server-side or transport failure; may succeed on retry.
    ServerError,
}

impl ErrorKind {
    /// Map an exchange (or HTTP status) code to its kind.
    ///
    /// | code                       | kind          |
    /// |----------------------------|---------------|
    /// | 10028                      | `RateLimit`   |
    /// | 13004, 13009               | `Auth`        |
    /// | 10000..=19999 (otherwise)  | `ClientError` |
    /// | anything else              | `ServerError` |
    pub fn from_code(code: i64) -> Self {
        match code {
            error_codes::TOO_MANY_REQUESTS => Self::RateLimit,
            error_codes::INVALID_CREDENTIALS | error_codes::UNAUTHORIZED => Self::Auth,
            c if error_codes::CLIENT_ERROR_RANGE.contains(&c) => Self::ClientError,
            _ => Self::ServerError,
        }
    }

    /// Whether an error of this kind may be retried at all.
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::ClientError)
    }
}

/// Known Deribit error codes.
pub mod error_codes {
    use std::ops::Range;

    /// Failure that never produced an exchange error code (network, parse).
    pub const TRANSPORT_FAILURE: i64 = -1;

    /// "too_many_requests"
    pub const TOO_MANY_REQUESTS: i64 = 10028;

    /// "invalid_credentials"
    pub const INVALID_CREDENTIALS: i64 = 13004;

    /// "unauthorized"
    pub const UNAUTHORIZED: i64 = 13009;

    /// Exchange codes describing a malformed or rejected request.
    pub const CLIENT_ERROR_RANGE: Range<i64> = 10000..20000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(ErrorKind::from_code(10028), ErrorKind::RateLimit);
        assert_eq!(ErrorKind::from_code(13004), ErrorKind::Auth);
        assert_eq!(ErrorKind::from_code(13009), ErrorKind::Auth);
        assert_eq!(ErrorKind::from_code(10001), ErrorKind::ClientError);
        assert_eq!(ErrorKind::from_code(11050), ErrorKind::ClientError);
        assert_eq!(ErrorKind::from_code(19999), ErrorKind::ClientError);
        assert_eq!(ErrorKind::from_code(20000), ErrorKind::ServerError);
        assert_eq!(ErrorKind::from_code(500), ErrorKind::ServerError);
        assert_eq!(ErrorKind::from_code(-1), ErrorKind::ServerError);
    }

    #[test]
    fn test_client_errors_not_retryable() {
        assert!(!ErrorKind::ClientError.is_retryable());
        assert!(ErrorKind::ServerError.is_retryable());
        assert!(ErrorKind::RateLimit.is_retryable());
    }

    #[test]
    fn test_rpc_error_display() {
        let error = RpcError::new(10001, "Test error");
        assert_eq!(error.to_string(), "10001: Test error");

        let wrapped = DeribitError::RateLimit(RpcError::new(10028, "too_many_requests"));
        assert_eq!(wrapped.to_string(), "Rate limit exceeded: 10028: too_many_requests");
        assert_eq!(wrapped.code(), 10028);
    }

    #[test]
    fn test_timeout_code() {
        let error = DeribitError::Timeout {
            timeout: Duration::from_secs(5),
        };
        assert!(error.is_timeout());
        assert_eq!(error.code(), error_codes::TRANSPORT_FAILURE);
        assert!(error.rpc_error().is_none());
    }
}
