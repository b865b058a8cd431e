//! Single-attempt JSON-RPC execution over HTTP.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{DeribitError, ErrorKind, RpcError};
use crate::rpc::{JsonRpcErrorObject, JsonRpcRequest, JsonRpcResponse, RequestIds};
use crate::sanitize::Sanitizer;

/// Executes exactly one JSON-RPC call and classifies its outcome.
///
/// Implementations must not retry: all retry and backoff policy lives in
/// [`DeribitClient`](crate::DeribitClient). The trait is the seam used to
/// substitute scripted transports in tests.
pub trait RpcTransport: Send + Sync {
    /// Call `method` with `params`, sending `bearer_token` if given.
    ///
    /// Returns the `result` member of the response.
    fn execute(
        &self,
        method: &str,
        params: &Value,
        bearer_token: Option<&str>,
    ) -> impl Future<Output = Result<Value, DeribitError>> + Send;
}

impl<T: RpcTransport> RpcTransport for Arc<T> {
    fn execute(
        &self,
        method: &str,
        params: &Value,
        bearer_token: Option<&str>,
    ) -> impl Future<Output = Result<Value, DeribitError>> + Send {
        (**self).execute(method, params, bearer_token)
    }
}

/// The HTTP transport used against the real exchange.
///
/// Every call is a POST of a JSON-RPC envelope to the single API endpoint
/// (e.g. `https://www.deribit.com/api/v2`).
pub struct HttpTransport {
    http_client: ClientWithMiddleware,
    endpoint: Url,
    timeout: Duration,
    request_ids: RequestIds,
    sanitizer: Sanitizer,
}

impl HttpTransport {
    /// Build a transport from the client configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, DeribitError> {
        let endpoint = Url::parse(&config.base_url).map_err(|e| {
            DeribitError::Config(format!("invalid base URL {:?}: {e}", config.base_url))
        })?;

        let mut headers = HeaderMap::new();
        let header_value = HeaderValue::from_str(&config.user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("deribit-rpc-client"));
        headers.insert(USER_AGENT, header_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let reqwest_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| DeribitError::Config(format!("failed to build HTTP client: {e}")))?;

        let http_client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        Ok(Self {
            http_client,
            endpoint,
            timeout: config.timeout,
            request_ids: RequestIds::new(),
            sanitizer: Sanitizer::new(config.credentials.as_ref()),
        })
    }

    /// The endpoint requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The id sequence used for outgoing requests.
    pub fn request_ids(&self) -> &RequestIds {
        &self.request_ids
    }

    fn network_error(&self, method: &str, error: reqwest::Error) -> DeribitError {
        if error.is_timeout() {
            tracing::error!(method, timeout = ?self.timeout, "Request timeout");
            return DeribitError::Timeout {
                timeout: self.timeout,
            };
        }
        let detail = self.sanitizer.sanitize(&error.to_string());
        tracing::error!(method, "Request failed: {detail}");
        DeribitError::transport(format!("Request failed: {detail}"))
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RpcTransport for HttpTransport {
    async fn execute(
        &self,
        method: &str,
        params: &Value,
        bearer_token: Option<&str>,
    ) -> Result<Value, DeribitError> {
        let request = JsonRpcRequest::new(self.request_ids.next_id(), method, params);
        let payload = serde_json::to_vec(&request)
            .map_err(|e| DeribitError::transport(format!("Failed to encode request: {e}")))?;

        tracing::debug!(method, id = request.id, "Sending JSON-RPC request");

        let mut builder = self.http_client.post(self.endpoint.clone()).body(payload);
        if let Some(token) = bearer_token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(reqwest_middleware::Error::Reqwest(e)) => return Err(self.network_error(method, e)),
            Err(e) => {
                let detail = self.sanitizer.sanitize(&e.to_string());
                tracing::error!(method, "Request failed: {detail}");
                return Err(DeribitError::transport(format!("Request failed: {detail}")));
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.network_error(method, e))?;

        if !status.is_success() {
            let sanitized = self.sanitizer.sanitize_body(&body);
            tracing::error!(method, status = status.as_u16(), "HTTP error: {sanitized}");
            return Err(DeribitError::Api(RpcError::new(
                i64::from(status.as_u16()),
                format!("HTTP error: {sanitized}"),
            )));
        }

        let envelope: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            let sanitized = self.sanitizer.sanitize_body(&body);
            tracing::error!(method, "Invalid JSON-RPC response: {e}");
            DeribitError::transport(format!("Invalid response: {e}. Body: {sanitized}"))
        })?;

        if let Some(error) = envelope.error {
            let error = classify_rpc_error(error, &self.sanitizer);
            tracing::debug!(method, code = error.code(), "JSON-RPC error: {error}");
            return Err(error);
        }

        Ok(envelope.result.unwrap_or(Value::Null))
    }
}

/// Turn a JSON-RPC error object into a typed error.
pub(crate) fn classify_rpc_error(error: JsonRpcErrorObject, sanitizer: &Sanitizer) -> DeribitError {
    let rpc = RpcError::new(error.code, sanitizer.sanitize(&error.message)).with_data(error.data);
    match rpc.kind() {
        ErrorKind::RateLimit => DeribitError::RateLimit(rpc),
        ErrorKind::Auth => DeribitError::Auth(rpc),
        ErrorKind::ClientError | ErrorKind::ServerError => DeribitError::Api(rpc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_object(code: i64, message: &str) -> JsonRpcErrorObject {
        JsonRpcErrorObject {
            code,
            message: message.to_string(),
            data: None,
        }
    }

    #[test]
    fn test_classify_rate_limit() {
        let error = classify_rpc_error(error_object(10028, "too_many_requests"), &Sanitizer::default());
        assert!(error.is_rate_limit());
    }

    #[test]
    fn test_classify_auth() {
        for code in [13004, 13009] {
            let error = classify_rpc_error(error_object(code, "unauthorized"), &Sanitizer::default());
            assert!(error.is_auth());
            assert_eq!(error.code(), code);
        }
    }

    #[test]
    fn test_classify_generic() {
        let error = classify_rpc_error(error_object(11050, "bad_request"), &Sanitizer::default());
        assert!(matches!(error, DeribitError::Api(ref e) if e.code == 11050));
    }

    #[test]
    fn test_classify_sanitizes_message() {
        let error = classify_rpc_error(
            error_object(-32602, "Invalid params: client_secret=abc123"),
            &Sanitizer::default(),
        );
        assert!(!error.to_string().contains("abc123"));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = ClientConfig {
            base_url: "not a url".to_string(),
            ..ClientConfig::default()
        };
        let err = HttpTransport::new(&config).unwrap_err();
        assert!(matches!(err, DeribitError::Config(_)));
    }
}
