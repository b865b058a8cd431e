//! JSON-RPC 2.0 envelope types for the Deribit HTTP endpoint.
//!
//! - Request: `{"jsonrpc": "2.0", "id": 1, "method": "...", "params": {...}}`
//! - Success: `{"jsonrpc": "2.0", "id": 1, "result": ...}`
//! - Error: `{"jsonrpc": "2.0", "id": 1, "error": {"code": ..., "message": "...", "data": ...}}`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC protocol version sent with every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Outgoing JSON-RPC request.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    /// Always "2.0"
    pub jsonrpc: &'static str,
    /// Correlation id
    pub id: u64,
    /// Method name, e.g. `public/ticker`
    pub method: &'a str,
    /// Parameter object
    pub params: Value,
}

impl<'a> JsonRpcRequest<'a> {
    /// Build a request; absent params are sent as an empty object.
    pub fn new(id: u64, method: &'a str, params: &Value) -> Self {
        let params = match params {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

/// Incoming JSON-RPC response.
///
/// Deribit adds timing fields (`usIn`, `usOut`, `usDiff`, `testnet`), which
/// are ignored.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version echoed by the server
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Id of the request this answers
    #[serde(default)]
    pub id: Option<Value>,
    /// Present on success
    #[serde(default)]
    pub result: Option<Value>,
    /// Present on failure
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcErrorObject {
    /// Exchange error code
    #[serde(default = "unknown_code")]
    pub code: i64,
    /// Error message
    #[serde(default = "unknown_message")]
    pub message: String,
    /// Optional structured details
    #[serde(default)]
    pub data: Option<Value>,
}

fn unknown_code() -> i64 {
    -1
}

fn unknown_message() -> String {
    "Unknown error".to_string()
}
