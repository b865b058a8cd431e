//! JSON-RPC plumbing: envelopes, request ids and the HTTP transport.

mod envelope;
mod request_id;
mod transport;

pub use envelope::{JSONRPC_VERSION, JsonRpcErrorObject, JsonRpcRequest, JsonRpcResponse};
pub use request_id::RequestIds;
pub use transport::{HttpTransport, RpcTransport};
