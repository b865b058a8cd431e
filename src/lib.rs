//! # Deribit RPC Client
//!
//! A resilient async client for the Deribit JSON-RPC v2 API over HTTP.
//!
//! ## Features
//!
//! - Token-bucket rate limiting shared by all concurrent callers
//! - Two-tier TTL response cache (market data and instrument metadata)
//! - Client-credentials authentication with single-flight token refresh
//! - Bounded retries with jittered exponential backoff
//! - Typed errors classified from exchange error codes
//! - Secret redaction in every log line and error payload
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deribit_rpc_client::DeribitClient;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DeribitClient::builder().build()?;
//!     let time = client.call_public("get_time", json!({})).await?;
//!     println!("Server time: {time}");
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod rate_limit;
pub mod retry;
pub mod rpc;
pub mod sanitize;

// Re-export commonly used types at crate root
pub use client::{DeribitClient, DeribitClientBuilder};
pub use config::{ClientConfig, DeribitEnv};
pub use error::{DeribitError, ErrorKind, RpcError};
pub use rpc::{HttpTransport, RpcTransport};

/// Result type alias using DeribitError
pub type Result<T> = std::result::Result<T, DeribitError>;
