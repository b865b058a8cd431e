//! Authentication module for the Deribit API.
//!
//! This module provides:
//! - Credential management with secure secret storage
//! - Bearer tokens with an expiry safety buffer
//! - Single-flight token acquisition shared by concurrent requests

mod credentials;
mod manager;
mod token;

pub use credentials::{CLIENT_ID_VAR, CLIENT_SECRET_VAR, Credentials};
pub(crate) use credentials::mask;
pub use manager::{AUTH_METHOD, AuthManager};
pub use token::{AuthToken, DEFAULT_TOKEN_TTL, EXPIRY_BUFFER, MAX_TOKEN_TTL};
pub(crate) use token::AuthResponse;
