//! Client-credentials management for Deribit authentication.

use secrecy::{ExposeSecret, SecretString};

/// Default environment variable holding the client id.
pub const CLIENT_ID_VAR: &str = "DERIBIT_CLIENT_ID";

/// Default environment variable holding the client secret.
pub const CLIENT_SECRET_VAR: &str = "DERIBIT_CLIENT_SECRET";

/// API credentials for the client-credentials grant.
#[derive(Clone)]
pub struct Credentials {
    /// The client id (public identifier)
    pub client_id: String,
    /// The client secret (never logged)
    client_secret: SecretString,
}

impl Credentials {
    /// Create new credentials from a client id and secret.
    ///
    /// Surrounding whitespace is stripped from both values.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into().trim().to_string(),
            client_secret: SecretString::from(client_secret.into().trim().to_string()),
        }
    }

    /// Try to read credentials from the default environment variables.
    ///
    /// Returns `None` if either variable is unset or empty.
    pub fn from_env() -> Option<Self> {
        Self::from_env_vars(CLIENT_ID_VAR, CLIENT_SECRET_VAR)
    }

    /// Try to read credentials from custom environment variable names.
    pub fn from_env_vars(id_var: &str, secret_var: &str) -> Option<Self> {
        let client_id = std::env::var(id_var).ok()?;
        let client_secret = std::env::var(secret_var).ok()?;
        Some(Self::new(client_id, client_secret)).filter(Credentials::is_complete)
    }

    /// Get the client secret for the authentication request.
    ///
    /// This method exposes the secret - use carefully.
    pub fn expose_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }

    /// Whether both the id and the secret are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.expose_secret().is_empty()
    }

    /// The client id with everything but the first 4 characters masked.
    pub fn masked_client_id(&self) -> String {
        mask(&self.client_id, 4)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.masked_client_id())
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Mask a string, keeping only its first `show_chars` characters.
pub(crate) fn mask(value: &str, show_chars: usize) -> String {
    if value.chars().count() <= show_chars {
        return "****".to_string();
    }
    let prefix: String = value.chars().take(show_chars).collect();
    format!("{prefix}****")
}
