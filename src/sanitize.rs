//! Secret redaction for log lines and error payloads.
//!
//! Response bodies and exchange messages may echo request parameters back,
//! including the client secret sent to `public/auth`. Everything the client
//! logs or returns inside an error goes through [`Sanitizer::sanitize`] first.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::auth::{Credentials, mask};

/// Replacement for redacted values.
pub const REDACTED: &str = "***REDACTED***";

/// Maximum number of characters of an HTTP body kept in errors and logs.
pub const MAX_BODY_CHARS: usize = 500;

/// Key/value pairs whose value must never be shown.
static SECRET_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(client_secret|api_key|secret|token|password)(["\s:=]+)[^\s,"}\]]+"#)
        .expect("secret pattern is valid")
});

/// Redacts configured credentials and generic secret patterns.
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl Sanitizer {
    /// A sanitizer that knows the given credentials.
    pub fn new(credentials: Option<&Credentials>) -> Self {
        Self {
            client_id: credentials
                .map(|c| c.client_id.clone())
                .filter(|id| !id.is_empty()),
            client_secret: credentials
                .map(|c| c.expose_secret().to_string())
                .filter(|secret| !secret.is_empty()),
        }
    }

    /// Redact secrets from `message`.
    pub fn sanitize(&self, message: &str) -> String {
        let mut sanitized = Cow::Borrowed(message);

        if let Some(secret) = &self.client_secret {
            if sanitized.contains(secret.as_str()) {
                sanitized = Cow::Owned(sanitized.replace(secret.as_str(), REDACTED));
            }
        }
        if let Some(client_id) = &self.client_id {
            if sanitized.contains(client_id.as_str()) {
                sanitized = Cow::Owned(sanitized.replace(client_id.as_str(), &mask(client_id, 4)));
            }
        }

        SECRET_PAIR
            .replace_all(&sanitized, format!("${{1}}${{2}}{REDACTED}"))
            .into_owned()
    }

    /// Redact secrets from an HTTP body, then truncate it.
    ///
    /// Redaction runs on the full body so a secret straddling the cut is
    /// never partially kept.
    pub fn sanitize_body(&self, body: &str) -> String {
        truncate(&self.sanitize(body), MAX_BODY_CHARS)
    }
}

/// Keep at most `max_chars` characters of `value`.
pub(crate) fn truncate(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
