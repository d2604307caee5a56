//! Database secrets with automatic redaction in Debug output.
//!
//! A Fauna secret grants full access to the database it was issued for, so it
//! must never appear in logs or error messages. All secrets are carried in
//! [`Secret`], whose `Debug` output shows only the first four characters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A database secret, redacted in `Debug` output.
///
/// The `Debug` form shows only the first four characters followed by `...`,
/// enough to tell two keys apart without exposing either.
#[derive(Clone, Serialize, Deserialize)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value. The only intended caller is the auth-header
    /// computation at connection construction.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(\"{}\")", redact(&self.0))
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }

    let head: String = secret.chars().take(4).collect();
    format!("{}...", head)
}
