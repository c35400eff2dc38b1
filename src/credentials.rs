use std::sync::Mutex;

use crate::error::{Result, StudioError};
use crate::CredentialProvider;

/// Fixed token supplied by the host. `request_credential` cannot produce a
/// new one, so it fails when no token is set.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: Mutex<Option<String>>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Swap the token, e.g. after the user picked a different key.
    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.lock() {
            *slot = token;
        }
    }
}

impl CredentialProvider for StaticCredentials {
    async fn has_credential(&self) -> bool {
        self.token().is_some()
    }

    async fn request_credential(&self) -> Result<()> {
        if self.token().is_some() {
            Ok(())
        } else {
            Err(StudioError::NoCredential)
        }
    }

    fn token(&self) -> Option<String> {
        self.token
            .lock()
            .ok()
            .and_then(|t| t.clone())
            .filter(|t| !t.trim().is_empty())
    }
}

/// Reads the key from an environment variable on every call, so a key
/// exported after startup is picked up by the next run.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    /// Default variable: `GEMINI_API_KEY`.
    pub fn new() -> Self {
        Self::from_var("GEMINI_API_KEY")
    }

    pub fn from_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialProvider for EnvCredentials {
    async fn has_credential(&self) -> bool {
        self.token().is_some()
    }

    async fn request_credential(&self) -> Result<()> {
        tracing::warn!(var = %self.var, "no API key in environment");
        Ok(())
    }

    fn token(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
