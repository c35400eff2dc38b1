use std::time::Duration;

use crate::gemini::DEFAULT_ENDPOINT;

/// Engine-level settings that do not change between runs.
///
/// Use [`EngineConfig::builder()`] for ergonomic construction, or
/// [`EngineConfig::default()`] for sensible defaults (5 concurrent requests,
/// public Gemini endpoint, no manual key).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of backend requests in flight during a run.
    pub concurrency: usize,

    /// Base URL of the image backend.
    pub endpoint: String,

    /// Timeout applied to each backend request.
    pub request_timeout: Duration,

    /// How long to wait for the host to confirm a credential after requesting one.
    pub credential_timeout: Duration,

    /// Polling interval while waiting for credential confirmation.
    pub credential_poll_interval: Duration,

    /// User-supplied API key. Takes precedence over the credential provider.
    pub manual_api_key: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(120),
            credential_timeout: Duration::from_secs(60),
            credential_poll_interval: Duration::from_millis(500),
            manual_api_key: None,
        }
    }
}

impl EngineConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// The manual key, if one is set and non-blank.
    pub fn manual_key(&self) -> Option<&str> {
        self.manual_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Builder for [`EngineConfig`].
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the concurrency limit. Values below 1 are clamped to 1.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.config.concurrency = limit.max(1);
        self
    }

    /// Point the reference backend at a different base URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set how long a run waits for credential confirmation.
    pub fn with_credential_timeout(mut self, timeout: Duration) -> Self {
        self.config.credential_timeout = timeout;
        self
    }

    pub fn with_credential_poll_interval(mut self, interval: Duration) -> Self {
        self.config.credential_poll_interval = interval;
        self
    }

    /// Use a fixed API key instead of the credential provider.
    pub fn with_manual_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.manual_api_key = Some(key.into());
        self
    }

    /// Build the final [`EngineConfig`].
    pub fn build(self) -> EngineConfig {
        self.config
    }
}
