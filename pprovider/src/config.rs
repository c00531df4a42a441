//! Backend configuration owned by a session and its provider.
//!
//! ```rust
//! use pprovider::{ChatConfig, ProviderId};
//!
//! let config = ChatConfig::new(ProviderId::Ollama, "llama3.2").with_temperature(0.2);
//! assert_eq!(config.temperature, 0.2);
//! assert_eq!(config.max_tokens, pprovider::DEFAULT_MAX_TOKENS);
//! ```

use std::time::Duration;

use pcommon::GenerationOptions;

use crate::{ProviderId, SecretString};

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable description of which backend to use and how. Constructed once
/// per session; changing backends means constructing a new session. The
/// timeout is handed opaquely to the HTTP client, never enforced by the
/// core itself.
#[derive(Debug)]
pub struct ChatConfig {
    pub provider: ProviderId,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl ChatConfig {
    pub fn new(provider: ProviderId, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            api_key: None,
            base_url: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key));
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sampling parameters for one call: request overrides win, the
    /// configuration's defaults fill the gaps. Non-persistent by
    /// construction since the request is consumed per call.
    pub fn sampling(&self, options: &GenerationOptions) -> (f32, u32) {
        (
            options.temperature.unwrap_or(self.temperature),
            options.max_tokens.unwrap_or(self.max_tokens),
        )
    }
}
