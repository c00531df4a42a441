//! Maps a configuration's provider identity to a concrete provider.
//!
//! New backends are added here as new adapter variants; callers never
//! branch on the identity themselves.

use std::sync::Arc;

use crate::{ChatConfig, ModelProvider, ProviderError, ProviderId};

/// Constructs exactly one provider bound to `config`, or fails closed.
///
/// Failure modes, kept distinct on purpose:
/// - a backend compiled out of this build yields
///   [`ProviderErrorKind::DependencyUnavailable`](crate::ProviderErrorKind);
/// - a missing required credential yields
///   [`ProviderErrorKind::Configuration`](crate::ProviderErrorKind);
/// - unknown identities cannot reach this function because [`ProviderId`]
///   is a closed enum whose parse already fails.
pub fn create_provider(
    config: Arc<ChatConfig>,
) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    match config.provider {
        ProviderId::OpenAi => openai_provider(config),
        ProviderId::Anthropic => anthropic_provider(config),
        ProviderId::Ollama => ollama_provider(config),
    }
}

#[cfg(any(
    feature = "provider-openai",
    feature = "provider-anthropic",
    feature = "provider-ollama"
))]
fn http_client(config: &ChatConfig) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|err| ProviderError::transport(err.to_string()))
}

#[cfg(any(feature = "provider-openai", feature = "provider-anthropic"))]
fn require_api_key(config: &ChatConfig, backend: &str) -> Result<(), ProviderError> {
    match &config.api_key {
        Some(key) if !key.is_empty() => Ok(()),
        _ => Err(ProviderError::configuration(format!(
            "{backend} requires an API key and none was configured"
        ))),
    }
}

#[cfg(feature = "provider-openai")]
fn openai_provider(config: Arc<ChatConfig>) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    use crate::adapters::openai::OpenAiProvider;

    require_api_key(&config, "OpenAI")?;
    let transport = OpenAiProvider::default_http_transport(http_client(&config)?, &config);
    Ok(Arc::new(OpenAiProvider::new(config, Arc::new(transport))))
}

#[cfg(not(feature = "provider-openai"))]
fn openai_provider(_config: Arc<ChatConfig>) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    Err(ProviderError::dependency_unavailable(
        "OpenAI support was compiled out; rebuild with the 'provider-openai' feature",
    ))
}

#[cfg(feature = "provider-anthropic")]
fn anthropic_provider(config: Arc<ChatConfig>) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    use crate::adapters::anthropic::AnthropicProvider;

    require_api_key(&config, "Anthropic")?;
    let transport = AnthropicProvider::default_http_transport(http_client(&config)?, &config);
    Ok(Arc::new(AnthropicProvider::new(config, Arc::new(transport))))
}

#[cfg(not(feature = "provider-anthropic"))]
fn anthropic_provider(_config: Arc<ChatConfig>) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    Err(ProviderError::dependency_unavailable(
        "Anthropic support was compiled out; rebuild with the 'provider-anthropic' feature",
    ))
}

#[cfg(feature = "provider-ollama")]
fn ollama_provider(config: Arc<ChatConfig>) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    use crate::adapters::ollama::OllamaProvider;

    let transport = OllamaProvider::default_http_transport(http_client(&config)?, &config);
    Ok(Arc::new(OllamaProvider::new(config, Arc::new(transport))))
}

#[cfg(not(feature = "provider-ollama"))]
fn ollama_provider(_config: Arc<ChatConfig>) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    Err(ProviderError::dependency_unavailable(
        "Ollama support was compiled out; rebuild with the 'provider-ollama' feature",
    ))
}
