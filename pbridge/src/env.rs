//! Session configuration derived from ambient environment variables.
//!
//! Only the bridge reads the environment; the library crates take an
//! explicit `ChatConfig`. Variables and defaults:
//!
//! | variable          | default         |
//! |-------------------|-----------------|
//! | `AI_PROVIDER`     | `openai`        |
//! | `AI_MODEL`        | `gpt-3.5-turbo` |
//! | `AI_API_KEY`      | unset           |
//! | `AI_BASE_URL`     | unset           |
//! | `AI_TEMPERATURE`  | `0.7`           |
//! | `AI_MAX_TOKENS`   | `1000`          |
//! | `AI_TIMEOUT_SECS` | `30`            |

use std::time::Duration;

use pchat::ChatError;
use pprovider::{ChatConfig, ProviderId};

const DEFAULT_PROVIDER: &str = "openai";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

pub fn config_from_env() -> Result<ChatConfig, ChatError> {
    config_from(|key| std::env::var(key).ok())
}

/// Builds a configuration from any variable source. Malformed numeric
/// values are configuration errors, not silently replaced defaults.
pub fn config_from(lookup: impl Fn(&str) -> Option<String>) -> Result<ChatConfig, ChatError> {
    let provider: ProviderId = lookup("AI_PROVIDER")
        .unwrap_or_else(|| DEFAULT_PROVIDER.to_string())
        .parse()?;
    let model = lookup("AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let mut config = ChatConfig::new(provider, model);

    if let Some(api_key) = lookup("AI_API_KEY") {
        config = config.with_api_key(api_key);
    }
    if let Some(base_url) = lookup("AI_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    if let Some(raw) = lookup("AI_TEMPERATURE") {
        config = config.with_temperature(parse_number(&raw, "AI_TEMPERATURE")?);
    }
    if let Some(raw) = lookup("AI_MAX_TOKENS") {
        config = config.with_max_tokens(parse_number(&raw, "AI_MAX_TOKENS")?);
    }
    if let Some(raw) = lookup("AI_TIMEOUT_SECS") {
        let secs: u64 = parse_number(&raw, "AI_TIMEOUT_SECS")?;
        config = config.with_timeout(Duration::from_secs(secs));
    }

    Ok(config)
}

fn parse_number<T: std::str::FromStr>(raw: &str, variable: &str) -> Result<T, ChatError> {
    raw.trim().parse().map_err(|_| {
        ChatError::configuration(format!("{variable} must be a number, got '{raw}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pchat::ChatErrorKind;
    use pprovider::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT};
    use std::collections::HashMap;

    fn lookup_in<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| vars.get(key).map(|value| value.to_string())
    }

    #[test]
    fn empty_environment_yields_documented_defaults() {
        let config = config_from(lookup_in(&[])).unwrap();

        assert_eq!(config.provider, ProviderId::OpenAi);
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert!(config.api_key.is_none());
        assert!(config.base_url.is_none());
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn every_variable_is_honored() {
        let config = config_from(lookup_in(&[
            ("AI_PROVIDER", "anthropic"),
            ("AI_MODEL", "claude-sonnet-4-5"),
            ("AI_API_KEY", "sk-test"),
            ("AI_BASE_URL", "http://proxy.local"),
            ("AI_TEMPERATURE", "0.2"),
            ("AI_MAX_TOKENS", "512"),
            ("AI_TIMEOUT_SECS", "90"),
        ]))
        .unwrap();

        assert_eq!(config.provider, ProviderId::Anthropic);
        assert_eq!(config.model, "claude-sonnet-4-5");
        assert!(config.api_key.is_some());
        assert_eq!(config.base_url.as_deref(), Some("http://proxy.local"));
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.timeout, Duration::from_secs(90));
    }

    #[test]
    fn unknown_provider_is_a_configuration_error() {
        let error = config_from(lookup_in(&[("AI_PROVIDER", "bard")])).expect_err("must fail");
        assert_eq!(error.kind, ChatErrorKind::Configuration);
        assert!(error.message.contains("bard"));
    }

    #[test]
    fn malformed_numbers_are_configuration_errors() {
        for (variable, value) in [
            ("AI_TEMPERATURE", "warm"),
            ("AI_MAX_TOKENS", "lots"),
            ("AI_TIMEOUT_SECS", "soon"),
        ] {
            let error = config_from(lookup_in(&[(variable, value)])).expect_err("must fail");
            assert_eq!(error.kind, ChatErrorKind::Configuration);
            assert!(error.message.contains(variable));
        }
    }
}
