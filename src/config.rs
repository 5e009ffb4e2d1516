//! Application configuration
//!
//! Service endpoints and model identifiers are embedded from `config.toml`;
//! the two provider API keys are read from the environment (a `.env` file is
//! honored via dotenvy in `main`).

use serde::Deserialize;
use std::env;
use thiserror::Error;

/// Settings embedded from config.toml
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Settings {
    pub recognition: RecognitionSettings,
    pub language_model: LanguageModelSettings,
}

/// Recognition (speech-to-text) service settings
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RecognitionSettings {
    /// WebSocket endpoint, e.g. "wss://api.deepgram.com/v1/listen"
    pub endpoint: String,
    /// Recognition model identifier (e.g. "base")
    pub model: String,
    /// Whether to request smart formatting (punctuation, numerals)
    pub smart_format: bool,
}

/// Language-model (translation/annotation) service settings
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LanguageModelSettings {
    /// Chat-completions endpoint
    pub endpoint: String,
    /// Model identifier
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Load settings from the embedded config.toml
pub(crate) fn load_settings() -> Result<Settings, ConfigError> {
    const CONFIG_TOML: &str = include_str!("../config.toml");
    Ok(toml::from_str(CONFIG_TOML)?)
}

/// Provider API keys supplied at run time
pub(crate) struct Secrets {
    pub deepgram_api_key: String,
    pub fireworks_api_key: String,
}

impl Secrets {
    /// Read both API keys from the environment
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            deepgram_api_key: require_env("DEEPGRAM_API_KEY")?,
            fireworks_api_key: require_env("FIREWORKS_API_KEY")?,
        })
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingSecret(name)),
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("Failed to parse embedded config.toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing environment variable {0} (set it in the environment or a .env file)")]
    MissingSecret(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_config_parses() {
        let settings = load_settings().expect("embedded config must parse");
        assert!(settings.recognition.endpoint.starts_with("wss://"));
        assert_eq!(settings.recognition.model, "base");
        assert!(settings.recognition.smart_format);
        assert!(settings.language_model.endpoint.starts_with("https://"));
        assert!(settings.language_model.max_tokens > 0);
    }
}
