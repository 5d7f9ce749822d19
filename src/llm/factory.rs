//! LLM backend factory
//!
//! Builds the backend named by the configured model string. Models may be
//! given bare (`gemini-2.5-flash`) or with an explicit provider prefix
//! (`google/gemini-2.5-flash`).

use std::sync::Arc;

use crate::config::Config;
use crate::llm::gemini::GeminiBackend;
use crate::llm::{Backend, LlmError};

/// Supported model provider types
#[derive(Debug, PartialEq, Eq)]
pub enum Provider {
    /// Google's Gemini models
    Google,
    /// Unknown provider
    Unknown(String),
}

/// Model information after parsing
#[derive(Debug, PartialEq, Eq)]
struct ModelInfo {
    /// The provider to use
    provider: Provider,
    /// The actual model name to pass to the API
    model_name: String,
}

/// Create an LLM backend from configuration, inferring the provider from model name
pub fn create_backend(config: &Config) -> Result<Arc<dyn Backend>, LlmError> {
    let model_info = parse_model_string(&config.model);

    match model_info.provider {
        Provider::Google => {
            let api_key = config
                .require_api_key()
                .map_err(|e| LlmError::ConfigError(e.to_string()))?;
            let backend = GeminiBackend::new(
                api_key.to_string(),
                model_info.model_name,
                strip_provider(&config.image_model),
            )?;
            bprintln!(dev: "Using {} backend with model {}", backend.name(), backend.model());
            Ok(Arc::new(backend))
        }
        Provider::Unknown(provider) => {
            let provider_msg = if provider.is_empty() {
                format!("Unknown model '{}'. Cannot determine provider.", config.model)
            } else {
                format!(
                    "Unknown provider '{}' specified in '{}'",
                    provider, config.model
                )
            };

            Err(LlmError::ConfigError(format!(
                "{}. Currently supporting these providers:\n\
                 - Google models: 'gemini-2.5-flash', 'gemini-2.5-pro', etc.\n\
                 - Explicit provider format: 'google/gemini-2.5-flash'",
                provider_msg
            )))
        }
    }
}

fn strip_provider(model: &str) -> String {
    model
        .split_once('/')
        .map(|(_, name)| name)
        .unwrap_or(model)
        .trim()
        .to_string()
}

/// Parse a model string which may be in either format:
/// - "gemini-2.5-flash" (provider inferred from model name)
/// - "google/gemini-2.5-flash" (explicit provider)
fn parse_model_string(model_str: &str) -> ModelInfo {
    if let Some((provider, model)) = model_str.split_once('/') {
        let provider_type = match provider.trim().to_lowercase().as_str() {
            "google" | "gemini" => Provider::Google,
            other => Provider::Unknown(other.to_string()),
        };

        return ModelInfo {
            provider: provider_type,
            model_name: model.trim().to_string(),
        };
    }

    let provider = if is_gemini_model(model_str) {
        Provider::Google
    } else {
        Provider::Unknown(String::new())
    };

    ModelInfo {
        provider,
        model_name: model_str.trim().to_string(),
    }
}

/// Determine if a model name belongs to the Google Gemini family
fn is_gemini_model(model: &str) -> bool {
    let model = model.trim();
    model.starts_with("gemini-") || model.starts_with("gemma-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_string() {
        assert_eq!(
            parse_model_string("gemini-2.5-flash"),
            ModelInfo {
                provider: Provider::Google,
                model_name: "gemini-2.5-flash".into()
            }
        );
        assert_eq!(
            parse_model_string("google/gemini-2.5-pro").model_name,
            "gemini-2.5-pro"
        );
        assert_eq!(
            parse_model_string("openai/gpt-4o").provider,
            Provider::Unknown("openai".into())
        );
        assert_eq!(parse_model_string("gpt-4o").provider, Provider::Unknown(String::new()));
    }

    #[test]
    fn test_create_backend() {
        let mut config = Config::new();
        assert!(matches!(create_backend(&config), Err(LlmError::ConfigError(_))));

        config.api_key = Some("key".into());
        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.name(), "gemini");
        assert_eq!(backend.model(), crate::constants::DEFAULT_MODEL);

        config.model = "claude-3".into();
        match create_backend(&config) {
            Err(LlmError::ConfigError(msg)) => assert!(msg.contains("Unknown model 'claude-3'")),
            _ => panic!("expected config error"),
        }
    }
}
