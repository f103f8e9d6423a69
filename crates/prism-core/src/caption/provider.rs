//! Captioner trait, image input type, and the factory that builds the
//! configured provider once at startup.

use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CaptionConfig;
use crate::error::PipelineError;

/// Base64-encoded image ready to send to a caption API.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg")
    pub media_type: String,
}

impl ImageInput {
    /// Wrap normalized JPEG bytes.
    pub fn jpeg(bytes: &[u8]) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: "image/jpeg".to_string(),
        }
    }

    /// Return a data URL suitable for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// Prompt settings shared by every HTTP provider.
#[derive(Debug, Clone)]
pub struct CaptionSettings {
    pub prompt: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl From<&CaptionConfig> for CaptionSettings {
    fn from(config: &CaptionConfig) -> Self {
        Self {
            prompt: config.prompt.clone(),
            max_tokens: config.max_tokens,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

/// A best-effort natural-language description generator.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the worker holds an `Arc<dyn Captioner>`).
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Provider name for logging (e.g., "anthropic", "ollama").
    fn name(&self) -> &str;

    /// Describe the image. May be slow and may fail.
    async fn caption(&self, image: &ImageInput) -> Result<String, PipelineError>;

    /// Upper bound on a single caption call.
    fn timeout(&self) -> Duration;
}

/// Used when no provider is configured: every call fails, so records get a
/// diagnostic caption instead of silently missing one.
pub struct DisabledCaptioner;

#[async_trait]
impl Captioner for DisabledCaptioner {
    fn name(&self) -> &str {
        "none"
    }

    async fn caption(&self, _image: &ImageInput) -> Result<String, PipelineError> {
        Err(PipelineError::Caption {
            message: "no caption provider configured".to_string(),
            status_code: None,
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok()
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Builds the configured captioner.
pub struct CaptionerFactory;

impl CaptionerFactory {
    /// Create the captioner named by `config.provider`.
    pub fn create(config: &CaptionConfig) -> Result<Arc<dyn Captioner>, PipelineError> {
        let settings = CaptionSettings::from(config);
        match config.provider.as_str() {
            "none" => Ok(Arc::new(DisabledCaptioner)),
            "ollama" => {
                let cfg = config.ollama.clone().unwrap_or_default();
                Ok(Arc::new(super::ollama::OllamaCaptioner::new(
                    &cfg.endpoint,
                    &cfg.model,
                    settings,
                )))
            }
            "anthropic" => {
                let cfg = config.anthropic.clone().unwrap_or_default();
                let api_key =
                    resolve_env_var(&cfg.api_key).ok_or_else(|| PipelineError::Caption {
                        message: "Anthropic API key not set. Set ANTHROPIC_API_KEY env var."
                            .to_string(),
                        status_code: None,
                    })?;
                Ok(Arc::new(super::anthropic::AnthropicCaptioner::new(
                    &api_key, &cfg.model, settings,
                )))
            }
            "openai" => {
                let cfg = config.openai.clone().unwrap_or_default();
                let api_key =
                    resolve_env_var(&cfg.api_key).ok_or_else(|| PipelineError::Caption {
                        message: "OpenAI API key not set. Set OPENAI_API_KEY env var.".to_string(),
                        status_code: None,
                    })?;
                Ok(Arc::new(super::openai::OpenAiCaptioner::new(
                    &api_key,
                    &cfg.model,
                    &cfg.endpoint,
                    settings,
                )))
            }
            other => Err(PipelineError::Caption {
                message: format!("Unknown caption provider: {other}"),
                status_code: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenAiConfig;

    #[test]
    fn test_image_input_jpeg() {
        let input = ImageInput::jpeg(&[0xFF, 0xD8, 0xFF]);
        assert_eq!(input.media_type, "image/jpeg");
        assert_eq!(input.data, "/9j/");
    }

    #[test]
    fn test_image_input_data_url() {
        let input = ImageInput::jpeg(&[1, 2, 3]);
        assert!(input.data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_resolve_env_var() {
        // Non-env-var strings pass through
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        // Empty returns None
        assert_eq!(resolve_env_var(""), None);
        // Unset env var returns None
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }

    #[tokio::test]
    async fn test_disabled_captioner_always_fails() {
        let captioner = CaptionerFactory::create(&CaptionConfig::default()).unwrap();
        assert_eq!(captioner.name(), "none");
        let err = captioner.caption(&ImageInput::jpeg(&[1])).await.unwrap_err();
        assert!(err.to_string().contains("no caption provider"));
    }

    #[test]
    fn test_factory_builds_ollama_without_key() {
        let config = CaptionConfig {
            provider: "ollama".to_string(),
            ..CaptionConfig::default()
        };
        let captioner = CaptionerFactory::create(&config).unwrap();
        assert_eq!(captioner.name(), "ollama");
    }

    #[test]
    fn test_factory_requires_api_key() {
        let config = CaptionConfig {
            provider: "openai".to_string(),
            openai: Some(OpenAiConfig {
                api_key: "${DEFINITELY_NOT_SET_XYZ_456}".to_string(),
                ..OpenAiConfig::default()
            }),
            ..CaptionConfig::default()
        };
        let err = CaptionerFactory::create(&config).err().unwrap();
        assert!(err.to_string().contains("API key not set"));
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let config = CaptionConfig {
            provider: "blip".to_string(),
            ..CaptionConfig::default()
        };
        assert!(CaptionerFactory::create(&config).is_err());
    }
}
