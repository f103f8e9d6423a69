//! Ollama captioner for local vision model inference.
//!
//! Talks to a local Ollama instance via its HTTP API.
//! No authentication required, just needs Ollama running locally.

use super::provider::{CaptionSettings, Captioner, ImageInput};
use crate::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama captioner for local vision model inference.
pub struct OllamaCaptioner {
    endpoint: String,
    model: String,
    settings: CaptionSettings,
    client: reqwest::Client,
}

impl OllamaCaptioner {
    pub fn new(endpoint: &str, model: &str, settings: CaptionSettings) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            settings,
            client: reqwest::Client::new(),
        }
    }
}

/// Ollama /api/generate request body.
#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    images: Vec<String>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama /api/generate response.
#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl Captioner for OllamaCaptioner {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn caption(&self, image: &ImageInput) -> Result<String, PipelineError> {
        let url = format!("{}/api/generate", self.endpoint);

        let body = OllamaRequest {
            model: self.model.clone(),
            prompt: self.settings.prompt.clone(),
            images: vec![image.data.clone()],
            stream: false,
            options: OllamaOptions {
                temperature: 0.2,
                num_predict: self.settings.max_tokens,
            },
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| PipelineError::Caption {
                message: format!("Ollama request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Caption {
                message: format!("Ollama HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let ollama_resp: OllamaResponse =
            resp.json().await.map_err(|e| PipelineError::Caption {
                message: format!("Failed to parse Ollama response: {e}"),
                status_code: None,
            })?;

        let text = ollama_resp.response.trim().to_string();
        if text.is_empty() {
            return Err(PipelineError::Caption {
                message: "Ollama returned an empty caption".to_string(),
                status_code: None,
            });
        }

        Ok(text)
    }

    fn timeout(&self) -> Duration {
        self.settings.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = OllamaRequest {
            model: "llava".to_string(),
            prompt: "caption".to_string(),
            images: vec!["AAAA".to_string()],
            stream: false,
            options: OllamaOptions {
                temperature: 0.2,
                num_predict: 60,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["images"][0], "AAAA");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 60);
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let settings = CaptionSettings {
            prompt: String::new(),
            max_tokens: 10,
            timeout: Duration::from_secs(5),
        };
        let captioner = OllamaCaptioner::new("http://localhost:11434/", "llava", settings);
        assert_eq!(captioner.endpoint, "http://localhost:11434");
        assert_eq!(captioner.timeout(), Duration::from_secs(5));
    }
}
