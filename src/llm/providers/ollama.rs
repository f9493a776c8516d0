//! Ollama provider for local model serving.
//!
//! Talks to an Ollama daemon's `/api/generate` endpoint with streaming
//! disabled, so each request yields one complete completion.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::llm::{TextGenerator, GENERATION_TEMPERATURE, REQUEST_TIMEOUT_SECS};

/// Default Ollama daemon endpoint.
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Environment variable overriding the daemon endpoint.
const OLLAMA_URL_ENV: &str = "OLLAMA_URL";

/// Ollama provider for locally served models.
///
/// No credential is required; the only failure modes are an unreachable
/// daemon, a missing model, or a malformed response.
pub struct OllamaProvider {
    /// HTTP client for making API requests.
    client: Client,
    /// Base URL of the Ollama daemon.
    base_url: String,
    /// Model tag to generate with (e.g. `phi3:mini`).
    model: String,
}

impl OllamaProvider {
    /// Create a provider against the default local daemon.
    pub fn new(model: String) -> Self {
        Self::with_base_url(model, OLLAMA_BASE_URL.to_string())
    }

    /// Create a provider against a specific daemon endpoint.
    ///
    /// Useful for testing or for daemons running on another host.
    pub fn with_base_url(model: String, base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client - system TLS configuration error"),
            base_url,
            model,
        }
    }

    /// Create a provider, honoring the `OLLAMA_URL` environment override.
    pub fn from_env(model: String) -> Self {
        let base_url =
            std::env::var(OLLAMA_URL_ENV).unwrap_or_else(|_| OLLAMA_BASE_URL.to_string());
        Self::with_base_url(model, base_url)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the model tag.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for OllamaProvider {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = ApiRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: ApiOptions {
                temperature: GENERATION_TEMPERATURE,
                num_predict: max_tokens,
            },
        };

        let http_response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            // Ollama wraps errors as {"error": "..."}
            if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                return Err(LlmError::ApiError {
                    code: status_code,
                    message: error_response.error,
                });
            }

            return Err(LlmError::ApiError {
                code: status_code,
                message: error_text,
            });
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        Ok(api_response.response)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

/// Internal request structure for the Ollama generate API.
#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: ApiOptions,
}

/// Generation options passed through to the model runner.
#[derive(Debug, Serialize)]
struct ApiOptions {
    temperature: f64,
    num_predict: u32,
}

/// Internal response structure from the Ollama generate API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    response: String,
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_provider_new() {
        let provider = OllamaProvider::new("phi3:mini".to_string());

        assert_eq!(provider.base_url(), OLLAMA_BASE_URL);
        assert_eq!(provider.model(), "phi3:mini");
    }

    #[test]
    fn test_ollama_provider_with_base_url() {
        let provider = OllamaProvider::with_base_url(
            "llama3".to_string(),
            "http://10.0.0.5:11434".to_string(),
        );

        assert_eq!(provider.base_url(), "http://10.0.0.5:11434");
        assert_eq!(provider.model(), "llama3");
    }

    #[test]
    fn test_api_request_serialization() {
        let request = ApiRequest {
            model: "phi3:mini",
            prompt: "Hello",
            stream: false,
            options: ApiOptions {
                temperature: 0.8,
                num_predict: 300,
            },
        };

        let json = serde_json::to_string(&request).expect("serialization should succeed");
        assert!(json.contains("\"model\":\"phi3:mini\""));
        assert!(json.contains("\"stream\":false"));
        assert!(json.contains("\"temperature\":0.8"));
        assert!(json.contains("\"num_predict\":300"));
    }

    #[test]
    fn test_api_response_missing_field_defaults_empty() {
        let response: ApiResponse =
            serde_json::from_str("{}").expect("deserialization should succeed");
        assert_eq!(response.response, "");
    }

    #[tokio::test]
    async fn test_generate_connection_error() {
        let provider = OllamaProvider::with_base_url(
            "phi3:mini".to_string(),
            "http://localhost:65535".to_string(),
        );

        let result = provider.generate("test prompt", 50).await;

        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed(_)));
    }
}
