//! Anthropic Messages API provider.
//!
//! Sends each prompt as a single user message and reads the first text
//! block of the reply. The API key comes from the environment; a missing
//! key surfaces as [`LlmError::MissingCredential`] on every call so runs
//! degrade to scripted fallbacks instead of aborting.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::llm::{TextGenerator, GENERATION_TEMPERATURE, REQUEST_TIMEOUT_SECS};

/// Default Anthropic API endpoint.
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// API version header value required by the Messages endpoint.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Environment variable holding the API key.
const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Anthropic provider for hosted models.
pub struct AnthropicProvider {
    /// HTTP client for making API requests.
    client: Client,
    /// API key, if one was configured.
    api_key: Option<String>,
    /// Base URL for the Anthropic API.
    base_url: String,
    /// Model identifier (e.g. `claude-3-5-haiku-latest`).
    model: String,
}

impl AnthropicProvider {
    /// Create a provider with an explicit (possibly absent) API key.
    pub fn new(api_key: Option<String>, model: String) -> Self {
        Self::with_base_url(api_key, model, ANTHROPIC_BASE_URL.to_string())
    }

    /// Create a provider against a specific endpoint.
    ///
    /// Useful for testing or API-compatible proxies.
    pub fn with_base_url(api_key: Option<String>, model: String, base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client - system TLS configuration error"),
            api_key,
            base_url,
            model,
        }
    }

    /// Create a provider from the `ANTHROPIC_API_KEY` environment variable.
    ///
    /// A missing key is logged once here; each subsequent call fails with
    /// [`LlmError::MissingCredential`] and the adapter turns that into
    /// empty output.
    pub fn from_env(model: String) -> Self {
        let api_key = std::env::var(ANTHROPIC_API_KEY_ENV).ok();
        if api_key.is_none() {
            tracing::warn!(
                env = ANTHROPIC_API_KEY_ENV,
                "API key not set; all generation requests will yield empty output"
            );
        }
        Self::new(api_key, model)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether a credential is configured.
    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl TextGenerator for AnthropicProvider {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingCredential(ANTHROPIC_API_KEY_ENV))?;

        let url = format!("{}/v1/messages", self.base_url);
        let request = ApiRequest {
            model: &self.model,
            max_tokens,
            temperature: GENERATION_TEMPERATURE,
            messages: vec![ApiMessage {
                role: "user",
                content: prompt,
            }],
        };

        let http_response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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

            if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                return Err(LlmError::ApiError {
                    code: status_code,
                    message: error_response.error.message,
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

        api_response
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| LlmError::ParseError("Response contained no content blocks".to_string()))
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

/// Internal request structure for the Messages API.
#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<ApiMessage<'a>>,
}

/// Internal message structure for the Messages API.
#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Internal response structure from the Messages API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ApiContentBlock>,
}

/// One content block of the reply; only text blocks are expected.
#[derive(Debug, Deserialize)]
struct ApiContentBlock {
    #[serde(default)]
    text: String,
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

/// Error detail from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anthropic_provider_new() {
        let provider = AnthropicProvider::new(
            Some("test-key".to_string()),
            "claude-3-5-haiku-latest".to_string(),
        );

        assert_eq!(provider.base_url(), ANTHROPIC_BASE_URL);
        assert_eq!(provider.model(), "claude-3-5-haiku-latest");
        assert!(provider.has_credential());
    }

    #[test]
    fn test_anthropic_provider_without_key() {
        let provider = AnthropicProvider::new(None, "claude-3-5-haiku-latest".to_string());
        assert!(!provider.has_credential());
    }

    #[tokio::test]
    async fn test_generate_without_key_is_missing_credential() {
        let provider = AnthropicProvider::new(None, "claude-3-5-haiku-latest".to_string());

        let result = provider.generate("test prompt", 50).await;

        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, LlmError::MissingCredential(_)));
    }

    #[tokio::test]
    async fn test_generate_connection_error() {
        let provider = AnthropicProvider::with_base_url(
            Some("test-key".to_string()),
            "claude-3-5-haiku-latest".to_string(),
            "http://localhost:65535".to_string(),
        );

        let result = provider.generate("test prompt", 50).await;

        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed(_)));
    }

    #[test]
    fn test_api_request_serialization() {
        let request = ApiRequest {
            model: "claude-3-5-haiku-latest",
            max_tokens: 300,
            temperature: 0.8,
            messages: vec![ApiMessage {
                role: "user",
                content: "Hello",
            }],
        };

        let json = serde_json::to_string(&request).expect("serialization should succeed");
        assert!(json.contains("\"model\":\"claude-3-5-haiku-latest\""));
        assert!(json.contains("\"max_tokens\":300"));
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"content\":\"Hello\""));
    }

    #[test]
    fn test_api_response_first_text_block() {
        let json = r#"{"content":[{"type":"text","text":"first"},{"type":"text","text":"second"}]}"#;
        let response: ApiResponse =
            serde_json::from_str(json).expect("deserialization should succeed");
        assert_eq!(response.content[0].text, "first");
    }

    #[test]
    fn test_api_error_response_parse() {
        let json = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        let response: ApiErrorResponse =
            serde_json::from_str(json).expect("deserialization should succeed");
        assert_eq!(response.error.message, "invalid x-api-key");
    }
}
