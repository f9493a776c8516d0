//! The backend capability trait and its soft-failure adapter.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SimulationConfig;
use crate::error::LlmError;
use crate::llm::providers::{AnthropicProvider, OllamaProvider};

/// Capability contract for text-generation providers.
///
/// Implementations are honest about failures: transport errors, HTTP error
/// statuses and malformed responses come back as [`LlmError`]. Converting
/// those into the empty-output soft-failure signal is the adapter's job,
/// not the provider's.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates text for the given prompt within the token budget.
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;

    /// Short provider name for logging.
    fn name(&self) -> &'static str;
}

/// Which backend variant to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Local generation endpoint (no credential).
    Ollama,
    /// Hosted messages endpoint (credential-gated).
    Anthropic,
}

impl BackendKind {
    /// Returns the display name for this backend.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Anthropic => "anthropic",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(format!(
                "unknown backend '{other}' (expected 'ollama' or 'anthropic')"
            )),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Soft-failure boundary over a [`TextGenerator`].
///
/// Exposes generation as a total function: the result is either the
/// provider's trimmed output or the empty string. Callers never see an
/// error from this type; an empty result drives the scripted-fallback
/// paths throughout the conversation engine, so a run always completes
/// even with the backend entirely unreachable.
#[derive(Clone)]
pub struct BackendAdapter {
    provider: Arc<dyn TextGenerator>,
}

impl BackendAdapter {
    /// Wraps an existing provider.
    pub fn new(provider: Arc<dyn TextGenerator>) -> Self {
        Self { provider }
    }

    /// Constructs the provider selected by the configuration.
    ///
    /// Endpoint overrides and credentials are read from the environment
    /// here, once; nothing downstream touches env vars.
    pub fn from_config(config: &SimulationConfig) -> Self {
        let provider: Arc<dyn TextGenerator> = match config.backend {
            BackendKind::Ollama => Arc::new(OllamaProvider::from_env(config.model.clone())),
            BackendKind::Anthropic => Arc::new(AnthropicProvider::from_env(config.model.clone())),
        };
        Self { provider }
    }

    /// Generates text, resolving every provider failure to empty output.
    pub async fn generate(&self, prompt: &str, max_tokens: u32) -> String {
        match self.provider.generate(prompt, max_tokens).await {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                tracing::warn!(
                    backend = self.provider.name(),
                    error = %err,
                    "text generation failed; treating as empty output"
                );
                String::new()
            }
        }
    }

    /// The wrapped provider's name.
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
            Err(LlmError::RequestFailed("connection refused".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
            Ok(format!("  {prompt}  \n"))
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("ollama".parse::<BackendKind>(), Ok(BackendKind::Ollama));
        assert_eq!("Anthropic".parse::<BackendKind>(), Ok(BackendKind::Anthropic));
        assert!("gpt".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::Ollama.to_string(), "ollama");
        assert_eq!(BackendKind::Anthropic.to_string(), "anthropic");
    }

    #[tokio::test]
    async fn test_adapter_converts_errors_to_empty() {
        let adapter = BackendAdapter::new(Arc::new(FailingGenerator));
        let out = adapter.generate("anything", 50).await;
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn test_adapter_trims_output() {
        let adapter = BackendAdapter::new(Arc::new(EchoGenerator));
        let out = adapter.generate("hello", 50).await;
        assert_eq!(out, "hello");
    }
}
