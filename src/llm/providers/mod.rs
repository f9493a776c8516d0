//! Concrete text-generation providers.
//!
//! Each provider owns its HTTP client and wire types and implements the
//! [`TextGenerator`](crate::llm::TextGenerator) contract. Failure policy
//! lives in the adapter, not here.

pub mod anthropic;
pub mod ollama;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
