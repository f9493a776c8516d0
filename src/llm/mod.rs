//! Text-generation backends for agent conversations.
//!
//! Everything the engine needs from a language model is a single capability:
//! given a prompt and a token budget, produce text. The [`TextGenerator`]
//! trait captures that contract for provider implementations, and
//! [`BackendAdapter`] narrows it to the total function the orchestrator
//! consumes: transport failures, HTTP errors and timeouts all resolve to
//! empty output, which callers treat as an ordinary soft-failure signal
//! rather than an exceptional condition.
//!
//! Two provider variants exist, selected once at construction via
//! [`BackendKind`]:
//!
//! - [`OllamaProvider`]: a local generation endpoint (`/api/generate`).
//! - [`AnthropicProvider`]: a hosted messages endpoint requiring a
//!   credential; without one it degrades to empty output instead of failing.

pub mod adapter;
pub mod providers;

pub use adapter::{BackendAdapter, BackendKind, TextGenerator};
pub use providers::{AnthropicProvider, OllamaProvider};

/// Sampling temperature used for every generation request.
pub const GENERATION_TEMPERATURE: f64 = 0.8;

/// Request timeout in seconds for both provider variants.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;
