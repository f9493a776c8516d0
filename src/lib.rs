//! agora: LLM-conversation-driven opinion dynamics engine.
//!
//! A population of agents holds bounded opinion scores in [-1.0, 1.0] on a
//! topic. Each simulation tick, one pair argues through a three-turn
//! conversation generated by a language-model backend; both agents then
//! restate their opinion, which is parsed back out of the text and becomes
//! their new score. Runs leave per-agent memory files and an append-only
//! transcript behind, from which the whole opinion history can be rebuilt.

// Core modules
pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod memory;
pub mod opinion;
pub mod transcript;

// Re-export commonly used error types
pub use error::{EngineError, EngineResult, LlmError, ReplayError, StoreError, TranscriptError};
