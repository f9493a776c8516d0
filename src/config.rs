//! Run configuration for the opinion-dynamics engine.
//!
//! A [`SimulationConfig`] is built once, before any agents exist, and passed
//! to the pieces that need it. There is no module-level mutable state:
//! two orchestrators with different configs can run side by side without
//! interfering.

use std::path::PathBuf;

use crate::llm::BackendKind;

/// Default model identifier for the local generation backend.
pub const DEFAULT_MODEL: &str = "phi3:mini";

/// Default number of recent memory records included in prompts.
pub const DEFAULT_MEMORY_WINDOW: usize = 5;

/// Default token budget for a single generated turn.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 300;

/// Immutable configuration for one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// The topic agents argue about. Embedded verbatim in stance labels
    /// and every prompt.
    pub topic: String,
    /// Model identifier passed to the text-generation backend.
    pub model: String,
    /// Which backend variant to construct.
    pub backend: BackendKind,
    /// Directory holding one memory file per agent.
    pub memory_dir: PathBuf,
    /// Path of the append-only conversation transcript.
    pub transcript_path: PathBuf,
    /// Path of the append-only opinion-parse failure log.
    pub failure_log_path: PathBuf,
    /// How many recent memory records each prompt may include.
    pub memory_window: usize,
    /// Token budget for each generated turn.
    pub max_output_tokens: u32,
    /// Optional RNG seed. When set, initial opinion draws and parse-failure
    /// fallback noise are reproducible across runs; when unset both use
    /// entropy, matching the original behavior.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            topic: String::new(),
            model: DEFAULT_MODEL.to_string(),
            backend: BackendKind::Ollama,
            memory_dir: PathBuf::from("agent_memories"),
            transcript_path: PathBuf::from("transcript.txt"),
            failure_log_path: PathBuf::from("parse_failures.log"),
            memory_window: DEFAULT_MEMORY_WINDOW,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration for the given topic with defaults elsewhere.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    /// Sets the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the backend variant.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the agent memory directory.
    pub fn with_memory_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.memory_dir = dir.into();
        self
    }

    /// Sets the transcript path.
    pub fn with_transcript_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcript_path = path.into();
        self
    }

    /// Sets the parse-failure log path.
    pub fn with_failure_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.failure_log_path = path.into();
        self
    }

    /// Sets the memory window length (at least 1).
    pub fn with_memory_window(mut self, window: usize) -> Self {
        self.memory_window = window.max(1);
        self
    }

    /// Sets the per-turn token budget.
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Sets the RNG seed for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Places memory dir, transcript and failure log under one run directory,
    /// using the conventional file names.
    pub fn rooted_at(mut self, run_dir: impl Into<PathBuf>) -> Self {
        let run_dir = run_dir.into();
        self.memory_dir = run_dir.join("agent_memories");
        self.transcript_path = run_dir.join("transcript.txt");
        self.failure_log_path = run_dir.join("parse_failures.log");
        self
    }
}
