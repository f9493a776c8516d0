//! Drives the three-turn exchange between two agents and commits the
//! resulting state: one memory record per participant plus one
//! transcript block.

use std::sync::Arc;

use crate::config::SimulationConfig;
use crate::conversation::prompts::{
    build_opening_prompt, build_reply_prompt, build_response_prompt, devils_advocate_instruction,
    SpeakerContext,
};
use crate::error::EngineResult;
use crate::llm::BackendAdapter;
use crate::memory::{DirMemoryStore, MemoryEntry, MemoryStore};
use crate::opinion::{embedded_score, strip_opinion_line, OpinionParser};
use crate::transcript::{TranscriptLog, TranscriptRecord};

/// Characters of the opening turn kept in the progress snippet.
const SNIPPET_CHARS: usize = 80;

/// Result of one completed pairwise conversation.
#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    /// First speaker's posterior opinion.
    pub opinion_a: f64,
    /// Second speaker's posterior opinion.
    pub opinion_b: f64,
    /// Short excerpt of the opening turn for progress reporting.
    pub snippet: String,
}

/// Runs conversations one at a time against shared agent state.
///
/// The sequential loop is what makes the state writes safe: a concurrent
/// variant would need per-agent exclusion on the memory records and a
/// single writer for the transcript.
pub struct ConversationOrchestrator {
    config: SimulationConfig,
    backend: BackendAdapter,
    store: Arc<dyn MemoryStore>,
    transcript: TranscriptLog,
    parser: OpinionParser,
}

impl ConversationOrchestrator {
    /// Assembles an orchestrator from explicitly constructed parts.
    pub fn new(
        config: SimulationConfig,
        backend: BackendAdapter,
        store: Arc<dyn MemoryStore>,
        transcript: TranscriptLog,
        parser: OpinionParser,
    ) -> Self {
        Self {
            config,
            backend,
            store,
            transcript,
            parser,
        }
    }

    /// Builds the standard file-backed setup for a config: directory
    /// memory store, transcript log and failure-logging opinion parser,
    /// all sharing the config's seed.
    pub fn from_config(config: SimulationConfig) -> Self {
        let backend = BackendAdapter::from_config(&config);
        Self::from_config_with_backend(config, backend)
    }

    /// Same file-backed setup, but with a caller-supplied backend. Used
    /// when the credential or endpoint is resolved outside the config.
    pub fn from_config_with_backend(config: SimulationConfig, backend: BackendAdapter) -> Self {
        let store = Arc::new(DirMemoryStore::new(&config.memory_dir).with_seed(config.seed));
        let transcript = TranscriptLog::new(&config.transcript_path);
        let parser = OpinionParser::new()
            .with_failure_log(&config.failure_log_path)
            .with_seed(config.seed);
        Self::new(config, backend, store, transcript, parser)
    }

    /// The run configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The text-generation backend.
    pub fn backend(&self) -> &BackendAdapter {
        &self.backend
    }

    /// The opinion parser, exposing its attempt and failure counters.
    pub fn parser(&self) -> &OpinionParser {
        &self.parser
    }

    /// The agent memory store.
    pub fn store(&self) -> &dyn MemoryStore {
        self.store.as_ref()
    }

    /// Starts a fresh run: truncates the transcript and seeds `num_agents`
    /// agents with random initial opinions. Returns the initial opinions
    /// in agent order.
    pub async fn initialize_agents(&self, num_agents: u32) -> EngineResult<Vec<f64>> {
        self.transcript
            .initialize(&self.config.topic, &self.config.model)
            .await?;
        let initial = self
            .store
            .initialize(num_agents, &self.config.topic, &self.backend)
            .await?;
        Ok(initial)
    }

    /// Runs one three-turn conversation between `agent_a` (who opens and
    /// replies) and `agent_b` (who responds), then persists both agents'
    /// updated state and the transcript block.
    ///
    /// Empty backend output never aborts a conversation: each turn has a
    /// canned fallback that restates the speaker's current position, so
    /// opinions hold steady when the backend is down.
    pub async fn run_conversation(
        &self,
        agent_a: u32,
        agent_b: u32,
        tick: u64,
    ) -> EngineResult<ConversationOutcome> {
        let topic = &self.config.topic;
        let window = self.config.memory_window;
        let max_tokens = self.config.max_output_tokens;

        let stance_a = self.store.latest_stance(agent_a).await?;
        let stance_b = self.store.latest_stance(agent_b).await?;
        let rationale_a = self.store.latest_rationale(agent_a).await?;
        let rationale_b = self.store.latest_rationale(agent_b).await?;
        let memory_a = self.store.recent_entries(agent_a, window).await?;
        let memory_b = self.store.recent_entries(agent_b, window).await?;

        let prior_a = embedded_score(&stance_a);
        let prior_b = embedded_score(&stance_b);

        let challenge = devils_advocate_instruction(prior_a - prior_b);
        if challenge.is_some() {
            tracing::debug!(
                agent_a,
                agent_b,
                prior_a,
                prior_b,
                "opinions close; injecting challenge instruction"
            );
        }

        let speaker_a = SpeakerContext {
            stance: &stance_a,
            score: prior_a,
            rationale: &rationale_a,
        };
        let speaker_b = SpeakerContext {
            stance: &stance_b,
            score: prior_b,
            rationale: &rationale_b,
        };

        // Turn 1: A opens.
        let opening_prompt = build_opening_prompt(topic, &speaker_a, &memory_a, challenge);
        let mut opening = self.backend.generate(&opening_prompt, max_tokens).await;
        if opening.is_empty() {
            opening = format!("I believe {stance_a}.");
        }

        // Turn 2: B responds and restates its opinion.
        let response_prompt =
            build_response_prompt(topic, &speaker_b, &memory_b, challenge, &opening);
        let mut response_raw = self.backend.generate(&response_prompt, max_tokens).await;
        if response_raw.is_empty() {
            response_raw = format!("I disagree. {stance_b}.\nOPINION: {prior_b:.2}");
        }
        let opinion_b = self.parser.extract(&response_raw, prior_b);
        let response = strip_opinion_line(&response_raw);

        // Turn 3: A replies and restates its opinion.
        let reply_prompt = build_reply_prompt(topic, &speaker_a, challenge, &opening, &response);
        let mut reply_raw = self.backend.generate(&reply_prompt, max_tokens).await;
        if reply_raw.is_empty() {
            reply_raw = format!(
                "That's an interesting point, but I maintain my view.\nOPINION: {prior_a:.2}"
            );
        }
        let opinion_a = self.parser.extract(&reply_raw, prior_a);
        let reply = strip_opinion_line(&reply_raw);

        let conversation = format!("A: {opening}\nB: {response}\nA: {reply}");
        let snippet = format!("A: {}", truncate_chars(&opening, SNIPPET_CHARS));

        let entry_a = MemoryEntry {
            tick,
            partner: agent_b,
            conversation: conversation.clone(),
            opinion: opinion_a,
            rationale: rationale_a,
        };
        let entry_b = MemoryEntry {
            tick,
            partner: agent_a,
            conversation: conversation.clone(),
            opinion: opinion_b,
            rationale: rationale_b,
        };
        self.store.append_entry(agent_a, &entry_a).await?;
        self.store.append_entry(agent_b, &entry_b).await?;

        self.transcript
            .append(&TranscriptRecord {
                tick,
                agent_a,
                agent_b,
                prior: Some((prior_a, prior_b)),
                conversation,
                posterior: (opinion_a, opinion_b),
            })
            .await?;

        tracing::debug!(tick, agent_a, agent_b, opinion_a, opinion_b, "conversation recorded");

        Ok(ConversationOutcome {
            opinion_a,
            opinion_b,
            snippet,
        })
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
