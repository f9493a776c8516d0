//! Store implementations over the per-agent record format.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::config::DEFAULT_MAX_OUTPUT_TOKENS;
use crate::conversation::prompts::build_rationale_prompt;
use crate::error::StoreError;
use crate::llm::BackendAdapter;
use crate::memory::types::{
    initial_record, last_labeled_line, split_records, stance_label, MemoryEntry,
    FALLBACK_RATIONALE, RECORD_DELIMITER, UNSTATED_STANCE,
};

/// Per-agent append-only conversation memory.
///
/// Missing state never errors: reads on an agent with no stored records
/// resolve to empty collections or the documented sentinels. The only
/// failure class here is real storage I/O.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Clears storage and seeds `num_agents` fresh agents.
    ///
    /// For each agent this draws an initial opinion uniformly from
    /// [-1.0, 1.0], derives the stance label, obtains a one-sentence
    /// rationale through the backend and writes the agent's first record.
    /// Returns the initial opinions in agent order.
    async fn initialize(
        &self,
        num_agents: u32,
        topic: &str,
        backend: &BackendAdapter,
    ) -> Result<Vec<f64>, StoreError>;

    /// Appends one conversation record; prior records are never rewritten.
    async fn append_entry(&self, agent: u32, entry: &MemoryEntry) -> Result<(), StoreError>;

    /// Last `n` records for the agent, oldest-first.
    async fn recent_entries(&self, agent: u32, n: usize) -> Result<Vec<String>, StoreError>;

    /// Most recently written stance text, or [`UNSTATED_STANCE`].
    async fn latest_stance(&self, agent: u32) -> Result<String, StoreError>;

    /// Most recently written rationale, or empty when none exists.
    async fn latest_rationale(&self, agent: u32) -> Result<String, StoreError>;
}

/// Generates a one-sentence rationale for holding the given opinion.
///
/// Only the first line of a longer reply is kept; empty backend output
/// falls back to [`FALLBACK_RATIONALE`].
async fn generate_rationale(backend: &BackendAdapter, opinion: f64, topic: &str) -> String {
    let prompt = build_rationale_prompt(opinion, topic);
    let response = backend.generate(&prompt, DEFAULT_MAX_OUTPUT_TOKENS).await;
    match response.lines().next() {
        Some(first) if !first.trim().is_empty() => first.trim().to_string(),
        _ => FALLBACK_RATIONALE.to_string(),
    }
}

/// Directory-backed store: one `agent_<id>.txt` file per agent.
pub struct DirMemoryStore {
    /// Directory holding the agent files.
    dir: PathBuf,
    /// Seed for initial-opinion draws; entropy-seeded when absent.
    seed: Option<u64>,
}

impl DirMemoryStore {
    /// Creates a store rooted at `dir`. The directory is created (and any
    /// previous contents cleared) by [`MemoryStore::initialize`].
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seed: None,
        }
    }

    /// Seeds the initial-opinion draws for reproducible setups.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Directory holding the agent files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn create_rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        }
    }

    fn agent_path(&self, agent: u32) -> PathBuf {
        self.dir.join(format!("agent_{agent}.txt"))
    }

    /// Full file text for the agent; empty when no file exists yet.
    async fn read_all(&self, agent: u32) -> Result<String, StoreError> {
        match tokio::fs::read_to_string(self.agent_path(agent)).await {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl MemoryStore for DirMemoryStore {
    async fn initialize(
        &self,
        num_agents: u32,
        topic: &str,
        backend: &BackendAdapter,
    ) -> Result<Vec<f64>, StoreError> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut rng = self.create_rng();
        let mut initial = Vec::with_capacity(num_agents as usize);
        for agent in 0..num_agents {
            let opinion: f64 = rng.random_range(-1.0..=1.0);
            let stance = stance_label(opinion, topic);
            let rationale = generate_rationale(backend, opinion, topic).await;
            let record = initial_record(opinion, &stance, &rationale);
            tokio::fs::write(self.agent_path(agent), format!("{record}{RECORD_DELIMITER}"))
                .await?;
            tracing::info!(agent, num_agents, opinion, "agent initialized");
            initial.push(opinion);
        }
        Ok(initial)
    }

    async fn append_entry(&self, agent: u32, entry: &MemoryEntry) -> Result<(), StoreError> {
        let rendered = format!("{}{}", entry.render().trim_end(), RECORD_DELIMITER);
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.agent_path(agent))
            .await?;
        file.write_all(rendered.as_bytes()).await?;
        // tokio's File queues writes on a background task; flush before
        // returning so the record is readable once this call resolves.
        file.flush().await?;
        Ok(())
    }

    async fn recent_entries(&self, agent: u32, n: usize) -> Result<Vec<String>, StoreError> {
        let text = self.read_all(agent).await?;
        let mut records = split_records(&text);
        if records.len() > n {
            records.drain(..records.len() - n);
        }
        Ok(records)
    }

    async fn latest_stance(&self, agent: u32) -> Result<String, StoreError> {
        let text = self.read_all(agent).await?;
        Ok(last_labeled_line(&text, "Stance:").unwrap_or_else(|| UNSTATED_STANCE.to_string()))
    }

    async fn latest_rationale(&self, agent: u32) -> Result<String, StoreError> {
        let text = self.read_all(agent).await?;
        Ok(last_labeled_line(&text, "Rationale:").unwrap_or_default())
    }
}

/// In-memory store for tests and embedded runs.
pub struct InMemoryStore {
    /// Rendered records per agent, oldest-first.
    records: Mutex<BTreeMap<u32, Vec<String>>>,
    /// Seed for initial-opinion draws; entropy-seeded when absent.
    seed: Option<u64>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            seed: None,
        }
    }

    /// Seeds the initial-opinion draws for reproducible setups.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    fn create_rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn initialize(
        &self,
        num_agents: u32,
        topic: &str,
        backend: &BackendAdapter,
    ) -> Result<Vec<f64>, StoreError> {
        let mut rng = self.create_rng();
        let mut drawn = Vec::with_capacity(num_agents as usize);
        for agent in 0..num_agents {
            let opinion: f64 = rng.random_range(-1.0..=1.0);
            let stance = stance_label(opinion, topic);
            let rationale = generate_rationale(backend, opinion, topic).await;
            drawn.push((agent, opinion, initial_record(opinion, &stance, &rationale)));
        }

        let mut records = self.records.lock().await;
        records.clear();
        let mut initial = Vec::with_capacity(drawn.len());
        for (agent, opinion, record) in drawn {
            records.insert(agent, vec![record]);
            initial.push(opinion);
        }
        Ok(initial)
    }

    async fn append_entry(&self, agent: u32, entry: &MemoryEntry) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        records
            .entry(agent)
            .or_default()
            .push(entry.render().trim_end().to_string());
        Ok(())
    }

    async fn recent_entries(&self, agent: u32, n: usize) -> Result<Vec<String>, StoreError> {
        let records = self.records.lock().await;
        let Some(entries) = records.get(&agent) else {
            return Ok(Vec::new());
        };
        let start = entries.len().saturating_sub(n);
        Ok(entries[start..].to_vec())
    }

    async fn latest_stance(&self, agent: u32) -> Result<String, StoreError> {
        let records = self.records.lock().await;
        let stance = records
            .get(&agent)
            .and_then(|entries| {
                entries
                    .iter()
                    .rev()
                    .find_map(|record| last_labeled_line(record, "Stance:"))
            });
        Ok(stance.unwrap_or_else(|| UNSTATED_STANCE.to_string()))
    }

    async fn latest_rationale(&self, agent: u32) -> Result<String, StoreError> {
        let records = self.records.lock().await;
        let rationale = records
            .get(&agent)
            .and_then(|entries| {
                entries
                    .iter()
                    .rev()
                    .find_map(|record| last_labeled_line(record, "Rationale:"))
            });
        Ok(rationale.unwrap_or_default())
    }
}
