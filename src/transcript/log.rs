//! The global append-only conversation transcript.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::TranscriptError;

/// One conversation event in the transcript.
///
/// The ordered sequence of these records is the single source of truth
/// for reconstructing global history; blocks are only ever appended.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptRecord {
    /// Simulation tick the conversation happened on.
    pub tick: u64,
    /// Opening agent.
    pub agent_a: u32,
    /// Responding agent.
    pub agent_b: u32,
    /// Opinions going in, (A, B), when known.
    pub prior: Option<(f64, f64)>,
    /// Full conversation text.
    pub conversation: String,
    /// Opinions coming out, (A, B).
    pub posterior: (f64, f64),
}

impl TranscriptRecord {
    /// Renders the record as one transcript block.
    ///
    /// The block shape is an external interface consumed by offline
    /// tooling: header line, optional prior line, conversation body,
    /// posterior line, blank separator.
    pub fn render(&self) -> String {
        let mut block = format!(
            "=== Tick {} | Agent {} <-> Agent {} ===\n",
            self.tick, self.agent_a, self.agent_b
        );
        if let Some((prior_a, prior_b)) = self.prior {
            block.push_str(&format!(
                "PRIOR_STANCE: A({})={prior_a:.2} , B({})={prior_b:.2}\n",
                self.agent_a, self.agent_b
            ));
        }
        block.push_str(self.conversation.trim_end());
        block.push('\n');
        block.push_str(&format!(
            "Opinions after: A({})={:.3}, B({})={:.3}\n\n",
            self.agent_a, self.posterior.0, self.agent_b, self.posterior.1
        ));
        block
    }
}

/// Append-only writer for the transcript file.
pub struct TranscriptLog {
    path: PathBuf,
}

impl TranscriptLog {
    /// Creates a writer for the given path. Nothing is touched on disk
    /// until [`initialize`](Self::initialize) or
    /// [`append`](Self::append) is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the transcript file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts a fresh transcript: truncates the file and writes the
    /// run header.
    pub async fn initialize(&self, topic: &str, model: &str) -> Result<(), TranscriptError> {
        let header = format!("# Transcript: {topic}\n# Model: {model}\n\n");
        tokio::fs::write(&self.path, header).await?;
        Ok(())
    }

    /// Appends one conversation block; existing content is never
    /// rewritten.
    pub async fn append(&self, record: &TranscriptRecord) -> Result<(), TranscriptError> {
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;
        file.write_all(record.render().as_bytes()).await?;
        // tokio's File queues writes on a background task; flush before
        // returning so the block is readable once this call resolves.
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn record(tick: u64) -> TranscriptRecord {
        TranscriptRecord {
            tick,
            agent_a: 0,
            agent_b: 1,
            prior: Some((0.35, -0.4)),
            conversation: "A: opening\nB: response\nA: reply".to_string(),
            posterior: (0.62, -0.55),
        }
    }

    #[test]
    fn test_render_block_shape() {
        let block = record(7).render();

        assert_eq!(
            block,
            "=== Tick 7 | Agent 0 <-> Agent 1 ===\n\
             PRIOR_STANCE: A(0)=0.35 , B(1)=-0.40\n\
             A: opening\nB: response\nA: reply\n\
             Opinions after: A(0)=0.620, B(1)=-0.550\n\n"
        );
    }

    #[test]
    fn test_render_without_prior_omits_line() {
        let mut rec = record(1);
        rec.prior = None;
        let block = rec.render();

        assert!(!block.contains("PRIOR_STANCE"));
        assert!(block.starts_with("=== Tick 1 | Agent 0 <-> Agent 1 ===\nA: opening"));
    }

    #[tokio::test]
    async fn test_initialize_writes_header_and_truncates() {
        let dir = TempDir::new().expect("failed to create temp dir");
        let log = TranscriptLog::new(dir.path().join("transcript.txt"));

        log.append(&record(1)).await.expect("append should succeed");
        log.initialize("carbon taxes", "phi3:mini")
            .await
            .expect("initialize should succeed");

        let contents = tokio::fs::read_to_string(log.path())
            .await
            .expect("transcript should exist");
        assert_eq!(contents, "# Transcript: carbon taxes\n# Model: phi3:mini\n\n");
    }

    #[tokio::test]
    async fn test_append_accumulates_blocks_in_order() {
        let dir = TempDir::new().expect("failed to create temp dir");
        let log = TranscriptLog::new(dir.path().join("transcript.txt"));
        log.initialize("t", "m").await.expect("initialize should succeed");

        log.append(&record(1)).await.expect("append should succeed");
        log.append(&record(2)).await.expect("append should succeed");

        let contents = tokio::fs::read_to_string(log.path())
            .await
            .expect("transcript should exist");
        let first = contents.find("=== Tick 1 ").expect("first block present");
        let second = contents.find("=== Tick 2 ").expect("second block present");
        assert!(first < second);
    }
}
