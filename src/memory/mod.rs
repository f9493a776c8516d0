//! Per-agent conversation memory.
//!
//! Each agent accumulates an append-only history of records holding past
//! conversations, stance and rationale. Stance and rationale live as labeled
//! lines embedded in the free-text records rather than as separate fields;
//! lookups scan newest-first and the latest written line wins.

pub mod store;
pub mod types;

pub use store::{DirMemoryStore, InMemoryStore, MemoryStore};
pub use types::{
    initial_record, last_labeled_line, split_records, stance_label, MemoryEntry,
    FALLBACK_RATIONALE, RECORD_DELIMITER, UNSTATED_STANCE,
};
