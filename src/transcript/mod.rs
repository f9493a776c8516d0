//! Append-only conversation transcript and its offline replay.

pub mod log;
pub mod replay;

pub use log::{TranscriptLog, TranscriptRecord};
pub use replay::{discover_initial_opinions, parse_transcript, reconstruct, OpinionSeries};
