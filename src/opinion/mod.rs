//! Opinion extraction from unreliable model output.
//!
//! Model replies are free text that may or may not carry the requested
//! `OPINION: <float>` trailer. The parser turns whatever came back into a
//! score in [-1.0, 1.0], falling back to bounded noise around the prior
//! opinion so a non-compliant model can never stall a run.

pub mod parser;

pub use parser::{embedded_score, strip_opinion_line, OpinionParser};
