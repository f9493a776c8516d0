//! Command-line interface for agora.
//!
//! Provides the `run` command that drives a full simulation and the
//! `replay` command that rebuilds opinion series from run artifacts.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
