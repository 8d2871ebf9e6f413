//! Command-line interface for gapforge.
//!
//! Submits analyses, inspects and manages stored jobs, and reconciles jobs
//! left behind by an earlier process.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
