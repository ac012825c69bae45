//! CLI layer for agentstream.
//!
//! Provides the command-line interface using clap, with commands for
//! serving the streaming endpoint, asking questions and managing prompts.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
