//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// agentstream: tool-augmented chat agent with a progressive streaming endpoint.
///
/// Serves the `/api/chat` streaming endpoint, or asks a single question
/// against a running server or an in-process pipeline.
#[derive(Parser, Debug)]
#[command(name = "agentstream")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the streaming chat endpoint.
    ///
    /// Serves `POST /api/chat` (frame stream) and `GET /api/chat` (health).
    /// Requires an OpenAI-compatible API key.
    #[command(after_help = r#"Examples:
  agentstream serve                                  # Listen on 127.0.0.1:3000
  agentstream serve --host 0.0.0.0 --port 8080
  agentstream serve --origin https://chat.example    # Pin the accepted Origin
  OPENAI_API_KEY=sk-... agentstream serve --prompt-dir ./prompts
"#)]
    Serve {
        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to.
        #[arg(long, default_value = "3000")]
        port: u16,

        /// Accepted `Origin` header. Defaults to the request's `Host`.
        #[arg(long, env = "AGENTSTREAM_ORIGIN")]
        origin: Option<String>,

        /// Directory containing prompt template files.
        #[arg(long)]
        prompt_dir: Option<PathBuf>,
    },

    /// Ask one question and stream the answer.
    ///
    /// With `--endpoint` the question goes to a running server. Without it
    /// the full pipeline runs in process.
    #[command(after_help = r#"Examples:
  agentstream ask "Who was Maria Sklodowska-Curie?" --plugin wikipedia
  agentstream ask "What did the Sejm vote on last week?" --plugin sejm-stats.pl
  agentstream ask "hello" --endpoint http://127.0.0.1:3000/api/chat
  agentstream --format json ask "What is Rust?" --plugin wikipedia | jq .content
"#)]
    Ask {
        /// The question to ask.
        question: String,

        /// Enabled plugin id (repeatable).
        #[arg(short, long = "plugin")]
        plugins: Vec<String>,

        /// Model for this turn.
        #[arg(short, long)]
        model: Option<String>,

        /// Synthesis system prompt.
        #[arg(long)]
        system_prompt: Option<String>,

        /// Submission endpoint of a running server.
        #[arg(long)]
        endpoint: Option<String>,

        /// Directory containing prompt template files.
        #[arg(long)]
        prompt_dir: Option<PathBuf>,
    },

    /// List the registered plugins.
    Tools,

    /// Write default prompt templates to a directory.
    ///
    /// Existing files are not overwritten.
    #[command(after_help = r#"Examples:
  agentstream init-prompts                  # ~/.config/agentstream/prompts
  agentstream init-prompts --dir ./prompts
"#)]
    InitPrompts {
        /// Target directory for prompt templates.
        ///
        /// Defaults to `~/.config/agentstream/prompts/`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}
