//! Tool-augmented answering pipeline.
//!
//! Uses a pluggable provider abstraction backed by OpenAI-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! TurnRequest → Orchestrator
//!   ├── RelevanceAnalyzer × enabled tools (ordered, bounded concurrency)
//!   ├── ToolExecutor × relevant tools → ToolResult + Artifact
//!   └── ResponseSynthesizer → streamed deltas
//!        └── ProgressEvent channel → server encoder
//! ```

pub mod client;
pub mod config;
pub mod executor;
pub mod message;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod relevance;
pub mod synthesizer;
pub mod tool;
pub mod tools;
pub mod traits;

// Re-export key types
pub use client::create_provider;
pub use config::AgentConfig;
pub use executor::ToolExecutor;
pub use message::{ChatMessage, ChatRequest, ChatResponse, ChatRole, TokenUsage};
pub use orchestrator::{
    EventSender, Orchestrator, TurnEvent, TurnOutcome, TurnRequest, TurnSummary, spawn_turn,
};
pub use prompt::PromptSet;
pub use provider::{DeltaStream, LlmProvider};
pub use relevance::RelevanceAnalyzer;
pub use synthesizer::ResponseSynthesizer;
pub use tool::{Tool, ToolDescriptor, ToolQuery, ToolRegistry};
pub use traits::{Agent, AgentResponse};
