//! agentstream: tool-augmented chat agent with progressive streaming.
//!
//! One assistant turn flows through three stages:
//!
//! ```text
//! history ─▶ Orchestrator (relevance → tools → synthesis)
//!              │ ProgressEvent
//!              ▼
//!            encoder ─▶ `data: {...}\n\n` chunks over HTTP
//!              │ bytes, arbitrary chunk boundaries
//!              ▼
//!            StreamDecoder ─▶ FoldState ─▶ Message
//! ```
//!
//! - [`agent`]: providers, tools, relevance analysis and the turn state machine
//! - [`server`]: the `/api/chat` endpoint and the frame encoder
//! - [`client`]: chunk-safe decoding, folding and conversation state
//! - [`core`]: data model shared by both ends of the stream
//! - [`cli`]: the `agentstream` command line

pub mod agent;
pub mod cli;
pub mod client;
pub mod core;
pub mod error;
pub mod server;

pub use agent::{AgentConfig, Orchestrator, TurnRequest, TurnSummary, spawn_turn};
pub use client::{ChatClient, Conversation, DecoderRegistry, StreamDecoder};
pub use crate::core::{Artifact, Message, ProgressEvent, Role, WireFrame};
pub use error::{AgentError, ClientError, DecodeError, Error, Result};
pub use server::{AppState, SubmitRequest, router};
