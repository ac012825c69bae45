//! Client side of the stream: decode, fold, and track conversation state.
//!
//! ```text
//! bytes ─▶ StreamDecoder (UTF-8 tail + line buffer)
//!            └─▶ WireFrame::parse_line ─▶ FoldState::fold ─▶ Message
//! ```

pub mod decoder;
pub mod fold;
pub mod http;
pub mod session;

pub use decoder::StreamDecoder;
pub use fold::{FoldEffect, FoldState};
pub use http::{ChatClient, SubmitOutcome};
pub use session::{BoundDecoder, Conversation, DecoderRegistry, Notice};
