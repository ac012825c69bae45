//! Shared data model for both ends of the stream.
//!
//! The orchestrator produces [`ProgressEvent`]s, the server encodes them as
//! [`WireFrame`]s, and the client folds the frames back into a [`Message`].

pub mod event;
pub mod frame;
pub mod message;

pub use event::{ProgressEvent, RelevanceDecision, ToolResult};
pub use frame::{FRAME_MARKER, FrameKind, WireFrame};
pub use message::{Artifact, Message, Role};
