//! Wire frames: the line-oriented unit of the streaming protocol.
//!
//! A frame is a single line `data: <json>` followed by a blank line. The JSON
//! always has the same shape, `{"type": ..., "messages": [message]}`, with
//! exactly one message-shaped payload.

use serde::{Deserialize, Serialize};

use super::event::ProgressEvent;
use super::message::Message;

/// Prefix that marks a line as a frame.
pub const FRAME_MARKER: &str = "data:";

/// Discriminant carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Status indicator update.
    Status,
    /// Tool finished, payload carries its artifacts and data.
    ToolExecution,
    /// Answer delta.
    Response,
    /// Terminal error.
    Error,
}

/// A decoded or to-be-encoded frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    /// Frame kind.
    #[serde(rename = "type")]
    pub kind: FrameKind,
    /// Message-shaped payloads. Producers always send exactly one.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl WireFrame {
    /// Wraps a progress event in a frame addressed to `message_id`.
    #[must_use]
    pub fn from_event(message_id: &str, event: &ProgressEvent) -> Self {
        let mut message = Message::assistant(message_id);
        let kind = match event {
            ProgressEvent::Status { text } => {
                message.content.clone_from(text);
                FrameKind::Status
            }
            ProgressEvent::ToolExecution {
                text,
                artifacts,
                data,
            } => {
                message.content.clone_from(text);
                message.artifacts.clone_from(artifacts);
                message.data.clone_from(data);
                FrameKind::ToolExecution
            }
            ProgressEvent::Response {
                text_delta,
                artifacts,
            } => {
                message.content.clone_from(text_delta);
                message.artifacts.clone_from(artifacts);
                FrameKind::Response
            }
            ProgressEvent::Error { text } => {
                message.content.clone_from(text);
                FrameKind::Error
            }
        };
        Self {
            kind,
            messages: vec![message],
        }
    }

    /// The frame's payload, if present.
    #[must_use]
    pub fn payload(&self) -> Option<&Message> {
        self.messages.first()
    }

    /// Serializes the frame as `data: <json>\n\n`.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if a payload value cannot be encoded.
    pub fn encode(&self) -> serde_json::Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{FRAME_MARKER} {json}\n\n"))
    }

    /// Parses a single line, returning `None` for lines without the marker.
    ///
    /// One optional space after the marker is skipped.
    ///
    /// # Errors
    ///
    /// Returns a JSON error when the marker is present but the body is not a
    /// valid frame.
    pub fn parse_line(line: &str) -> Option<serde_json::Result<Self>> {
        let body = line.strip_prefix(FRAME_MARKER)?;
        let body = body.strip_prefix(' ').unwrap_or(body);
        Some(serde_json::from_str(body))
    }
}
