//! Conversation messages and tool artifacts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human input.
    User,
    /// Model output.
    Assistant,
}

/// Structured side-payload produced by a tool.
///
/// Artifacts ride along with an assistant message so later turns can answer
/// follow-up questions from the same source material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact kind, usually the producing tool's name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Question the tool was answering.
    #[serde(default)]
    pub question: String,
    /// Search query the tool actually ran, when it differs from the question.
    #[serde(
        rename = "searchQuery",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub search_query: Option<String>,
    /// Tool-specific payload.
    #[serde(default)]
    pub data: Value,
}

/// One entry in the conversation history.
///
/// While an assistant turn is streaming, `content` only grows. Once the turn
/// completes the message is not modified again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier.
    pub id: String,
    /// Author.
    pub role: Role,
    /// Text content.
    #[serde(default)]
    pub content: String,
    /// Artifacts attached during the turn, in execution order.
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Raw tool data attached during the turn.
    #[serde(default)]
    pub data: Vec<Value>,
}

impl Message {
    /// Generates a fresh message id.
    #[must_use]
    pub fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Creates a user message with a generated id.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Self::new_id(),
            role: Role::User,
            content: content.into(),
            artifacts: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Creates an empty assistant message bound to `id`.
    #[must_use]
    pub fn assistant(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: String::new(),
            artifacts: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Returns `true` for assistant messages.
    #[must_use]
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_artifact_wire_names() {
        let artifact = Artifact {
            kind: "sejm-stats".to_string(),
            question: "q".to_string(),
            search_query: Some("sq".to_string()),
            data: json!([1, 2]),
        };
        let value = serde_json::to_value(&artifact).unwrap_or_default();
        assert_eq!(value["type"], "sejm-stats");
        assert_eq!(value["searchQuery"], "sq");
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn test_artifact_omits_missing_search_query() {
        let artifact = Artifact {
            kind: "wikipedia".to_string(),
            question: "q".to_string(),
            search_query: None,
            data: Value::Null,
        };
        let json = serde_json::to_string(&artifact).unwrap_or_default();
        assert!(!json.contains("searchQuery"));
    }

    #[test]
    fn test_message_defaults_on_deserialize() {
        let msg: Message = serde_json::from_str(r#"{"id":"1","role":"user","content":"hi"}"#)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(msg.role, Role::User);
        assert!(msg.artifacts.is_empty());
        assert!(msg.data.is_empty());
    }

    #[test]
    fn test_message_rejects_unknown_role() {
        let result = serde_json::from_str::<Message>(r#"{"id":"1","role":"system","content":""}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_constructors() {
        let user = Message::user("hello");
        assert_eq!(user.role, Role::User);
        assert!(!user.id.is_empty());

        let assistant = Message::assistant("abc");
        assert!(assistant.is_assistant());
        assert_eq!(assistant.id, "abc");
        assert!(assistant.content.is_empty());
    }
}
