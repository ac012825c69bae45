//! Output formatting for CLI commands.

use std::fmt::Write;

use serde::Serialize;

use crate::agent::ToolDescriptor;
use crate::core::Message;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
    /// One JSON document per line.
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name. Unknown names fall back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Serializes `value` in this format (JSON for `Text`).
    #[must_use]
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        let rendered = match self {
            Self::Ndjson => serde_json::to_string(value),
            Self::Text | Self::Json => serde_json::to_string_pretty(value),
        };
        rendered.map_or_else(|e| format!("{{\"error\": \"{e}\"}}"), |s| s + "\n")
    }
}

/// Formats the registered plugins.
#[must_use]
pub fn format_tools(tools: &[ToolDescriptor], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if tools.is_empty() {
                return "No plugins registered.\n".to_string();
            }
            let width = tools.iter().map(|t| t.name.len()).max().unwrap_or(0);
            let mut output = String::new();
            for tool in tools {
                let summary = tool.description.lines().next().unwrap_or_default();
                let _ = writeln!(output, "{:<width$}  {summary}", tool.name);
            }
            output
        }
        OutputFormat::Json | OutputFormat::Ndjson => format.to_json(tools),
    }
}

/// Formats a finished answer.
///
/// Text output carries only the trailer, since the content was streamed
/// already.
#[must_use]
pub fn format_answer(message: &Message, notice: Option<&str>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::from("\n");
            if !message.artifacts.is_empty() {
                let kinds: Vec<&str> = message.artifacts.iter().map(|a| a.kind.as_str()).collect();
                let _ = writeln!(output, "\nSources: {}", kinds.join(", "));
            }
            if let Some(notice) = notice {
                let _ = writeln!(output, "\nError: {notice}");
            }
            output
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "id": message.id,
                "content": message.content,
                "artifacts": message.artifacts,
                "data": message.data,
                "error": notice,
            });
            format.to_json(&json)
        }
    }
}
