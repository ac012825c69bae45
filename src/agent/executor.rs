//! Tool executor: invokes one tool, normalizes its output and contains its
//! failures.
//!
//! A tool that errors or runs past the configured timeout yields the inert
//! result `"Error: Failed to execute tool <name>"`. The turn always continues.
//! A panicking tool is treated the same way when the build unwinds; release
//! builds abort on panic.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::Value;

use super::tool::{Tool, ToolQuery};
use crate::core::{Artifact, ToolResult};

/// Result text substituted for a failed tool call.
#[must_use]
pub fn failure_text(tool_name: &str) -> String {
    format!("Error: Failed to execute tool {tool_name}")
}

/// Runs tools with a per-call timeout.
#[derive(Debug, Clone, Copy)]
pub struct ToolExecutor {
    timeout: Duration,
}

impl ToolExecutor {
    /// Creates an executor that gives each tool at most `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Invokes `tool` and normalizes its output.
    ///
    /// Never fails; see the module docs.
    pub async fn execute(&self, tool: &dyn Tool, query: &ToolQuery) -> ToolResult {
        let name = tool.name().to_string();

        let call = AssertUnwindSafe(tool.invoke(query)).catch_unwind();
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(Ok(raw))) => normalize(name, raw),
            Ok(Ok(Err(e))) => {
                tracing::warn!(tool = %name, error = %e, "tool failed");
                failed(name)
            }
            Ok(Err(_)) => {
                tracing::warn!(tool = %name, "tool panicked");
                failed(name)
            }
            Err(_) => {
                tracing::warn!(tool = %name, timeout = ?self.timeout, "tool timed out");
                failed(name)
            }
        }
    }
}

fn failed(tool_name: String) -> ToolResult {
    ToolResult {
        result: failure_text(&tool_name),
        tool_name,
        artifact: None,
        data: Vec::new(),
    }
}

/// Splits `{result, artifact, data?}` output, or keeps `raw` verbatim.
///
/// Both `result` and `artifact` keys must be present for the split. A null
/// artifact means "no artifact". A non-string `result` is re-serialized.
fn normalize(tool_name: String, raw: String) -> ToolResult {
    let verbatim = |tool_name: String, raw: String| ToolResult {
        tool_name,
        result: raw,
        artifact: None,
        data: Vec::new(),
    };

    let Ok(Value::Object(mut fields)) = serde_json::from_str::<Value>(&raw) else {
        return verbatim(tool_name, raw);
    };
    if !fields.contains_key("result") || !fields.contains_key("artifact") {
        return verbatim(tool_name, raw);
    }

    let result = match fields.remove("result") {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    };

    let artifact = match fields.remove("artifact") {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value::<Artifact>(value) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                tracing::warn!(tool = %tool_name, error = %e, "dropping malformed artifact");
                None
            }
        },
    };

    let data = match fields.remove("data") {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };

    ToolResult {
        tool_name,
        result,
        artifact,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tool::ToolDescriptor;
    use async_trait::async_trait;
    use serde_json::json;

    enum Behavior {
        Output(String),
        Fail,
        Hang,
        Panic,
    }

    struct Fake {
        descriptor: ToolDescriptor,
        behavior: Behavior,
    }

    #[async_trait]
    impl Tool for Fake {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }

        async fn invoke(&self, _query: &ToolQuery) -> anyhow::Result<String> {
            match &self.behavior {
                Behavior::Output(s) => Ok(s.clone()),
                Behavior::Fail => anyhow::bail!("upstream down"),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(String::new())
                }
                #[allow(clippy::panic)]
                Behavior::Panic => panic!("tool bug"),
            }
        }
    }

    fn fake(behavior: Behavior) -> Fake {
        Fake {
            descriptor: ToolDescriptor {
                name: "fake".to_string(),
                description: String::new(),
            },
            behavior,
        }
    }

    fn query() -> ToolQuery {
        ToolQuery {
            question: "q".to_string(),
            search_query: None,
        }
    }

    #[tokio::test]
    async fn test_structured_output_is_split() {
        let raw = json!({
            "result": "summary",
            "artifact": {"type": "fake", "question": "q", "data": [1]},
            "data": [{"id": 1}]
        })
        .to_string();
        let executor = ToolExecutor::new(Duration::from_secs(5));
        let result = executor.execute(&fake(Behavior::Output(raw)), &query()).await;
        assert_eq!(result.result, "summary");
        assert_eq!(result.artifact.map(|a| a.kind).as_deref(), Some("fake"));
        assert_eq!(result.data, vec![json!({"id": 1})]);
    }

    #[tokio::test]
    async fn test_plain_output_is_verbatim() {
        let executor = ToolExecutor::new(Duration::from_secs(5));
        let result = executor
            .execute(&fake(Behavior::Output("just text".into())), &query())
            .await;
        assert_eq!(result.result, "just text");
        assert!(result.artifact.is_none());
    }

    #[tokio::test]
    async fn test_object_without_both_fields_is_verbatim() {
        let raw = json!({"result": "only result"}).to_string();
        let executor = ToolExecutor::new(Duration::from_secs(5));
        let result = executor
            .execute(&fake(Behavior::Output(raw.clone())), &query())
            .await;
        assert_eq!(result.result, raw);
        assert!(result.artifact.is_none());
    }

    #[tokio::test]
    async fn test_null_artifact_and_structured_result() {
        let raw = json!({"result": {"n": 1}, "artifact": null}).to_string();
        let executor = ToolExecutor::new(Duration::from_secs(5));
        let result = executor.execute(&fake(Behavior::Output(raw)), &query()).await;
        assert_eq!(result.result, r#"{"n":1}"#);
        assert!(result.artifact.is_none());
    }

    #[tokio::test]
    async fn test_failure_becomes_inert_text() {
        let executor = ToolExecutor::new(Duration::from_secs(5));
        let result = executor.execute(&fake(Behavior::Fail), &query()).await;
        assert_eq!(result.result, "Error: Failed to execute tool fake");
        assert!(result.artifact.is_none());
    }

    #[tokio::test]
    async fn test_timeout_becomes_inert_text() {
        let executor = ToolExecutor::new(Duration::from_millis(20));
        let result = executor.execute(&fake(Behavior::Hang), &query()).await;
        assert_eq!(result.result, failure_text("fake"));
    }

    #[tokio::test]
    async fn test_panic_becomes_inert_text() {
        let executor = ToolExecutor::new(Duration::from_secs(5));
        let result = executor.execute(&fake(Behavior::Panic), &query()).await;
        assert_eq!(result.result, failure_text("fake"));
        assert!(result.artifact.is_none());
    }
}
