//! Vector search over Polish parliamentary records and legal acts.

use std::sync::{Arc, LazyLock};

use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value, json};

use crate::agent::config::AgentConfig;
use crate::agent::tool::{Tool, ToolDescriptor, ToolQuery};

/// Plugin id.
pub const NAME: &str = "sejm-stats.pl";

/// Results requested per search.
const RESULT_COUNT: &str = "4";

static DATE_ONLY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").ok());

/// Client for the sejm-stats vector search endpoint.
pub struct SejmStatsTool {
    descriptor: ToolDescriptor,
    client: reqwest::Client,
    base_url: String,
}

/// Factory registered in the tool registry.
pub fn create(config: &AgentConfig) -> anyhow::Result<Arc<dyn Tool>> {
    Ok(Arc::new(SejmStatsTool {
        descriptor: ToolDescriptor {
            name: NAME.to_string(),
            description: "Searches Polish legal acts currently in force (Dziennik Ustaw, \
                          Monitor Polski), parliamentary votes, sittings and interpellations."
                .to_string(),
        },
        client: super::http_client(config.timeout)?,
        base_url: config.sejm_stats_url.trim_end_matches('/').to_string(),
    }))
}

/// Keeps the first array in the response and drops photo fields.
///
/// Bare `YYYY-MM-DD` dates are widened to midnight UTC timestamps.
fn optimize_for_llm(response: &Value) -> Vec<Value> {
    let Some(items) = response
        .as_object()
        .and_then(|obj| obj.values().find_map(Value::as_array))
        .or_else(|| response.as_array())
    else {
        return Vec::new();
    };

    items
        .iter()
        .map(|item| match item {
            Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .filter(|(key, _)| !key.to_lowercase().contains("photo"))
                    .map(|(key, value)| (key.clone(), widen_date(value)))
                    .collect::<Map<String, Value>>(),
            ),
            other => other.clone(),
        })
        .collect()
}

fn widen_date(value: &Value) -> Value {
    match value {
        Value::String(s) if DATE_ONLY.as_ref().is_some_and(|re| re.is_match(s)) => {
            Value::String(format!("{s}T00:00:00.000Z"))
        }
        other => other.clone(),
    }
}

#[async_trait]
impl Tool for SejmStatsTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, query: &ToolQuery) -> anyhow::Result<String> {
        let search = query.search_text();
        let url = format!("{}/vector-search", self.base_url);
        tracing::debug!(tool = NAME, search, "querying sejm-stats");

        let response: Value = self
            .client
            .get(&url)
            .query(&[("q", search), ("n", RESULT_COUNT)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("sejm-stats returned invalid JSON")?;

        let items = optimize_for_llm(&response);
        let output = json!({
            "result": serde_json::to_string(&items)?,
            "artifact": {
                "type": "sejm-stats",
                "question": query.question,
                "searchQuery": search,
                "data": items,
            },
        });
        Ok(output.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimize_takes_first_array_and_strips_photos() {
        let response = json!({
            "acts": [
                {"title": "Act", "photoUrl": "x", "PHOTO": 1, "date": "2024-01-31", "n": 3},
                "raw"
            ]
        });
        let items = optimize_for_llm(&response);
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            json!({"title": "Act", "date": "2024-01-31T00:00:00.000Z", "n": 3})
        );
        assert_eq!(items[1], json!("raw"));
    }

    #[test]
    fn test_optimize_without_array() {
        assert!(optimize_for_llm(&json!({"count": 0})).is_empty());
        assert!(optimize_for_llm(&json!("text")).is_empty());
        assert_eq!(optimize_for_llm(&json!([1, 2])).len(), 2);
    }

    #[test]
    fn test_widen_date_leaves_timestamps() {
        let ts = json!("2024-01-31T10:00:00Z");
        assert_eq!(widen_date(&ts), ts);
    }
}
