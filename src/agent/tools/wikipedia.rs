//! Wikipedia lookup through the `MediaWiki` action API.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::agent::config::AgentConfig;
use crate::agent::prompt::excerpt;
use crate::agent::tool::{Tool, ToolDescriptor, ToolQuery};

/// Plugin id.
pub const NAME: &str = "wikipedia";

/// Longest extract handed to the synthesizer.
const MAX_CONTENT_CHARS: usize = 2000;

/// Returned verbatim when the search finds nothing.
const NO_RESULT: &str = "No good Wikipedia search result was found";

/// Wikipedia search + extract tool.
pub struct WikipediaTool {
    descriptor: ToolDescriptor,
    client: reqwest::Client,
    endpoint: String,
}

/// Factory registered in the tool registry.
pub fn create(config: &AgentConfig) -> anyhow::Result<Arc<dyn Tool>> {
    Ok(Arc::new(WikipediaTool {
        descriptor: ToolDescriptor {
            name: NAME.to_string(),
            description: "Looks up encyclopedic background on people, places, events and \
                          general concepts on Wikipedia."
                .to_string(),
        },
        client: super::http_client(config.timeout)?,
        endpoint: config.wikipedia_url.clone(),
    }))
}

impl WikipediaTool {
    async fn get(&self, params: &[(&str, &str)]) -> anyhow::Result<Value> {
        Ok(self
            .client
            .get(&self.endpoint)
            .query(&[("action", "query"), ("format", "json")])
            .query(params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

fn first_title(search: &Value) -> Option<&str> {
    search
        .pointer("/query/search/0/title")
        .and_then(Value::as_str)
}

fn first_extract(pages: &Value) -> Option<&str> {
    pages
        .pointer("/query/pages")
        .and_then(Value::as_object)
        .and_then(|pages| pages.values().next())
        .and_then(|page| page.get("extract"))
        .and_then(Value::as_str)
}

#[async_trait]
impl Tool for WikipediaTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, query: &ToolQuery) -> anyhow::Result<String> {
        let search = query.search_text();
        tracing::debug!(tool = NAME, search, "querying wikipedia");

        let hits = self
            .get(&[("list", "search"), ("srsearch", search), ("srlimit", "1")])
            .await?;
        let Some(title) = first_title(&hits) else {
            return Ok(NO_RESULT.to_string());
        };

        let pages = self
            .get(&[
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .await?;
        let extract = excerpt(first_extract(&pages).unwrap_or_default(), MAX_CONTENT_CHARS);

        let output = json!({
            "result": format!("Page: {title}\nSummary: {extract}"),
            "artifact": {
                "type": "wikipedia",
                "question": query.question,
                "searchQuery": search,
                "data": {"title": title, "extract": extract},
            },
        });
        Ok(output.to_string())
    }
}
