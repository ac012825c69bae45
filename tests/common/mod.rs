//! Scripted provider and stub tools shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentstream::agent::{
    AgentConfig, ChatRequest, ChatResponse, DeltaStream, LlmProvider, PromptSet, Tool,
    ToolDescriptor, ToolQuery, TokenUsage,
};
use agentstream::core::Message;
use agentstream::error::AgentError;
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use tokio_util::sync::CancellationToken;

/// Provider whose relevance verdicts are keyed by tool name.
#[derive(Default)]
pub struct ScriptedProvider {
    /// Verdict text per tool; tools without an entry get `RELEVANT: NO`.
    pub verdicts: HashMap<String, String>,
    /// Delay per tool before the verdict is returned.
    pub verdict_delays: HashMap<String, Duration>,
    /// Tools whose relevance check fails.
    pub failing_verdicts: Vec<String>,
    /// Deltas returned by every streaming call.
    pub deltas: Vec<String>,
    /// Fail the stream after the deltas.
    pub stream_error: Option<String>,
    /// Keep the stream open after the deltas.
    pub hang_after_deltas: bool,
    /// Every request seen, in arrival order.
    pub requests: Mutex<Vec<ChatRequest>>,
    /// Cancelled once a hanging stream is dropped by its consumer.
    pub released: CancellationToken,
}

/// Cancels its token when dropped.
struct ReleaseOnDrop(CancellationToken);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relevant(mut self, tool: &str, search_query: &str) -> Self {
        self.verdicts.insert(
            tool.to_string(),
            format!("RELEVANT: YES\nSEARCH QUERY: {search_query}"),
        );
        self
    }

    pub fn verdict_delay(mut self, tool: &str, delay: Duration) -> Self {
        self.verdict_delays.insert(tool.to_string(), delay);
        self
    }

    pub fn failing_verdict(mut self, tool: &str) -> Self {
        self.failing_verdicts.push(tool.to_string());
        self
    }

    pub fn answer(mut self, deltas: &[&str]) -> Self {
        self.deltas = deltas.iter().map(|d| (*d).to_string()).collect();
        self
    }

    pub fn stream_error(mut self, message: &str) -> Self {
        self.stream_error = Some(message.to_string());
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang_after_deltas = true;
        self
    }

    pub fn streamed_prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| {
                r.iter()
                    .filter(|req| req.stream)
                    .filter_map(|req| req.messages.last().map(|m| m.content.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn streamed_requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.iter().filter(|req| req.stream).cloned().collect())
            .unwrap_or_default()
    }

    fn record(&self, request: &ChatRequest) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
    }
}

/// Extracts the tool name from a relevance prompt.
fn tool_in_prompt(request: &ChatRequest) -> Option<String> {
    let prompt = &request.messages.last()?.content;
    let start = prompt.find("<tool name=\"")? + "<tool name=\"".len();
    let end = prompt[start..].find('"')? + start;
    Some(prompt[start..end].to_string())
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        self.record(request);
        let tool = tool_in_prompt(request).unwrap_or_default();
        if let Some(delay) = self.verdict_delays.get(&tool) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_verdicts.contains(&tool) {
            return Err(AgentError::ApiRequest {
                message: format!("relevance check for {tool} failed"),
                status: Some(503),
            });
        }
        let content = self
            .verdicts
            .get(&tool)
            .cloned()
            .unwrap_or_else(|| "RELEVANT: NO".to_string());
        Ok(ChatResponse {
            content,
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<DeltaStream, AgentError> {
        self.record(request);
        let mut items: Vec<Result<String, AgentError>> =
            self.deltas.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.stream_error {
            items.push(Err(AgentError::Stream {
                message: message.clone(),
            }));
        }
        let deltas = stream::iter(items);
        if self.hang_after_deltas {
            let guard = ReleaseOnDrop(self.released.clone());
            let hang = stream::unfold(guard, |guard| async move {
                let _guard = guard;
                std::future::pending::<Option<(Result<String, AgentError>, ReleaseOnDrop)>>()
                    .await
            });
            Ok(Box::pin(deltas.chain(hang)))
        } else {
            Ok(Box::pin(deltas))
        }
    }
}

/// What a stub tool does when invoked.
#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// Returns an artifact envelope with this kind and result text.
    Artifact(&'static str, &'static str),
    /// Returns plain text.
    Text(&'static str),
    /// Fails.
    Fail,
    /// Sleeps, then returns plain text.
    Slow(Duration),
}

pub struct StubTool {
    descriptor: ToolDescriptor,
    behavior: StubBehavior,
    /// Queries received, in call order.
    pub queries: Mutex<Vec<ToolQuery>>,
}

impl StubTool {
    pub fn new(name: &str, behavior: StubBehavior) -> Arc<Self> {
        Arc::new(Self {
            descriptor: ToolDescriptor {
                name: name.to_string(),
                description: format!("Looks things up in {name}"),
            },
            behavior,
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Tool for StubTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, query: &ToolQuery) -> anyhow::Result<String> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }
        match &self.behavior {
            StubBehavior::Artifact(kind, result) => Ok(serde_json::json!({
                "result": result,
                "artifact": {
                    "type": kind,
                    "question": query.question,
                    "searchQuery": query.search_query,
                    "data": { "hits": 1 },
                },
                "data": [{ "source": kind }],
            })
            .to_string()),
            StubBehavior::Text(text) => Ok((*text).to_string()),
            StubBehavior::Fail => anyhow::bail!("upstream exploded"),
            StubBehavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok("late".to_string())
            }
        }
    }
}

pub fn config() -> AgentConfig {
    AgentConfig::builder()
        .api_key("test-key")
        .build()
        .unwrap_or_else(|_| unreachable!())
}

pub fn prompts() -> Arc<PromptSet> {
    Arc::new(PromptSet::defaults())
}

pub fn history(turns: &[&str]) -> Vec<Message> {
    turns
        .iter()
        .enumerate()
        .map(|(i, text)| {
            if i % 2 == 0 {
                Message::user(*text)
            } else {
                let mut reply = Message::assistant(format!("a{i}"));
                reply.content = (*text).to_string();
                reply
            }
        })
        .collect()
}
