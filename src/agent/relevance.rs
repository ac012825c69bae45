//! Relevance analyzer agent.
//!
//! Asks the model whether one tool applies to the user's question and parses
//! a `RELEVANT: YES|NO` verdict. Anything that does not parse is treated as
//! "not relevant".

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::config::AgentConfig;
use super::prompt::{build_relevance_prompt, excerpt};
use super::provider::LlmProvider;
use super::tool::ToolDescriptor;
use super::traits::Agent;
use crate::core::RelevanceDecision;
use crate::error::AgentError;

static VERDICT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*RELEVANT:\s*\[?\s*(YES|NO)\b").ok());

static SEARCH_QUERY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*SEARCH QUERY:[ \t]*(.*)$").ok());

/// Parsed model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// `true` only for an explicit YES.
    pub is_relevant: bool,
    /// Non-empty `SEARCH QUERY:` line, if present.
    pub search_query: Option<String>,
}

impl Verdict {
    /// Parses a model reply. Missing or malformed verdicts fail closed.
    #[must_use]
    pub fn parse(reply: &str) -> Self {
        let is_relevant = VERDICT
            .as_ref()
            .and_then(|re| re.captures(reply))
            .and_then(|caps| caps.get(1))
            .is_some_and(|m| m.as_str().eq_ignore_ascii_case("yes"));

        let search_query = SEARCH_QUERY
            .as_ref()
            .and_then(|re| re.captures(reply))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().trim_matches(['"', '\'', '<', '>']).trim())
            .filter(|q| !q.is_empty())
            .map(str::to_string);

        Self {
            is_relevant,
            search_query,
        }
    }
}

/// Agent that judges whether a tool applies to the current question.
pub struct RelevanceAnalyzer {
    model: String,
    max_tokens: u32,
    excerpt_chars: usize,
    system_prompt: String,
}

impl RelevanceAnalyzer {
    /// Creates an analyzer for one turn.
    ///
    /// `model` is the turn's requested model. The configured relevance model
    /// takes precedence when set.
    #[must_use]
    pub fn new(config: &AgentConfig, model: &str, system_prompt: String) -> Self {
        Self {
            model: config
                .relevance_model
                .clone()
                .unwrap_or_else(|| model.to_string()),
            max_tokens: config.relevance_max_tokens,
            excerpt_chars: config.excerpt_chars,
            system_prompt,
        }
    }

    /// Decides whether `tool` applies to `query`.
    ///
    /// `previous_answer` is the last assistant message, if any. Only an
    /// excerpt of it is sent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] only when the provider call fails. An
    /// unparseable reply is a negative decision, not an error.
    pub async fn analyze(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        tool: &ToolDescriptor,
        previous_answer: Option<&str>,
    ) -> Result<RelevanceDecision, AgentError> {
        let previous = previous_answer
            .filter(|text| !text.trim().is_empty())
            .map(|text| excerpt(text, self.excerpt_chars));
        let prompt = build_relevance_prompt(query, &tool.name, &tool.description, previous);

        let response = self.execute(provider, &prompt).await?;
        let verdict = Verdict::parse(&response.content);

        tracing::debug!(
            tool = %tool.name,
            relevant = verdict.is_relevant,
            search_query = ?verdict.search_query,
            "relevance verdict"
        );

        Ok(RelevanceDecision {
            tool_name: tool.name.clone(),
            is_relevant: verdict.is_relevant,
            derived_query: verdict.search_query.filter(|_| verdict.is_relevant),
        })
    }
}

#[async_trait]
impl Agent for RelevanceAnalyzer {
    fn name(&self) -> &'static str {
        "relevance"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
