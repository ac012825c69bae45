//! Synthesizer agent for the final streamed answer.
//!
//! Builds the synthesis prompt from tool results (or from artifacts found
//! earlier in the conversation) and opens a delta stream from the provider.

use async_trait::async_trait;

use super::config::AgentConfig;
use super::message::{ChatMessage, ChatRequest, system_message, user_message};
use super::prompt::{build_contextual_prompt, build_synthesis_prompt};
use super::provider::{DeltaStream, LlmProvider};
use super::traits::Agent;
use crate::core::{Artifact, Message, ToolResult};
use crate::error::AgentError;

/// Agent that streams the answer shown to the user.
pub struct ResponseSynthesizer {
    model: String,
    temperature: f32,
    max_tokens: u32,
    system_prompt: String,
}

impl ResponseSynthesizer {
    /// Creates a synthesizer for one turn.
    #[must_use]
    pub fn new(config: &AgentConfig, model: &str, system_prompt: String) -> Self {
        Self {
            model: model.to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt,
        }
    }

    /// Overrides the configured temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        if let Some(t) = temperature {
            self.temperature = t;
        }
        self
    }

    /// Overrides the configured token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        if let Some(n) = max_tokens {
            self.max_tokens = n;
        }
        self
    }

    /// Streams an answer grounded in this turn's tool results.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the provider stream cannot be opened.
    pub async fn stream_answer(
        &self,
        provider: &dyn LlmProvider,
        question: &str,
        results: &[ToolResult],
    ) -> Result<DeltaStream, AgentError> {
        let prompt = build_synthesis_prompt(question, results);
        self.execute_stream(provider, &prompt).await
    }

    /// Streams an answer to a follow-up from artifacts of earlier turns.
    ///
    /// `earlier` is the recent conversation before the question. It is sent
    /// as prior chat turns so the model can resolve references to them.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the provider stream cannot be opened.
    pub async fn stream_contextual_answer(
        &self,
        provider: &dyn LlmProvider,
        earlier: &[Message],
        question: &str,
        artifacts: &[Artifact],
    ) -> Result<DeltaStream, AgentError> {
        let request = self.contextual_request(earlier, question, artifacts);
        provider.chat_stream(&request).await
    }

    fn contextual_request(
        &self,
        earlier: &[Message],
        question: &str,
        artifacts: &[Artifact],
    ) -> ChatRequest {
        let prompt = build_contextual_prompt(question, artifacts);
        let mut request = self.build_request(&prompt, true);
        request.messages = std::iter::once(system_message(self.system_prompt()))
            .chain(
                earlier
                    .iter()
                    .filter(|m| !m.content.trim().is_empty())
                    .map(ChatMessage::from),
            )
            .chain(std::iter::once(user_message(&prompt)))
            .collect();
        request
    }
}

#[async_trait]
impl Agent for ResponseSynthesizer {
    fn name(&self) -> &'static str {
        "synthesizer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
