//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

/// Default chat model.
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default sampling temperature for synthesis.
const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default synthesis max tokens.
const DEFAULT_MAX_TOKENS: u32 = 1024;
/// Default relevance-check max tokens. The verdict is two short lines.
const DEFAULT_RELEVANCE_MAX_TOKENS: u32 = 64;
/// Default connect/request timeout in seconds for outbound tool calls.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default concurrent relevance checks (1 = sequential).
const DEFAULT_RELEVANCE_CONCURRENCY: usize = 1;
/// Default per-tool execution budget in seconds.
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 60;
/// Default excerpt length of the previous answer in relevance prompts.
const DEFAULT_EXCERPT_CHARS: usize = 900;
/// Histories shorter than this get the canned reply when no tool applies.
const DEFAULT_CONTEXT_MIN_HISTORY: usize = 3;
/// How many trailing messages are searched for earlier artifacts.
const DEFAULT_CONTEXT_WINDOW: usize = 5;
/// Default Together API base URL.
pub const TOGETHER_BASE_URL: &str = "https://api.together.xyz/v1";
/// Default sejm-stats API base URL.
const DEFAULT_SEJM_STATS_URL: &str = "https://sejm-stats.pl/apiInt";
/// Default `MediaWiki` API endpoint.
const DEFAULT_WIKIPEDIA_URL: &str = "https://en.wikipedia.org/w/api.php";

/// Configuration for the agent system.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (`"openai"` or `"together"`).
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Default model for synthesis when a request does not name one.
    pub model: String,
    /// Model for relevance checks. Falls back to the request's model.
    pub relevance_model: Option<String>,
    /// Sampling temperature for synthesis.
    pub temperature: f32,
    /// Maximum tokens for synthesis responses.
    pub max_tokens: u32,
    /// Maximum tokens for relevance verdicts.
    pub relevance_max_tokens: u32,
    /// Timeout for outbound HTTP requests made by tools.
    pub timeout: Duration,
    /// Relevance checks allowed in flight at once.
    ///
    /// Results keep registration order regardless of this value.
    pub relevance_concurrency: usize,
    /// Upper bound on a single tool invocation.
    pub tool_timeout: Duration,
    /// Characters of the previous answer included in relevance prompts.
    pub excerpt_chars: usize,
    /// Minimum history length before contextual synthesis is attempted.
    pub context_min_history: usize,
    /// Trailing messages scanned for earlier artifacts.
    pub context_window: usize,
    /// Directory containing prompt template files.
    ///
    /// When set, prompts are loaded from markdown files in this directory,
    /// falling back to compiled-in defaults for any missing files.
    pub prompt_dir: Option<PathBuf>,
    /// Base URL of the sejm-stats API.
    pub sejm_stats_url: String,
    /// `MediaWiki` API endpoint used by the wikipedia tool.
    pub wikipedia_url: String,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    relevance_model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    relevance_max_tokens: Option<u32>,
    timeout: Option<Duration>,
    relevance_concurrency: Option<usize>,
    tool_timeout: Option<Duration>,
    excerpt_chars: Option<usize>,
    context_min_history: Option<usize>,
    context_window: Option<usize>,
    prompt_dir: Option<PathBuf>,
    sejm_stats_url: Option<String>,
    wikipedia_url: Option<String>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("AGENTSTREAM_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            let together = self.provider.as_deref() == Some("together");
            self.api_key = if together {
                std::env::var("TOGETHER_API_KEY")
            } else {
                std::env::var("OPENAI_API_KEY")
            }
            .or_else(|_| std::env::var("AGENTSTREAM_API_KEY"))
            .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("AGENTSTREAM_BASE_URL"))
                .ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("AGENTSTREAM_MODEL").ok();
        }
        if self.relevance_model.is_none() {
            self.relevance_model = std::env::var("AGENTSTREAM_RELEVANCE_MODEL").ok();
        }
        if self.relevance_concurrency.is_none() {
            self.relevance_concurrency = env_parse("AGENTSTREAM_RELEVANCE_CONCURRENCY");
        }
        if self.tool_timeout.is_none() {
            self.tool_timeout =
                env_parse("AGENTSTREAM_TOOL_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("AGENTSTREAM_PROMPT_DIR")
                .ok()
                .map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the default synthesis model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the relevance-check model.
    #[must_use]
    pub fn relevance_model(mut self, model: impl Into<String>) -> Self {
        self.relevance_model = Some(model.into());
        self
    }

    /// Sets the synthesis temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets the synthesis max tokens.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Sets the relevance-check max tokens.
    #[must_use]
    pub const fn relevance_max_tokens(mut self, n: u32) -> Self {
        self.relevance_max_tokens = Some(n);
        self
    }

    /// Sets the outbound HTTP timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets how many relevance checks may run at once.
    #[must_use]
    pub const fn relevance_concurrency(mut self, n: usize) -> Self {
        self.relevance_concurrency = Some(n);
        self
    }

    /// Sets the per-tool execution budget.
    #[must_use]
    pub const fn tool_timeout(mut self, duration: Duration) -> Self {
        self.tool_timeout = Some(duration);
        self
    }

    /// Sets the previous-answer excerpt length.
    #[must_use]
    pub const fn excerpt_chars(mut self, n: usize) -> Self {
        self.excerpt_chars = Some(n);
        self
    }

    /// Sets the minimum history length for contextual synthesis.
    #[must_use]
    pub const fn context_min_history(mut self, n: usize) -> Self {
        self.context_min_history = Some(n);
        self
    }

    /// Sets how many trailing messages are scanned for artifacts.
    #[must_use]
    pub const fn context_window(mut self, n: usize) -> Self {
        self.context_window = Some(n);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the sejm-stats API base URL.
    #[must_use]
    pub fn sejm_stats_url(mut self, url: impl Into<String>) -> Self {
        self.sejm_stats_url = Some(url.into());
        self
    }

    /// Sets the `MediaWiki` API endpoint.
    #[must_use]
    pub fn wikipedia_url(mut self, url: impl Into<String>) -> Self {
        self.wikipedia_url = Some(url.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            relevance_model: self.relevance_model,
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            relevance_max_tokens: self
                .relevance_max_tokens
                .unwrap_or(DEFAULT_RELEVANCE_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            relevance_concurrency: self
                .relevance_concurrency
                .unwrap_or(DEFAULT_RELEVANCE_CONCURRENCY)
                .max(1),
            tool_timeout: self
                .tool_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS)),
            excerpt_chars: self.excerpt_chars.unwrap_or(DEFAULT_EXCERPT_CHARS),
            context_min_history: self
                .context_min_history
                .unwrap_or(DEFAULT_CONTEXT_MIN_HISTORY),
            context_window: self.context_window.unwrap_or(DEFAULT_CONTEXT_WINDOW),
            prompt_dir: self.prompt_dir,
            sejm_stats_url: self
                .sejm_stats_url
                .unwrap_or_else(|| DEFAULT_SEJM_STATS_URL.to_string()),
            wikipedia_url: self
                .wikipedia_url
                .unwrap_or_else(|| DEFAULT_WIKIPEDIA_URL.to_string()),
        })
    }
}
