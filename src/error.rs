//! Error types for agentstream.
//!
//! Each layer gets its own `thiserror` enum: [`AgentError`] for the
//! orchestration pipeline and providers, [`DecodeError`] for client-side
//! stream folding, [`ClientError`] for HTTP submission and
//! [`CommandError`] for the CLI. [`Error`] wraps them all.

use thiserror::Error;

/// Result alias using the crate-wide [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Agent pipeline error.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Stream decoding error.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// HTTP client error.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// CLI command error.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by providers, tools and the orchestrator.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key configured for the provider.
    #[error("API key missing: set OPENAI_API_KEY, TOGETHER_API_KEY or AGENTSTREAM_API_KEY")]
    ApiKeyMissing,

    /// Provider name not recognized by the factory.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Requested provider name.
        name: String,
    },

    /// Upstream API request failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error description.
        message: String,
        /// HTTP status reported by the provider, when known.
        status: Option<u16>,
    },

    /// Upstream stream broke mid-response.
    #[error("stream error: {message}")]
    Stream {
        /// Error description.
        message: String,
    },

    /// Upstream response could not be parsed.
    #[error("failed to parse response: {message}")]
    ResponseParse {
        /// Parse failure description.
        message: String,
        /// Raw content that failed to parse.
        content: String,
    },

    /// Submitted turn is malformed.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the request.
        message: String,
    },

    /// Requested plugin id is not registered.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// Requested plugin id.
        name: String,
    },

    /// Tool invocation failed.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Tool name.
        name: String,
        /// Failure description.
        message: String,
    },

    /// Pipeline failure not covered by another variant.
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Error description.
        message: String,
    },
}

impl AgentError {
    /// HTTP status used when this error is reported before any frame.
    ///
    /// Validation failures map to 400, upstream parse failures to 422,
    /// upstream request failures to the provider's status when it is a
    /// valid error status, everything else to 500.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest { .. }
            | Self::UnknownTool { .. }
            | Self::UnsupportedProvider { .. } => 400,
            Self::ResponseParse { .. } => 422,
            Self::ApiRequest {
                status: Some(status),
                ..
            } if (400..=599).contains(status) => *status,
            _ => 500,
        }
    }
}

/// Errors raised while folding a frame stream on the client.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The server sent a terminal error frame.
    #[error("server reported an error: {message}")]
    Remote {
        /// Error text carried by the frame.
        message: String,
    },

    /// A decoder is already bound to this message id.
    #[error("a decoder is already bound to message {message_id}")]
    AlreadyBound {
        /// Contested message id.
        message_id: String,
    },
}

/// Errors raised by the HTTP chat client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server rejected the submission before streaming.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message from the JSON body, or the raw body.
        message: String,
    },

    /// Stream folding failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// CLI command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command failed to execute.
    #[error("command failed: {0}")]
    ExecutionFailed(String),

    /// Output could not be formatted.
    #[error("output format error: {0}")]
    OutputFormat(String),
}
