//! HTTP client for the submission endpoint.

use futures_util::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::decoder::StreamDecoder;
use super::fold::FoldEffect;
use crate::error::ClientError;
use crate::server::SubmitRequest;

/// How a submission ended. The decoder holds the message either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The server closed the stream.
    Completed,
    /// The caller cancelled; the response was dropped mid-read.
    Cancelled,
}

/// Posts turns and streams the answer into a decoder.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ChatClient {
    /// Creates a client for the full endpoint URL, e.g.
    /// `http://127.0.0.1:3000/api/chat`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("agentstream/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    /// Submits `request` and folds the response into `decoder`.
    ///
    /// The request's `messageId` is set to the decoder's id. `on_effect` sees
    /// every folded frame as it arrives, an `error` frame included. Call
    /// [`StreamDecoder::finish`] afterwards to flush the residual line.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Status`] for a non-2xx response
    /// - [`ClientError::Http`] if the connection fails
    /// - [`ClientError::Decode`] for a server-reported error; the decoder
    ///   keeps the partial content
    pub async fn submit<F>(
        &self,
        request: &SubmitRequest,
        decoder: &mut StreamDecoder,
        cancel: &CancellationToken,
        mut on_effect: F,
    ) -> Result<SubmitOutcome, ClientError>
    where
        F: FnMut(&FoldEffect) + Send,
    {
        let mut body = request.clone();
        body.message_id = Some(decoder.message_id().to_string());

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(SubmitOutcome::Cancelled),
            response = self.http.post(&self.endpoint).json(&body).send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: error_message(text),
            });
        }

        let mut chunks = response.bytes_stream();
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(message_id = %decoder.message_id(), "submission cancelled");
                    return Ok(SubmitOutcome::Cancelled);
                }
                next = chunks.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            for effect in decoder.feed(&chunk?)? {
                on_effect(&effect);
            }
            decoder.ensure_live()?;
        }
        Ok(SubmitOutcome::Completed)
    }
}

/// Extracts `{"error": "..."}` from an error body, else returns it whole.
fn error_message(body: String) -> String {
    serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body)
}
