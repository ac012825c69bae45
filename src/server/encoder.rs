//! Transport encoder: turns the orchestrator's event stream into body bytes.
//!
//! One event becomes one `data: <json>\n\n` chunk. An `Err` item becomes a
//! terminal `error` frame. Dropping the body stream cancels the turn, which
//! is how a client disconnect reaches the orchestrator.

use std::convert::Infallible;

use axum::body::Bytes;
use futures_util::{Stream, StreamExt, future};
use tokio_util::sync::CancellationToken;

use crate::agent::orchestrator::TurnEvent;
use crate::core::{ProgressEvent, WireFrame};

/// Encodes a single event for `message_id`.
///
/// Returns `None` (and logs) if the event cannot be serialized.
#[must_use]
pub fn encode_event(message_id: &str, event: &ProgressEvent) -> Option<Bytes> {
    match WireFrame::from_event(message_id, event).encode() {
        Ok(line) => Some(Bytes::from(line)),
        Err(e) => {
            tracing::warn!(error = %e, "dropping unencodable frame");
            None
        }
    }
}

/// Wraps `events` as a response body stream.
///
/// The stream stops before the next write once `cancel` fires, and cancels
/// `cancel` when dropped.
pub fn encode_stream<S>(
    message_id: String,
    events: S,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static
where
    S: Stream<Item = TurnEvent> + Send + 'static,
{
    let guard = cancel.clone().drop_guard();

    events
        .take_until(cancel.cancelled_owned())
        .filter_map(move |item| {
            let _turn = &guard;
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "turn failed mid-stream");
                    ProgressEvent::error(e.to_string())
                }
            };
            future::ready(encode_event(&message_id, &event).map(Ok))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use futures_util::stream;

    async fn collect(events: Vec<TurnEvent>, cancel: CancellationToken) -> String {
        let chunks: Vec<Result<Bytes, Infallible>> =
            encode_stream("m1".to_string(), stream::iter(events), cancel)
                .collect()
                .await;
        chunks
            .into_iter()
            .flatten()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_one_frame_per_event() {
        let body = collect(
            vec![
                Ok(ProgressEvent::status("Analyzing your question")),
                Ok(ProgressEvent::Response {
                    text_delta: "Hi".to_string(),
                    artifacts: Vec::new(),
                }),
            ],
            CancellationToken::new(),
        )
        .await;
        let frames: Vec<&str> = body.split_terminator("\n\n").collect();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.starts_with("data: ")));
        assert!(frames[0].contains(r#""type":"status""#));
        assert!(frames[1].contains(r#""content":"Hi""#));
    }

    #[tokio::test]
    async fn test_error_becomes_error_frame() {
        let body = collect(
            vec![
                Ok(ProgressEvent::status("s")),
                Err(AgentError::Stream {
                    message: "reset".to_string(),
                }),
            ],
            CancellationToken::new(),
        )
        .await;
        assert!(body.contains(r#""type":"error""#));
        assert!(body.contains("stream error: reset"));
    }

    #[tokio::test]
    async fn test_cancelled_stream_writes_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let body = collect(vec![Ok(ProgressEvent::status("s"))], cancel).await;
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_drop_cancels_turn() {
        let cancel = CancellationToken::new();
        let body = encode_stream("m".to_string(), stream::pending::<TurnEvent>(), cancel.clone());
        drop(body);
        assert!(cancel.is_cancelled());
    }
}
