//! `/api/chat` handlers.

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::{StreamExt, stream};
use serde_json::json;

use super::AppState;
use super::encoder::encode_stream;
use super::params::SubmitRequest;
use crate::agent::orchestrator::spawn_turn;
use crate::error::AgentError;

/// Header carrying the assistant message id of a streamed turn.
pub const MESSAGE_ID_HEADER: &str = "x-message-id";

/// Error returned before streaming starts, rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        let status =
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// `GET /api/chat`: liveness check.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}

/// `POST /api/chat`: runs one turn and streams its frames.
///
/// # Errors
///
/// - 403 when the `Origin` header does not match the serving origin
/// - 400 for a malformed body, an unknown plugin or an invalid history
/// - the provider's status (else 500) when the turn fails before its first
///   frame
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    check_origin(&headers, state.serving_origin.as_deref())?;

    let request: SubmitRequest = serde_json::from_slice(&body).map_err(|e| {
        ApiError::new(StatusCode::BAD_REQUEST, format!("malformed request body: {e}"))
    })?;
    let orchestrator = state.orchestrator(&request.enabled_plugin_ids)?;
    let message_id = request.resolve_message_id();

    let cancel = state.shutdown.child_token();
    let span = tracing::info_span!("turn", message_id = %message_id);
    let mut events = span.in_scope(|| {
        tracing::info!(
            plugins = ?request.enabled_plugin_ids,
            history = request.messages.len(),
            "turn submitted"
        );
        spawn_turn(orchestrator, request.into_turn(), cancel.clone())
    });

    // The first item decides between a JSON error and a stream.
    let first = match events.next().await {
        Some(Err(e)) => return Err(e.into()),
        first => first,
    };
    let events = stream::iter(first).chain(events);

    let mut response =
        Body::from_stream(encode_stream(message_id.clone(), events, cancel)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream; charset=utf-8"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-transform"),
    );
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    if let Ok(value) = HeaderValue::from_str(&message_id) {
        headers.insert(MESSAGE_ID_HEADER, value);
    }
    Ok(response)
}

/// Same-origin check against the configured origin, or the `Host` header.
///
/// Requests without an `Origin` header are not browser cross-origin
/// requests and pass.
fn check_origin(headers: &HeaderMap, serving_origin: Option<&str>) -> Result<(), ApiError> {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return Ok(());
    };
    let origin = origin.to_str().unwrap_or_default().trim_end_matches('/');

    let allowed = match serving_origin {
        Some(expected) => origin.eq_ignore_ascii_case(expected.trim_end_matches('/')),
        None => {
            let host = headers
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .unwrap_or_default();
            let origin_host = origin
                .split_once("://")
                .map_or(origin, |(_, rest)| rest);
            !host.is_empty() && origin_host.eq_ignore_ascii_case(host)
        }
    };

    if allowed {
        Ok(())
    } else {
        tracing::warn!(origin, "rejected cross-origin submission");
        Err(ApiError::new(StatusCode::FORBIDDEN, "origin not allowed"))
    }
}
