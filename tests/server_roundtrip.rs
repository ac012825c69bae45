//! End-to-end: axum endpoint on an ephemeral port, decoded by the client.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use agentstream::agent::{LlmProvider, PromptSet, Tool, ToolRegistry};
use agentstream::client::{ChatClient, FoldEffect, StreamDecoder, SubmitOutcome};
use agentstream::core::Message;
use agentstream::error::{ClientError, DecodeError};
use agentstream::server::{AppState, SubmitRequest, serve_on};
use common::{ScriptedProvider, StubBehavior, StubTool, config};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn start(provider: ScriptedProvider, origin: Option<&str>) -> SocketAddr {
    let mut registry = ToolRegistry::new();
    registry
        .register(StubTool::new("alpha", StubBehavior::Artifact("alpha", "found")) as Arc<dyn Tool>)
        .unwrap_or_else(|_| unreachable!());
    let state = AppState::new(
        Arc::new(provider) as Arc<dyn LlmProvider>,
        config(),
        registry,
        PromptSet::defaults(),
    )
    .with_origin(origin.map(str::to_string));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|_| unreachable!());
    let addr = listener.local_addr().unwrap_or_else(|_| unreachable!());
    tokio::spawn(serve_on(listener, state));
    addr
}

fn endpoint(addr: SocketAddr) -> String {
    format!("http://{addr}/api/chat")
}

fn question(text: &str) -> SubmitRequest {
    SubmitRequest::new(vec![Message::user(text)]).with_plugins(["alpha"])
}

#[tokio::test]
async fn test_health() {
    let addr = start(ScriptedProvider::new(), None).await;
    let response = reqwest::get(endpoint(addr))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap_or_default();
    assert_eq!(body, json!({ "status": "OK" }));
}

#[tokio::test]
async fn test_streamed_turn_folds_into_message() {
    let provider = ScriptedProvider::new()
        .relevant("alpha", "alpha search")
        .answer(&["Hello", ", ", "wörld"]);
    let addr = start(provider, None).await;
    let client = ChatClient::new(endpoint(addr)).unwrap_or_else(|_| unreachable!());

    let mut decoder = StreamDecoder::new("assistant-42");
    let mut effects = Vec::new();
    let outcome = client
        .submit(
            &question("alpha?"),
            &mut decoder,
            &CancellationToken::new(),
            |effect| effects.push(effect.clone()),
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(outcome, SubmitOutcome::Completed);

    let message = decoder.finish().unwrap_or_else(|_| unreachable!());
    assert_eq!(message.id, "assistant-42");
    assert_eq!(message.content, "Hello, wörld");
    assert_eq!(message.artifacts.len(), 1);
    assert_eq!(message.artifacts[0].search_query.as_deref(), Some("alpha search"));
    assert_eq!(message.data.len(), 1);

    assert!(effects.contains(&FoldEffect::Status("Using: alpha".to_string())));
    assert!(effects.iter().any(|e| matches!(
        e,
        FoldEffect::ToolFinished { artifacts: 1, .. }
    )));
}

#[tokio::test]
async fn test_stream_headers_echo_message_id() {
    let provider = ScriptedProvider::new().relevant("alpha", "").answer(&["x"]);
    let addr = start(provider, None).await;

    let mut body = question("alpha?");
    body.message_id = Some("fixed-id".to_string());
    let response = reqwest::Client::new()
        .post(endpoint(addr))
        .json(&body)
        .send()
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(response.status(), 200);
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    assert!(header("content-type").starts_with("text/event-stream"));
    assert_eq!(header("x-message-id"), "fixed-id");

    let text = response.text().await.unwrap_or_default();
    assert!(text.starts_with("data: {"));
    assert!(text.contains("\"id\":\"fixed-id\""));
    assert!(text.ends_with("\n\n"));
}

#[tokio::test]
async fn test_cross_origin_rejected() {
    let addr = start(ScriptedProvider::new(), Some("https://chat.example")).await;

    let response = reqwest::Client::new()
        .post(endpoint(addr))
        .header("origin", "https://evil.example")
        .json(&question("hi"))
        .send()
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(response.status(), 403);
    let body: Value = response.json().await.unwrap_or_default();
    assert_eq!(body["error"], "origin not allowed");
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let addr = start(ScriptedProvider::new(), None).await;

    let response = reqwest::Client::new()
        .post(endpoint(addr))
        .header("content-type", "application/json")
        .body("{\"messages\": 7}")
        .send()
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap_or_default();
    assert!(body["error"].as_str().unwrap_or_default().starts_with("malformed request body"));
}

#[tokio::test]
async fn test_unknown_plugin_rejected_before_streaming() {
    let addr = start(ScriptedProvider::new(), None).await;
    let client = ChatClient::new(endpoint(addr)).unwrap_or_else(|_| unreachable!());
    let request = SubmitRequest::new(vec![Message::user("q")]).with_plugins(["nope"]);

    let mut decoder = StreamDecoder::new("m");
    let result = client
        .submit(&request, &mut decoder, &CancellationToken::new(), |_| {})
        .await;

    match result {
        Err(ClientError::Status { status, message }) => {
            assert_eq!(status, 400);
            assert!(message.contains("nope"));
        }
        other => unreachable!("unexpected result {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_history_rejected_with_json_error() {
    let addr = start(ScriptedProvider::new(), None).await;
    let client = ChatClient::new(endpoint(addr)).unwrap_or_else(|_| unreachable!());
    let request = SubmitRequest::new(Vec::new());

    let mut decoder = StreamDecoder::new("m");
    let result = client
        .submit(&request, &mut decoder, &CancellationToken::new(), |_| {})
        .await;

    assert!(matches!(result, Err(ClientError::Status { status: 400, .. })));
}

#[tokio::test]
async fn test_midstream_failure_keeps_partial_content() {
    let provider = ScriptedProvider::new()
        .relevant("alpha", "")
        .answer(&["Half an "])
        .stream_error("upstream closed");
    let addr = start(provider, None).await;
    let client = ChatClient::new(endpoint(addr)).unwrap_or_else(|_| unreachable!());

    let mut decoder = StreamDecoder::new("m");
    let mut effects = Vec::new();
    let result = client
        .submit(
            &question("alpha?"),
            &mut decoder,
            &CancellationToken::new(),
            |effect| effects.push(effect.clone()),
        )
        .await;

    match result {
        Err(ClientError::Decode(DecodeError::Remote { message })) => {
            assert!(message.contains("upstream closed"));
        }
        other => unreachable!("unexpected result {other:?}"),
    }
    assert_eq!(decoder.snapshot().content, "Half an ");
    assert_eq!(decoder.snapshot().artifacts.len(), 1);

    // The last delta reaches the callback even when it shares a chunk with the error.
    assert!(effects.contains(&FoldEffect::Delta("Half an ".to_string())));
    assert!(matches!(effects.last(), Some(FoldEffect::Failed(_))));
}

#[tokio::test]
async fn test_client_cancel_stops_server_turn() {
    let provider = ScriptedProvider::new()
        .relevant("alpha", "")
        .answer(&["first"])
        .hanging();
    let released = provider.released.clone();
    let addr = start(provider, None).await;
    let client = ChatClient::new(endpoint(addr)).unwrap_or_else(|_| unreachable!());

    let cancel = CancellationToken::new();
    let on_delta = cancel.clone();
    let mut decoder = StreamDecoder::new("m");
    let mut effects = Vec::new();
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        client.submit(&question("alpha?"), &mut decoder, &cancel, |effect| {
            if matches!(effect, FoldEffect::Delta(_)) {
                on_delta.cancel();
            }
            effects.push(effect.clone());
        }),
    )
    .await
    .unwrap_or_else(|_| unreachable!());

    assert!(matches!(outcome, Ok(SubmitOutcome::Cancelled)));
    assert_eq!(decoder.snapshot().content, "first");
    assert!(!effects.iter().any(|e| matches!(e, FoldEffect::Failed(_))));

    // Dropping the response cancels the turn, which drops the synthesis stream.
    assert!(
        tokio::time::timeout(Duration::from_secs(5), released.cancelled())
            .await
            .is_ok()
    );
}
