//! HTTP listener with graceful shutdown.

use tokio::net::TcpListener;

use super::{AppState, router};

/// Serves the chat endpoint on `host:port` until Ctrl-C.
///
/// Shutdown cancels every in-flight turn, so open streams close promptly.
///
/// # Errors
///
/// Returns an error if the server fails to bind or encounters a runtime error.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    serve_on(listener, state).await
}

/// Serves the chat endpoint on an already bound listener until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the server encounters a runtime error.
pub async fn serve_on(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let local = listener.local_addr()?;
    let tools: Vec<String> = state
        .registry
        .descriptors()
        .into_iter()
        .map(|d| d.name)
        .collect();
    tracing::info!(
        origin = ?state.serving_origin,
        ?tools,
        "agentstream listening on http://{local}/api/chat"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
