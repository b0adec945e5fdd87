//! Roomcast server library - WebSocket relay for collaborative rooms.
//!
//! Every request target is a room: clients that connect to the same path see
//! each other's frames in order, and late joiners get the full history first.
//! Separated from main.rs so integration tests can serve the same router.

pub mod config;
pub mod logging;
pub mod routes;
pub mod state;
pub mod websocket;

use axum::Router;
use state::AppState;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// How long shutdown waits for live sessions to send their close frames.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Build the application router. There are no fixed routes; every path is
/// handed to the WebSocket upgrade handler as a room id.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(routes::ws::upgrade)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the relay on `listener` until `signal` resolves.
///
/// On the signal the listener stops accepting, every live session is told to
/// close with 1001, and this returns once all of them have left their rooms
/// (or [`SHUTDOWN_GRACE`] runs out).
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    signal: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(state.clone());
    let stopping = state.clone();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            tracing::info!(target: "roomcast::startup", "Received shutdown signal, closing connections...");
            stopping.begin_shutdown();
        })
        .await?;

    let connections = state.connections();
    connections.close();
    tracing::info!(
        target: "roomcast::startup",
        "Waiting for {} connections to close",
        connections.len()
    );
    if tokio::time::timeout(SHUTDOWN_GRACE, connections.wait()).await.is_err() {
        tracing::warn!(
            target: "roomcast::startup",
            "{} connections still open after {:?}",
            connections.len(),
            SHUTDOWN_GRACE
        );
    }
    Ok(())
}
