//! Common test utilities for integration tests.

#![allow(dead_code)]

use futures::StreamExt;
use roomcast_server::{config::Config, serve, state::AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long to wait before concluding nothing more is coming.
pub const SILENCE: Duration = Duration::from_millis(200);

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Fire the shutdown signal and wait for `serve` to return.
    pub async fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), &mut self.task)
            .await
            .expect("server did not stop in time")
            .expect("server task failed");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Serve the relay on an ephemeral port.
pub async fn spawn_server(config: Config) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(AppState::new(config));
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(serve_until(listener, state.clone(), stopped));
    TestServer {
        addr,
        state,
        stop: Some(stop),
        task,
    }
}

async fn serve_until(listener: tokio::net::TcpListener, state: Arc<AppState>, stopped: oneshot::Receiver<()>) {
    serve(listener, state, async move {
        let _ = stopped.await;
    })
    .await
    .unwrap();
}

pub async fn spawn_default_server() -> TestServer {
    spawn_server(Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Config::default()
    })
    .await
}

/// Open a client connection to `path` (e.g. "/alpha").
pub async fn connect(server: &TestServer, path: &str) -> Client {
    let url = format!("ws://{}{}", server.addr, path);
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to {}: {}", path, e));
    ws
}

/// Next message, failing the test if none arrives in time.
pub async fn recv(ws: &mut Client) -> Message {
    tokio::time::timeout(RECV_TIMEOUT, ws.next())
        .await
        .expect("timed out waiting for message")
        .expect("stream ended")
        .expect("read error")
}

/// Assert no message arrives within [`SILENCE`].
pub async fn assert_silent(ws: &mut Client) {
    let next = tokio::time::timeout(SILENCE, ws.next()).await;
    assert!(next.is_err(), "expected silence, got {:?}", next);
}

/// Assert the server ends the connection (close frame, error, or EOF)
/// without sending any data first.
pub async fn assert_closed(ws: &mut Client) {
    let next = tokio::time::timeout(RECV_TIMEOUT, ws.next())
        .await
        .expect("timed out waiting for close");
    match next {
        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {}
        Some(Ok(other)) => panic!("expected close, got {:?}", other),
    }
}

/// Read until the server's close frame, skipping queued data, and return
/// its close code.
pub async fn recv_close_code(ws: &mut Client) -> CloseCode {
    loop {
        match recv(ws).await {
            Message::Close(Some(frame)) => return frame.code,
            Message::Close(None) => panic!("close frame without a code"),
            _ => {}
        }
    }
}

/// Poll until `check` holds, failing after a couple of seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
