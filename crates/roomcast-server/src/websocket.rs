//! WebSocket connection handling.
//!
//! One connection runs as two tasks: the send task writes queued room frames
//! to the socket, the receive task publishes inbound frames to the room.
//! Whichever ends first tears down the other; dropping the connection takes
//! it out of its room.

use crate::state::AppState;
use anyhow::Result;
use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket};
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use roomcast_core::Subscription;
use roomcast_types::{Frame, FrameKind, RoomId};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, trace};

type WsSink = SplitSink<WebSocket, Message>;

pub async fn handle_websocket(
    socket: WebSocket,
    state: Arc<AppState>,
    room_id: RoomId,
) -> Result<()> {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut shutdown = state.shutdown_signal();

    let (mut connection, subscription) = state.engine.connect(room_id);
    let Subscription { replay, mut receiver } = subscription;
    let connection_id = connection.id();
    let room_id = connection.room_id().clone();

    // Replay goes out before any live frame; live frames queue meanwhile.
    for frame in replay {
        if let Err(e) = send_frame(&mut ws_tx, frame).await {
            debug!(target: "roomcast::ws", "Replay to {} in {} failed: {}", connection_id, room_id, e);
            connection.close();
            return Ok(());
        }
    }
    connection.activate()?;

    let send_room = room_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = receiver.recv() => {
                    let Some(frame) = frame else {
                        // The room dropped our queue: we fell too far behind.
                        info!(target: "roomcast::ws", "Closing slow consumer {} in {}", connection_id, send_room);
                        let _ = ws_tx.send(close_message(close_code::AGAIN, "slow consumer")).await;
                        break;
                    };
                    if let Err(e) = send_frame(&mut ws_tx, frame).await {
                        debug!(
                            target: "roomcast::ws",
                            "WebSocket send failed for {} in {} (client likely disconnected): {}",
                            connection_id, send_room, e
                        );
                        break;
                    }
                }
                _ = wait_for_shutdown(&mut shutdown) => {
                    let _ = ws_tx.send(close_message(close_code::AWAY, "server shutting down")).await;
                    break;
                }
            }
        }
    });

    let recv_room = room_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_rx.next().await {
            let frame = match msg {
                Ok(Message::Text(text)) => Frame::text(Bytes::from(text)),
                Ok(Message::Binary(data)) => Frame::binary(data),
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    trace!(target: "roomcast::ws::frame", "Control frame from {}", connection_id);
                    continue;
                }
                Ok(Message::Close(_)) => {
                    // Keep polling: the next read flushes our close reply
                    // and then ends the stream.
                    debug!(target: "roomcast::ws", "{} in {} closed the connection", connection_id, recv_room);
                    continue;
                }
                Err(e) => {
                    debug!(target: "roomcast::ws", "Read error from {} in {}: {}", connection_id, recv_room, e);
                    break;
                }
            };

            trace!(
                target: "roomcast::ws::frame",
                "{} frame of {} bytes from {}",
                frame.kind(),
                frame.len(),
                connection_id
            );
            if let Err(e) = connection.publish(frame) {
                debug!(target: "roomcast::ws", "Dropping {} in {}: {}", connection_id, recv_room, e);
                break;
            }
        }
        connection
    });

    // Wait for either task to finish. The survivor is awaited after abort so
    // the connection has left its room before this returns.
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            let _ = recv_task.await;
        }
        result = &mut recv_task => {
            let evicted = result
                .as_ref()
                .is_ok_and(|connection| !connection.room().is_member(connection.id()));
            if evicted {
                // The send task drains what is queued, then sends 1013.
                let _ = send_task.await;
            } else {
                // Leaving the room closes our queue, which the send task
                // would read as an eviction; stop it first.
                send_task.abort();
                let _ = send_task.await;
            }
            drop(result);
        }
    }

    Ok(())
}

async fn send_frame(ws_tx: &mut WsSink, frame: Frame) -> Result<()> {
    ws_tx.send(into_message(frame)?).await?;
    Ok(())
}

/// Rebuild the WebSocket message a frame arrived as.
pub fn into_message(frame: Frame) -> Result<Message> {
    let message = match frame.kind() {
        FrameKind::Binary => Message::Binary(frame.into_payload()),
        FrameKind::Text => Message::Text(Utf8Bytes::try_from(frame.into_payload())?),
    };
    Ok(message)
}

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    }))
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stopping| *stopping).await.is_err() {
        // Sender gone: nobody can ask us to stop any more.
        std::future::pending::<()>().await;
    }
}
