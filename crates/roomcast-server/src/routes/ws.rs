//! WebSocket route handler.

use crate::state::AppState;
use crate::websocket::handle_websocket;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    http::Uri,
    response::Response,
};
use roomcast_types::RoomId;
use std::sync::Arc;

pub async fn upgrade(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    ws: WebSocketUpgrade,
) -> Response {
    let room_id = room_id_from_uri(&uri);
    let on_failed_room = room_id.clone();
    // Held until the session ends, including the gap between the 101
    // response and the upgrade callback.
    let token = state.connections().token();

    ws.max_message_size(state.config.max_message_size)
        .max_frame_size(state.config.frame_size_limit())
        .on_failed_upgrade(move |e| {
            tracing::warn!(target: "roomcast::ws", "WebSocket upgrade failed for room {}: {}", on_failed_room, e);
        })
        .on_upgrade(move |socket| async move {
            handle_connection(socket, state, room_id).await;
            drop(token);
        })
}

/// The room key is the request target exactly as sent, query string included.
pub fn room_id_from_uri(uri: &Uri) -> RoomId {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    RoomId::from(target)
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>, room_id: RoomId) {
    let room = room_id.clone();
    if let Err(e) = handle_websocket(socket, state, room_id).await {
        tracing::error!(target: "roomcast::ws", "WebSocket error in room {}: {}", room, e);
    }
}
