//! Error types for the relay core.

use roomcast_types::{ConnectionId, ConnectionState, RoomId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Invalid connection state: expected {expected}, got {actual}")]
    InvalidState {
        expected: ConnectionState,
        actual: ConnectionState,
    },

    #[error("Illegal connection transition: {from} -> {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    #[error("Connection {connection} is not a member of room {room}")]
    NotAMember {
        connection: ConnectionId,
        room: RoomId,
    },
}
