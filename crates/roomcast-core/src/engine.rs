//! Connection lifecycle on top of the room registry.

use crate::{FanoutReport, RelayError, Result, Room, RoomRegistry, Subscription};
use roomcast_types::{ConnectionId, ConnectionState, Frame, RoomId};
use std::sync::Arc;
use tracing::{debug, info};

/// Default bound of each connection's outbound queue.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 1024;

/// Tunables for the relay engine.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Frames that may wait for a slow member before it is evicted.
    pub outbound_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

/// Owns the registry and hands out connections bound to rooms.
#[derive(Debug, Default)]
pub struct RelayEngine {
    registry: RoomRegistry,
    config: RelayConfig,
}

impl RelayEngine {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            registry: RoomRegistry::new(),
            config,
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Bind a new connection to `room_id`.
    ///
    /// Resolves (or creates) the room, then snapshots its history and
    /// registers the connection in one step. The returned connection is in
    /// `Replaying`: the caller writes `subscription.replay` to the transport,
    /// calls [`Connection::activate`], and from then on forwards whatever
    /// arrives on `subscription.receiver`. Frames published while the replay
    /// is being written wait in the receiver, so nothing is missed or seen
    /// twice.
    pub fn connect(&self, room_id: RoomId) -> (Connection, Subscription) {
        let id = ConnectionId::new();
        let mut connection = Connection {
            id,
            room: self.registry.resolve_or_create(&room_id),
            state: ConnectionState::Connecting,
        };

        let subscription = connection.room.join(id, self.config.outbound_buffer);
        connection.state = ConnectionState::Replaying;
        debug_assert!(ConnectionState::Connecting.can_transition_to(connection.state));

        info!(
            target: "roomcast::room",
            "User joined {}. Total users: {}",
            room_id,
            connection.room.member_count()
        );
        if !subscription.replay.is_empty() {
            info!(
                target: "roomcast::room",
                "Sending {} old updates to new user in {}",
                subscription.replay.len(),
                room_id
            );
        }

        (connection, subscription)
    }
}

/// One transport session's membership in a room.
///
/// Dropping a connection closes it, so a task that ends for any reason
/// leaves its room.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    room: Arc<Room>,
    state: ConnectionState,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn room_id(&self) -> &RoomId {
        self.room.id()
    }

    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(RelayError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Replay has been written; start handling live traffic.
    pub fn activate(&mut self) -> Result<()> {
        self.transition(ConnectionState::Active)
    }

    /// Record `frame` in the room history and fan it out to the other
    /// members.
    ///
    /// Fails with [`RelayError::NotAMember`] once the room has evicted this
    /// connection; the caller should then close it.
    pub fn publish(&self, frame: Frame) -> Result<FanoutReport> {
        if self.state != ConnectionState::Active {
            return Err(RelayError::InvalidState {
                expected: ConnectionState::Active,
                actual: self.state,
            });
        }
        let report = self.room.publish(self.id, frame)?;
        debug!(
            target: "roomcast::room",
            "Connection {} published seq {} to {} ({} recipients)",
            self.id,
            report.seq,
            self.room.id(),
            report.delivered
        );
        Ok(report)
    }

    /// Leave the room. Idempotent.
    pub fn close(&mut self) {
        if self.transition(ConnectionState::Closed).is_err() {
            return;
        }
        self.room.leave(self.id);
        info!(
            target: "roomcast::room",
            "User left {}. Remaining users: {}",
            self.room.id(),
            self.room.member_count()
        );
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
