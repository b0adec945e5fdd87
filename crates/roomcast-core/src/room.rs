//! A room: live members plus their shared history.
//!
//! All mutation goes through one short critical section per room. Appending to
//! the history and queueing the frame to every other member happen under the
//! same lock, which gives each room a single total order and makes a join's
//! snapshot line up exactly with the first frame it will receive live.

use crate::{HistoryLog, RelayError, Result};
use roomcast_types::{ConnectionId, Frame, RoomId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Everything a newly joined member needs: the history as of joining, then
/// every frame published afterwards.
#[derive(Debug)]
pub struct Subscription {
    pub replay: Vec<Frame>,
    pub receiver: mpsc::Receiver<Frame>,
}

/// Outcome of one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    /// Position of the frame in the room history
    pub seq: u64,
    /// Members the frame was queued to
    pub delivered: usize,
    /// Members dropped because their queue was full or already closed
    pub evicted: Vec<ConnectionId>,
}

/// Point-in-time counters for a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStats {
    pub members: usize,
    pub history_len: usize,
    pub history_bytes: usize,
}

#[derive(Debug, Default)]
struct RoomState {
    members: HashMap<ConnectionId, mpsc::Sender<Frame>>,
    history: HistoryLog,
}

#[derive(Debug)]
pub struct Room {
    id: RoomId,
    state: Mutex<RoomState>,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            state: Mutex::new(RoomState::default()),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    // The critical sections never panic midway, so a poisoned lock still
    // guards consistent state.
    fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `connection` and take the history snapshot atomically.
    ///
    /// `capacity` bounds the member's outbound queue (minimum 1).
    pub fn join(&self, connection: ConnectionId, capacity: usize) -> Subscription {
        let (tx, receiver) = mpsc::channel(capacity.max(1));
        let mut state = self.lock();
        let replay = state.history.snapshot();
        state.members.insert(connection, tx);
        debug!(
            target: "roomcast::room",
            "Connection {} joined room {} ({} members, {} frames to replay)",
            connection,
            self.id,
            state.members.len(),
            replay.len()
        );
        Subscription { replay, receiver }
    }

    /// Append `frame` to the history and queue it to every member except
    /// `from`.
    ///
    /// Never waits on a recipient: a member whose queue is full or closed is
    /// removed from the room, which closes its receiver once drained.
    pub fn publish(&self, from: ConnectionId, frame: Frame) -> Result<FanoutReport> {
        let mut state = self.lock();
        if !state.members.contains_key(&from) {
            return Err(RelayError::NotAMember {
                connection: from,
                room: self.id.clone(),
            });
        }

        let seq = state.history.append(frame.clone());

        let mut delivered = 0;
        let mut evicted = Vec::new();
        for (id, tx) in state.members.iter() {
            if *id == from {
                continue;
            }
            match tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        target: "roomcast::room",
                        "Evicting slow consumer {} from room {}: outbound queue full",
                        id, self.id
                    );
                    evicted.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(
                        target: "roomcast::room",
                        "Dropping closed member {} from room {}",
                        id, self.id
                    );
                    evicted.push(*id);
                }
            }
        }
        for id in &evicted {
            state.members.remove(id);
        }

        Ok(FanoutReport {
            seq,
            delivered,
            evicted,
        })
    }

    /// Remove `connection` from the live set. History is untouched.
    ///
    /// Returns false if it was not a member (already left or evicted).
    pub fn leave(&self, connection: ConnectionId) -> bool {
        let mut state = self.lock();
        state.members.remove(&connection).is_some()
    }

    pub fn is_member(&self, connection: ConnectionId) -> bool {
        self.lock().members.contains_key(&connection)
    }

    pub fn member_count(&self) -> usize {
        self.lock().members.len()
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn stats(&self) -> RoomStats {
        let state = self.lock();
        RoomStats {
            members: state.members.len(),
            history_len: state.history.len(),
            history_bytes: state.history.total_bytes(),
        }
    }
}
