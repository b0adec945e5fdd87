//! Process-wide room registry.

use crate::Room;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use roomcast_types::RoomId;
use std::sync::Arc;
use tracing::info;

/// Maps room ids to rooms. Rooms are created on first use and live until the
/// process exits; there is no removal.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Arc<Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the room for `id`, creating an empty one if this is the first
    /// time the id is seen. Concurrent first callers all get the same room.
    pub fn resolve_or_create(&self, id: &RoomId) -> Arc<Room> {
        if let Some(room) = self.rooms.get(id) {
            return Arc::clone(room.value());
        }

        match self.rooms.entry(id.clone()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let room = Arc::new(Room::new(id.clone()));
                entry.insert(Arc::clone(&room));
                info!(target: "roomcast::registry", "Room created: {}", id);
                room
            }
        }
    }

    pub fn get(&self, id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.get(id).map(|room| Arc::clone(room.value()))
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
