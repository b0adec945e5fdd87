//! Per-room append-only message history.

use roomcast_types::Frame;

/// Ordered record of every frame published to a room.
///
/// Frames are only ever pushed to the back; nothing is removed or reordered.
/// Synchronization is the owning room's job.
#[derive(Debug, Default)]
pub struct HistoryLog {
    frames: Vec<Frame>,
    total_bytes: usize,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame and return its sequence number (0-based position).
    pub fn append(&mut self, frame: Frame) -> u64 {
        let seq = self.frames.len() as u64;
        self.total_bytes += frame.len();
        self.frames.push(frame);
        seq
    }

    /// Copy of the current contents in append order.
    pub fn snapshot(&self) -> Vec<Frame> {
        self.frames.clone()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Sum of payload sizes.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}
