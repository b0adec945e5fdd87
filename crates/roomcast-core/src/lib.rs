//! Room registry, history log, and ordered fan-out for the roomcast relay.

mod engine;
mod error;
mod history;
mod registry;
mod room;

pub use engine::{Connection, DEFAULT_OUTBOUND_BUFFER, RelayConfig, RelayEngine};
pub use error::RelayError;
pub use history::HistoryLog;
pub use registry::RoomRegistry;
pub use room::{FanoutReport, Room, RoomStats, Subscription};

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
