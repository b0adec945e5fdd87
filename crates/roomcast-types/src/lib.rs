//! Shared types for the roomcast relay.

mod connection;
mod frame;
mod room;

pub use connection::*;
pub use frame::*;
pub use room::*;
