//! Connection identity and lifecycle.

use uuid::Uuid;

/// Identity of one accepted transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a connection.
///
/// `Connecting -> Replaying -> Active -> Closed`. Any state may move straight
/// to `Closed`; nothing leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Accepted; room not yet resolved.
    Connecting,
    /// Room resolved and history snapshot taken; snapshot being written.
    Replaying,
    /// Steady state: inbound frames are published, outbound frames delivered.
    Active,
    Closed,
}

impl ConnectionState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Replaying) | (Replaying, Active) | (Connecting | Replaying | Active, Closed)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Replaying => "replaying",
            ConnectionState::Active => "active",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}
