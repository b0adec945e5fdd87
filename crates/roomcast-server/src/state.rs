//! Shared application state.

use crate::config::Config;
use roomcast_core::RelayEngine;
use tokio::sync::watch;
use tokio_util::task::TaskTracker;

/// Shared application state.
pub struct AppState {
    pub engine: RelayEngine,
    pub config: Config,
    shutdown: watch::Sender<bool>,
    connections: TaskTracker,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            engine: RelayEngine::new(config.relay_config()),
            config,
            shutdown,
            connections: TaskTracker::new(),
        }
    }

    /// Receiver that flips to `true` once shutdown has begun.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Tell every live connection to close.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Upgraded WebSocket sessions. The HTTP server stops tracking a
    /// connection once it upgrades, so shutdown waits on this instead.
    pub fn connections(&self) -> &TaskTracker {
        &self.connections
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}
