//! Server configuration.

use anyhow::Result;
use roomcast_core::{DEFAULT_OUTBOUND_BUFFER, RelayConfig};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest inbound message in bytes; bigger ones close the connection.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Largest single WebSocket frame. Defaults to `max_message_size`.
    #[serde(default)]
    pub max_frame_size: Option<usize>,
    /// Per-connection outbound queue length before a member counts as a
    /// slow consumer.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1234
}

fn default_max_message_size() -> usize {
    16 * 1024 * 1024
}

fn default_outbound_buffer() -> usize {
    DEFAULT_OUTBOUND_BUFFER
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_message_size: default_max_message_size(),
            max_frame_size: None,
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from default location (config/default.toml) or fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from("config/default.toml");
        if config_path.exists() {
            return Self::load_from(&config_path);
        }

        Ok(Config::default())
    }

    pub fn frame_size_limit(&self) -> usize {
        self.max_frame_size.unwrap_or(self.max_message_size)
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            outbound_buffer: self.outbound_buffer,
        }
    }
}
