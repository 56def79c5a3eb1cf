//! Connector configuration.
//!
//! Every option has a default, so a config file only needs the fields it
//! changes:
//!
//! ```
//! use tickwire::ConnectorConfig;
//! use std::time::Duration;
//!
//! let config = ConnectorConfig::from_json(r#"{ "max_messages_per_poll": 32 }"#).unwrap();
//!
//! assert_eq!(config.max_messages_per_poll, 32);
//! assert_eq!(config.heartbeat.interval, Duration::from_secs(3));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::DEFAULT_BUFFER_SIZE;

/// Default interval between heartbeat pings.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);

/// Default silence after which the connection is considered dead.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default number of messages dispatched per poll.
pub const DEFAULT_MAX_MESSAGES_PER_POLL: usize = 10;

/// Heartbeat (liveness) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Send pings and enforce the timeout.
    pub enabled: bool,
    /// Time between pings.
    pub interval: Duration,
    /// Inbound silence after which the connection is force-closed.
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            timeout: DEFAULT_HEARTBEAT_TIMEOUT,
        }
    }
}

/// Configuration for a [`Connector`](crate::Connector).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Heartbeat settings.
    pub heartbeat: HeartbeatConfig,
    /// Initial capacity of the receive buffer in bytes.
    pub initial_buffer_size: usize,
    /// Upper bound on messages dispatched by one poll.
    pub max_messages_per_poll: usize,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            heartbeat: HeartbeatConfig::default(),
            initial_buffer_size: DEFAULT_BUFFER_SIZE,
            max_messages_per_poll: DEFAULT_MAX_MESSAGES_PER_POLL,
        }
    }
}

impl ConnectorConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
