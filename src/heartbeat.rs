//! Heartbeat liveness tracking.
//!
//! Driven from the consumer's poll with the host's clock, never from the
//! I/O tasks. A silently dead peer is only ever detected here: TCP itself
//! may keep a half-open connection around indefinitely.

use std::time::Instant;

use crate::config::HeartbeatConfig;

/// What the connector should do after a liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Nothing due.
    Idle,
    /// The ping interval elapsed; send a `Ping`.
    SendPing,
    /// Nothing was received within the timeout; force-close.
    TimedOut,
}

/// Ping scheduling and inbound-silence detection.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    config: HeartbeatConfig,
    last_ping: Instant,
    last_inbound: Instant,
}

impl Heartbeat {
    /// Start tracking at `now`.
    pub fn new(config: HeartbeatConfig, now: Instant) -> Self {
        Self {
            config,
            last_ping: now,
            last_inbound: now,
        }
    }

    /// Restart both timers, e.g. when a connection is established.
    pub fn reset(&mut self, now: Instant) {
        self.last_ping = now;
        self.last_inbound = now;
    }

    /// Note inbound traffic at `now`.
    pub fn record_inbound(&mut self, now: Instant) {
        if now > self.last_inbound {
            self.last_inbound = now;
        }
    }

    /// Check the timers. A returned `SendPing` counts as sent.
    pub fn check(&mut self, now: Instant) -> HeartbeatAction {
        if !self.config.enabled {
            return HeartbeatAction::Idle;
        }

        if now.saturating_duration_since(self.last_inbound) > self.config.timeout {
            return HeartbeatAction::TimedOut;
        }

        if now.saturating_duration_since(self.last_ping) > self.config.interval {
            self.last_ping = now;
            return HeartbeatAction::SendPing;
        }

        HeartbeatAction::Idle
    }

    /// When the last inbound traffic was recorded.
    pub fn last_inbound(&self) -> Instant {
        self.last_inbound
    }

    /// When the last ping was due.
    pub fn last_ping(&self) -> Instant {
        self.last_ping
    }
}
