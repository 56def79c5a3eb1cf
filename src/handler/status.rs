//! Connection status events surfaced to the host.

use std::fmt;

/// Key under which status handlers are registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectStatus {
    /// The connection was established.
    Succeeded,
    /// Connecting failed, or the transport failed while connected.
    Failed,
    /// The connection was closed.
    Closed,
}

/// A status change delivered to handlers registered for its [`ConnectStatus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// The connection was established.
    Succeeded,
    /// Human-readable failure detail.
    Failed(String),
    /// The connection was closed.
    Closed,
}

impl StatusEvent {
    /// The key this event is dispatched under.
    pub fn status(&self) -> ConnectStatus {
        match self {
            StatusEvent::Succeeded => ConnectStatus::Succeeded,
            StatusEvent::Failed(_) => ConnectStatus::Failed,
            StatusEvent::Closed => ConnectStatus::Closed,
        }
    }

    /// Failure detail, empty for the other events.
    pub fn detail(&self) -> &str {
        match self {
            StatusEvent::Failed(detail) => detail,
            _ => "",
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Succeeded => f.write_str("succeeded"),
            StatusEvent::Failed(detail) => write!(f, "failed: {}", detail),
            StatusEvent::Closed => f.write_str("closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_keys() {
        assert_eq!(StatusEvent::Succeeded.status(), ConnectStatus::Succeeded);
        assert_eq!(
            StatusEvent::Failed("refused".into()).status(),
            ConnectStatus::Failed
        );
        assert_eq!(StatusEvent::Closed.status(), ConnectStatus::Closed);
    }

    #[test]
    fn test_detail_only_for_failures() {
        assert_eq!(StatusEvent::Failed("refused".into()).detail(), "refused");
        assert_eq!(StatusEvent::Closed.detail(), "");
        assert_eq!(
            StatusEvent::Failed("refused".into()).to_string(),
            "failed: refused"
        );
    }
}
