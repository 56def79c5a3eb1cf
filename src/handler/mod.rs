//! Handler module - message and status callbacks.
//!
//! Provides:
//! - [`HandlerRegistry`] - ordered callback lists keyed by message id or status
//! - [`StatusEvent`] / [`ConnectStatus`] - connection status notifications
//!
//! Handlers run synchronously on the consumer thread, inside
//! [`Connector::poll_once`](crate::Connector::poll_once).

mod registry;
mod status;

pub use registry::{HandlerId, HandlerRegistry, MessageHandler, StatusHandler, TypedHandler};
pub use status::{ConnectStatus, StatusEvent};
