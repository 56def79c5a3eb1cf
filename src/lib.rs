//! # tickwire
//!
//! Poll-driven TCP client transport for game loops and other single-threaded
//! event loops.
//!
//! One [`Connector`] owns one outbound TCP connection. Socket I/O runs on
//! tokio tasks; the consumer thread never blocks and only observes the
//! connection through [`Connector::poll_once`], which applies status changes
//! and dispatches a bounded number of inbound messages to registered
//! handlers.
//!
//! ## Wire format
//!
//! ```text
//! | total_length: u16 LE | message_id: u16 LE | body (total_length - 4) |
//! ```
//!
//! Bodies are MessagePack. Each message type is registered once with an
//! explicit id; ids `0xFFFE`/`0xFFFF` carry the heartbeat ping/pong.
//!
//! ## Example
//!
//! ```ignore
//! use serde::{Deserialize, Serialize};
//! use tickwire::{ConnectStatus, Connector};
//!
//! #[derive(Serialize, Deserialize, Debug)]
//! struct Move { x: f32, y: f32 }
//!
//! fn main() -> tickwire::Result<()> {
//!     let mut connector = Connector::builder().register::<Move>(1).build()?;
//!
//!     connector.on_status(ConnectStatus::Failed, |e| eprintln!("{}", e));
//!     connector.on_message(|m: &Move| println!("moved to {}, {}", m.x, m.y))?;
//!     connector.connect("127.0.0.1", 7777)?;
//!
//!     loop {
//!         connector.poll_once();
//!         // ... game frame
//!     }
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod heartbeat;
pub mod protocol;

mod connector;
mod session;
mod writer;

pub use codec::{Message, MessageRegistry, Ping, Pong};
pub use config::{ConnectorConfig, HeartbeatConfig};
pub use connector::{ConnectionState, Connector, ConnectorBuilder};
pub use error::{Result, TickwireError};
pub use handler::{ConnectStatus, HandlerId, StatusEvent};
pub use protocol::ByteBuffer;
