//! Message registry mapping wire ids to concrete message types.
//!
//! Every message type that crosses the wire is registered once at startup
//! with an explicit id. The registry is then shared read-only between the
//! consumer (encoding outbound messages) and the receive task (decoding
//! inbound frames).
//!
//! Ids `0xFFFE` and `0xFFFF` are reserved for the heartbeat [`Ping`] and
//! [`Pong`] messages, which every registry contains.
//!
//! # Example
//!
//! ```
//! use tickwire::codec::MessageRegistry;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Debug, PartialEq)]
//! struct Move { x: f32, y: f32 }
//!
//! let mut registry = MessageRegistry::new();
//! registry.register::<Move>(1).unwrap();
//!
//! let (id, body) = registry.encode(&Move { x: 1.0, y: 2.0 }).unwrap();
//! assert_eq!(id, 1);
//!
//! let decoded = registry.decode(id, &body).unwrap();
//! assert_eq!(decoded.downcast_ref::<Move>(), Some(&Move { x: 1.0, y: 2.0 }));
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::MsgPackCodec;
use crate::error::{Result, TickwireError};
use crate::protocol::{build_frame_buffer, ByteBuffer};

/// Reserved id of the heartbeat request.
pub const PING_MESSAGE_ID: u16 = 0xFFFE;

/// Reserved id of the heartbeat response.
pub const PONG_MESSAGE_ID: u16 = 0xFFFF;

/// Anything that can be sent as a message body.
///
/// Implemented for every serde type; registration is what gives a type
/// its wire id.
pub trait Message: Serialize + DeserializeOwned + Send + 'static {}

impl<T> Message for T where T: Serialize + DeserializeOwned + Send + 'static {}

/// A decoded message whose concrete type is known only by its id.
pub type AnyMessage = Box<dyn Any + Send>;

type DecodeFn = fn(&[u8]) -> Result<AnyMessage>;

/// Heartbeat request sent by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {}

/// Heartbeat response expected from the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {}

struct MessageEntry {
    name: &'static str,
    decode: DecodeFn,
}

/// Two-way table between message ids and message types.
pub struct MessageRegistry {
    by_id: HashMap<u16, MessageEntry>,
    by_type: HashMap<TypeId, u16>,
}

impl MessageRegistry {
    /// Create a registry holding only the heartbeat messages.
    pub fn new() -> Self {
        let mut registry = Self {
            by_id: HashMap::new(),
            by_type: HashMap::new(),
        };
        registry.insert::<Ping>(PING_MESSAGE_ID);
        registry.insert::<Pong>(PONG_MESSAGE_ID);
        registry
    }

    /// Register a message type under `id`.
    ///
    /// # Errors
    ///
    /// Fails if the id is taken (including the reserved heartbeat ids) or
    /// the type is already registered under another id.
    pub fn register<M: Message>(&mut self, id: u16) -> Result<()> {
        if self.by_id.contains_key(&id) {
            return Err(TickwireError::DuplicateMessageId(id));
        }
        if self.by_type.contains_key(&TypeId::of::<M>()) {
            return Err(TickwireError::DuplicateMessageType(type_name::<M>()));
        }
        self.insert::<M>(id);
        Ok(())
    }

    fn insert<M: Message>(&mut self, id: u16) {
        self.by_id.insert(
            id,
            MessageEntry {
                name: type_name::<M>(),
                decode: decode_as::<M>,
            },
        );
        self.by_type.insert(TypeId::of::<M>(), id);
    }

    /// Get the id a type was registered under.
    pub fn id_of<M: 'static>(&self) -> Option<u16> {
        self.by_type.get(&TypeId::of::<M>()).copied()
    }

    /// Get the type name registered under an id.
    pub fn name_of(&self, id: u16) -> Option<&'static str> {
        self.by_id.get(&id).map(|e| e.name)
    }

    /// Check if an id is registered.
    pub fn contains(&self, id: u16) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Number of registered types, heartbeat messages included.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Always false: the heartbeat messages are always present.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Encode a message body, returning its id alongside.
    pub fn encode<M: Message>(&self, message: &M) -> Result<(u16, Vec<u8>)> {
        let id = self
            .id_of::<M>()
            .ok_or(TickwireError::UnregisteredMessage(type_name::<M>()))?;
        Ok((id, MsgPackCodec::encode(message)?))
    }

    /// Encode a message as a complete frame ready for the send queue.
    pub fn encode_frame<M: Message>(&self, message: &M) -> Result<ByteBuffer> {
        let (id, body) = self.encode(message)?;
        build_frame_buffer(id, &body)
    }

    /// Decode a frame body by id.
    ///
    /// # Errors
    ///
    /// `UnknownMessageId` if nothing is registered under `id`, or a decode
    /// error if the body does not match the registered type.
    pub fn decode(&self, id: u16, body: &[u8]) -> Result<AnyMessage> {
        let entry = self
            .by_id
            .get(&id)
            .ok_or(TickwireError::UnknownMessageId(id))?;
        (entry.decode)(body)
    }
}

impl Default for MessageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_as<M: Message>(body: &[u8]) -> Result<AnyMessage> {
    let message: M = MsgPackCodec::decode(body)?;
    Ok(Box::new(message))
}
