//! Codec module - message body encoding and the id registry.
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (struct-as-map)
//! - [`MessageRegistry`] - explicit two-way table between wire ids and
//!   message types, with one decode function per type
//!
//! # Design
//!
//! The codec is a marker struct with static methods rather than a trait
//! object. The registry stores a plain `fn` pointer per id, monomorphized
//! at registration, so decoding never needs runtime type introspection.

mod msgpack;
mod registry;

pub use msgpack::MsgPackCodec;
pub use registry::{
    AnyMessage, Message, MessageRegistry, Ping, Pong, PING_MESSAGE_ID, PONG_MESSAGE_ID,
};
