//! Protocol module - byte buffer, wire format, framing, and frame types.
//!
//! This module implements the binary protocol spoken over the TCP stream:
//! - Growable byte buffer shared by the receive and send paths
//! - 4-byte header encoding/decoding
//! - Frame buffer for reassembling fragmented reads
//! - Frame struct with typed accessors

mod byte_buffer;
mod frame;
mod frame_buffer;
mod wire_format;

pub use byte_buffer::{ByteBuffer, COMPACT_THRESHOLD, DEFAULT_BUFFER_SIZE};
pub use frame::{build_frame, build_frame_buffer, Frame};
pub use frame_buffer::{FrameBuffer, LOW_WATER_MARK};
pub use wire_format::{Header, HEADER_SIZE, LENGTH_FIELD_SIZE, MAX_BODY_SIZE, MAX_FRAME_SIZE};
