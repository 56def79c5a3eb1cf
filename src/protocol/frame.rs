//! Frame struct with typed accessors.
//!
//! Represents one complete protocol frame: header plus body.
//! Uses `bytes::Bytes` so bodies can be handed to the decoder without
//! another copy.
//!
//! # Example
//!
//! ```
//! use tickwire::protocol::{Frame, Header};
//! use bytes::Bytes;
//!
//! let frame = Frame::new(Header::new(9, 1), Bytes::from_static(b"hello"));
//!
//! assert_eq!(frame.message_id(), 1);
//! assert_eq!(frame.body(), b"hello");
//! ```

use bytes::Bytes;

use super::byte_buffer::ByteBuffer;
use super::wire_format::{Header, HEADER_SIZE};
use crate::error::Result;

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Body bytes.
    pub body: Bytes,
}

impl Frame {
    /// Create a new frame from header and body.
    pub fn new(header: Header, body: Bytes) -> Self {
        Self { header, body }
    }

    /// Get a reference to the body bytes.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Get the body length.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Get the message ID.
    #[inline]
    pub fn message_id(&self) -> u16 {
        self.header.message_id
    }

    /// Get the total length field.
    #[inline]
    pub fn total_length(&self) -> u16 {
        self.header.total_length
    }
}

/// Build a complete frame as a single byte vector.
///
/// Fails with `FrameTooLarge` if the body does not fit the length field.
///
/// # Example
///
/// ```
/// use tickwire::protocol::build_frame;
///
/// let bytes = build_frame(1, b"hello").unwrap();
/// assert_eq!(bytes, [9, 0, 1, 0, b'h', b'e', b'l', b'l', b'o']);
/// ```
pub fn build_frame(message_id: u16, body: &[u8]) -> Result<Vec<u8>> {
    let header = Header::for_body(message_id, body.len())?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(body);
    Ok(buf)
}

/// Build a frame wrapped in a [`ByteBuffer`] ready for the send queue.
pub fn build_frame_buffer(message_id: u16, body: &[u8]) -> Result<ByteBuffer> {
    build_frame(message_id, body).map(ByteBuffer::from_vec)
}
