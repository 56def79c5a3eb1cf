//! Wire format encoding and decoding.
//!
//! Implements the 4-byte frame header:
//! ```text
//! ┌──────────────┬────────────┬──────────────────────┐
//! │ Total length │ Message ID │ Body                 │
//! │ 2 bytes      │ 2 bytes    │ total_length - 4     │
//! │ uint16 LE    │ uint16 LE  │                      │
//! └──────────────┴────────────┴──────────────────────┘
//! ```
//!
//! `total_length` counts the whole frame, header included.
//! All multi-byte integers are Little Endian.

use crate::error::{Result, TickwireError};

/// Header size in bytes (length field + message id).
pub const HEADER_SIZE: usize = 4;

/// Size of the leading length field.
pub const LENGTH_FIELD_SIZE: usize = 2;

/// Largest frame the 16-bit length field can describe.
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

/// Largest body that fits in a single frame.
pub const MAX_BODY_SIZE: usize = MAX_FRAME_SIZE - HEADER_SIZE;

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Whole frame length, including these 4 bytes.
    pub total_length: u16,
    /// Message identifier from the registry.
    pub message_id: u16,
}

impl Header {
    /// Create a new header.
    pub fn new(total_length: u16, message_id: u16) -> Self {
        Self {
            total_length,
            message_id,
        }
    }

    /// Create the header for a body of `body_len` bytes.
    ///
    /// Fails if the frame would not fit the 16-bit length field.
    pub fn for_body(message_id: u16, body_len: usize) -> Result<Self> {
        let size = HEADER_SIZE + body_len;
        if size > MAX_FRAME_SIZE {
            return Err(TickwireError::FrameTooLarge {
                size,
                max: MAX_FRAME_SIZE,
            });
        }
        Ok(Self::new(size as u16, message_id))
    }

    /// Body length implied by `total_length`.
    #[inline]
    pub fn body_len(&self) -> usize {
        (self.total_length as usize).saturating_sub(HEADER_SIZE)
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use tickwire::protocol::Header;
    ///
    /// let bytes = Header::new(9, 0x0102).encode();
    /// assert_eq!(bytes, [9, 0, 0x02, 0x01]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (4 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..2].copy_from_slice(&self.total_length.to_le_bytes());
        buf[2..4].copy_from_slice(&self.message_id.to_le_bytes());
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            total_length: u16::from_le_bytes([buf[0], buf[1]]),
            message_id: u16::from_le_bytes([buf[2], buf[3]]),
        })
    }

    /// Validate the header.
    ///
    /// A `total_length` smaller than the header itself makes frame
    /// boundaries undeterminable.
    pub fn validate(&self) -> Result<()> {
        if (self.total_length as usize) < HEADER_SIZE {
            return Err(TickwireError::Protocol(format!(
                "Frame length {} is shorter than the {}-byte header",
                self.total_length, HEADER_SIZE
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let original = Header::new(42, 7);
        let decoded = Header::decode(&original.encode()).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_header_little_endian_byte_order() {
        let bytes = Header::new(0x0102, 0x0304).encode();
        assert_eq!(bytes, [0x02, 0x01, 0x04, 0x03]);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        assert!(Header::decode(&[0u8; 3]).is_none());
    }

    #[test]
    fn test_for_body_counts_header() {
        let header = Header::for_body(1, 10).unwrap();
        assert_eq!(header.total_length, 14);
        assert_eq!(header.body_len(), 10);
    }

    #[test]
    fn test_for_body_rejects_oversized() {
        assert!(Header::for_body(1, MAX_BODY_SIZE).is_ok());

        let result = Header::for_body(1, MAX_BODY_SIZE + 1);
        assert!(matches!(
            result,
            Err(TickwireError::FrameTooLarge { size, .. }) if size == MAX_FRAME_SIZE + 1
        ));
    }

    #[test]
    fn test_validate_short_length_rejected() {
        for len in 0..HEADER_SIZE as u16 {
            let result = Header::new(len, 1).validate();
            assert!(result.is_err());
            assert!(result.unwrap_err().to_string().contains("shorter than"));
        }
        assert!(Header::new(4, 1).validate().is_ok());
    }
}
