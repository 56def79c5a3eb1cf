//! Frame buffer for accumulating partial reads.
//!
//! Wraps a single [`ByteBuffer`] that the receive task reads the socket
//! into. After each read, complete frames are drained in a loop:
//! - fewer than 2 bytes buffered: wait
//! - `total_length` peeked but not fully buffered: wait
//! - otherwise consume header and body, yield the frame, repeat
//!
//! # Example
//!
//! ```ignore
//! use tickwire::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! // Data arrives in chunks from socket
//! let n = socket.read(buffer.recv_slice()).await?;
//! buffer.recv_advance(n);
//!
//! for frame in buffer.drain()? {
//!     println!("Got frame with message_id: {}", frame.message_id());
//! }
//! buffer.reserve_headroom();
//! ```

use bytes::Bytes;

use super::byte_buffer::{ByteBuffer, DEFAULT_BUFFER_SIZE};
use super::wire_format::{Header, HEADER_SIZE};
use super::Frame;
use crate::error::Result;

/// Free space below which the receive buffer is compacted and grown
/// before the next read.
pub const LOW_WATER_MARK: usize = 8;

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: ByteBuffer,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default 1 KB capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new frame buffer with custom initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: ByteBuffer::new(capacity),
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Copies `data` in; the socket path uses [`recv_slice`](Self::recv_slice)
    /// instead to avoid the copy.
    ///
    /// # Errors
    ///
    /// Returns error if a frame header carries an impossible length.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.write(data);
        self.drain()
    }

    /// Spare region to read the socket into.
    pub fn recv_slice(&mut self) -> &mut [u8] {
        self.buffer.writable()
    }

    /// Mark `count` bytes of [`recv_slice`](Self::recv_slice) as received.
    pub fn recv_advance(&mut self, count: usize) {
        self.buffer.advance_write(count);
    }

    /// Extract every complete frame currently buffered.
    pub fn drain(&mut self) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` if the length field is shorter than the header
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        // Peek, don't consume: the length must be fully buffered first
        let Some(total_length) = self.buffer.peek_u16_le() else {
            return Ok(None);
        };

        Header::new(total_length, 0).validate()?;

        if self.buffer.len() < total_length as usize {
            return Ok(None);
        }

        let Some(header) = Header::decode(self.buffer.readable()) else {
            return Ok(None);
        };
        self.buffer.advance_read(HEADER_SIZE);

        let body_len = header.body_len();
        let body = Bytes::copy_from_slice(&self.buffer.readable()[..body_len]);
        self.buffer.advance_read(body_len);
        self.buffer.compact_if_small();

        Ok(Some(Frame::new(header, body)))
    }

    /// Make room for the next socket read.
    ///
    /// When free space drops below [`LOW_WATER_MARK`] the live bytes are
    /// compacted, and if that is still not enough the capacity doubles.
    pub fn reserve_headroom(&mut self) {
        if self.buffer.remaining() >= LOW_WATER_MARK {
            return;
        }

        self.buffer.compact();
        if self.buffer.remaining() < LOW_WATER_MARK {
            let target = (self.buffer.capacity() * 2).max(LOW_WATER_MARK);
            self.buffer.resize(target);
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Capacity of the underlying buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Free space for the next read.
    pub fn remaining(&self) -> usize {
        self.buffer.remaining()
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        let live = self.buffer.len();
        self.buffer.advance_read(live);
        self.buffer.compact();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TickwireError;
    use crate::protocol::build_frame;

    fn make_frame_bytes(message_id: u16, body: &[u8]) -> Vec<u8> {
        build_frame(message_id, body).unwrap()
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&make_frame_bytes(1, b"hello")).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_id(), 1);
        assert_eq!(frames[0].total_length(), 9);
        assert_eq!(frames[0].body(), b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = Vec::new();
        combined.extend(make_frame_bytes(1, b"first"));
        combined.extend(make_frame_bytes(2, b"second"));
        combined.extend(make_frame_bytes(3, b"third"));

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].message_id(), 1);
        assert_eq!(frames[1].message_id(), 2);
        assert_eq!(frames[2].message_id(), 3);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_header() {
        let mut buffer = FrameBuffer::new();
        let bytes = make_frame_bytes(1, b"test");

        assert!(buffer.push(&bytes[..1]).unwrap().is_empty());
        assert!(buffer.push(&bytes[1..3]).unwrap().is_empty());

        let frames = buffer.push(&bytes[3..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].body(), b"test");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_body() {
        let mut buffer = FrameBuffer::new();
        let body = b"this is a longer body that will be fragmented";
        let bytes = make_frame_bytes(7, body);

        let partial = HEADER_SIZE + 10;
        assert!(buffer.push(&bytes[..partial]).unwrap().is_empty());
        assert_eq!(buffer.len(), partial);

        let frames = buffer.push(&bytes[partial..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].body(), body);
    }

    #[test]
    fn test_empty_body() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&make_frame_bytes(4, b"")).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].body.is_empty());
        assert_eq!(frames[0].total_length(), 4);
    }

    #[test]
    fn test_frame_larger_than_initial_capacity() {
        let mut buffer = FrameBuffer::with_capacity(64);
        let body = vec![0xAB; 4000];

        let frames = buffer.push(&make_frame_bytes(1, &body)).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].body_len(), 4000);
        assert!(frames[0].body().iter().all(|&b| b == 0xAB));
        assert_eq!(buffer.capacity(), 4096);
    }

    #[test]
    fn test_invalid_length_is_protocol_error() {
        let mut buffer = FrameBuffer::new();
        let result = buffer.push(&[2, 0, 1, 0]);

        assert!(matches!(result, Err(TickwireError::Protocol(_))));
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut buffer = FrameBuffer::new();

        let frame1 = make_frame_bytes(1, b"first");
        let frame2 = make_frame_bytes(2, b"second");

        let mut data = frame1.clone();
        data.extend_from_slice(&frame2[..5]);

        let frames = buffer.push(&data).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_id(), 1);
        assert_eq!(buffer.len(), 5);

        let frames = buffer.push(&frame2[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_id(), 2);
    }

    #[test]
    fn test_byte_at_a_time_matches_all_at_once() {
        let mut stream = Vec::new();
        for i in 0..20u16 {
            stream.extend(make_frame_bytes(i, &vec![i as u8; i as usize * 3]));
        }

        let mut whole = FrameBuffer::with_capacity(16);
        let expected: Vec<(u16, Vec<u8>)> = whole
            .push(&stream)
            .unwrap()
            .into_iter()
            .map(|f| (f.message_id(), f.body.to_vec()))
            .collect();

        let mut trickle = FrameBuffer::with_capacity(16);
        let mut actual = Vec::new();
        for byte in &stream {
            for frame in trickle.push(&[*byte]).unwrap() {
                actual.push((frame.message_id(), frame.body.to_vec()));
            }
        }

        assert_eq!(expected.len(), 20);
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_recv_slice_path() {
        let mut buffer = FrameBuffer::with_capacity(32);
        let bytes = make_frame_bytes(3, b"direct");

        buffer.recv_slice()[..bytes.len()].copy_from_slice(&bytes);
        buffer.recv_advance(bytes.len());

        let frames = buffer.drain().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].body(), b"direct");
    }

    #[test]
    fn test_reserve_headroom_grows_when_nearly_full() {
        let mut buffer = FrameBuffer::with_capacity(16);
        let bytes = make_frame_bytes(1, &[0u8; 20]);

        // 12 of 24 bytes: a partial frame that fills most of the buffer
        buffer.recv_slice()[..12].copy_from_slice(&bytes[..12]);
        buffer.recv_advance(12);
        assert!(buffer.drain().unwrap().is_empty());
        assert_eq!(buffer.remaining(), 4);

        buffer.reserve_headroom();
        assert_eq!(buffer.capacity(), 32);
        assert!(buffer.remaining() >= LOW_WATER_MARK);
        assert_eq!(buffer.len(), 12);
    }

    #[test]
    fn test_reserve_headroom_noop_with_space() {
        let mut buffer = FrameBuffer::with_capacity(64);
        buffer.reserve_headroom();
        assert_eq!(buffer.capacity(), 64);
    }

    #[test]
    fn test_clear_discards_partial_frame() {
        let mut buffer = FrameBuffer::new();
        buffer.push(&make_frame_bytes(1, b"test")[..5]).unwrap();
        assert_eq!(buffer.len(), 5);

        buffer.clear();
        assert!(buffer.is_empty());
    }
}
