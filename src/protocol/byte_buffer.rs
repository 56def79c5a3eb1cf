//! Growable byte buffer with separate read and write cursors.
//!
//! A single `ByteBuffer` is reused for the whole receive stream, and every
//! outbound frame is wrapped in one while it waits in the send queue.
//!
//! ```text
//! 0            read_index          write_index          capacity
//! |  consumed  |       live        |      remaining     |
//! ```
//!
//! Invariants:
//! - `read_index <= write_index <= capacity`
//! - capacity only grows, always to a power of two, never below the size
//!   the buffer was created with
//!
//! # Example
//!
//! ```
//! use tickwire::protocol::ByteBuffer;
//!
//! let mut buffer = ByteBuffer::new(16);
//! buffer.write(&[0x34, 0x12, 0xFF]);
//!
//! assert_eq!(buffer.read_u16_le(), Some(0x1234));
//! assert_eq!(buffer.len(), 1);
//! assert_eq!(buffer.read_u16_le(), None);
//! ```

use std::fmt;

/// Default capacity for a new buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Below this many live bytes a read compacts the buffer.
pub const COMPACT_THRESHOLD: usize = 8;

/// Reusable read/write byte region.
#[derive(Clone)]
pub struct ByteBuffer {
    /// Backing storage; its length is the capacity.
    data: Vec<u8>,
    /// Next byte to read.
    read_index: usize,
    /// Next byte to write.
    write_index: usize,
    /// Capacity fixed at construction; resize never goes below it.
    init_size: usize,
}

impl ByteBuffer {
    /// Create an empty buffer with the given capacity.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            read_index: 0,
            write_index: 0,
            init_size: size,
        }
    }

    /// Wrap an existing byte vector. The whole vector is readable.
    ///
    /// Used for outbound frames: the writer drains the buffer by advancing
    /// its read cursor as bytes reach the socket.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self {
            data: bytes,
            read_index: 0,
            write_index: len,
            init_size: len,
        }
    }

    /// Number of live bytes between the cursors.
    #[inline]
    pub fn len(&self) -> usize {
        self.write_index - self.read_index
    }

    /// Check if there are no live bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.write_index == self.read_index
    }

    /// Free space after the write cursor.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.write_index
    }

    /// Current size of the backing region.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Position of the read cursor.
    #[inline]
    pub fn read_index(&self) -> usize {
        self.read_index
    }

    /// Position of the write cursor.
    #[inline]
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// The live bytes.
    #[inline]
    pub fn readable(&self) -> &[u8] {
        &self.data[self.read_index..self.write_index]
    }

    /// The spare region after the write cursor, for reading a socket into.
    #[inline]
    pub fn writable(&mut self) -> &mut [u8] {
        &mut self.data[self.write_index..]
    }

    /// Mark `count` bytes of the spare region as written.
    ///
    /// Clamped to the remaining space.
    #[inline]
    pub fn advance_write(&mut self, count: usize) {
        debug_assert!(count <= self.remaining());
        self.write_index += count.min(self.remaining());
    }

    /// Consume `count` live bytes without copying them out.
    ///
    /// Clamped to the live length. Does not compact.
    #[inline]
    pub fn advance_read(&mut self, count: usize) {
        debug_assert!(count <= self.len());
        self.read_index += count.min(self.len());
    }

    /// Append bytes, growing the buffer if they do not fit.
    ///
    /// Always writes everything and returns `bytes.len()`.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let count = bytes.len();
        if self.remaining() < count {
            let needed = self.len() + count;
            if needed <= self.capacity() {
                self.compact();
            } else {
                self.resize(needed);
            }
        }

        self.data[self.write_index..self.write_index + count].copy_from_slice(bytes);
        self.write_index += count;
        count
    }

    /// Copy up to `out.len()` live bytes into `out` and consume them.
    ///
    /// Returns the number of bytes copied, never more than [`len`](Self::len).
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.len());
        out[..count].copy_from_slice(&self.data[self.read_index..self.read_index + count]);
        self.read_index += count;
        self.compact_if_small();
        count
    }

    /// Grow the backing region to the smallest power of two >= `target`.
    ///
    /// No-op when `target` is below the live length or below the size the
    /// buffer was created with. Capacity never shrinks: if the power of two
    /// fits in the current region the live bytes are compacted in place.
    pub fn resize(&mut self, target: usize) {
        if target < self.len() || target < self.init_size {
            return;
        }

        let new_size = target.next_power_of_two();
        if new_size <= self.capacity() {
            self.compact();
            return;
        }

        let len = self.len();
        let mut data = vec![0; new_size];
        data[..len].copy_from_slice(self.readable());
        self.data = data;
        self.read_index = 0;
        self.write_index = len;
    }

    /// Compact when fewer than [`COMPACT_THRESHOLD`] live bytes remain.
    #[inline]
    pub fn compact_if_small(&mut self) {
        if self.len() < COMPACT_THRESHOLD {
            self.compact();
        }
    }

    /// Move the live bytes to offset 0 and reset the cursors.
    pub fn compact(&mut self) {
        let len = self.len();
        if len > 0 && self.read_index > 0 {
            self.data.copy_within(self.read_index..self.write_index, 0);
        }
        // write cursor comes from the pre-shift length
        self.write_index = len;
        self.read_index = 0;
    }

    /// Peek a little-endian `u16` at the read cursor without consuming it.
    #[inline]
    pub fn peek_u16_le(&self) -> Option<u16> {
        let live = self.readable();
        if live.len() < 2 {
            return None;
        }
        Some(u16::from_le_bytes([live[0], live[1]]))
    }

    /// Read a little-endian `u16`.
    ///
    /// Returns `None` and leaves the cursor untouched if fewer than 2 bytes
    /// are buffered.
    pub fn read_u16_le(&mut self) -> Option<u16> {
        let value = self.peek_u16_le()?;
        self.read_index += 2;
        self.compact_if_small();
        Some(value)
    }

    /// Read a little-endian `u32`.
    ///
    /// Returns `None` and leaves the cursor untouched if fewer than 4 bytes
    /// are buffered.
    pub fn read_u32_le(&mut self) -> Option<u32> {
        let live = self.readable();
        if live.len() < 4 {
            return None;
        }
        let value = u32::from_le_bytes([live[0], live[1], live[2], live[3]]);
        self.read_index += 4;
        self.compact_if_small();
        Some(value)
    }

    /// Cursor positions plus the whole backing region, for debugging.
    pub fn dump(&self) -> String {
        format!(
            "readIdx({}) writeIdx({}) bytes({})",
            self.read_index,
            self.write_index,
            hex(&self.data)
        )
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

/// Live bytes as dash-separated hex, e.g. `01-AB-FF`.
impl fmt::Display for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex(self.readable()))
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("read_index", &self.read_index)
            .field("write_index", &self.write_index)
            .field("capacity", &self.capacity())
            .finish()
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join("-")
}
