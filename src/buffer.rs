//! A FIFO byte buffer with a hard capacity.
//!
//! Used by the streaming APDU decoder so a malicious or malfunctioning peer
//! cannot force unbounded memory growth by dribbling bytes without ever
//! completing a frame.

use bytes::{Buf, BytesMut};

use crate::error::{Iec104Error, Result};

/// A capacity-bounded FIFO byte buffer.
#[derive(Debug)]
pub struct BoundedBuffer {
    data: BytesMut,
    capacity: usize,
}

impl BoundedBuffer {
    /// Create an empty buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: BytesMut::new(),
            capacity,
        }
    }

    /// Total capacity in octets.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of octets currently buffered.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append bytes to the buffer.
    ///
    /// Fails before enqueueing any of `bytes` if doing so would exceed
    /// capacity; the buffer's existing contents are left untouched.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if self.data.len() + bytes.len() > self.capacity {
            return Err(Iec104Error::length(format!(
                "bounded buffer capacity {} exceeded by append of {} bytes ({} buffered)",
                self.capacity,
                bytes.len(),
                self.data.len()
            )));
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Peek at the first `size` bytes without consuming them.
    ///
    /// Returns `None` if fewer than `size` bytes are buffered.
    pub fn peek(&self, size: usize) -> Option<&[u8]> {
        if self.data.len() < size {
            return None;
        }
        Some(&self.data[..size])
    }

    /// Remove and return the first `size` bytes.
    ///
    /// Panics if fewer than `size` bytes are buffered; callers must check
    /// via [`BoundedBuffer::len`] first.
    pub fn consume(&mut self, size: usize) -> BytesMut {
        assert!(size <= self.data.len(), "consume beyond buffered length");
        let out = self.data.split_to(size);
        self.data.advance(0);
        out
    }

    /// Drop all buffered bytes, preserving capacity.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_len() {
        let mut buf = BoundedBuffer::new(10);
        buf.append(&[1, 2, 3]).unwrap();
        assert_eq!(buf.len(), 3);
        assert!(!buf.is_empty());
    }

    #[test]
    fn append_beyond_capacity_rejected_before_enqueue() {
        let mut buf = BoundedBuffer::new(4);
        buf.append(&[1, 2]).unwrap();
        assert!(buf.append(&[3, 4, 5]).is_err());
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.peek(2), Some(&[1u8, 2u8][..]));
    }

    #[test]
    fn append_at_exact_capacity_succeeds() {
        let mut buf = BoundedBuffer::new(4);
        buf.append(&[1, 2, 3, 4]).unwrap();
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn peek_insufficient_bytes_returns_none() {
        let mut buf = BoundedBuffer::new(10);
        buf.append(&[1, 2]).unwrap();
        assert!(buf.peek(3).is_none());
    }

    #[test]
    fn consume_removes_prefix() {
        let mut buf = BoundedBuffer::new(10);
        buf.append(&[1, 2, 3, 4]).unwrap();
        let consumed = buf.consume(2);
        assert_eq!(&consumed[..], &[1, 2]);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.peek(2), Some(&[3u8, 4u8][..]));
    }

    #[test]
    fn clear_preserves_capacity() {
        let mut buf = BoundedBuffer::new(8);
        buf.append(&[1, 2, 3]).unwrap();
        buf.clear();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.capacity(), 8);
        buf.append(&[0; 8]).unwrap();
    }

    #[test]
    fn append_in_chunks_accumulates() {
        let mut buf = BoundedBuffer::new(6);
        buf.append(&[1, 2]).unwrap();
        buf.append(&[3, 4]).unwrap();
        buf.append(&[5, 6]).unwrap();
        assert_eq!(buf.len(), 6);
        assert!(buf.append(&[7]).is_err());
    }
}
