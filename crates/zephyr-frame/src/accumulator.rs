use bytes::{Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Default starting capacity of a channel buffer: 8 KiB.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Growable per-channel byte buffer.
///
/// Bytes only ever enter at the tail and leave as a contiguous prefix.
#[derive(Debug, Default)]
pub struct ByteAccumulator {
    buf: BytesMut,
}

impl ByteAccumulator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Append received bytes to the tail.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// First buffered byte, if any.
    pub fn first(&self) -> Option<u8> {
        self.buf.first().copied()
    }

    /// Borrow the first `n` bytes without consuming them.
    pub fn peek_prefix(&self, n: usize) -> Result<&[u8]> {
        self.check(n)?;
        Ok(&self.buf[..n])
    }

    /// Remove and return the first `n` bytes.
    pub fn consume_prefix(&mut self, n: usize) -> Result<Bytes> {
        self.check(n)?;
        Ok(self.buf.split_to(n).freeze())
    }

    /// Lowest offset at which `needle` starts, if present.
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() {
            return Some(0);
        }
        self.buf
            .windows(needle.len())
            .position(|window| window == needle)
    }

    /// Everything currently buffered.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Drop all buffered bytes (port flushed or reopened).
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn check(&self, n: usize) -> Result<()> {
        if n > self.buf.len() {
            return Err(FrameError::InsufficientData {
                requested: n,
                available: self.buf.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_consume_prefix() {
        let mut acc = ByteAccumulator::new();
        acc.append(b"hello ");
        acc.append(b"world");

        assert_eq!(acc.len(), 11);
        assert_eq!(acc.peek_prefix(5).unwrap(), b"hello");
        assert_eq!(acc.consume_prefix(6).unwrap().as_ref(), b"hello ");
        assert_eq!(acc.as_slice(), b"world");
    }

    #[test]
    fn consume_more_than_buffered_fails_without_mutation() {
        let mut acc = ByteAccumulator::new();
        acc.append(b"abc");

        let err = acc.consume_prefix(4).unwrap_err();
        assert_eq!(
            err,
            FrameError::InsufficientData {
                requested: 4,
                available: 3
            }
        );
        assert_eq!(acc.as_slice(), b"abc");
    }

    #[test]
    fn find_returns_lowest_offset() {
        let mut acc = ByteAccumulator::new();
        acc.append(b"a</CRC>b</CRC>");

        assert_eq!(acc.find(b"</CRC>"), Some(1));
        assert_eq!(acc.find(b"<TM>"), None);
        assert_eq!(acc.find(b""), Some(0));
    }

    #[test]
    fn find_needle_longer_than_buffer() {
        let mut acc = ByteAccumulator::new();
        acc.append(b"</C");
        assert_eq!(acc.find(b"</CRC>"), None);
    }

    #[test]
    fn clear_and_first() {
        let mut acc = ByteAccumulator::with_capacity(4);
        assert_eq!(acc.first(), None);
        acc.append(b"\r\n");
        assert_eq!(acc.first(), Some(b'\r'));
        acc.clear();
        assert!(acc.is_empty());
    }
}
