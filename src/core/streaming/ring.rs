//! Growable ring buffer for stream framing
//!
//! Single-task byte buffer sitting between the HTTP transport and the event
//! framer. Starts at 16 KiB and doubles on demand up to a hard ceiling;
//! writes that would exceed the ceiling fail with `BufferOverflow` instead of
//! growing without bound. Reads consume up to (and including) a delimiter,
//! and partial bytes are never lost between writes.

use crate::core::error::{RelayError, Result};

/// Initial capacity.
pub const INITIAL_CAPACITY: usize = 16 * 1024;
/// Default growth ceiling.
pub const DEFAULT_MAX_CAPACITY: usize = 256 * 1024;

#[derive(Debug)]
pub struct RingBuffer {
    buf: Vec<u8>,
    head: usize,
    len: usize,
    max_capacity: usize,
}

impl RingBuffer {
    pub fn new() -> Self {
        Self::with_limits(INITIAL_CAPACITY, DEFAULT_MAX_CAPACITY)
    }

    pub fn with_limits(initial: usize, max_capacity: usize) -> Self {
        let initial = initial.max(1).min(max_capacity);
        Self {
            buf: vec![0; initial],
            head: 0,
            len: 0,
            max_capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Append bytes, growing (by doubling) as needed.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let needed = self.len + bytes.len();
        if needed > self.buf.len() {
            self.grow(needed)?;
        }

        let cap = self.buf.len();
        let mut write_at = (self.head + self.len) % cap;
        for &byte in bytes {
            self.buf[write_at] = byte;
            write_at = (write_at + 1) % cap;
        }
        self.len += bytes.len();
        Ok(())
    }

    /// Consume and return the bytes before the first occurrence of `delim`,
    /// discarding the delimiter itself. `None` when no complete frame is
    /// buffered.
    pub fn read_until(&mut self, delim: &[u8]) -> Option<Vec<u8>> {
        let at = self.find(delim)?;
        let frame = self.copy_range(0, at);
        self.consume(at + delim.len());
        Some(frame)
    }

    /// Consume and return everything buffered.
    pub fn drain(&mut self) -> Vec<u8> {
        let all = self.copy_range(0, self.len);
        self.consume(self.len);
        all
    }

    fn grow(&mut self, needed: usize) -> Result<()> {
        if needed > self.max_capacity {
            return Err(RelayError::BufferOverflow {
                limit: self.max_capacity,
            });
        }

        let mut new_cap = self.buf.len().max(1);
        while new_cap < needed {
            new_cap *= 2;
        }
        let new_cap = new_cap.min(self.max_capacity);

        let mut new_buf = vec![0; new_cap];
        for i in 0..self.len {
            new_buf[i] = self.at(i);
        }
        self.buf = new_buf;
        self.head = 0;
        Ok(())
    }

    fn at(&self, logical: usize) -> u8 {
        self.buf[(self.head + logical) % self.buf.len()]
    }

    fn find(&self, delim: &[u8]) -> Option<usize> {
        if delim.is_empty() || self.len < delim.len() {
            return None;
        }
        'outer: for start in 0..=(self.len - delim.len()) {
            for (offset, &expected) in delim.iter().enumerate() {
                if self.at(start + offset) != expected {
                    continue 'outer;
                }
            }
            return Some(start);
        }
        None
    }

    fn copy_range(&self, from: usize, to: usize) -> Vec<u8> {
        (from..to).map(|i| self.at(i)).collect()
    }

    fn consume(&mut self, count: usize) {
        let count = count.min(self.len);
        self.head = (self.head + count) % self.buf.len();
        self.len -= count;
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_frame() {
        let mut ring = RingBuffer::new();
        ring.write(b"data: hello\n\ndata: wor").unwrap();

        assert_eq!(ring.read_until(b"\n\n").unwrap(), b"data: hello");
        assert!(ring.read_until(b"\n\n").is_none());
        assert_eq!(ring.len(), b"data: wor".len());
    }

    #[test]
    fn test_partial_bytes_survive_across_writes() {
        let mut ring = RingBuffer::new();
        ring.write(b"data: he").unwrap();
        assert!(ring.read_until(b"\n\n").is_none());

        ring.write(b"llo\n\n").unwrap();
        assert_eq!(ring.read_until(b"\n\n").unwrap(), b"data: hello");
    }

    #[test]
    fn test_delimiter_split_across_writes() {
        let mut ring = RingBuffer::new();
        ring.write(b"abc\n").unwrap();
        assert!(ring.read_until(b"\n\n").is_none());
        ring.write(b"\n").unwrap();
        assert_eq!(ring.read_until(b"\n\n").unwrap(), b"abc");
    }

    #[test]
    fn test_growth_doubles_up_to_ceiling() {
        let mut ring = RingBuffer::with_limits(4, 16);
        assert_eq!(ring.capacity(), 4);

        ring.write(b"123456").unwrap();
        assert_eq!(ring.capacity(), 8);

        ring.write(b"7890123456").unwrap();
        assert_eq!(ring.capacity(), 16);
        assert_eq!(ring.len(), 16);
    }

    #[test]
    fn test_overflow_past_ceiling() {
        let mut ring = RingBuffer::with_limits(4, 8);
        ring.write(b"12345678").unwrap();

        let err = ring.write(b"9").unwrap_err();
        assert!(matches!(err, RelayError::BufferOverflow { limit: 8 }));
        // Buffered content is untouched by the failed write.
        assert_eq!(ring.len(), 8);
        assert_eq!(ring.drain(), b"12345678");
    }

    #[test]
    fn test_wraparound_reads() {
        let mut ring = RingBuffer::with_limits(8, 8);
        ring.write(b"aaaa--").unwrap();
        assert_eq!(ring.read_until(b"--").unwrap(), b"aaaa");

        // head is now mid-buffer; the next frame wraps around the edge.
        ring.write(b"bbbbbb--").unwrap();
        assert_eq!(ring.read_until(b"--").unwrap(), b"bbbbbb");
        assert!(ring.is_empty());
    }

    #[test]
    fn test_drain_returns_everything() {
        let mut ring = RingBuffer::new();
        ring.write(b"tail without delimiter").unwrap();
        assert_eq!(ring.drain(), b"tail without delimiter");
        assert!(ring.is_empty());
    }

    #[test]
    fn test_byte_at_a_time_framing() {
        let mut ring = RingBuffer::new();
        let mut frames = Vec::new();
        for &byte in b"one\n\ntwo\n\nthree".iter() {
            ring.write(&[byte]).unwrap();
            while let Some(frame) = ring.read_until(b"\n\n") {
                frames.push(frame);
            }
        }
        assert_eq!(frames, vec![b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(ring.drain(), b"three");
    }
}
