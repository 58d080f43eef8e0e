//! Ring Buffer Implementation

/// Value returned by [`RingBuffer::peek`] for positions past the unread data.
///
/// `0xFF` is also a legal data byte, so callers must bounds-check against
/// [`RingBuffer::available`] before trusting a peeked value.
pub const SENTINEL: u8 = 0xFF;

/// Fixed-capacity circular byte buffer.
///
/// Read and write cursors both run modulo `N`, so at most `N - 1` bytes are
/// unread at any time.
///
/// # Overflow
///
/// The producer can outrun the consumer: pushing into a full buffer discards
/// the oldest unread byte. Each discarded byte is counted in
/// [`RingBuffer::overwritten`] so a decoder can report it.
pub struct RingBuffer<const N: usize> {
    /// Pre-allocated storage
    storage: [u8; N],
    /// Write cursor
    head: usize,
    /// Read cursor
    tail: usize,
    /// Total bytes written (for statistics)
    total_written: u64,
    /// Unread bytes discarded by overflowing pushes
    overwritten: u64,
}

impl<const N: usize> RingBuffer<N> {
    /// Create an empty ring buffer
    pub const fn new() -> Self {
        assert!(N >= 2, "ring buffer needs room for at least one byte");
        Self {
            storage: [0; N],
            head: 0,
            tail: 0,
            total_written: 0,
            overwritten: 0,
        }
    }

    /// Push one byte (overwrites the oldest unread byte if full)
    pub fn push(&mut self, byte: u8) {
        self.storage[self.head] = byte;
        self.head = (self.head + 1) % N;
        self.total_written += 1;

        // If buffer was full, advance tail past the clobbered byte
        if self.head == self.tail {
            self.tail = (self.tail + 1) % N;
            self.overwritten += 1;
        }
    }

    /// Push every byte of a slice, in order
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    /// The `pos`-th unread byte, or [`SENTINEL`] if `pos >= available()`
    pub fn peek(&self, pos: usize) -> u8 {
        self.get(pos).unwrap_or(SENTINEL)
    }

    /// The `pos`-th unread byte, if there is one
    pub fn get(&self, pos: usize) -> Option<u8> {
        if pos < self.available() {
            Some(self.storage[(self.tail + pos) % N])
        } else {
            None
        }
    }

    /// Big-endian u16 starting at unread position `pos`
    pub fn peek_u16_be(&self, pos: usize) -> u16 {
        u16::from_be_bytes([self.peek(pos), self.peek(pos + 1)])
    }

    /// Discard up to `count` unread bytes
    pub fn pop(&mut self, count: usize) {
        let count = count.min(self.available());
        self.tail = (self.tail + count) % N;
    }

    /// Number of unread bytes
    pub fn available(&self) -> usize {
        (N + self.head - self.tail) % N
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Check if the next push would overwrite unread data
    pub fn is_full(&self) -> bool {
        self.available() == N - 1
    }

    /// Maximum number of unread bytes the buffer can hold
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Copy `len` unread bytes starting at `start` into a new vector.
    ///
    /// Positions past the unread data come back as [`SENTINEL`].
    pub fn copy_range(&self, start: usize, len: usize) -> Vec<u8> {
        (start..start + len).map(|pos| self.peek(pos)).collect()
    }

    /// Get total bytes written (for statistics)
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Get number of unread bytes lost to overflow
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }

    /// Drop all unread bytes
    pub fn clear(&mut self) {
        self.tail = self.head;
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> std::fmt::Debug for RingBuffer<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .field("overwritten", &self.overwritten)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_and_peek() {
        let mut buffer = RingBuffer::<8>::new();
        buffer.extend_from_slice(&[1, 2, 3]);

        assert_eq!(buffer.available(), 3);
        assert_eq!(buffer.peek(0), 1);
        assert_eq!(buffer.peek(2), 3);
        assert_eq!(buffer.get(3), None);
        assert_eq!(buffer.peek(3), SENTINEL);
    }

    #[test]
    fn test_pop_clamps_to_available() {
        let mut buffer = RingBuffer::<8>::new();
        buffer.extend_from_slice(&[1, 2, 3]);

        buffer.pop(1);
        assert_eq!(buffer.peek(0), 2);

        buffer.pop(100);
        assert!(buffer.is_empty());

        // Cursors stay consistent after an over-pop
        buffer.push(9);
        assert_eq!(buffer.available(), 1);
        assert_eq!(buffer.peek(0), 9);
    }

    #[test]
    fn test_wraparound() {
        let mut buffer = RingBuffer::<4>::new();
        for round in 0..10u8 {
            buffer.extend_from_slice(&[round, round + 1]);
            assert_eq!(buffer.peek_u16_be(0), u16::from_be_bytes([round, round + 1]));
            buffer.pop(2);
        }
        assert_eq!(buffer.total_written(), 20);
        assert_eq!(buffer.overwritten(), 0);
    }

    #[test]
    fn test_overwrite_oldest() {
        let mut buffer = RingBuffer::<5>::new();

        // Fill beyond capacity
        for i in 0..10u8 {
            buffer.push(i);
        }

        // Should only have capacity (N-1) bytes, the newest ones
        assert!(buffer.is_full());
        assert_eq!(buffer.available(), 4);
        assert_eq!(buffer.copy_range(0, 4), vec![6, 7, 8, 9]);
        assert_eq!(buffer.overwritten(), 6);
    }

    #[test]
    fn test_clear() {
        let mut buffer = RingBuffer::<16>::new();
        buffer.extend_from_slice(b"hello");
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.peek(0), SENTINEL);
    }

    proptest! {
        #[test]
        fn prop_matches_bounded_queue(ops in proptest::collection::vec((any::<bool>(), any::<u8>()), 0..200)) {
            let mut buffer = RingBuffer::<16>::new();
            let mut model = std::collections::VecDeque::new();

            for (is_push, value) in ops {
                if is_push {
                    buffer.push(value);
                    model.push_back(value);
                    if model.len() > 15 {
                        model.pop_front();
                    }
                } else {
                    let count = (value % 4) as usize;
                    buffer.pop(count);
                    for _ in 0..count.min(model.len()) {
                        model.pop_front();
                    }
                }

                prop_assert_eq!(buffer.available(), model.len());
                for (i, expected) in model.iter().enumerate() {
                    prop_assert_eq!(buffer.peek(i), *expected);
                }
            }
        }
    }
}
