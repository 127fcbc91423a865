//! Fixed-capacity byte ring for buffered debug input

/// Ring buffer for bytes
///
/// One slot is kept free so that `head == tail` always means empty; a
/// ring of size `N` holds at most `N - 1` bytes. Pushing into a full ring
/// drops the new byte and leaves the stored bytes untouched.
///
/// The ring does no locking of its own. Callers serialize access (see
/// [`ConsoleFifo`](crate::fifo::ConsoleFifo)).
pub struct RingBuffer<const N: usize> {
    buffer: [u8; N],
    head: usize,  // Write position
    tail: usize,  // Read position
    dropped: u64, // Bytes discarded while full
}

impl<const N: usize> RingBuffer<N> {
    const MASK: usize = {
        assert!(N >= 2 && N.is_power_of_two(), "Ring buffer size must be power of 2");
        N - 1
    };

    /// Create a new empty ring buffer
    pub const fn new() -> Self {
        let _ = Self::MASK;
        Self {
            buffer: [0; N],
            head: 0,
            tail: 0,
            dropped: 0,
        }
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Check if the buffer is full
    pub fn is_full(&self) -> bool {
        (self.head + 1) & Self::MASK == self.tail
    }

    /// Get the number of bytes in the buffer
    pub fn len(&self) -> usize {
        self.head.wrapping_sub(self.tail) & Self::MASK
    }

    /// Usable capacity (`N - 1`)
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Bytes dropped because the buffer was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Push a byte into the buffer
    ///
    /// A full buffer silently discards `byte`; only the drop counter moves.
    pub fn push(&mut self, byte: u8) {
        let next = (self.head + 1) & Self::MASK;
        if next == self.tail {
            self.dropped = self.dropped.saturating_add(1);
            return;
        }
        self.buffer[self.head] = byte;
        self.head = next;
    }

    /// Pop the oldest byte, or `None` if empty
    pub fn try_pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.buffer[self.tail];
        self.tail = (self.tail + 1) & Self::MASK;
        Some(byte)
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
