/// Default receive buffer capacity: 15 MiB.
pub const DEFAULT_CAPACITY: usize = 15 * 1024 * 1024;

/// Fixed-capacity byte store for in-progress frames.
///
/// The consumer never advances a read cursor through this buffer; it slices
/// the whole unread span via [`RingBuffer::tail`] and then wipes it with
/// [`RingBuffer::clear`]. Overflow is resolved by refusing the append, not
/// by growing.
#[derive(Debug)]
pub struct RingBuffer {
    storage: Box<[u8]>,
    len: usize,
}

impl RingBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Append bytes at the tail.
    ///
    /// Returns `false` and leaves the buffer untouched when the bytes do
    /// not fit in the remaining capacity.
    pub fn produce(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.storage.len() - self.len {
            return false;
        }
        self.storage[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        true
    }

    /// The unread byte span, oldest first.
    pub fn tail(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Empty the buffer; capacity is retained.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Release the backing storage.
    ///
    /// Afterwards the capacity is zero, so every non-empty `produce` fails
    /// until the buffer is re-created.
    pub fn cleanup(&mut self) {
        self.storage = Box::default();
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produce_then_tail_returns_exact_bytes() {
        let mut ring = RingBuffer::with_capacity(64);
        assert!(ring.produce(b"hello"));
        assert!(ring.produce(b" "));
        assert!(ring.produce(b"world"));
        assert_eq!(ring.tail(), b"hello world");
        assert_eq!(ring.len(), 11);
    }

    #[test]
    fn clear_resets_without_losing_capacity() {
        let mut ring = RingBuffer::with_capacity(8);
        assert!(ring.produce(b"12345678"));
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), 8);
        assert!(ring.produce(b"abcdefgh"));
        assert_eq!(ring.tail(), b"abcdefgh");
    }

    #[test]
    fn overfull_produce_is_rejected_and_has_no_effect() {
        let mut ring = RingBuffer::with_capacity(4);
        assert!(ring.produce(b"abc"));
        assert!(!ring.produce(b"de"));
        assert_eq!(ring.tail(), b"abc");
        // A smaller append still fits afterwards.
        assert!(ring.produce(b"d"));
        assert_eq!(ring.tail(), b"abcd");
        assert!(!ring.produce(b"x"));
    }

    #[test]
    fn produce_exactly_to_capacity() {
        let mut ring = RingBuffer::with_capacity(3);
        assert!(ring.produce(b"abc"));
        assert_eq!(ring.len(), 3);
        assert!(!ring.produce(b"d"));
    }

    #[test]
    fn cleanup_releases_storage() {
        let mut ring = RingBuffer::with_capacity(16);
        assert!(ring.produce(b"data"));
        ring.cleanup();
        assert_eq!(ring.capacity(), 0);
        assert!(ring.is_empty());
        assert!(!ring.produce(b"x"));
        // Empty appends are trivially satisfiable even with no storage.
        assert!(ring.produce(b""));
    }

    #[test]
    fn many_produces_between_clears_concatenate() {
        let mut ring = RingBuffer::with_capacity(1000);
        for round in 0..3 {
            for i in 0..100u8 {
                assert!(ring.produce(&[i]));
            }
            let tail = ring.tail();
            assert_eq!(tail.len(), 100);
            assert!(tail.iter().enumerate().all(|(i, b)| *b == i as u8), "round {round}");
            ring.clear();
        }
    }
}
