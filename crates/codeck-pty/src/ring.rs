//! A byte ring buffer clamped to a fixed capacity, oldest bytes dropped
//! first, used to hold PTY output produced while no client is attached.

/// Output buffer capacity: 1 MiB.
pub const RING_CAPACITY: usize = 1024 * 1024;

/// Append-only byte buffer that evicts from the front once full.
#[derive(Debug, Default, Clone)]
pub struct RingBuffer {
    data: std::collections::VecDeque<u8>,
    capacity: usize,
}

impl RingBuffer {
    /// Construct an empty ring with [`RING_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: std::collections::VecDeque::with_capacity(RING_CAPACITY),
            capacity: RING_CAPACITY,
        }
    }

    /// Push `chunk` onto the buffer, evicting the oldest bytes if the
    /// total would exceed capacity.
    pub fn push(&mut self, chunk: &[u8]) {
        if chunk.len() >= self.capacity {
            self.data.clear();
            self.data.extend(&chunk[chunk.len() - self.capacity..]);
            return;
        }
        let overflow = (self.data.len() + chunk.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.data.drain(..overflow);
        }
        self.data.extend(chunk);
    }

    /// Drain and return all buffered bytes, leaving the ring empty.
    pub fn take(&mut self) -> Vec<u8> {
        self.data.drain(..).collect()
    }

    /// Current buffered byte count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
