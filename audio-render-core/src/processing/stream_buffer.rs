/// Result of handing bytes to an output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// All bytes are queued for the driver.
    Accepted,
    /// Nothing was queued; wait briefly (~10ms) and resubmit the same chunk.
    Retry(RetryReason),
    /// No stream is running; the bytes were consumed and discarded.
    Dropped,
}

impl WriteOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// Accepting the chunk would grow the buffer past its ceiling.
    WouldExceedCeiling,
    /// The stream is draining ahead of a stop.
    Draining,
}

/// Growable byte FIFO between the producer and the driver callback.
///
/// Not synchronized on its own: the owning lifecycle keeps it under the same
/// `parking_lot::Mutex` as the stream state.
///
/// Unread bytes always sit at the front of the store. Capacity grows on
/// demand up to `ceiling` and never shrinks; the whole buffer is dropped
/// when the stream stops.
#[derive(Debug)]
pub struct StreamBuffer {
    store: Vec<u8>,
    filled: usize,
    ceiling: usize,
    headroom_chunks: usize,
    grows: u64,
}

impl StreamBuffer {
    /// Create an empty buffer that will never hold more than `ceiling` bytes.
    ///
    /// Each write reserves room for `headroom_chunks` chunks of its own size,
    /// so the buffer grows ahead of demand instead of flapping at the edge.
    pub fn new(ceiling: usize, headroom_chunks: usize) -> Self {
        Self {
            store: Vec::new(),
            filled: 0,
            ceiling,
            headroom_chunks: headroom_chunks.max(1),
            grows: 0,
        }
    }

    /// Queue `bytes` behind the unread data.
    ///
    /// Grows the store first when needed. Returns
    /// `Retry(WouldExceedCeiling)` without queueing anything when the unread
    /// data plus `bytes` cannot fit under the ceiling.
    pub fn write(&mut self, bytes: &[u8]) -> WriteOutcome {
        if bytes.is_empty() {
            return WriteOutcome::Accepted;
        }

        let required = self.filled + bytes.len();
        let wanted = bytes
            .len()
            .saturating_mul(self.headroom_chunks)
            .max(required)
            .min(self.ceiling);
        if wanted > self.capacity() {
            self.grow(wanted);
        }

        if required > self.capacity() {
            return WriteOutcome::Retry(RetryReason::WouldExceedCeiling);
        }

        self.store[self.filled..required].copy_from_slice(bytes);
        self.filled = required;
        WriteOutcome::Accepted
    }

    /// Fill `destination` from the front of the buffer.
    ///
    /// Every byte of `destination` is written: buffered audio first, then
    /// silence. Returns the number of audio bytes copied.
    pub fn pull(&mut self, destination: &mut [u8]) -> usize {
        let copied = self.filled.min(destination.len());

        destination[..copied].copy_from_slice(&self.store[..copied]);
        destination[copied..].fill(0);

        self.store.copy_within(copied..self.filled, 0);
        self.filled -= copied;
        copied
    }

    /// The most recently queued `len` bytes, for in-place transforms.
    pub fn unread_tail_mut(&mut self, len: usize) -> &mut [u8] {
        let len = len.min(self.filled);
        &mut self.store[self.filled - len..self.filled]
    }

    /// Bytes waiting for the driver.
    pub fn pending_bytes(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn capacity(&self) -> usize {
        self.store.len()
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Number of times the store was reallocated.
    pub fn grow_count(&self) -> u64 {
        self.grows
    }

    fn grow(&mut self, new_capacity: usize) {
        // Vec::resize keeps the unread prefix at offset 0.
        self.store.resize(new_capacity, 0);
        self.grows += 1;
    }
}
