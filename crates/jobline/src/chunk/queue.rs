use crate::config::DEFAULT_CHUNK_CAPACITY;
use core::fmt;
use std::collections::VecDeque;

/// Fixed-capacity slot buffer backing one chunk of the queue.
type Chunk<T> = Box<[Option<T>]>;

const CHAIN_INVARIANT: &str = "chunk chain must always hold at least one chunk";

/// An unbounded FIFO built from fixed-capacity chunks.
///
/// Items are written into the tail chunk until it is full, at which point a
/// fresh chunk is linked behind it. Fully drained chunks are moved onto an
/// internal free-list and handed back out on the next growth, so a queue that
/// repeatedly fills and drains stops allocating once it has reached its peak
/// size.
///
/// The queue always owns at least one chunk, even when empty: emptiness is
/// `head_index == tail_index` within a single chunk. `push` never blocks and
/// never fails, and `peek`/`pop` are O(1).
///
/// ## Features
/// - ✅ Amortized O(1) push and pop without reallocation or copying
/// - ✅ Chunk recycling bounded by the peak queue size (or by a pool limit)
/// - ❌ Not synchronized: meant to be owned by a single thread
///
/// ## Recommended When
/// - One thread owns the queue and other threads talk to it through channels
/// - Bursts are large and unpredictable, so a single growable buffer would
///   reallocate and copy often
///
/// # Example
/// ```
/// use jobline::ChunkedQueue;
///
/// let mut queue = ChunkedQueue::with_chunk_capacity(2);
/// queue.push("a");
/// queue.push("b");
/// queue.push("c");
///
/// assert_eq!(queue.peek(), Some(&"a"));
/// assert_eq!(queue.pop(), Some("a"));
/// assert_eq!(queue.pop(), Some("b"));
/// assert_eq!(queue.pop(), Some("c"));
/// assert_eq!(queue.pop(), None);
/// ```
pub struct ChunkedQueue<T> {
    /// Live chunks; front is the head chunk, back is the tail chunk.
    chunks: VecDeque<Chunk<T>>,
    /// Drained chunks waiting to be reused.
    pool: Vec<Chunk<T>>,
    /// Next slot to consume in the head chunk.
    head_index: usize,
    /// Next free slot in the tail chunk.
    tail_index: usize,
    len: usize,
    chunk_capacity: usize,
    pool_limit: Option<usize>,
    allocated: usize,
}

impl<T> ChunkedQueue<T> {
    /// Creates an empty queue with [`DEFAULT_CHUNK_CAPACITY`] slots per chunk.
    pub fn new() -> Self {
        Self::with_chunk_capacity(DEFAULT_CHUNK_CAPACITY)
    }

    /// Creates an empty queue with `chunk_capacity` slots per chunk.
    ///
    /// The first chunk is allocated eagerly.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_capacity` is zero.
    pub fn with_chunk_capacity(chunk_capacity: usize) -> Self {
        assert!(chunk_capacity > 0, "chunk capacity must be greater than 0");

        let mut chunks = VecDeque::with_capacity(2);
        chunks.push_back(new_chunk(chunk_capacity));

        Self {
            chunks,
            pool: Vec::new(),
            head_index: 0,
            tail_index: 0,
            len: 0,
            chunk_capacity,
            pool_limit: None,
            allocated: 1,
        }
    }

    /// Caps the number of drained chunks kept for reuse.
    ///
    /// Chunks drained while the pool is already at `limit` are freed instead.
    /// A limit of `0` disables recycling entirely.
    #[must_use]
    pub fn with_pool_limit(mut self, limit: usize) -> Self {
        self.pool_limit = Some(limit);
        self.pool.truncate(limit);
        self
    }

    /// Appends `item` at the back of the queue.
    ///
    /// When this fills the tail chunk, a chunk is taken from the pool (or
    /// allocated) and linked as the new tail.
    pub fn push(&mut self, item: T) {
        let tail = self.chunks.back_mut().expect(CHAIN_INVARIANT);
        debug_assert!(tail[self.tail_index].is_none(), "tail slot already in use");
        tail[self.tail_index] = Some(item);
        self.tail_index += 1;
        self.len += 1;

        if self.tail_index == self.chunk_capacity {
            let chunk = self.acquire();
            self.chunks.push_back(chunk);
            self.tail_index = 0;
        }
    }

    /// Returns the item at the front of the queue without removing it.
    ///
    /// Calling `peek` repeatedly without an intervening [`pop`](Self::pop)
    /// always returns the same item.
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        let head = self.chunks.front().expect(CHAIN_INVARIANT);
        head[self.head_index].as_ref()
    }

    /// Removes and returns the item at the front of the queue.
    ///
    /// This is the item the preceding [`peek`](Self::peek) reported. When the
    /// head chunk becomes fully drained it is moved to the pool and the next
    /// chunk becomes the head. When the queue becomes empty the indices are
    /// rewound so the remaining chunk is reused from its first slot.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let head = self.chunks.front_mut().expect(CHAIN_INVARIANT);
        let item = head[self.head_index]
            .take()
            .expect("head slot of a non-empty queue must be occupied");
        self.head_index += 1;
        self.len -= 1;

        if self.head_index == self.chunk_capacity {
            // The tail always has a free slot, so a full head is never the
            // tail: there is a next chunk to advance to.
            assert!(self.chunks.len() > 1, "drained head chunk has no successor");
            let drained = self.chunks.pop_front().expect(CHAIN_INVARIANT);
            self.recycle(drained);
            self.head_index = 0;
        }

        if self.is_empty() {
            self.head_index = 0;
            self.tail_index = 0;
        }

        Some(item)
    }

    /// Drops every queued item, recycling chunks as [`pop`](Self::pop) does.
    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }

    /// Returns the number of queued items.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no items are queued.
    pub fn is_empty(&self) -> bool {
        let empty = self.chunks.len() == 1 && self.head_index == self.tail_index;
        debug_assert_eq!(empty, self.len == 0, "length counter out of sync");
        empty
    }

    /// Returns the number of slots per chunk.
    pub const fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// Returns how many chunk buffers this queue has allocated over its
    /// lifetime, including the initial one.
    pub const fn allocated_chunks(&self) -> usize {
        self.allocated
    }

    /// Returns the number of chunks currently linked into the live chain.
    pub fn live_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Returns the number of drained chunks waiting for reuse.
    pub fn pooled_chunks(&self) -> usize {
        self.pool.len()
    }

    fn acquire(&mut self) -> Chunk<T> {
        match self.pool.pop() {
            Some(chunk) => chunk,
            None => {
                self.allocated += 1;
                new_chunk(self.chunk_capacity)
            }
        }
    }

    fn recycle(&mut self, chunk: Chunk<T>) {
        debug_assert!(chunk.iter().all(Option::is_none), "recycled a non-empty chunk");
        if self.pool_limit.is_none_or(|limit| self.pool.len() < limit) {
            self.pool.push(chunk);
        }
    }
}

impl<T> Default for ChunkedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Extend<T> for ChunkedQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

impl<T> fmt::Debug for ChunkedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedQueue")
            .field("len", &self.len)
            .field("chunk_capacity", &self.chunk_capacity)
            .field("live_chunks", &self.chunks.len())
            .field("pooled_chunks", &self.pool.len())
            .field("allocated_chunks", &self.allocated)
            .finish()
    }
}

fn new_chunk<T>(capacity: usize) -> Chunk<T> {
    core::iter::repeat_with(|| None).take(capacity).collect()
}
