//! Fixed-capacity byte ring shared by one writer and one reader.

use parking_lot::Mutex;

/// Bounded FIFO of PCM bytes.
///
/// One thread writes (the generator), one thread reads (the render loop).
/// A single lock serializes cursor bookkeeping and the byte copy; the
/// critical section is bounded by the block size, so neither side is held
/// off for longer than one `memcpy`.
///
/// The buffer never grows and never overwrites unread data. The writer is
/// expected to poll [`free`](Self::free) before each write and skip the cycle
/// when there is no room:
///
/// ```rust
/// use tonegen_core::RingBuffer;
///
/// let ring = RingBuffer::new(8);
/// let block = [1u8, 2, 3, 4];
/// while ring.free() >= block.len() {
///     ring.write(&block);
/// }
/// assert_eq!(ring.occupied(), 8);
///
/// let mut out = [0u8; 6];
/// assert_eq!(ring.read(&mut out), 6);
/// assert_eq!(out, [1, 2, 3, 4, 1, 2]);
/// ```
#[derive(Debug)]
pub struct RingBuffer {
    capacity: usize,
    inner: Mutex<RingState>,
}

#[derive(Debug)]
struct RingState {
    data: Box<[u8]>,
    read_pos: usize,
    write_pos: usize,
    count: usize,
}

impl RingState {
    /// Copy `len` bytes produced by `fill` into the ring at the write cursor.
    ///
    /// `fill` is called once or twice with contiguous destination slices.
    fn commit_with(&mut self, len: usize, mut fill: impl FnMut(&mut [u8], usize)) {
        let capacity = self.data.len();
        let first = len.min(capacity - self.write_pos);
        fill(&mut self.data[self.write_pos..self.write_pos + first], 0);
        if first < len {
            fill(&mut self.data[..len - first], first);
        }
        self.write_pos = (self.write_pos + len) % capacity;
        self.count += len;
    }
}

impl RingBuffer {
    /// Create a ring holding at most `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            capacity,
            inner: Mutex::new(RingState {
                data: vec![0u8; capacity].into_boxed_slice(),
                read_pos: 0,
                write_pos: 0,
                count: 0,
            }),
        }
    }

    /// Create a double-buffered ring for blocks of `block_bytes`.
    pub fn for_block(block_bytes: usize) -> Self {
        Self::new(crate::format::double_buffered(block_bytes))
    }

    /// Total capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently holding unread data.
    pub fn occupied(&self) -> usize {
        self.inner.lock().count
    }

    /// Bytes that can be written without overrunning unread data.
    pub fn free(&self) -> usize {
        self.capacity - self.occupied()
    }

    /// Whether there is nothing to read.
    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }

    /// Append `block` at the write cursor.
    ///
    /// The caller must have checked `free() >= block.len()`. Violating that
    /// is a logic error: debug builds panic, release builds write only the
    /// prefix that fits so unread data is never overwritten.
    pub fn write(&self, block: &[u8]) {
        let mut state = self.inner.lock();
        let free = self.capacity - state.count;
        debug_assert!(
            block.len() <= free,
            "ring buffer write of {} bytes with only {} free",
            block.len(),
            free
        );
        let len = block.len().min(free);
        state.commit_with(len, |dst, offset| {
            dst.copy_from_slice(&block[offset..offset + dst.len()]);
        });
    }

    /// Append `len` zero bytes; same precondition as [`write`](Self::write).
    pub fn write_silence(&self, len: usize) {
        let mut state = self.inner.lock();
        let free = self.capacity - state.count;
        debug_assert!(
            len <= free,
            "ring buffer silence write of {len} bytes with only {free} free"
        );
        state.commit_with(len.min(free), |dst, _| dst.fill(0));
    }

    /// Copy up to `out.len()` unread bytes into `out`.
    ///
    /// Returns the number of bytes copied. A short read is normal: the
    /// caller feeds what it got and asks again next tick.
    pub fn read(&self, out: &mut [u8]) -> usize {
        let mut state = self.inner.lock();
        let len = out.len().min(state.count);
        if len == 0 {
            return 0;
        }

        let first = len.min(self.capacity - state.read_pos);
        let read_pos = state.read_pos;
        out[..first].copy_from_slice(&state.data[read_pos..read_pos + first]);
        if first < len {
            out[first..len].copy_from_slice(&state.data[..len - first]);
        }

        state.read_pos = (read_pos + len) % self.capacity;
        state.count -= len;
        len
    }

    /// Discard all unread bytes.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.read_pos = 0;
        state.write_pos = 0;
        state.count = 0;
    }
}
