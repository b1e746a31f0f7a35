use parking_lot::Mutex;

/// Reusable byte buffer pool.
///
/// Streams rent a buffer per slice and give it back once the slice has been
/// transmitted, so steady-state blob construction allocates nothing. Rent and
/// return must be safe under concurrent use from unrelated streams; a single
/// stream's calls are always sequential.
pub trait BufferPool: Send + Sync {
    /// Rent a buffer of at least `min_size` bytes (it may be larger)
    fn rent(&self, min_size: usize) -> Vec<u8>;

    /// Return a previously rented buffer for reuse
    fn give_back(&self, buffer: Vec<u8>);
}

/// Default free-list pool. A miss allocates fresh; at most a small bounded
/// number of buffers is retained.
pub struct SharedPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_retained: usize,
}

impl SharedPool {
    const DEFAULT_MAX_RETAINED: usize = 8;

    pub fn new() -> Self {
        Self::with_max_retained(Self::DEFAULT_MAX_RETAINED)
    }

    /// Create a pool retaining at most `max_retained` idle buffers
    pub fn with_max_retained(max_retained: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_retained,
        }
    }
}

impl Default for SharedPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool for SharedPool {
    fn rent(&self, min_size: usize) -> Vec<u8> {
        let mut free = self.free.lock();
        if let Some(pos) = free.iter().position(|b| b.len() >= min_size) {
            return free.swap_remove(pos);
        }
        drop(free);

        vec![0; min_size]
    }

    fn give_back(&self, buffer: Vec<u8>) {
        if buffer.is_empty() {
            return;
        }

        let mut free = self.free.lock();
        if free.len() < self.max_retained {
            free.push(buffer);
        }
    }
}
