//! Free-list object pools for scratch buffers that are allocated per
//! operation, such as the light propagation queues.

use parking_lot::Mutex;

/// A value that can be returned to a [`Pool`] and handed out again.
pub trait Poolable: Default {
    /// Clears the value before it goes back on the free list.
    fn reset(&mut self);
}

/// A free list guarded by its own mutex. Obtaining from an empty pool
/// allocates a fresh value.
pub struct Pool<T: Poolable> {
    free: Mutex<Vec<T>>,
    max_free: usize,
}

impl<T: Poolable> Pool<T> {
    /// Creates a pool that keeps at most `max_free` values around.
    pub fn new(max_free: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_free,
        }
    }

    /// Takes a value from the free list or allocates one.
    pub fn obtain(&self) -> T {
        self.free.lock().pop().unwrap_or_default()
    }

    /// Resets a value and returns it to the free list. Values beyond the
    /// pool's capacity are dropped.
    pub fn free(&self, mut value: T) {
        value.reset();
        let mut free = self.free.lock();
        if free.len() < self.max_free {
            free.push(value);
        }
    }

    /// Drops every pooled value.
    pub fn clear(&self) {
        self.free.lock().clear();
    }

    /// Number of values currently on the free list.
    pub fn len(&self) -> usize {
        self.free.lock().len()
    }

    /// Returns `true` if the free list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Poolable> Default for Pool<T> {
    fn default() -> Self {
        Self::new(64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
