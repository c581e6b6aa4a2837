//! The shared backend index.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Index of the currently preferred backend, always in `0..len`.
///
/// A cursor is shared (as `Arc<Cursor>`) by a failover service, all of its
/// clones, and any recovery task it spawned. Every mutation is a single
/// atomic operation; there is no lock.
pub struct Cursor {
    index: AtomicUsize,
    len: usize,
}

impl Cursor {
    /// Creates a cursor over `len` backends, starting at 0.
    ///
    /// # Panics
    ///
    /// Panics if `len` is zero.
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "a cursor needs at least one backend");
        Self {
            index: AtomicUsize::new(0),
            len,
        }
    }

    /// Number of backends the cursor ranges over.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`; a cursor covers at least one backend.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Current index.
    pub fn get(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }

    /// Stores `index`, or 0 if `index` is out of range.
    pub fn set(&self, index: usize) {
        let index = if index < self.len { index } else { 0 };
        self.index.store(index, Ordering::Release);
    }

    /// Stores 0.
    pub fn reset(&self) {
        self.index.store(0, Ordering::Release);
    }

    /// Moves one step forward, wrapping at `len`, and returns the new index.
    pub fn advance(&self) -> usize {
        let len = self.len;
        let previous = self
            .index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some((current + 1) % len)
            })
            .unwrap_or_else(|current| current);
        (previous + 1) % len
    }

    /// Index following `index`, wrapping at `len`.
    pub fn successor(&self, index: usize) -> usize {
        (index + 1) % self.len
    }

    /// Replaces `current` with `new` if the cursor still holds `current`.
    ///
    /// Returns `true` for the single caller whose swap took effect.
    pub fn compare_and_set(&self, current: usize, new: usize) -> bool {
        let new = if new < self.len { new } else { 0 };
        self.index
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("index", &self.get())
            .field("len", &self.len)
            .finish()
    }
}
