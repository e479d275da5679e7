//! Process-wide thread index registry.
//!
//! Every thread that touches a per-thread-state lock gets a small dense
//! index, used to address its state flag. Indices are recycled when the
//! owning thread exits, so the handed-out range tracks the peak number of
//! live threads. Locks give dedicated flags to indices below
//! [`MAX_THREADS`]; higher indices take a slower shared path.

use crate::ttas::TTas;
use alloc::vec::Vec;
use core::cell::Cell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Number of indices that get a dedicated per-thread flag.
pub const MAX_THREADS: usize = 1024;

struct Registry {
    /// Next never-used index.
    next: AtomicUsize,
    /// Indices released by exited threads.
    free: TTas<Vec<usize>>,
}

impl Registry {
    fn acquire(&self) -> usize {
        {
            // Lowest first, so flagged slots are handed out again before
            // anything above MAX_THREADS.
            let mut free = self.free.lock();
            let lowest = free
                .iter()
                .enumerate()
                .min_by_key(|&(_, index)| *index)
                .map(|(position, _)| position);
            if let Some(position) = lowest {
                return free.swap_remove(position);
            }
        }
        self.next.fetch_add(1, Ordering::AcqRel)
    }

    fn release(&self, index: usize) {
        self.free.lock().push(index);
    }
}

static REGISTRY: Registry = Registry {
    next: AtomicUsize::new(0),
    free: TTas::new(Vec::new()),
};

struct ThreadIndex {
    index: Cell<Option<usize>>,
}

impl ThreadIndex {
    #[inline]
    fn get(&self) -> usize {
        match self.index.get() {
            Some(index) => index,
            None => {
                let index = REGISTRY.acquire();
                self.index.set(Some(index));
                index
            }
        }
    }
}

impl Drop for ThreadIndex {
    fn drop(&mut self) {
        if let Some(index) = self.index.get() {
            REGISTRY.release(index);
        }
    }
}

std::thread_local! {
    static THREAD_INDEX: ThreadIndex = const { ThreadIndex { index: Cell::new(None) } };
}

/// Index of the calling thread, allocated on first use.
///
/// Never fails; the lowest free index is not guaranteed, only one that no
/// other live thread holds.
#[inline]
pub fn current_index() -> usize {
    THREAD_INDEX.with(ThreadIndex::get)
}

/// Upper bound (exclusive) of every flagged index handed out so far.
///
/// A flagged index obtained before this call is always below the returned
/// value, which never exceeds [`MAX_THREADS`].
#[inline]
pub fn high_water() -> usize {
    REGISTRY.next.load(Ordering::Acquire).min(MAX_THREADS)
}
