//! Append cursor shared by the concurrent strategies.
//!
//! `reserved` hands out indices, `committed` is the published length.
//! An appender reserves an index, writes its slot, then commits in index
//! order, so every index below `committed` holds a written value.
//! Commits must happen with no lock held: the appender an earlier index
//! belongs to may still need the lock to finish its write.

use crate::error::{Result, StrataError};
use core::sync::atomic::{AtomicUsize, Ordering};
use crossbeam_utils::{Backoff, CachePadded};

pub(crate) struct AppendCursor {
    reserved: CachePadded<AtomicUsize>,
    committed: CachePadded<AtomicUsize>,
}

impl AppendCursor {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            reserved: CachePadded::new(AtomicUsize::new(len)),
            committed: CachePadded::new(AtomicUsize::new(len)),
        }
    }

    /// Published length.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.committed.load(Ordering::Acquire)
    }

    /// Reserve the next index. Refuses, reserving nothing, once `max` indices
    /// are taken.
    pub(crate) fn reserve(&self, max: usize) -> Result<usize> {
        self.reserved
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |reserved| {
                (reserved < max).then_some(reserved + 1)
            })
            .map_err(|reserved| StrataError::capacity_overflow(reserved + 1, max))
    }

    /// Publish `index` once every earlier index is published.
    pub(crate) fn commit(&self, index: usize) {
        let backoff = Backoff::new();
        while self.committed.load(Ordering::Acquire) != index {
            backoff.snooze();
        }
        self.committed.store(index + 1, Ordering::Release);
    }
}
