//! Optimistic reads validated against a stamped lock.
//!
//! - Reads snapshot the length and the store without locking, read the
//!   slot, then validate the stamp. After `optimistic_retries` failed
//!   validations they take the lock in shared mode instead.
//! - In-place writes and appends that fit take the lock in shared mode,
//!   which leaves the stamp alone.
//! - Growth takes the lock exclusively; releasing it bumps the stamp.
//!
//! A reader may still be looking at a store that growth just replaced, so
//! replaced stores are retired through `crossbeam-epoch`.

use super::{Strategy, StrategyKind};
use crate::config::ContainerConfig;
use crate::cursor::AppendCursor;
use crate::element::Element;
use crate::error::{check_bounds, Result, StrataError};
use crate::store::{self, BackingStore};
use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned};
use crossbeam_utils::Backoff;
use std::sync::atomic::Ordering;
use strata::StampedLock;

/// Stamped-lock strategy.
pub struct StampedLockStrategy<T: Element> {
    lock: StampedLock,
    store: Atomic<BackingStore<T>>,
    cursor: AppendCursor,
    max_capacity: usize,
    optimistic_retries: u32,
}

impl<T: Element> StampedLockStrategy<T> {
    /// Wrap an existing store holding `len` elements.
    pub fn from_parts(store: BackingStore<T>, len: usize, config: &ContainerConfig) -> Self {
        Self {
            lock: StampedLock::new(),
            store: Atomic::new(store),
            cursor: AppendCursor::new(len),
            max_capacity: config.max_capacity,
            optimistic_retries: config.optimistic_retries,
        }
    }

    #[inline]
    fn current<'g>(&self, guard: &'g Guard) -> &'g BackingStore<T> {
        // SAFETY: never null while `self` is alive; the pinned guard keeps a
        // replaced store alive until it is dropped.
        unsafe { self.store.load(Ordering::Acquire, guard).deref() }
    }

    fn read_optimistic(&self, index: usize, guard: &Guard) -> Option<Result<T>> {
        let backoff = Backoff::new();
        for _ in 0..self.optimistic_retries {
            let Some(stamp) = self.lock.try_optimistic_read() else {
                backoff.snooze();
                continue;
            };
            let len = self.cursor.len();
            let value = self.current(guard).get(index);
            if self.lock.validate(stamp) {
                return Some(match value {
                    Some(value) if index < len => Ok(value),
                    _ => Err(StrataError::index_out_of_bounds(index, len)),
                });
            }
            backoff.spin();
        }
        None
    }

    /// Grow under the write lock so the store holds `required` slots.
    /// Returns with the write lock held so the caller can finish its slot.
    fn grow_locked(&self, required: usize) -> Result<strata::StampedWriteGuard<'_>> {
        let write = self.lock.write();
        let guard = epoch::pin();
        let current = self.current(&guard);
        if let Some(grown) = store::grow(current, required, self.max_capacity)? {
            let old = self.store.swap(Owned::new(grown), Ordering::AcqRel, &guard);
            // SAFETY: `old` is unreachable through `self.store`; optimistic
            // readers that still hold it are pinned.
            unsafe { guard.defer_destroy(old) };
        }
        Ok(write)
    }
}

impl<T: Element> Strategy<T> for StampedLockStrategy<T> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StampedLock
    }

    fn len(&self) -> usize {
        self.cursor.len()
    }

    fn capacity(&self) -> usize {
        let guard = epoch::pin();
        self.current(&guard).capacity()
    }

    fn read(&self, index: usize) -> Result<T> {
        let guard = epoch::pin();
        if let Some(result) = self.read_optimistic(index, &guard) {
            return result;
        }

        log::trace!("stamped read of {index} fell back to the read lock");
        let _shared = self.lock.read();
        let len = self.cursor.len();
        check_bounds(index, len)?;
        Ok(self.current(&guard).load(index))
    }

    fn write(&self, index: usize, value: T) -> Result<()> {
        let _shared = self.lock.read();
        check_bounds(index, self.cursor.len())?;
        let guard = epoch::pin();
        self.current(&guard).store(index, value);
        Ok(())
    }

    fn append(&self, value: T) -> Result<usize> {
        let index = self.cursor.reserve(self.max_capacity)?;
        let written = {
            let _shared = self.lock.read();
            let guard = epoch::pin();
            self.current(&guard).set(index, value)
        };
        if !written {
            let _write = self.grow_locked(index + 1)?;
            let guard = epoch::pin();
            self.current(&guard).store(index, value);
        }
        self.cursor.commit(index);
        Ok(index)
    }

    fn ensure_capacity(&self, required: usize) -> Result<()> {
        if required <= self.capacity() {
            return Ok(());
        }
        self.grow_locked(required).map(drop)
    }

    fn to_vec(&self) -> Vec<T> {
        let _shared = self.lock.read();
        let guard = epoch::pin();
        self.current(&guard).to_vec(self.cursor.len())
    }

    fn into_parts(mut self: Box<Self>) -> (BackingStore<T>, usize) {
        let len = self.cursor.len();
        let store = std::mem::replace(&mut self.store, Atomic::null());
        // SAFETY: `self` is owned, so no reader holds the store.
        let store = unsafe { store.into_owned() };
        (*store.into_box(), len)
    }
}

impl<T: Element> Drop for StampedLockStrategy<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` rules out concurrent readers.
        unsafe {
            let guard = epoch::unprotected();
            let store = self.store.load(Ordering::Relaxed, guard);
            if !store.is_null() {
                drop(store.into_owned());
            }
        }
    }
}
