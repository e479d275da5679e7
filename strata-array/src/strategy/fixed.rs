//! No synchronization on element traffic.
//!
//! Correct only when one thread uses the container at a time (or callers
//! synchronize externally). Concurrent appends from several threads can lose
//! elements or leave a stale length. That is outside the contract, but it
//! stays memory safe: slots are atomic and every access is bounds-checked
//! against the store it actually reads.
//!
//! Growth is the one synchronized step. A replaced store may still be read
//! by a misbehaving thread, so growth takes a short [`TTas`] lock to push it
//! onto a retire list instead of freeing it. Each growth below the maximum
//! at least doubles, so retired stores hold fewer slots than twice the
//! current store, and usually fewer than the current store itself. They are
//! freed by [`Strategy::reclaim`] and whenever the strategy is torn down.

use super::{Strategy, StrategyKind};
use crate::config::ContainerConfig;
use crate::element::Element;
use crate::error::{check_bounds, Result, StrataError};
use crate::store::{self, BackingStore};
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use strata::TTas;

/// Unsynchronized strategy for single-threaded use.
pub struct FixedSize<T: Element> {
    store: AtomicPtr<BackingStore<T>>,
    len: AtomicUsize,
    retired: TTas<Vec<Box<BackingStore<T>>>>,
    max_capacity: usize,
}

impl<T: Element> FixedSize<T> {
    /// Wrap an existing store holding `len` elements.
    pub fn from_parts(store: BackingStore<T>, len: usize, config: &ContainerConfig) -> Self {
        Self {
            store: AtomicPtr::new(Box::into_raw(Box::new(store))),
            len: AtomicUsize::new(len),
            retired: TTas::new(Vec::new()),
            max_capacity: config.max_capacity,
        }
    }

    #[inline]
    fn current(&self) -> &BackingStore<T> {
        // SAFETY: the pointer is never null while `self` is borrowed and
        // stores it pointed to are only freed on teardown.
        unsafe { &*self.store.load(Ordering::Acquire) }
    }

    fn grow(&self, required: usize) -> Result<()> {
        let current = self.current();
        if let Some(grown) = store::grow(current, required, self.max_capacity)? {
            let old = self
                .store
                .swap(Box::into_raw(Box::new(grown)), Ordering::AcqRel);
            // SAFETY: `old` came from Box::into_raw and is no longer reachable
            // through `self.store`.
            self.retired.lock().push(unsafe { Box::from_raw(old) });
        }
        Ok(())
    }
}

impl<T: Element> Strategy<T> for FixedSize<T> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FixedSize
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    fn capacity(&self) -> usize {
        self.current().capacity()
    }

    fn read(&self, index: usize) -> Result<T> {
        let len = self.len();
        check_bounds(index, len)?;
        self.current()
            .get(index)
            .ok_or_else(|| StrataError::index_out_of_bounds(index, len))
    }

    fn write(&self, index: usize, value: T) -> Result<()> {
        let len = self.len();
        check_bounds(index, len)?;
        if self.current().set(index, value) {
            Ok(())
        } else {
            Err(StrataError::index_out_of_bounds(index, len))
        }
    }

    fn append(&self, value: T) -> Result<usize> {
        let index = self.len.load(Ordering::Relaxed);
        if index >= self.max_capacity {
            return Err(StrataError::capacity_overflow(index + 1, self.max_capacity));
        }
        if !self.current().set(index, value) {
            self.grow(index + 1)?;
            self.current().set(index, value);
        }
        self.len.store(index + 1, Ordering::Release);
        Ok(index)
    }

    fn ensure_capacity(&self, required: usize) -> Result<()> {
        self.grow(required)
    }

    fn to_vec(&self) -> Vec<T> {
        self.current().to_vec(self.len())
    }

    fn reclaim(&mut self) -> usize {
        let retired = self.retired.get_mut();
        let freed = retired.len();
        retired.clear();
        if freed > 0 {
            log::trace!("freed {freed} retired stores");
        }
        freed
    }

    fn into_parts(mut self: Box<Self>) -> (BackingStore<T>, usize) {
        self.reclaim();
        let len = *self.len.get_mut();
        let raw = std::mem::replace(self.store.get_mut(), ptr::null_mut());
        // SAFETY: `raw` came from Box::into_raw; nulling the field keeps Drop
        // from freeing it again.
        let store = unsafe { Box::from_raw(raw) };
        (*store, len)
    }
}

impl<T: Element> Drop for FixedSize<T> {
    fn drop(&mut self) {
        let raw = *self.store.get_mut();
        if !raw.is_null() {
            // SAFETY: `raw` came from Box::into_raw and nothing else owns it.
            drop(unsafe { Box::from_raw(raw) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn growth_retires_old_stores() {
        let strategy = FixedSize::<u8>::from_parts(
            BackingStore::with_capacity(1),
            0,
            &ContainerConfig::default(),
        );
        for i in 0..40 {
            strategy.append(i).unwrap();
        }
        // 1 -> 16 -> 32 -> 64
        assert_eq!(strategy.retired.lock().len(), 3);
        assert_eq!(strategy.capacity(), 64);
        assert_eq!(strategy.read(39), Ok(39));
    }

    #[test]
    fn reclaim_frees_retired_stores_and_keeps_data() {
        let mut strategy = FixedSize::<u16>::from_parts(
            BackingStore::with_capacity(0),
            0,
            &ContainerConfig::default(),
        );
        for i in 0..100 {
            strategy.append(i).unwrap();
        }
        let retired = strategy.retired.get_mut().len();
        assert!(retired > 0);
        let held: usize = strategy.retired.get_mut().iter().map(|s| s.capacity()).sum();
        assert!(held < strategy.capacity());

        assert_eq!(strategy.reclaim(), retired);
        assert!(strategy.retired.get_mut().is_empty());
        assert_eq!(strategy.reclaim(), 0);
        assert_eq!(strategy.to_vec(), (0..100).collect::<Vec<u16>>());

        strategy.append(100).unwrap();
        assert_eq!(strategy.read(100), Ok(100));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn concurrent_misuse_stays_in_bounds() {
        let strategy = Arc::new(FixedSize::<u32>::from_parts(
            BackingStore::with_capacity(0),
            0,
            &ContainerConfig::default(),
        ));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let strategy = strategy.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        let _ = strategy.append(t * 1000 + i);
                        let len = strategy.len();
                        if len > 0 {
                            let _ = strategy.read(len - 1);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // Appends may be lost, but never invented.
        assert!(strategy.len() <= 2000);
        assert!(strategy.to_vec().len() <= strategy.len());
    }
}
