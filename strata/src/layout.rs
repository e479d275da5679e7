//! Layout lock.
//!
//! Protects only the *layout* of a structure (which backing store is
//! current, how large it is), never the element slots inside it. Element
//! accesses enter in shared mode for as long as they need a stable layout
//! snapshot; a layout change enters exclusively, waiting for every accessor
//! in flight to leave.
//!
//! Shared mode is a single accessor counter. A pending layout change stops
//! new accessors from entering so growth cannot be starved by a steady
//! stream of element traffic.

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicUsize, Ordering};
use crossbeam_utils::Backoff;

const CHANGE: usize = 1 << (usize::BITS - 1);
const COUNT: usize = CHANGE - 1;

/// Reader-count layout lock guarding a layout of type `T`.
///
/// Not reentrant: a thread holding an [`AccessGuard`] must not request
/// another access or a change on the same lock.
pub struct LayoutLock<T: ?Sized> {
    state: AtomicUsize,
    pending_changes: AtomicUsize,
    layout: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for LayoutLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for LayoutLock<T> {}

impl<T> LayoutLock<T> {
    /// Create a layout lock around `layout`.
    pub const fn new(layout: T) -> Self {
        Self {
            state: AtomicUsize::new(0),
            pending_changes: AtomicUsize::new(0),
            layout: UnsafeCell::new(layout),
        }
    }

    /// Consume the lock and return the layout.
    pub fn into_inner(self) -> T {
        self.layout.into_inner()
    }
}

impl<T: ?Sized> LayoutLock<T> {
    /// Enter shared mode and snapshot the layout.
    #[inline]
    pub fn access(&self) -> AccessGuard<'_, T> {
        if let Some(guard) = self.try_access() {
            return guard;
        }
        let backoff = Backoff::new();
        loop {
            backoff.snooze();
            if let Some(guard) = self.try_access() {
                return guard;
            }
        }
    }

    /// Enter shared mode unless a layout change is running or pending.
    #[inline]
    pub fn try_access(&self) -> Option<AccessGuard<'_, T>> {
        if self.pending_changes.load(Ordering::Relaxed) != 0 {
            return None;
        }
        let s = self.state.load(Ordering::Relaxed);
        if s & CHANGE == 0
            && s & COUNT < COUNT
            && self
                .state
                .compare_exchange_weak(s, s + 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        {
            Some(AccessGuard { lock: self })
        } else {
            None
        }
    }

    /// Start a layout change, waiting for all accessors to leave.
    pub fn change(&self) -> ChangeGuard<'_, T> {
        self.pending_changes.fetch_add(1, Ordering::Relaxed);
        let backoff = Backoff::new();
        while self
            .state
            .compare_exchange_weak(0, CHANGE, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            backoff.snooze();
        }
        self.pending_changes.fetch_sub(1, Ordering::Relaxed);
        ChangeGuard { lock: self }
    }

    /// Number of accessors currently in shared mode.
    pub fn accessors(&self) -> usize {
        self.state.load(Ordering::Relaxed) & COUNT
    }

    /// Whether a layout change holds the lock.
    pub fn is_changing(&self) -> bool {
        self.state.load(Ordering::Relaxed) & CHANGE != 0
    }

    /// Direct access to the layout; the borrow proves exclusivity.
    pub fn get_mut(&mut self) -> &mut T {
        self.layout.get_mut()
    }
}

impl<T: Default> Default for LayoutLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for LayoutLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutLock")
            .field("accessors", &self.accessors())
            .field("changing", &self.is_changing())
            .finish_non_exhaustive()
    }
}

/// Shared-mode snapshot of the layout.
pub struct AccessGuard<'a, T: ?Sized> {
    lock: &'a LayoutLock<T>,
}

impl<T: ?Sized> Deref for AccessGuard<'_, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.layout.get() }
    }
}

impl<T: ?Sized> Drop for AccessGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.state.fetch_sub(1, Ordering::Release);
    }
}

/// Exclusive layout change.
pub struct ChangeGuard<'a, T: ?Sized> {
    lock: &'a LayoutLock<T>,
}

impl<T: ?Sized> Deref for ChangeGuard<'_, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.layout.get() }
    }
}

impl<T: ?Sized> DerefMut for ChangeGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.layout.get() }
    }
}

impl<T: ?Sized> Drop for ChangeGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        // Accessors never enter while CHANGE is set, so the count is zero.
        self.lock.state.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_share() {
        let lock = LayoutLock::new(vec![1, 2, 3]);
        let a = lock.access();
        let b = lock.access();
        assert_eq!(lock.accessors(), 2);
        assert_eq!(a.len() + b.len(), 6);
    }

    #[test]
    fn change_excludes_access() {
        let lock = LayoutLock::new(0u64);
        {
            let mut change = lock.change();
            *change = 7;
            assert!(lock.is_changing());
            assert!(lock.try_access().is_none());
        }
        assert_eq!(*lock.access(), 7);
        assert!(!lock.is_changing());
    }
}
