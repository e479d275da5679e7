//! Fast layout lock.
//!
//! Same contract as [`LayoutLock`](crate::LayoutLock), but shared mode costs
//! one uncontended CAS on a cache line owned by the calling thread instead
//! of an increment on a counter every core fights over.
//!
//! # Protocol
//!
//! Each thread owns a state flag per lock:
//!
//! - `INACTIVE -> ACCESS` on entering shared mode (fast path),
//! - `ACCESS -> INACTIVE` on leaving it.
//!
//! A layout change takes the base lock exclusively and flips every flag
//! `INACTIVE -> LAYOUT_CHANGE`, spinning on threads that are mid-access.
//! Flags stay in `LAYOUT_CHANGE` after the change; the owner's next access
//! fails the fast-path CAS and recovers through the base lock's shared mode,
//! which blocks while a change is running. Recovering raises
//! `need_to_recover` so the next change knows some flag left
//! `LAYOUT_CHANGE` and must be marked again.
//!
//! Flags live in lazily allocated chunks indexed by
//! [`registry::current_index`](crate::registry::current_index). Fresh flags
//! start in `LAYOUT_CHANGE`, so a thread's first access always goes through
//! the base lock.
//!
//! Threads whose index is at or above [`MAX_THREADS`] have no flag. Their
//! accesses hold the base lock in shared mode for the whole access, which a
//! change excludes by taking it exclusively. Any number of threads can use
//! the lock; only the first [`MAX_THREADS`] concurrent ones get the fast
//! path.

use crate::registry::{self, MAX_THREADS};
use crate::stamped::{StampedLock, StampedReadGuard, StampedWriteGuard};
use alloc::boxed::Box;
use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU8, Ordering};
use crossbeam_utils::{Backoff, CachePadded};

const INACTIVE: u8 = 0;
const ACCESS: u8 = 1;
const LAYOUT_CHANGE: u8 = 2;

const CHUNK: usize = 32;
const CHUNKS: usize = MAX_THREADS / CHUNK;

struct FlagChunk {
    flags: [CachePadded<AtomicU8>; CHUNK],
}

impl FlagChunk {
    fn new() -> Self {
        Self {
            flags: core::array::from_fn(|_| CachePadded::new(AtomicU8::new(LAYOUT_CHANGE))),
        }
    }
}

/// Layout lock with per-thread shared-mode flags.
///
/// Not reentrant: a thread holding a [`FastAccessGuard`] must not request
/// another access or a change on the same lock.
pub struct FastLayoutLock<T: ?Sized> {
    base: StampedLock,
    need_to_recover: AtomicBool,
    chunks: [AtomicPtr<FlagChunk>; CHUNKS],
    layout: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for FastLayoutLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for FastLayoutLock<T> {}

impl<T> FastLayoutLock<T> {
    /// Create a fast layout lock around `layout`.
    pub fn new(layout: T) -> Self {
        Self {
            base: StampedLock::new(),
            need_to_recover: AtomicBool::new(false),
            chunks: core::array::from_fn(|_| AtomicPtr::new(ptr::null_mut())),
            layout: UnsafeCell::new(layout),
        }
    }

    /// Consume the lock and return the layout.
    pub fn into_inner(self) -> T {
        // Chunks are freed by Drop; move the layout out first.
        let this = core::mem::ManuallyDrop::new(self);
        let layout = unsafe { ptr::read(this.layout.get()) };
        this.free_chunks();
        layout
    }
}

impl<T: ?Sized> FastLayoutLock<T> {
    /// Enter shared mode and snapshot the layout.
    #[inline]
    pub fn access(&self) -> FastAccessGuard<'_, T> {
        self.access_as(registry::current_index())
    }

    #[inline]
    fn access_as(&self, index: usize) -> FastAccessGuard<'_, T> {
        let Some(flag) = self.flag(index) else {
            return FastAccessGuard {
                lock: self,
                hold: Hold::Base(self.base.read()),
            };
        };
        if flag
            .compare_exchange(INACTIVE, ACCESS, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            self.recover(flag);
        }
        FastAccessGuard {
            lock: self,
            hold: Hold::Flag(flag),
        }
    }

    /// Start a layout change, waiting for every thread mid-access to leave.
    pub fn change(&self) -> FastChangeGuard<'_, T> {
        let base = self.base.write();
        // Without a recovery since the last change every flag is still
        // LAYOUT_CHANGE and there is nothing to wait for.
        if self.need_to_recover.swap(false, Ordering::Relaxed) {
            self.mark_layout_change();
        }
        FastChangeGuard { lock: self, _base: base }
    }

    /// Direct access to the layout; the borrow proves exclusivity.
    pub fn get_mut(&mut self) -> &mut T {
        self.layout.get_mut()
    }

    #[cold]
    fn recover(&self, flag: &AtomicU8) {
        debug_assert_ne!(
            flag.load(Ordering::Relaxed),
            ACCESS,
            "FastLayoutLock is not reentrant"
        );
        let _shared = self.base.read();
        flag.store(ACCESS, Ordering::Relaxed);
        self.need_to_recover.store(true, Ordering::Relaxed);
    }

    fn mark_layout_change(&self) {
        let limit = registry::high_water();
        for (chunk_index, chunk) in self.chunks.iter().enumerate() {
            let first = chunk_index * CHUNK;
            if first >= limit {
                break;
            }
            let chunk = chunk.load(Ordering::Acquire);
            if chunk.is_null() {
                continue;
            }
            let chunk = unsafe { &*chunk };
            for flag in chunk.flags.iter().take(limit - first) {
                let backoff = Backoff::new();
                loop {
                    match flag.compare_exchange(
                        INACTIVE,
                        LAYOUT_CHANGE,
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) | Err(LAYOUT_CHANGE) => break,
                        Err(_) => backoff.snooze(),
                    }
                }
            }
        }
    }

    #[inline]
    fn flag(&self, index: usize) -> Option<&AtomicU8> {
        let slot = self.chunks.get(index / CHUNK)?;
        let mut chunk = slot.load(Ordering::Acquire);
        if chunk.is_null() {
            chunk = Self::install_chunk(slot);
        }
        Some(unsafe { &*(*chunk).flags[index % CHUNK] })
    }

    #[cold]
    fn install_chunk(slot: &AtomicPtr<FlagChunk>) -> *mut FlagChunk {
        let fresh = Box::into_raw(Box::new(FlagChunk::new()));
        match slot.compare_exchange(ptr::null_mut(), fresh, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => fresh,
            Err(existing) => {
                drop(unsafe { Box::from_raw(fresh) });
                existing
            }
        }
    }

    fn free_chunks(&self) {
        for slot in &self.chunks {
            let chunk = slot.swap(ptr::null_mut(), Ordering::Relaxed);
            if !chunk.is_null() {
                drop(unsafe { Box::from_raw(chunk) });
            }
        }
    }
}

impl<T: ?Sized> Drop for FastLayoutLock<T> {
    fn drop(&mut self) {
        self.free_chunks();
    }
}

impl<T: Default> Default for FastLayoutLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for FastLayoutLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastLayoutLock")
            .field("base", &self.base)
            .field("need_to_recover", &self.need_to_recover.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Shared-mode snapshot of the layout.
pub struct FastAccessGuard<'a, T: ?Sized> {
    lock: &'a FastLayoutLock<T>,
    hold: Hold<'a>,
}

enum Hold<'a> {
    Flag(&'a AtomicU8),
    Base(#[allow(dead_code)] StampedReadGuard<'a>),
}

impl<T: ?Sized> Deref for FastAccessGuard<'_, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.layout.get() }
    }
}

impl<T: ?Sized> Drop for FastAccessGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        // The base variant releases on its own drop.
        if let Hold::Flag(flag) = &self.hold {
            flag.store(INACTIVE, Ordering::Release);
        }
    }
}

/// Exclusive layout change. Holds the base lock until dropped.
pub struct FastChangeGuard<'a, T: ?Sized> {
    lock: &'a FastLayoutLock<T>,
    _base: StampedWriteGuard<'a>,
}

impl<T: ?Sized> Deref for FastChangeGuard<'_, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.layout.get() }
    }
}

impl<T: ?Sized> DerefMut for FastChangeGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.layout.get() }
    }
}
