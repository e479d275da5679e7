//! Stamped lock: a versioned reader-writer lock with optimistic reads.
//!
//! # Lock word
//!
//! ```text
//!  63                         17   16   15            0
//! +-----------------------------+----+---------------+
//! |           version           | W  | reader count  |
//! +-----------------------------+----+---------------+
//! ```
//!
//! Releasing the write lock adds `WBIT` once more, which clears the write bit
//! and carries into the version. An optimistic stamp is the lock word with
//! the reader count masked out, so shared-mode traffic never invalidates it;
//! only a write lock does.

use core::fmt;
use core::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};
use crossbeam_utils::Backoff;

const RMASK: u64 = (1 << 16) - 1;
const WBIT: u64 = 1 << 16;
const SBITS: u64 = !RMASK;
/// Initial lock word. Version 1 keeps every valid stamp non-zero.
const ORIGIN: u64 = WBIT << 1;

/// Version observed by an optimistic read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stamp(u64);

impl Stamp {
    /// Raw version bits.
    pub fn version(self) -> u64 {
        self.0 >> 17
    }
}

/// Versioned reader-writer lock.
///
/// Waiting writers take priority over newly arriving readers. Neither mode
/// is reentrant.
pub struct StampedLock {
    state: AtomicU64,
    waiting_writers: AtomicU32,
}

impl StampedLock {
    /// Create an unlocked stamped lock.
    pub const fn new() -> Self {
        Self {
            state: AtomicU64::new(ORIGIN),
            waiting_writers: AtomicU32::new(0),
        }
    }

    /// Begin an optimistic read.
    ///
    /// Returns `None` while the write lock is held.
    #[inline]
    pub fn try_optimistic_read(&self) -> Option<Stamp> {
        let s = self.state.load(Ordering::Acquire);
        if s & WBIT == 0 {
            Some(Stamp(s & SBITS))
        } else {
            None
        }
    }

    /// Check that no write lock was acquired since `stamp` was taken.
    ///
    /// Every load performed between [`try_optimistic_read`](Self::try_optimistic_read)
    /// and this call is ordered before the check.
    #[inline]
    pub fn validate(&self, stamp: Stamp) -> bool {
        fence(Ordering::Acquire);
        (self.state.load(Ordering::Relaxed) & SBITS) == stamp.0
    }

    /// Acquire the lock in shared mode.
    pub fn read(&self) -> StampedReadGuard<'_> {
        let backoff = Backoff::new();
        loop {
            if self.waiting_writers.load(Ordering::Relaxed) == 0 {
                if let Some(guard) = self.try_read() {
                    return guard;
                }
            }
            backoff.snooze();
        }
    }

    /// Acquire the lock in shared mode if no writer holds it.
    #[inline]
    pub fn try_read(&self) -> Option<StampedReadGuard<'_>> {
        let s = self.state.load(Ordering::Relaxed);
        if s & WBIT == 0
            && (s & RMASK) < RMASK
            && self
                .state
                .compare_exchange_weak(s, s + 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        {
            Some(StampedReadGuard { lock: self })
        } else {
            None
        }
    }

    /// Acquire the lock exclusively.
    pub fn write(&self) -> StampedWriteGuard<'_> {
        if let Some(guard) = self.try_write() {
            return guard;
        }

        self.waiting_writers.fetch_add(1, Ordering::Relaxed);
        let backoff = Backoff::new();
        let guard = loop {
            if let Some(guard) = self.try_write() {
                break guard;
            }
            backoff.snooze();
        };
        self.waiting_writers.fetch_sub(1, Ordering::Relaxed);
        guard
    }

    /// Acquire the lock exclusively if it is entirely free.
    #[inline]
    pub fn try_write(&self) -> Option<StampedWriteGuard<'_>> {
        let s = self.state.load(Ordering::Relaxed);
        if s & (WBIT | RMASK) == 0
            && self
                .state
                .compare_exchange(s, s + WBIT, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        {
            // Pairs with the acquire fence in `validate`: a reader that sees
            // any store made under this guard also sees WBIT.
            fence(Ordering::Release);
            Some(StampedWriteGuard { lock: self })
        } else {
            None
        }
    }

    /// Whether a writer currently holds the lock.
    pub fn is_write_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) & WBIT != 0
    }

    /// Number of shared holders right now.
    pub fn readers(&self) -> usize {
        (self.state.load(Ordering::Relaxed) & RMASK) as usize
    }

    #[inline]
    fn unlock_read(&self) {
        self.state.fetch_sub(1, Ordering::Release);
    }

    #[inline]
    fn unlock_write(&self) {
        // Clears WBIT and carries into the version.
        self.state.fetch_add(WBIT, Ordering::Release);
    }
}

impl Default for StampedLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StampedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.load(Ordering::Relaxed);
        f.debug_struct("StampedLock")
            .field("version", &(s >> 17))
            .field("write_locked", &(s & WBIT != 0))
            .field("readers", &(s & RMASK))
            .finish()
    }
}

/// Shared-mode guard. Does not change the stamp.
pub struct StampedReadGuard<'a> {
    lock: &'a StampedLock,
}

impl Drop for StampedReadGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.unlock_read();
    }
}

/// Exclusive guard. Dropping it bumps the version, invalidating every
/// outstanding optimistic stamp.
pub struct StampedWriteGuard<'a> {
    lock: &'a StampedLock,
}

impl Drop for StampedWriteGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.unlock_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_invalidates_stamp() {
        let lock = StampedLock::new();
        let stamp = lock.try_optimistic_read().unwrap();
        assert!(lock.validate(stamp));

        drop(lock.write());
        assert!(!lock.validate(stamp));

        let next = lock.try_optimistic_read().unwrap();
        assert_eq!(next.version(), stamp.version() + 1);
    }

    #[test]
    fn shared_mode_keeps_stamp() {
        let lock = StampedLock::new();
        let stamp = lock.try_optimistic_read().unwrap();
        let a = lock.read();
        let b = lock.read();
        assert_eq!(lock.readers(), 2);
        assert!(lock.validate(stamp));
        drop((a, b));
        assert_eq!(lock.readers(), 0);
    }

    #[test]
    fn modes_exclude_each_other() {
        let lock = StampedLock::new();
        let r = lock.read();
        assert!(lock.try_write().is_none());
        drop(r);

        let w = lock.write();
        assert!(lock.is_write_locked());
        assert!(lock.try_read().is_none());
        assert!(lock.try_optimistic_read().is_none());
        drop(w);
        assert!(!lock.is_write_locked());
    }
}
