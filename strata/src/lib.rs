//! Strata: synchronization primitives for growable concurrent containers.
//!
//! A growable container has two kinds of shared state with very different
//! access patterns: the *layout* (which backing store is current and how big
//! it is), which changes rarely, and the *elements*, which change all the
//! time. The locks in this crate protect the layout only and leave element
//! slots to the container.
//!
//! # Primitives
//!
//! - [`TTas`]: test-test-and-set spin lock for short coarse critical sections.
//! - [`StampedLock`]: versioned reader-writer lock with optimistic reads.
//! - [`LayoutLock`]: shared/exclusive layout lock built on one accessor counter.
//! - [`FastLayoutLock`]: layout lock whose shared mode touches only a
//!   per-thread flag.
//!
//! # Example
//!
//! ```rust
//! use strata::LayoutLock;
//!
//! let lock = LayoutLock::new(vec![0u64; 4]);
//!
//! // Element traffic snapshots the layout in shared mode.
//! assert_eq!(lock.access().len(), 4);
//!
//! // Growth swaps the layout exclusively.
//! lock.change().resize(8, 0);
//! assert_eq!(lock.access().len(), 8);
//! ```

#![warn(missing_docs)]

extern crate alloc;

mod fast_layout;
mod layout;
pub mod registry;
mod stamped;
mod ttas;

pub use fast_layout::{FastAccessGuard, FastChangeGuard, FastLayoutLock};
pub use layout::{AccessGuard, ChangeGuard, LayoutLock};
pub use stamped::{Stamp, StampedLock, StampedReadGuard, StampedWriteGuard};
pub use ttas::{TTas, TTasGuard};
