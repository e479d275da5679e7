//! Strata array: a growable array shared between threads, under one of
//! seven interchangeable concurrency strategies.
//!
//! | strategy         | reads                        | writes / appends           | growth              |
//! |------------------|------------------------------|----------------------------|---------------------|
//! | `FixedSize`      | unsynchronized               | unsynchronized             | unsynchronized      |
//! | `Synchronized`   | mutex                        | mutex                      | mutex               |
//! | `ReentrantLock`  | reentrant mutex              | reentrant mutex            | reentrant mutex     |
//! | `CustomLock`     | TTAS spin lock               | TTAS spin lock             | TTAS spin lock      |
//! | `StampedLock`    | optimistic, validated        | stamped lock, shared mode  | stamped lock, write |
//! | `LayoutLock`     | layout lock, shared mode     | layout lock, shared mode   | layout change       |
//! | `FastLayoutLock` | per-thread flag              | per-thread flag            | layout change       |
//!
//! `FixedSize` is for single-threaded use; every other strategy may be
//! shared freely. The active strategy can be swapped at runtime without
//! copying the elements.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//! use strata_array::{ConcurrentArray, StrategyKind};
//!
//! let array = Arc::new(ConcurrentArray::<u32>::new(StrategyKind::LayoutLock));
//! let handles: Vec<_> = (0..4)
//!     .map(|t| {
//!         let array = array.clone();
//!         thread::spawn(move || {
//!             for i in 0..100 {
//!                 array.append(t * 100 + i).unwrap();
//!             }
//!         })
//!     })
//!     .collect();
//! for h in handles {
//!     h.join().unwrap();
//! }
//! assert_eq!(array.size(), 400);
//! ```

#![warn(missing_docs)]

mod array;
pub mod config;
mod cursor;
mod element;
pub mod error;
pub mod store;
pub mod strategy;

pub use array::ConcurrentArray;
pub use config::ContainerConfig;
pub use element::Element;
pub use error::{Result, StrataError};
pub use store::BackingStore;
pub use strategy::{Strategy, StrategyKind};
