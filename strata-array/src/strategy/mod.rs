//! Concurrency strategies.
//!
//! A strategy owns the current [`BackingStore`] together with whatever
//! synchronization guards it, and implements element access and growth on
//! top of them. The container holds one strategy at a time behind
//! `Box<dyn Strategy<T>>` and can swap it for another, handing the live
//! store over through [`Strategy::into_parts`].

mod coarse;
mod custom;
mod fast_layout;
mod fixed;
mod layout;
mod reentrant;
mod stamped;
mod synchronized;

pub use custom::CustomLock;
pub use fast_layout::FastLayoutLockStrategy;
pub use fixed::FixedSize;
pub use layout::LayoutLockStrategy;
pub use reentrant::ReentrantLock;
pub use stamped::StampedLockStrategy;
pub use synchronized::Synchronized;

use crate::config::ContainerConfig;
use crate::element::Element;
use crate::error::{Result, StrataError};
use crate::store::BackingStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Concurrency-control policy of a container.
pub trait Strategy<T: Element>: Send + Sync {
    /// Which of the seven strategies this is.
    fn kind(&self) -> StrategyKind;

    /// Display name.
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Number of published elements.
    fn len(&self) -> usize;

    /// Whether no element is published.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots in the current store.
    fn capacity(&self) -> usize;

    /// Read element `index`.
    fn read(&self, index: usize) -> Result<T>;

    /// Overwrite element `index`.
    fn write(&self, index: usize, value: T) -> Result<()>;

    /// Append `value`, growing if needed. Returns the index it landed at.
    fn append(&self, value: T) -> Result<usize>;

    /// Grow so the store holds at least `required` slots.
    fn ensure_capacity(&self, required: usize) -> Result<()>;

    /// Copy of the published elements.
    fn to_vec(&self) -> Vec<T>;

    /// Free superseded stores that are still held. Returns how many.
    fn reclaim(&mut self) -> usize {
        0
    }

    /// Tear down, returning the store and the length.
    fn into_parts(self: Box<Self>) -> (BackingStore<T>, usize);
}

/// The seven strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    /// No synchronization; single-threaded use only.
    FixedSize,
    /// Every operation under one mutex.
    Synchronized,
    /// Every operation under one reentrant lock.
    ReentrantLock,
    /// Every operation under the TTAS spin lock.
    CustomLock,
    /// Optimistic reads validated against a stamped lock.
    StampedLock,
    /// Element access in layout-lock shared mode.
    LayoutLock,
    /// Element access flipping a per-thread layout flag.
    FastLayoutLock,
}

impl StrategyKind {
    /// Every strategy, in declaration order.
    pub const ALL: [StrategyKind; 7] = [
        StrategyKind::FixedSize,
        StrategyKind::Synchronized,
        StrategyKind::ReentrantLock,
        StrategyKind::CustomLock,
        StrategyKind::StampedLock,
        StrategyKind::LayoutLock,
        StrategyKind::FastLayoutLock,
    ];

    /// Canonical name, also accepted by `FromStr`.
    pub const fn name(self) -> &'static str {
        match self {
            StrategyKind::FixedSize => "FixedSize",
            StrategyKind::Synchronized => "Synchronized",
            StrategyKind::ReentrantLock => "ReentrantLock",
            StrategyKind::CustomLock => "CustomLock",
            StrategyKind::StampedLock => "StampedLock",
            StrategyKind::LayoutLock => "LayoutLock",
            StrategyKind::FastLayoutLock => "FastLayoutLock",
        }
    }

    /// Whether concurrent use from several threads is within contract.
    pub const fn is_thread_safe(self) -> bool {
        !matches!(self, StrategyKind::FixedSize)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = StrataError;

    /// Case-insensitive; `_`, `-` and spaces are ignored.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let kind = match normalized.as_str() {
            "fixedsize" | "fixed" => StrategyKind::FixedSize,
            "synchronized" | "sync" => StrategyKind::Synchronized,
            "reentrantlock" | "reentrant" => StrategyKind::ReentrantLock,
            "customlock" | "custom" => StrategyKind::CustomLock,
            "stampedlock" | "stamped" => StrategyKind::StampedLock,
            "layoutlock" | "layout" => StrategyKind::LayoutLock,
            "fastlayoutlock" | "fastlayout" => StrategyKind::FastLayoutLock,
            _ => return Err(StrataError::unknown_strategy(s)),
        };
        Ok(kind)
    }
}

/// Build a `kind` strategy around an existing store and length.
pub(crate) fn build<T: Element>(
    kind: StrategyKind,
    store: BackingStore<T>,
    len: usize,
    config: &ContainerConfig,
) -> Box<dyn Strategy<T>> {
    debug_assert!(len <= store.capacity());
    match kind {
        StrategyKind::FixedSize => Box::new(FixedSize::from_parts(store, len, config)),
        StrategyKind::Synchronized => Box::new(Synchronized::from_parts(store, len, config)),
        StrategyKind::ReentrantLock => Box::new(ReentrantLock::from_parts(store, len, config)),
        StrategyKind::CustomLock => Box::new(CustomLock::from_parts(store, len, config)),
        StrategyKind::StampedLock => {
            Box::new(StampedLockStrategy::from_parts(store, len, config))
        }
        StrategyKind::LayoutLock => Box::new(LayoutLockStrategy::from_parts(store, len, config)),
        StrategyKind::FastLayoutLock => {
            Box::new(FastLayoutLockStrategy::from_parts(store, len, config))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.name());
        }
    }

    #[test]
    fn parsing_is_forgiving() {
        assert_eq!(
            "fast_layout_lock".parse::<StrategyKind>().unwrap(),
            StrategyKind::FastLayoutLock
        );
        assert_eq!(
            "Stamped-Lock".parse::<StrategyKind>().unwrap(),
            StrategyKind::StampedLock
        );
        assert_eq!("SYNC".parse::<StrategyKind>().unwrap(), StrategyKind::Synchronized);
        assert_eq!(
            "rwlock".parse::<StrategyKind>(),
            Err(StrataError::unknown_strategy("rwlock"))
        );
    }

    /// Operations every strategy must agree on, single-threaded.
    fn exercise(kind: StrategyKind) {
        let config = ContainerConfig::new(kind).with_max_capacity(40);
        let strategy = build::<u32>(kind, BackingStore::with_capacity(2), 0, &config);
        assert_eq!(strategy.kind(), kind);
        assert!(strategy.is_empty());
        assert_eq!(
            strategy.read(0),
            Err(StrataError::IndexOutOfBounds { index: 0, len: 0 })
        );

        for i in 0..40 {
            assert_eq!(strategy.append(i * 3).unwrap(), i as usize);
        }
        assert_eq!(strategy.len(), 40);
        assert_eq!(strategy.capacity(), 40);
        assert_eq!(
            strategy.append(0),
            Err(StrataError::CapacityOverflow { requested: 41, max: 40 })
        );
        assert_eq!(strategy.len(), 40);

        strategy.write(7, 1000).unwrap();
        assert_eq!(strategy.read(7), Ok(1000));
        assert_eq!(
            strategy.write(40, 1),
            Err(StrataError::IndexOutOfBounds { index: 40, len: 40 })
        );
        assert!(strategy.ensure_capacity(41).is_err());

        let values = strategy.to_vec();
        assert_eq!(values.len(), 40);
        assert_eq!(values[39], 117);

        let (store, len) = strategy.into_parts();
        assert_eq!(len, 40);
        assert_eq!(store.load(7), 1000);
    }

    #[test]
    fn every_strategy_single_threaded() {
        for kind in StrategyKind::ALL {
            exercise(kind);
        }
    }

    #[test]
    fn ensure_capacity_grows_without_publishing() {
        for kind in StrategyKind::ALL {
            let config = ContainerConfig::new(kind);
            let strategy = build::<i64>(kind, BackingStore::with_capacity(0), 0, &config);
            strategy.ensure_capacity(100).unwrap();
            assert!(strategy.capacity() >= 100, "{kind}");
            assert_eq!(strategy.len(), 0, "{kind}");
            strategy.ensure_capacity(10).unwrap();
            assert!(strategy.capacity() >= 100, "{kind}");
        }
    }
}
