//! The user-facing container.

use crate::config::ContainerConfig;
use crate::element::Element;
use crate::error::{Result, StrataError};
use crate::store::BackingStore;
use crate::strategy::{self, Strategy, StrategyKind};
use std::fmt;

/// Growable array shared between threads under a swappable strategy.
///
/// Every element operation takes `&self`, so the array is shared with
/// `Arc` or scoped threads. Swapping the strategy and clearing take
/// `&mut self`.
///
/// ```rust
/// use strata_array::{ConcurrentArray, StrategyKind};
///
/// let mut array = ConcurrentArray::<u64>::new(StrategyKind::Synchronized);
/// array.append(7)?;
/// array.append(8)?;
/// array.write(0, 70)?;
///
/// array.set_strategy(StrategyKind::FastLayoutLock);
/// assert_eq!(array.current_strategy_name(), "FastLayoutLock");
/// assert_eq!(array.to_vec(), vec![70, 8]);
/// # Ok::<(), strata_array::StrataError>(())
/// ```
pub struct ConcurrentArray<T: Element> {
    strategy: Box<dyn Strategy<T>>,
    config: ContainerConfig,
}

impl<T: Element> ConcurrentArray<T> {
    /// Empty array running `kind` with default settings.
    pub fn new(kind: StrategyKind) -> Self {
        let config = ContainerConfig::new(kind);
        Self::build(config)
    }

    /// Empty array from `config`, validated first.
    pub fn with_config(config: ContainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Array from `values`, running `config.strategy`.
    pub fn from_values(values: &[T], config: ContainerConfig) -> Result<Self> {
        config.validate()?;
        if values.len() > config.max_capacity {
            return Err(StrataError::capacity_overflow(
                values.len(),
                config.max_capacity,
            ));
        }
        let store = BackingStore::from_slice(values, config.initial_capacity);
        let strategy = strategy::build(config.strategy, store, values.len(), &config);
        Ok(Self { strategy, config })
    }

    fn build(config: ContainerConfig) -> Self {
        let store = BackingStore::with_capacity(config.initial_capacity);
        let strategy = strategy::build(config.strategy, store, 0, &config);
        Self { strategy, config }
    }

    /// Switch to `kind`, carrying over the current store and length.
    pub fn set_strategy(&mut self, kind: StrategyKind) {
        let from = self.strategy.kind();
        if from == kind {
            return;
        }
        let placeholder =
            strategy::build(StrategyKind::FixedSize, BackingStore::default(), 0, &self.config);
        let old = std::mem::replace(&mut self.strategy, placeholder);
        let (store, len) = old.into_parts();
        log::debug!(
            "switching strategy {from} -> {kind} (len {len}, capacity {})",
            store.capacity()
        );
        self.strategy = strategy::build(kind, store, len, &self.config);
        self.config.strategy = kind;
    }

    /// Append `value`, growing if needed. Returns the index it landed at.
    #[inline]
    pub fn append(&self, value: T) -> Result<usize> {
        self.strategy.append(value)
    }

    /// Read element `index`.
    #[inline]
    pub fn read(&self, index: usize) -> Result<T> {
        self.strategy.read(index)
    }

    /// Overwrite element `index`.
    #[inline]
    pub fn write(&self, index: usize, value: T) -> Result<()> {
        self.strategy.write(index, value)
    }

    /// Number of elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.strategy.len()
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.strategy.len()
    }

    /// Whether the array holds no element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strategy.is_empty()
    }

    /// Slots in the current store.
    pub fn capacity(&self) -> usize {
        self.strategy.capacity()
    }

    /// Grow the store to at least `required` slots without adding elements.
    pub fn ensure_capacity(&self, required: usize) -> Result<()> {
        self.strategy.ensure_capacity(required)
    }

    /// Free any superseded stores the strategy still holds.
    ///
    /// Only [`StrategyKind::FixedSize`] keeps any. Returns how many were
    /// freed.
    pub fn reclaim(&mut self) -> usize {
        self.strategy.reclaim()
    }

    /// Drop every element, going back to `initial_capacity` slots.
    pub fn clear(&mut self) {
        log::debug!(
            "clearing {} array of {} elements",
            self.strategy.name(),
            self.strategy.len()
        );
        *self = Self::build(self.config.clone());
    }

    /// Copy of the elements.
    pub fn to_vec(&self) -> Vec<T> {
        self.strategy.to_vec()
    }

    /// Name of the active strategy.
    pub fn current_strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// The active strategy.
    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Settings the array was built with; `strategy` tracks the active one.
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }
}

impl<T: Element> Default for ConcurrentArray<T> {
    fn default() -> Self {
        Self::build(ContainerConfig::default())
    }
}

impl<T: Element> fmt::Debug for ConcurrentArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentArray")
            .field("strategy", &self.strategy.kind())
            .field("len", &self.strategy.len())
            .field("capacity", &self.strategy.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fixed_size() {
        let array = ConcurrentArray::<i32>::default();
        assert_eq!(array.strategy_kind(), StrategyKind::FixedSize);
        assert!(array.is_empty());
        assert_eq!(array.capacity(), 16);
    }

    #[test]
    fn clear_keeps_strategy_and_resets_capacity() {
        let mut array = ConcurrentArray::<u8>::new(StrategyKind::CustomLock);
        for i in 0..100 {
            array.append(i).unwrap();
        }
        assert!(array.capacity() >= 100);
        array.clear();
        assert_eq!(array.size(), 0);
        assert_eq!(array.capacity(), 16);
        assert_eq!(array.strategy_kind(), StrategyKind::CustomLock);
        assert_eq!(
            array.read(0),
            Err(StrataError::IndexOutOfBounds { index: 0, len: 0 })
        );
    }

    #[test]
    fn reclaim_only_frees_for_fixed_size() {
        let mut array = ConcurrentArray::<u32>::new(StrategyKind::FixedSize);
        for i in 0..200 {
            array.append(i).unwrap();
        }
        // 16 -> 32 -> 64 -> 128 -> 256
        assert_eq!(array.reclaim(), 4);
        assert_eq!(array.reclaim(), 0);
        assert_eq!(array.to_vec(), (0..200).collect::<Vec<_>>());

        array.set_strategy(StrategyKind::Synchronized);
        for i in 200..1000 {
            array.append(i).unwrap();
        }
        assert_eq!(array.reclaim(), 0);
        assert_eq!(array.len(), 1000);
    }

    #[test]
    fn migration_visits_every_strategy() {
        let mut array = ConcurrentArray::<f64>::new(StrategyKind::FixedSize);
        for i in 0..20 {
            array.append(i as f64 / 2.0).unwrap();
        }
        let expected = array.to_vec();
        for kind in StrategyKind::ALL.into_iter().rev() {
            array.set_strategy(kind);
            assert_eq!(array.current_strategy_name(), kind.name());
            assert_eq!(array.config().strategy, kind);
            assert_eq!(array.to_vec(), expected);
        }
    }

    #[test]
    fn from_values_respects_limits() {
        let config = ContainerConfig::new(StrategyKind::LayoutLock)
            .with_initial_capacity(0)
            .with_max_capacity(3);
        let array = ConcurrentArray::from_values(&[1u32, 2, 3], config.clone()).unwrap();
        assert_eq!(array.capacity(), 3);
        assert_eq!(array.append(4), Err(StrataError::capacity_overflow(4, 3)));

        let err = ConcurrentArray::from_values(&[0u32; 4], config).unwrap_err();
        assert_eq!(err, StrataError::capacity_overflow(4, 3));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ContainerConfig::default().with_max_capacity(0);
        assert!(ConcurrentArray::<u8>::with_config(config).is_err());
    }
}
