//! Fixed-capacity backing store.

use crate::element::Element;
use crate::error::{Result, StrataError};
use core::fmt;

/// Smallest capacity a growing store jumps to.
pub const MIN_GROWTH_CAPACITY: usize = 16;

/// Contiguous block of element slots whose capacity never changes.
///
/// Growth allocates a new store and copies the old one into it. The logical
/// length is tracked by the owning strategy, not here.
pub struct BackingStore<T: Element> {
    slots: Box<[T::Atom]>,
}

impl<T: Element> BackingStore<T> {
    /// Allocate `capacity` slots holding `T::default()`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| T::new_atom(T::default())).collect(),
        }
    }

    /// Build a store holding `values`, with at least `capacity` slots.
    pub fn from_slice(values: &[T], capacity: usize) -> Self {
        let capacity = capacity.max(values.len());
        let slots = values
            .iter()
            .copied()
            .chain(core::iter::repeat(T::default()))
            .take(capacity)
            .map(T::new_atom)
            .collect();
        Self { slots }
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Read slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity()`.
    #[inline]
    pub fn load(&self, index: usize) -> T {
        T::load(&self.slots[index])
    }

    /// Overwrite slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity()`.
    #[inline]
    pub fn store(&self, index: usize, value: T) {
        T::store(&self.slots[index], value)
    }

    /// Read slot `index`, or `None` past the end.
    #[inline]
    pub fn get(&self, index: usize) -> Option<T> {
        self.slots.get(index).map(T::load)
    }

    /// Overwrite slot `index`. Returns `false` past the end.
    #[inline]
    pub fn set(&self, index: usize, value: T) -> bool {
        match self.slots.get(index) {
            Some(slot) => {
                T::store(slot, value);
                true
            }
            None => false,
        }
    }

    /// New store of `capacity` slots starting with a copy of every slot of `self`.
    pub fn grown(&self, capacity: usize) -> Self {
        debug_assert!(capacity >= self.capacity());
        let slots = self
            .slots
            .iter()
            .map(|slot| T::new_atom(T::load(slot)))
            .chain((self.capacity()..capacity).map(|_| T::new_atom(T::default())))
            .collect();
        Self { slots }
    }

    /// Copy out the first `len` slots.
    pub fn to_vec(&self, len: usize) -> Vec<T> {
        self.slots[..len.min(self.capacity())]
            .iter()
            .map(T::load)
            .collect()
    }
}

impl<T: Element> Default for BackingStore<T> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<T: Element> fmt::Debug for BackingStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackingStore")
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Capacity to grow to when `required` slots are needed and `current` exist.
///
/// Doubles, never below [`MIN_GROWTH_CAPACITY`], clamped to `max`.
pub fn capacity_for(current: usize, required: usize, max: usize) -> Result<usize> {
    if required > max {
        return Err(StrataError::capacity_overflow(required, max));
    }
    Ok(MIN_GROWTH_CAPACITY
        .max(current.saturating_mul(2))
        .max(required)
        .min(max))
}

/// Grow `store` so it holds at least `required` slots.
///
/// Returns `Ok(None)` when the store is already large enough.
pub(crate) fn grow<T: Element>(
    store: &BackingStore<T>,
    required: usize,
    max: usize,
) -> Result<Option<BackingStore<T>>> {
    let current = store.capacity();
    if required <= current {
        return Ok(None);
    }
    let capacity = capacity_for(current, required, max)?;
    log::trace!("growing backing store {current} -> {capacity}");
    Ok(Some(store.grown(capacity)))
}
