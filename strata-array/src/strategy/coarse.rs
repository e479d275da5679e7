//! State shared by the coarse-lock strategies: a store and a plain length,
//! mutated only while the strategy's lock is held.

use crate::element::Element;
use crate::error::{check_bounds, Result, StrataError};
use crate::store::{self, BackingStore};

pub(crate) struct Coarse<T: Element> {
    store: BackingStore<T>,
    len: usize,
    max_capacity: usize,
}

impl<T: Element> Coarse<T> {
    pub(crate) fn new(store: BackingStore<T>, len: usize, max_capacity: usize) -> Self {
        Self {
            store,
            len,
            max_capacity,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.store.capacity()
    }

    #[inline]
    pub(crate) fn read(&self, index: usize) -> Result<T> {
        check_bounds(index, self.len)?;
        Ok(self.store.load(index))
    }

    #[inline]
    pub(crate) fn write(&self, index: usize, value: T) -> Result<()> {
        check_bounds(index, self.len)?;
        self.store.store(index, value);
        Ok(())
    }

    pub(crate) fn ensure_capacity(&mut self, required: usize) -> Result<()> {
        if let Some(grown) = store::grow(&self.store, required, self.max_capacity)? {
            self.store = grown;
        }
        Ok(())
    }

    /// Next append index, or `CapacityOverflow` once `max_capacity` is reached.
    #[inline]
    pub(crate) fn next_index(&self) -> Result<usize> {
        if self.len < self.max_capacity {
            Ok(self.len)
        } else {
            Err(StrataError::capacity_overflow(self.len + 1, self.max_capacity))
        }
    }

    /// Append into a store already known to have room.
    #[inline]
    pub(crate) fn push_within(&mut self, value: T) -> usize {
        let index = self.len;
        self.store.store(index, value);
        self.len = index + 1;
        index
    }

    pub(crate) fn push(&mut self, value: T) -> Result<usize> {
        let index = self.next_index()?;
        self.ensure_capacity(index + 1)?;
        Ok(self.push_within(value))
    }

    pub(crate) fn to_vec(&self) -> Vec<T> {
        self.store.to_vec(self.len)
    }

    pub(crate) fn into_parts(self) -> (BackingStore<T>, usize) {
        (self.store, self.len)
    }
}
