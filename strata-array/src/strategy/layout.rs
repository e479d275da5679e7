//! Element access in layout-lock shared mode.
//!
//! The layout lock guards which store is current; slots need no lock of
//! their own. Reads, writes and appends that fit all run in shared mode, so
//! they proceed in parallel. Only growth enters exclusive mode, waiting for
//! every accessor in flight to leave before swapping the store.

use super::{Strategy, StrategyKind};
use crate::config::ContainerConfig;
use crate::cursor::AppendCursor;
use crate::element::Element;
use crate::error::{check_bounds, Result};
use crate::store::{self, BackingStore};
use strata::LayoutLock;

/// Layout-lock strategy.
pub struct LayoutLockStrategy<T: Element> {
    layout: LayoutLock<BackingStore<T>>,
    cursor: AppendCursor,
    max_capacity: usize,
}

impl<T: Element> LayoutLockStrategy<T> {
    /// Wrap an existing store holding `len` elements.
    pub fn from_parts(store: BackingStore<T>, len: usize, config: &ContainerConfig) -> Self {
        Self {
            layout: LayoutLock::new(store),
            cursor: AppendCursor::new(len),
            max_capacity: config.max_capacity,
        }
    }
}

impl<T: Element> Strategy<T> for LayoutLockStrategy<T> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LayoutLock
    }

    fn len(&self) -> usize {
        self.cursor.len()
    }

    fn capacity(&self) -> usize {
        self.layout.access().capacity()
    }

    fn read(&self, index: usize) -> Result<T> {
        let store = self.layout.access();
        check_bounds(index, self.cursor.len())?;
        Ok(store.load(index))
    }

    fn write(&self, index: usize, value: T) -> Result<()> {
        let store = self.layout.access();
        check_bounds(index, self.cursor.len())?;
        store.store(index, value);
        Ok(())
    }

    fn append(&self, value: T) -> Result<usize> {
        let index = self.cursor.reserve(self.max_capacity)?;
        let written = self.layout.access().set(index, value);
        if !written {
            let mut store = self.layout.change();
            if let Some(grown) = store::grow(&*store, index + 1, self.max_capacity)? {
                *store = grown;
            }
            store.store(index, value);
        }
        self.cursor.commit(index);
        Ok(index)
    }

    fn ensure_capacity(&self, required: usize) -> Result<()> {
        if required <= self.capacity() {
            return Ok(());
        }
        let mut store = self.layout.change();
        if let Some(grown) = store::grow(&*store, required, self.max_capacity)? {
            *store = grown;
        }
        Ok(())
    }

    fn to_vec(&self) -> Vec<T> {
        let store = self.layout.access();
        store.to_vec(self.cursor.len())
    }

    fn into_parts(self: Box<Self>) -> (BackingStore<T>, usize) {
        let len = self.cursor.len();
        (self.layout.into_inner(), len)
    }
}
