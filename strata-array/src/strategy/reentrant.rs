//! Every operation under one reentrant lock.
//!
//! `append` grows by calling back into [`Strategy::ensure_capacity`] while
//! it still holds the lock, which takes the lock a second time.

use super::coarse::Coarse;
use super::{Strategy, StrategyKind};
use crate::config::ContainerConfig;
use crate::element::Element;
use crate::error::Result;
use crate::store::BackingStore;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;

/// Strategy serializing every operation through a `parking_lot` reentrant mutex.
pub struct ReentrantLock<T: Element> {
    inner: ReentrantMutex<RefCell<Coarse<T>>>,
}

impl<T: Element> ReentrantLock<T> {
    /// Wrap an existing store holding `len` elements.
    pub fn from_parts(store: BackingStore<T>, len: usize, config: &ContainerConfig) -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(Coarse::new(store, len, config.max_capacity))),
        }
    }
}

impl<T: Element> Strategy<T> for ReentrantLock<T> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ReentrantLock
    }

    fn len(&self) -> usize {
        self.inner.lock().borrow().len()
    }

    fn capacity(&self) -> usize {
        self.inner.lock().borrow().capacity()
    }

    fn read(&self, index: usize) -> Result<T> {
        self.inner.lock().borrow().read(index)
    }

    fn write(&self, index: usize, value: T) -> Result<()> {
        self.inner.lock().borrow().write(index, value)
    }

    fn append(&self, value: T) -> Result<usize> {
        let guard = self.inner.lock();
        let (index, capacity) = {
            let inner = guard.borrow();
            (inner.next_index()?, inner.capacity())
        };
        if index >= capacity {
            self.ensure_capacity(index + 1)?;
        }
        let index = guard.borrow_mut().push_within(value);
        Ok(index)
    }

    fn ensure_capacity(&self, required: usize) -> Result<()> {
        self.inner.lock().borrow_mut().ensure_capacity(required)
    }

    fn to_vec(&self) -> Vec<T> {
        self.inner.lock().borrow().to_vec()
    }

    fn into_parts(self: Box<Self>) -> (BackingStore<T>, usize) {
        self.inner.into_inner().into_inner().into_parts()
    }
}
