//! Every operation under the hand-built TTAS spin lock.

use super::coarse::Coarse;
use super::{Strategy, StrategyKind};
use crate::config::ContainerConfig;
use crate::element::Element;
use crate::error::Result;
use crate::store::BackingStore;
use strata::TTas;

/// Strategy serializing every operation through a [`TTas`] spin lock.
///
/// Suited to short critical sections with little contention; waiters burn
/// CPU instead of parking.
pub struct CustomLock<T: Element> {
    inner: TTas<Coarse<T>>,
}

impl<T: Element> CustomLock<T> {
    /// Wrap an existing store holding `len` elements.
    pub fn from_parts(store: BackingStore<T>, len: usize, config: &ContainerConfig) -> Self {
        Self {
            inner: TTas::new(Coarse::new(store, len, config.max_capacity)),
        }
    }
}

impl<T: Element> Strategy<T> for CustomLock<T> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CustomLock
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    fn read(&self, index: usize) -> Result<T> {
        self.inner.lock().read(index)
    }

    fn write(&self, index: usize, value: T) -> Result<()> {
        self.inner.lock().write(index, value)
    }

    fn append(&self, value: T) -> Result<usize> {
        self.inner.lock().push(value)
    }

    fn ensure_capacity(&self, required: usize) -> Result<()> {
        self.inner.lock().ensure_capacity(required)
    }

    fn to_vec(&self) -> Vec<T> {
        self.inner.lock().to_vec()
    }

    fn into_parts(self: Box<Self>) -> (BackingStore<T>, usize) {
        self.inner.into_inner().into_parts()
    }
}
