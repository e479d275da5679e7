//! Growable concurrent hash map guarded by a layout lock.
//!
//! # Architecture
//! - **Table**: power-of-two array of buckets, addressed by `hash & mask`.
//! - **Buckets**: a short vector of entries behind a TTAS spin lock.
//! - **Layout**: the table itself sits behind a [`LayoutLock`]. Lookups and
//!   inserts run in shared mode and only lock the one bucket they touch.
//!   Resizing doubles the table in exclusive mode once the load factor
//!   passes 3/4.
//!
//! Entries are never removed; the table only grows.
//!
//! Iteration works on a snapshot: [`LayoutMap::iter`] and
//! [`LayoutMap::for_each`] stay in shared mode for the whole walk, so no
//! resize can move an entry between buckets halfway through and every key
//! is seen exactly once.
//!
//! ```rust
//! use strata_map::LayoutMap;
//!
//! let map = LayoutMap::new();
//! assert_eq!(map.insert("a", 1), None);
//! assert_eq!(map.insert("a", 2), Some(1));
//! assert_eq!(map.get("a"), Some(2));
//! assert!(!map.contains_key("b"));
//! ```

#![warn(missing_docs)]

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::sync::atomic::{AtomicUsize, Ordering};
use foldhash::fast::FixedState;
use strata::{LayoutLock, TTas};

/// Bucket count of a map built with [`LayoutMap::new`].
pub const DEFAULT_BUCKETS: usize = 16;

/// Entry layout: `hash` first so a scan compares integers before keys.
struct Entry<K, V> {
    hash: u64,
    key: K,
    value: V,
}

struct Table<K, V> {
    buckets: Box<[TTas<Vec<Entry<K, V>>>]>,
    mask: usize,
}

impl<K, V> Table<K, V> {
    fn with_buckets(count: usize) -> Self {
        debug_assert!(count.is_power_of_two());
        Self {
            buckets: (0..count).map(|_| TTas::new(Vec::new())).collect(),
            mask: count - 1,
        }
    }

    #[inline(always)]
    fn bucket(&self, hash: u64) -> &TTas<Vec<Entry<K, V>>> {
        &self.buckets[(hash as usize) & self.mask]
    }

    fn buckets(&self) -> usize {
        self.buckets.len()
    }
}

/// Concurrent hash map with a layout-locked bucket table.
pub struct LayoutMap<K, V, S = FixedState> {
    table: LayoutLock<Table<K, V>>,
    len: AtomicUsize,
    hasher: S,
}

impl<K, V> LayoutMap<K, V, FixedState>
where
    K: Hash + Eq,
{
    /// Creates a new empty map with FoldHash (FixedState).
    pub fn new() -> Self {
        Self::with_hasher(FixedState::default())
    }

    /// Creates a map that holds `capacity` entries before its first resize.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, FixedState::default())
    }
}

impl<K, V> Default for LayoutMap<K, V, FixedState>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> LayoutMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates a new map with a custom hasher.
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    /// Creates a map with room for `capacity` entries and a custom hasher.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        let buckets = buckets_for(capacity);
        Self {
            table: LayoutLock::new(Table::with_buckets(buckets)),
            len: AtomicUsize::new(0),
            hasher,
        }
    }

    /// Clone of the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let hash = self.hasher.hash_one(key);
        let table = self.table.access();
        let bucket = table.bucket(hash).lock();
        bucket
            .iter()
            .find(|e| e.hash == hash && e.key.borrow() == key)
            .map(|e| e.value.clone())
    }

    /// Checks if the key exists.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        let table = self.table.access();
        let bucket = table.bucket(hash).lock();
        bucket
            .iter()
            .any(|e| e.hash == hash && e.key.borrow() == key)
    }

    /// Insert a key-value pair, returning the value it replaced.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let hash = self.hasher.hash_one(&key);
        let buckets = {
            let table = self.table.access();
            let mut bucket = table.bucket(hash).lock();
            if let Some(entry) = bucket
                .iter_mut()
                .find(|e| e.hash == hash && e.key == key)
            {
                return Some(core::mem::replace(&mut entry.value, value));
            }
            bucket.push(Entry { hash, key, value });
            table.buckets()
        };
        self.after_insert(buckets);
        None
    }

    /// Insert only if the key is absent.
    /// Returns `None` if inserted, `Some(existing_value)` if the key already exists.
    pub fn insert_if_absent(&self, key: K, value: V) -> Option<V>
    where
        V: Clone,
    {
        let hash = self.hasher.hash_one(&key);
        let buckets = {
            let table = self.table.access();
            let mut bucket = table.bucket(hash).lock();
            if let Some(entry) = bucket.iter().find(|e| e.hash == hash && e.key == key) {
                return Some(entry.value.clone());
            }
            bucket.push(Entry { hash, key, value });
            table.buckets()
        };
        self.after_insert(buckets);
        None
    }

    /// Count the new entry and resize once the load factor passes 3/4.
    /// `buckets` is the table size the entry went into.
    fn after_insert(&self, buckets: usize) {
        let len = self.len.fetch_add(1, Ordering::Relaxed) + 1;
        if over_load_factor(len, buckets) {
            self.resize();
        }
    }

    fn resize(&self) {
        let mut table = self.table.change();
        let len = self.len.load(Ordering::Relaxed);
        let current = table.buckets();
        // Another inserter may already have grown the table far enough.
        if !over_load_factor(len, current) {
            return;
        }
        let mut count = current * 2;
        while over_load_factor(len, count) {
            count *= 2;
        }
        log::trace!("resizing layout map {current} -> {count} buckets ({len} entries)");

        let old = core::mem::replace(&mut *table, Table::with_buckets(count));
        for bucket in old.buckets.into_vec() {
            for entry in bucket.into_inner() {
                let index = (entry.hash as usize) & table.mask;
                table.buckets[index].get_mut().push(entry);
            }
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Whether the map holds no entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current number of buckets.
    pub fn capacity(&self) -> usize {
        self.table.access().buckets()
    }

    /// Get the hasher.
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Call `f` on every entry, one bucket at a time.
    ///
    /// Holds shared mode for the whole walk and each bucket's lock while
    /// `f` runs on its entries. `f` must not call back into this map.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        let table = self.table.access();
        for bucket in table.buckets.iter() {
            for entry in bucket.lock().iter() {
                f(&entry.key, &entry.value);
            }
        }
    }

    /// Iterator over a snapshot of the entries. Yields `(K, V)` clones.
    ///
    /// Inserts that complete before the call are all included; inserts
    /// racing with it may or may not be.
    pub fn iter(&self) -> Iter<K, V>
    where
        K: Clone,
        V: Clone,
    {
        let mut entries = Vec::with_capacity(self.len());
        self.for_each(|k, v| entries.push((k.clone(), v.clone())));
        Iter {
            inner: entries.into_iter(),
        }
    }

    /// Iterator over a snapshot of the keys.
    pub fn keys(&self) -> Keys<K, V>
    where
        K: Clone,
        V: Clone,
    {
        Keys { iter: self.iter() }
    }
}

/// Snapshot iterator over map entries, built by [`LayoutMap::iter`].
pub struct Iter<K, V> {
    inner: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for Iter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<K, V> {}

/// Snapshot iterator over map keys, built by [`LayoutMap::keys`].
pub struct Keys<K, V> {
    iter: Iter<K, V>,
}

impl<K, V> Iterator for Keys<K, V> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<K, V> {}

impl<'a, K, V, S> IntoIterator for &'a LayoutMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    type Item = (K, V);
    type IntoIter = Iter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> fmt::Debug for LayoutMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutMap")
            .field("len", &self.len())
            .field("buckets", &self.capacity())
            .finish()
    }
}

#[inline]
fn over_load_factor(len: usize, buckets: usize) -> bool {
    len.saturating_mul(4) > buckets.saturating_mul(3)
}

fn buckets_for(capacity: usize) -> usize {
    let needed = capacity.saturating_mul(4).div_ceil(3);
    needed.max(DEFAULT_BUCKETS).next_power_of_two()
}
