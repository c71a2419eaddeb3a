//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::entry::{entry_cost, Entry};

/// In-memory table for recent writes
///
/// `size` and `entry_count` are only modified while the map's write lock is
/// held, so they always match the map contents. They are atomics so that
/// flush checks can read them without taking the lock.
pub struct MemTable {
    data: RwLock<BTreeMap<Bytes, Entry>>,
    size: AtomicUsize,
    entry_count: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
            entry_count: AtomicUsize::new(0),
        }
    }

    /// Get the entry for a key (read lock)
    ///
    /// `None` means this table knows nothing about the key; a deleted key
    /// returns `Some(Entry::Tombstone)`.
    pub fn get(&self, key: &[u8]) -> Option<Entry> {
        self.data.read().get(key).cloned()
    }

    /// Insert or overwrite an entry (write lock)
    ///
    /// Returns the table size after the write.
    pub fn put(&self, key: Bytes, entry: Entry) -> usize {
        let mut data = self.data.write();
        let new_cost = entry_cost(&key, &entry);
        let key_len = key.len();

        let old_cost = match data.insert(key, entry) {
            Some(old) => key_len + old.value_len(),
            None => {
                self.entry_count.fetch_add(1, Ordering::Relaxed);
                0
            }
        };

        let size = self.size.load(Ordering::Relaxed) - old_cost + new_cost;
        self.size.store(size, Ordering::Relaxed);
        size
    }

    /// Insert a live value
    pub fn put_value(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> usize {
        self.put(key.into(), Entry::Value(value.into()))
    }

    /// Insert a tombstone for a key
    pub fn delete(&self, key: impl Into<Bytes>) -> usize {
        self.put(key.into(), Entry::Tombstone)
    }

    /// Accumulated cost of all entries in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Number of distinct keys (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.entry_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    /// Sorted copy of every entry, used when persisting a frozen table.
    ///
    /// Keys and values are reference counted, so no payload is copied.
    pub fn snapshot(&self) -> Vec<(Bytes, Entry)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Sorted entries with `from <= key < to`; either bound may be open
    pub fn range(&self, from: Option<&[u8]>, to: Option<&[u8]>) -> Vec<(Bytes, Entry)> {
        if let (Some(from), Some(to)) = (from, to) {
            if from >= to {
                return Vec::new();
            }
        }

        let lower = from.map_or(Bound::Unbounded, Bound::Included);
        let upper = to.map_or(Bound::Unbounded, Bound::Excluded);

        self.data
            .read()
            .range::<[u8], _>((lower, upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Remove all entries
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::Relaxed);
        self.entry_count.store(0, Ordering::Relaxed);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
