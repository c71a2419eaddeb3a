//! Key/value model shared by the memtable, segments and readers.
//!
//! Keys are `Bytes` compared lexicographically. A value is either live bytes
//! or a tombstone; an empty value is a live value, not a deletion.

use bytes::Bytes;

/// The value side of an entry: live bytes or a deletion marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A live value
    Value(Bytes),

    /// A tombstone (deleted key)
    Tombstone,
}

impl Entry {
    /// Build an entry from an optional value (`None` is a delete)
    pub fn from_option(value: Option<Bytes>) -> Self {
        match value {
            Some(v) => Entry::Value(v),
            None => Entry::Tombstone,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Entry::Tombstone)
    }

    /// The live value, if any
    pub fn value(&self) -> Option<&Bytes> {
        match self {
            Entry::Value(v) => Some(v),
            Entry::Tombstone => None,
        }
    }

    /// Convert into the public view where tombstones read as absent
    pub fn into_value(self) -> Option<Bytes> {
        match self {
            Entry::Value(v) => Some(v),
            Entry::Tombstone => None,
        }
    }

    /// Bytes of value payload counted toward the flush threshold
    pub fn value_len(&self) -> usize {
        match self {
            Entry::Value(v) => v.len(),
            Entry::Tombstone => 0,
        }
    }
}

/// Size accounting used for flush decisions: key bytes plus value bytes,
/// tombstones count their key only.
pub fn entry_cost(key: &[u8], entry: &Entry) -> usize {
    key.len() + entry.value_len()
}
