//! Segment Iterator
//!
//! Lazy ascending iteration over a key range of a segment.

use std::sync::Arc;

use bytes::Bytes;

use crate::entry::Entry;
use crate::error::Result;

use super::reader::Segment;

/// Iterator over segment entries in sorted key order
///
/// Holds its own reference to the segment, so it stays valid after the
/// store has moved on. Tombstones are yielded; hiding them is the merge
/// reader's job.
#[derive(Clone)]
pub struct SegmentIterator {
    segment: Arc<Segment>,
    /// First record of the range, kept for `restart()`
    start: usize,
    /// Next record to decode
    position: usize,
    /// Exclusive upper bound
    upper: Option<Bytes>,
    done: bool,
}

impl SegmentIterator {
    pub(super) fn new(segment: Arc<Segment>, start: usize, upper: Option<Bytes>) -> Self {
        Self {
            segment,
            start,
            position: start,
            upper,
            done: false,
        }
    }

    /// Rewind to the first entry of the range
    pub fn restart(&mut self) {
        self.position = self.start;
        self.done = false;
    }

    /// Sequence number of the segment being iterated
    pub fn seq(&self) -> u64 {
        self.segment.seq()
    }
}

impl Iterator for SegmentIterator {
    type Item = Result<(Bytes, Entry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.position as u64 >= self.segment.entry_count() {
            return None;
        }

        let (key, value) = match self.segment.record_at(self.position) {
            Ok(record) => record,
            Err(e) => {
                // A published segment is expected to decode; stop after reporting
                self.done = true;
                return Some(Err(e));
            }
        };

        if let Some(upper) = &self.upper {
            if key >= upper.as_ref() {
                self.done = true;
                return None;
            }
        }

        let entry = match value {
            Some(v) => Entry::Value(Bytes::copy_from_slice(v)),
            None => Entry::Tombstone,
        };
        let key = Bytes::copy_from_slice(key);

        self.position += 1;
        Some(Ok((key, entry)))
    }
}
