//! Merge Reader
//!
//! Resolves reads across every source that may hold a key: the live
//! memtable, a frozen memtable waiting to be flushed, and published
//! segments. Sources are passed in explicitly, newest first; the first
//! source that knows a key decides its value.
//!
//! Range scans k-way merge all sources with a min-heap ordered by
//! (key, source rank). For each key only the newest source's entry is
//! considered and tombstoned keys are skipped.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use bytes::Bytes;

use crate::entry::Entry;
use crate::error::{Result, StoreError};
use crate::memtable::MemTable;
use crate::storage::Segment;

/// One place a key can live
#[derive(Clone)]
pub enum Source {
    MemTable(Arc<MemTable>),
    Segment(Arc<Segment>),
}

type SourceIter = Box<dyn Iterator<Item = Result<(Bytes, Entry)>> + Send>;

impl Source {
    fn get(&self, key: &[u8]) -> Result<Option<Entry>> {
        match self {
            Source::MemTable(table) => Ok(table.get(key)),
            Source::Segment(segment) => segment.get(key),
        }
    }

    fn range(&self, from: Option<&[u8]>, to: Option<&[u8]>) -> Result<SourceIter> {
        match self {
            Source::MemTable(table) => Ok(Box::new(
                table.range(from, to).into_iter().map(Ok::<_, StoreError>),
            )),
            Source::Segment(segment) => Ok(Box::new(segment.iter(from, to)?)),
        }
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::MemTable(table) => write!(f, "MemTable({} entries)", table.entry_count()),
            Source::Segment(segment) => write!(f, "Segment({})", segment.seq()),
        }
    }
}

/// Reader over an ordered list of sources, newest first
pub struct MergeReader {
    sources: Vec<Source>,
}

impl MergeReader {
    pub fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }

    /// Newest entry for `key`, tombstones included
    ///
    /// Search order is the source order: memtables, then segments newest to
    /// oldest. A segment read error is returned, never skipped.
    pub fn get(&self, key: &[u8]) -> Result<Option<Entry>> {
        for source in &self.sources {
            if let Some(entry) = source.get(key)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Merged ascending scan of live values with `from <= key < to`
    pub fn range(&self, from: Option<&[u8]>, to: Option<&[u8]>) -> Result<MergeIterator> {
        let mut iters = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            iters.push(source.range(from, to)?);
        }
        MergeIterator::new(iters)
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }
}

/// Head of one source inside the merge heap
struct HeapEntry {
    key: Bytes,
    entry: Entry,
    /// Position in the source list; lower is newer
    rank: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // Reversed: BinaryHeap is a max-heap, the merge wants the smallest key
    // and, for equal keys, the newest source first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.rank.cmp(&self.rank))
    }
}

/// Ascending, de-duplicated, tombstone-free iterator over several sources
///
/// Yields `(key, value)` pairs. A source error is yielded once and ends the
/// iteration.
pub struct MergeIterator {
    iters: Vec<SourceIter>,
    heap: BinaryHeap<HeapEntry>,
    failed: bool,
}

impl MergeIterator {
    fn new(iters: Vec<SourceIter>) -> Result<Self> {
        let mut merge = Self {
            heap: BinaryHeap::with_capacity(iters.len()),
            iters,
            failed: false,
        };
        for rank in 0..merge.iters.len() {
            merge.advance(rank)?;
        }
        Ok(merge)
    }

    /// Pull the next entry of source `rank` into the heap
    fn advance(&mut self, rank: usize) -> Result<()> {
        if let Some(next) = self.iters[rank].next() {
            let (key, entry) = next?;
            self.heap.push(HeapEntry { key, entry, rank });
        }
        Ok(())
    }

    fn next_live(&mut self) -> Result<Option<(Bytes, Bytes)>> {
        while let Some(top) = self.heap.pop() {
            self.advance(top.rank)?;

            // Older versions of the same key
            while self.heap.peek().is_some_and(|next| next.key == top.key) {
                if let Some(shadowed) = self.heap.pop() {
                    self.advance(shadowed.rank)?;
                }
            }

            if let Entry::Value(value) = top.entry {
                return Ok(Some((top.key, value)));
            }
        }
        Ok(None)
    }
}

impl Iterator for MergeIterator {
    type Item = Result<(Bytes, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_live() {
            Ok(item) => item.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
