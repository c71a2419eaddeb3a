//! Store Module
//!
//! The public facade that coordinates all components.
//!
//! ## Responsibilities
//! - Route reads through the merge reader
//! - Apply writes to the memtable and trigger flushes past the threshold
//! - Load existing segments on startup
//! - Flush and release everything on close

use std::mem;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::{error, info};

use crate::config::Config;
use crate::entry::Entry;
use crate::error::{Result, StoreError};
use crate::flush::{FlushCoordinator, FlushTrigger};
use crate::memtable::MemTable;
use crate::merge::{MergeIterator, MergeReader, Source};
use crate::storage::{Segment, SegmentDirectory};

/// Mutable state shared by readers, writers and the flush coordinator
pub(crate) struct StoreState {
    /// Receives all writes
    pub(crate) memtable: Arc<MemTable>,
    /// Swapped-out memtable being flushed, or left over from a failed flush
    pub(crate) frozen: Option<Arc<MemTable>>,
    /// Published segments, oldest → newest
    pub(crate) segments: Vec<Arc<Segment>>,
    pub(crate) closed: bool,
}

impl StoreState {
    /// Every source that can hold a key, newest first
    fn sources(&self) -> Vec<Source> {
        let mut sources = Vec::with_capacity(self.segments.len() + 2);
        sources.push(Source::MemTable(Arc::clone(&self.memtable)));
        if let Some(frozen) = &self.frozen {
            sources.push(Source::MemTable(Arc::clone(frozen)));
        }
        sources.extend(
            self.segments
                .iter()
                .rev()
                .map(|segment| Source::Segment(Arc::clone(segment))),
        );
        sources
    }

    /// Move the current memtable into the frozen slot and start a new one
    pub(crate) fn freeze(&mut self) -> Arc<MemTable> {
        let frozen = mem::replace(&mut self.memtable, Arc::new(MemTable::new()));
        self.frozen = Some(Arc::clone(&frozen));
        frozen
    }
}

/// Point-in-time counters for a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub memtable_entries: usize,
    pub memtable_bytes: usize,
    /// Entries in a frozen memtable not yet published
    pub frozen_entries: usize,
    pub segment_count: usize,
    pub segment_entries: u64,
    pub segment_payload_bytes: u64,
}

/// The key-value store
///
/// ## Concurrency Model
///
/// - **State** (`memtable`, `frozen`, `segments`, `closed`): one RwLock.
///   Writers insert into the memtable while holding the read guard; a freeze
///   takes the write guard, so a write lands wholly in one generation.
/// - **Reads**: clone the source list under the read guard, then search
///   without any store lock. Segments are immutable memory maps.
/// - **Flushes**: serialized by `flusher`. Segment I/O runs outside the
///   state lock, so writes keep flowing into the fresh memtable.
/// - **Close**: takes `flusher` first, so it waits for an in-flight flush.
pub struct Store {
    config: Config,
    state: RwLock<StoreState>,
    flusher: Mutex<FlushCoordinator>,
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Validate the config and the working directory
    /// 2. Remove leftovers of interrupted flushes
    /// 3. Load committed segments, oldest first
    /// 4. Start with an empty memtable
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let (directory, segments) =
            SegmentDirectory::open(&config.working_dir, config.sync_on_flush)?;
        let next_seq = segments.last().map_or(1, |segment| segment.seq() + 1);

        info!(
            working_dir = %config.working_dir.display(),
            segments = segments.len(),
            next_seq,
            flush_threshold_bytes = config.flush_threshold_bytes,
            "store opened"
        );

        Ok(Self {
            config,
            state: RwLock::new(StoreState {
                memtable: Arc::new(MemTable::new()),
                frozen: None,
                segments,
                closed: false,
            }),
            flusher: Mutex::new(FlushCoordinator::new(directory, next_seq)),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified working directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().working_dir(path).build())
    }

    /// Get the live value for a key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. Frozen memtable, if a flush is in progress or failed
    /// 3. Segments (newest to oldest)
    ///
    /// Deleted and unknown keys both return `Ok(None)`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let reader = self.reader()?;
        Ok(reader.get(key)?.and_then(Entry::into_value))
    }

    /// Insert, overwrite (`Some`) or delete (`None`) a key
    ///
    /// The write is applied before the flush check. If the resulting flush
    /// fails the error is returned, but the write stays visible and the
    /// snapshot is retried by the next flush.
    pub fn upsert(&self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        let key = Bytes::copy_from_slice(key);
        let entry = Entry::from_option(value.map(Bytes::copy_from_slice));

        let size = {
            let state = self.state.read();
            if state.closed {
                return Err(StoreError::Closed);
            }
            state.memtable.put(key, entry)
        };

        let limit = self.config.flush_threshold_bytes;
        if size >= limit {
            self.flusher
                .lock()
                .flush(&self.state, FlushTrigger::Threshold(limit))?;
        }

        Ok(())
    }

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.upsert(key, Some(value))
    }

    /// Delete a key (writes a tombstone)
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.upsert(key, None)
    }

    /// Ascending scan of live entries with `from <= key < to`
    ///
    /// The iterator works on the sources present when it was created; later
    /// writes are not visible to it.
    pub fn range(&self, from: Option<&[u8]>, to: Option<&[u8]>) -> Result<MergeIterator> {
        self.reader()?.range(from, to)
    }

    /// Flush the memtable to a segment regardless of its size
    pub fn flush(&self) -> Result<()> {
        let mut flusher = self.flusher.lock();
        if self.state.read().closed {
            return Err(StoreError::Closed);
        }
        flusher.flush(&self.state, FlushTrigger::Forced)?;
        Ok(())
    }

    /// Close the store gracefully
    ///
    /// Waits for any in-flight flush, flushes pending writes, then releases
    /// segment maps and memtables. Resources are released even if the final
    /// flush fails; that error is returned. Calling `close()` again is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        let mut flusher = self.flusher.lock();

        {
            let mut state = self.state.write();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
        }

        let flushed = flusher.flush(&self.state, FlushTrigger::Forced);

        let released = {
            let mut state = self.state.write();
            state.frozen = None;
            state.memtable = Arc::new(MemTable::new());
            mem::take(&mut state.segments)
        };
        drop(released);

        match flushed {
            Ok(published) => {
                info!(published, "store closed");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "final flush failed while closing store");
                Err(e)
            }
        }
    }

    fn reader(&self) -> Result<MergeReader> {
        let state = self.state.read();
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(MergeReader::new(state.sources()))
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the working directory path
    pub fn working_dir(&self) -> &Path {
        &self.config.working_dir
    }

    /// Get the directory where segment files are stored
    pub fn segments_dir(&self) -> std::path::PathBuf {
        self.config.working_dir.join(SegmentDirectory::SEGMENT_DIR)
    }

    /// Get the current memtable size in bytes
    pub fn memtable_size(&self) -> usize {
        self.state.read().memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.state.read().memtable.entry_count()
    }

    /// Get the number of published segments held open
    pub fn segment_count(&self) -> usize {
        self.state.read().segments.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            memtable_entries: state.memtable.entry_count(),
            memtable_bytes: state.memtable.size(),
            frozen_entries: state.frozen.as_ref().map_or(0, |f| f.entry_count()),
            segment_count: state.segments.len(),
            segment_entries: state.segments.iter().map(|s| s.entry_count()).sum(),
            segment_payload_bytes: state.segments.iter().map(|s| s.payload_bytes()).sum(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
