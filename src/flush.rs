//! Flush Coordinator
//!
//! Turns a full memtable into a published segment.
//!
//! ## Protocol
//! 1. Retry a frozen snapshot left behind by a failed flush, if any
//! 2. Under the state write lock: re-check the trigger, then move the current
//!    memtable into the frozen slot and install an empty one
//! 3. Write the snapshot to a new segment without holding the state lock
//! 4. Under the state write lock: append the segment, clear the frozen slot
//!
//! The coordinator lives behind the store's flush mutex, so only one flush
//! runs at a time. Writers that cross the threshold while a flush is running
//! wait on that mutex and re-check in step 2, which keeps a single crossing
//! from producing more than one segment.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::memtable::MemTable;
use crate::storage::SegmentDirectory;
use crate::store::StoreState;

/// Why a flush was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Flush only if the memtable holds at least this many bytes
    Threshold(usize),
    /// Flush whatever the memtable holds (`flush()`, `close()`)
    Forced,
}

/// Serializes frozen memtables into segments and publishes them
pub struct FlushCoordinator {
    directory: SegmentDirectory,
    /// Sequence number of the next segment; consumed only on success
    next_seq: u64,
}

impl FlushCoordinator {
    pub fn new(directory: SegmentDirectory, next_seq: u64) -> Self {
        Self {
            directory,
            next_seq,
        }
    }

    /// Run one flush round; returns the number of segments published
    ///
    /// On error the segment list is unchanged and the snapshot that failed to
    /// persist stays in the frozen slot, readable and retried next round.
    pub(crate) fn flush(&mut self, state: &RwLock<StoreState>, trigger: FlushTrigger) -> Result<usize> {
        if matches!(trigger, FlushTrigger::Threshold(_)) && state.read().closed {
            return Ok(0);
        }

        let mut published = 0;

        let pending = state.read().frozen.clone();
        if let Some(frozen) = pending {
            debug!(seq = self.next_seq, "retrying flush of frozen memtable");
            self.persist(state, &frozen)?;
            published += 1;
        }

        let frozen = {
            let mut guard = state.write();
            let due = match trigger {
                FlushTrigger::Threshold(limit) => guard.memtable.size() >= limit,
                FlushTrigger::Forced => !guard.memtable.is_empty(),
            };
            if !due {
                return Ok(published);
            }
            guard.freeze()
        };

        self.persist(state, &frozen)?;
        Ok(published + 1)
    }

    /// Write `frozen` as segment `next_seq` and link it into the state
    fn persist(&mut self, state: &RwLock<StoreState>, frozen: &Arc<MemTable>) -> Result<()> {
        let seq = self.next_seq;
        let entries = frozen.snapshot();
        debug!(seq, entries = entries.len(), bytes = frozen.size(), "flushing memtable");

        let segment = match self.directory.write_segment(seq, &entries) {
            Ok(segment) => segment,
            Err(e) => {
                error!(seq, error = %e, "flush failed, memtable snapshot retained");
                return Err(e);
            }
        };

        {
            let mut guard = state.write();
            guard.segments.push(Arc::clone(&segment));
            guard.frozen = None;
        }
        self.next_seq += 1;

        info!(
            seq,
            entries = segment.entry_count(),
            payload_bytes = segment.payload_bytes(),
            "segment published"
        );
        Ok(())
    }
}
