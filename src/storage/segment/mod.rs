//! Segment Module
//!
//! Immutable on-disk sorted key-value storage, one data file plus one index
//! file per segment.
//!
//! ## File Format
//! ```text
//! segment_NNNNNN.data
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (6 bytes)                                        │
//! │   Magic: "SGDT" (4) | Version: u16 (2)                  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Records (variable)                                      │
//! │   [KeyLen: u32][ValLen: u32][Key][Value]                │
//! │   ... repeated for each entry, ascending key order ...  │
//! │   (ValLen = u32::MAX means tombstone, no value bytes)   │
//! └─────────────────────────────────────────────────────────┘
//!
//! segment_NNNNNN.index
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (8 bytes)                                        │
//! │   Magic: "SGIX" (4) | PayloadCRC: u32 (4)               │
//! ├─────────────────────────────────────────────────────────┤
//! │ Payload: bincode-encoded SegmentIndex                   │
//! │   seq, counts, data length + CRC, min/max key,          │
//! │   one record offset per entry                           │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod iterator;
mod reader;

use serde::{Deserialize, Serialize};

pub use builder::SegmentBuilder;
pub use iterator::SegmentIterator;
pub use reader::Segment;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying a segment data file
pub(crate) const DATA_MAGIC: &[u8; 4] = b"SGDT";

/// Magic bytes identifying a segment index file
pub(crate) const INDEX_MAGIC: &[u8; 4] = b"SGIX";

/// Current segment format version
pub(crate) const VERSION: u16 = 1;

/// Data header size: Magic (4) + Version (2) = 6 bytes
pub(crate) const DATA_HEADER_SIZE: u64 = 6;

/// Index header size: Magic (4) + PayloadCRC (4) = 8 bytes
pub(crate) const INDEX_HEADER_SIZE: usize = 8;

/// Record header size: KeyLen (4) + ValLen (4) = 8 bytes
pub(crate) const RECORD_HEADER_SIZE: usize = 8;

/// Sentinel value indicating a tombstone (deleted key)
pub(crate) const TOMBSTONE_MARKER: u32 = u32::MAX;

// =============================================================================
// Index Payload
// =============================================================================

/// Contents of an index file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SegmentIndex {
    pub version: u16,
    /// Creation sequence number; must match the file name
    pub seq: u64,
    pub entry_count: u64,
    /// Sum of key + value bytes, same accounting as the memtable
    pub payload_bytes: u64,
    /// Exact length of the data file
    pub data_len: u64,
    /// CRC32 of the whole data file
    pub data_crc: u32,
    pub min_key: Vec<u8>,
    pub max_key: Vec<u8>,
    /// File offset of each record, in key order
    pub offsets: Vec<u64>,
}

// =============================================================================
// Segment Metadata
// =============================================================================

/// Summary of a written segment, returned by [`SegmentBuilder::finish`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMeta {
    pub seq: u64,
    pub entry_count: u64,
    pub payload_bytes: u64,
    /// Smallest key (for range filtering)
    pub min_key: Vec<u8>,
    /// Largest key (for range filtering)
    pub max_key: Vec<u8>,
    pub data_size: u64,
    pub index_size: u64,
}

impl SegmentMeta {
    /// Quick check if a key might be in this segment (range check)
    pub fn might_contain(&self, key: &[u8]) -> bool {
        self.entry_count > 0 && key >= self.min_key.as_slice() && key <= self.max_key.as_slice()
    }
}

/// Read a little-endian u32 at `pos`; the caller guarantees bounds
pub(crate) fn read_u32(buf: &[u8], pos: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[pos..pos + 4]);
    u32::from_le_bytes(bytes)
}

/// Read a little-endian u16 at `pos`; the caller guarantees bounds
pub(crate) fn read_u16(buf: &[u8], pos: usize) -> u16 {
    let mut bytes = [0u8; 2];
    bytes.copy_from_slice(&buf[pos..pos + 2]);
    u16::from_le_bytes(bytes)
}
