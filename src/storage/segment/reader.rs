//! Segment Reader
//!
//! Opens a published segment and provides O(log n) key lookups by binary
//! searching the offset table against keys decoded from the mapped data.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use memmap2::Mmap;

use crate::entry::Entry;
use crate::error::{Result, StoreError};

use super::iterator::SegmentIterator;
use super::{
    read_u16, read_u32, SegmentIndex, SegmentMeta, DATA_HEADER_SIZE, DATA_MAGIC,
    INDEX_HEADER_SIZE, INDEX_MAGIC, RECORD_HEADER_SIZE, TOMBSTONE_MARKER, VERSION,
};

/// A published, immutable segment
///
/// The data file is memory mapped read-only, so any number of threads can
/// read it concurrently without locking.
pub struct Segment {
    data_path: PathBuf,
    index_path: PathBuf,
    data: Mmap,
    index: SegmentIndex,
    index_size: u64,
}

impl Segment {
    /// Open a segment for reading
    ///
    /// Validates both files before the segment is usable: magic numbers,
    /// version, sequence number, data length and both checksums. Any mismatch
    /// is reported as [`StoreError::Corruption`].
    pub fn open(seq: u64, data_path: &Path, index_path: &Path) -> Result<Self> {
        let (index, index_size) = Self::read_index(index_path)?;

        if index.seq != seq {
            return Err(StoreError::corruption(
                index_path,
                format!("index belongs to segment {}, expected {}", index.seq, seq),
            ));
        }
        if index.offsets.len() as u64 != index.entry_count {
            return Err(StoreError::corruption(
                index_path,
                format!(
                    "index lists {} offsets for {} entries",
                    index.offsets.len(),
                    index.entry_count
                ),
            ));
        }

        let file = File::open(data_path)?;
        let data_len = file.metadata()?.len();
        if data_len != index.data_len {
            return Err(StoreError::corruption(
                data_path,
                format!("data file is {} bytes, index expects {}", data_len, index.data_len),
            ));
        }
        if data_len < DATA_HEADER_SIZE {
            return Err(StoreError::corruption(data_path, "data file is truncated"));
        }

        // SAFETY: segment files are never modified after publication; the
        // store only ever creates new files and renames them into place.
        let data = unsafe { Mmap::map(&file)? };

        if &data[0..4] != DATA_MAGIC {
            return Err(StoreError::corruption(
                data_path,
                format!("invalid data magic {:?}", &data[0..4]),
            ));
        }
        let version = read_u16(&data, 4);
        if version != VERSION {
            return Err(StoreError::corruption(
                data_path,
                format!("unsupported data version {}", version),
            ));
        }
        if crc32fast::hash(&data) != index.data_crc {
            return Err(StoreError::corruption(data_path, "data checksum mismatch"));
        }

        Ok(Self {
            data_path: data_path.to_path_buf(),
            index_path: index_path.to_path_buf(),
            data,
            index,
            index_size,
        })
    }

    fn read_index(index_path: &Path) -> Result<(SegmentIndex, u64)> {
        let raw = fs::read(index_path)?;
        if raw.len() < INDEX_HEADER_SIZE {
            return Err(StoreError::corruption(index_path, "index file is truncated"));
        }
        if &raw[0..4] != INDEX_MAGIC {
            return Err(StoreError::corruption(
                index_path,
                format!("invalid index magic {:?}", &raw[0..4]),
            ));
        }

        let payload = &raw[INDEX_HEADER_SIZE..];
        if crc32fast::hash(payload) != read_u32(&raw, 4) {
            return Err(StoreError::corruption(index_path, "index checksum mismatch"));
        }

        let index: SegmentIndex = bincode::deserialize(payload)
            .map_err(|e| StoreError::corruption(index_path, format!("undecodable index: {}", e)))?;
        if index.version != VERSION {
            return Err(StoreError::corruption(
                index_path,
                format!("unsupported index version {}", index.version),
            ));
        }
        Ok((index, raw.len() as u64))
    }

    /// Get the entry for a key in O(log n) key comparisons
    ///
    /// Returns:
    /// - `Ok(Some(Entry::Value(_)))`: key found with value
    /// - `Ok(Some(Entry::Tombstone))`: key found, deleted as of this segment
    /// - `Ok(None)`: key not in this segment
    pub fn get(&self, key: &[u8]) -> Result<Option<Entry>> {
        if !self.might_contain(key) {
            return Ok(None);
        }

        let position = self.lower_bound(key)?;
        if position == self.len() {
            return Ok(None);
        }

        let (found, value) = self.record_at(position)?;
        if found != key {
            return Ok(None);
        }
        Ok(Some(match value {
            Some(v) => Entry::Value(Bytes::copy_from_slice(v)),
            None => Entry::Tombstone,
        }))
    }

    /// Lazy ascending iteration over keys in `[from, to)`
    pub fn iter(self: &Arc<Self>, from: Option<&[u8]>, to: Option<&[u8]>) -> Result<SegmentIterator> {
        let start = match from {
            Some(key) => self.lower_bound(key)?,
            None => 0,
        };
        Ok(SegmentIterator::new(
            Arc::clone(self),
            start,
            to.map(Bytes::copy_from_slice),
        ))
    }

    /// Index of the first record whose key is `>= key`
    pub(crate) fn lower_bound(&self, key: &[u8]) -> Result<usize> {
        let (mut low, mut high) = (0, self.len());
        while low < high {
            let mid = low + (high - low) / 2;
            if self.record_at(mid)?.0 < key {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        Ok(low)
    }

    /// Decode record `position` as (key, value); `None` value is a tombstone
    pub(crate) fn record_at(&self, position: usize) -> Result<(&[u8], Option<&[u8]>)> {
        let offset = *self
            .index
            .offsets
            .get(position)
            .ok_or_else(|| self.corrupt(format!("record {} out of range", position)))?
            as usize;

        let header = self
            .data
            .get(offset..offset + RECORD_HEADER_SIZE)
            .ok_or_else(|| self.corrupt(format!("record header at {} out of bounds", offset)))?;
        let key_len = read_u32(header, 0) as usize;
        let val_len = read_u32(header, 4);

        let key_start = offset + RECORD_HEADER_SIZE;
        let key_end = key_start + key_len;
        let key = self
            .data
            .get(key_start..key_end)
            .ok_or_else(|| self.corrupt(format!("key at {} out of bounds", key_start)))?;

        if val_len == TOMBSTONE_MARKER {
            return Ok((key, None));
        }

        let value = self
            .data
            .get(key_end..key_end + val_len as usize)
            .ok_or_else(|| self.corrupt(format!("value at {} out of bounds", key_end)))?;
        Ok((key, Some(value)))
    }

    fn corrupt(&self, reason: String) -> StoreError {
        StoreError::corruption(&self.data_path, reason)
    }

    fn len(&self) -> usize {
        self.index.offsets.len()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Creation sequence number (higher is newer)
    pub fn seq(&self) -> u64 {
        self.index.seq
    }

    pub fn entry_count(&self) -> u64 {
        self.index.entry_count
    }

    /// Sum of key + value bytes stored in this segment
    pub fn payload_bytes(&self) -> u64 {
        self.index.payload_bytes
    }

    /// Get the minimum key in this segment (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        (self.index.entry_count > 0).then_some(self.index.min_key.as_slice())
    }

    /// Get the maximum key in this segment (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        (self.index.entry_count > 0).then_some(self.index.max_key.as_slice())
    }

    /// Quick check if a key might be in this segment (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false,
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Metadata summary of this segment
    pub fn meta(&self) -> SegmentMeta {
        SegmentMeta {
            seq: self.index.seq,
            entry_count: self.index.entry_count,
            payload_bytes: self.index.payload_bytes,
            min_key: self.index.min_key.clone(),
            max_key: self.index.max_key.clone(),
            data_size: self.index.data_len,
            index_size: self.index_size,
        }
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("seq", &self.index.seq)
            .field("entry_count", &self.index.entry_count)
            .field("data_path", &self.data_path)
            .finish()
    }
}
