//! Segment Builder
//!
//! Writes sorted entries to a new data file and its index file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::entry::{entry_cost, Entry};
use crate::error::{Result, StoreError};

use super::{
    SegmentIndex, SegmentMeta, DATA_HEADER_SIZE, DATA_MAGIC, INDEX_MAGIC, TOMBSTONE_MARKER,
    VERSION,
};

/// Builder for creating new segments from sorted entries
pub struct SegmentBuilder {
    seq: u64,
    data_path: PathBuf,
    index_path: PathBuf,
    /// Buffered writer for the data file
    writer: BufWriter<File>,
    /// Current write position (start of the next record)
    current_offset: u64,
    /// Record offsets in key order
    offsets: Vec<u64>,
    payload_bytes: u64,
    min_key: Option<Vec<u8>>,
    max_key: Option<Vec<u8>>,
    /// Running CRC over every byte of the data file
    data_hasher: crc32fast::Hasher,
    /// fsync both files in `finish()`
    sync: bool,
}

impl SegmentBuilder {
    /// Create a new segment builder
    ///
    /// Writes the data header immediately; call `add()` in strictly ascending
    /// key order, then `finish()` to write the index.
    pub fn new(data_path: &Path, index_path: &Path, seq: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(data_path)?;

        let mut writer = BufWriter::new(file);
        let mut data_hasher = crc32fast::Hasher::new();

        let version = VERSION.to_le_bytes();
        writer.write_all(DATA_MAGIC)?;
        writer.write_all(&version)?;
        data_hasher.update(DATA_MAGIC);
        data_hasher.update(&version);

        Ok(Self {
            seq,
            data_path: data_path.to_path_buf(),
            index_path: index_path.to_path_buf(),
            writer,
            current_offset: DATA_HEADER_SIZE,
            offsets: Vec::new(),
            payload_bytes: 0,
            min_key: None,
            max_key: None,
            data_hasher,
            sync: true,
        })
    }

    /// Enable or disable fsync when finishing (enabled by default)
    pub fn sync_on_finish(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Add an entry (must be called in strictly ascending key order)
    pub fn add(&mut self, key: &[u8], entry: &Entry) -> Result<()> {
        if let Some(last) = &self.max_key {
            if key <= last.as_slice() {
                return Err(StoreError::Storage(format!(
                    "segment {} keys must be strictly ascending",
                    self.seq
                )));
            }
        }

        let key_len = u32::try_from(key.len())
            .map_err(|_| StoreError::Storage(format!("key of {} bytes is too large", key.len())))?;
        let val_len = match entry {
            Entry::Value(v) => match u32::try_from(v.len()) {
                Ok(len) if len != TOMBSTONE_MARKER => len,
                _ => {
                    return Err(StoreError::Storage(format!(
                        "value of {} bytes is too large",
                        v.len()
                    )))
                }
            },
            Entry::Tombstone => TOMBSTONE_MARKER,
        };

        self.offsets.push(self.current_offset);
        if self.min_key.is_none() {
            self.min_key = Some(key.to_vec());
        }
        self.max_key = Some(key.to_vec());

        // [key_len(4)][val_len(4)][key][value]
        let key_len_bytes = key_len.to_le_bytes();
        let val_len_bytes = val_len.to_le_bytes();

        self.writer.write_all(&key_len_bytes)?;
        self.writer.write_all(&val_len_bytes)?;
        self.writer.write_all(key)?;

        self.data_hasher.update(&key_len_bytes);
        self.data_hasher.update(&val_len_bytes);
        self.data_hasher.update(key);

        let mut record_size: u64 = 8 + key.len() as u64;
        if let Entry::Value(v) = entry {
            self.writer.write_all(v)?;
            self.data_hasher.update(v);
            record_size += v.len() as u64;
        }

        self.current_offset += record_size;
        self.payload_bytes += entry_cost(key, entry) as u64;

        Ok(())
    }

    /// Add a live value
    pub fn add_value(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.add(key, &Entry::Value(bytes::Bytes::copy_from_slice(value)))
    }

    /// Add a tombstone
    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.add(key, &Entry::Tombstone)
    }

    /// Number of entries added so far
    pub fn entry_count(&self) -> usize {
        self.offsets.len()
    }

    /// Finish building: flush the data file, write the index, return metadata
    pub fn finish(mut self) -> Result<SegmentMeta> {
        self.writer.flush()?;
        let file = self.writer.into_inner().map_err(|e| {
            StoreError::Storage(format!("Failed to flush segment data: {}", e))
        })?;
        if self.sync {
            file.sync_all()?;
        }
        let data_size = self.current_offset;
        drop(file);

        let index = SegmentIndex {
            version: VERSION,
            seq: self.seq,
            entry_count: self.offsets.len() as u64,
            payload_bytes: self.payload_bytes,
            data_len: data_size,
            data_crc: self.data_hasher.finalize(),
            min_key: self.min_key.unwrap_or_default(),
            max_key: self.max_key.unwrap_or_default(),
            offsets: self.offsets,
        };

        let payload = bincode::serialize(&index)?;
        let payload_crc = crc32fast::hash(&payload);

        let mut index_file = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.index_path)?,
        );
        index_file.write_all(INDEX_MAGIC)?;
        index_file.write_all(&payload_crc.to_le_bytes())?;
        index_file.write_all(&payload)?;
        index_file.flush()?;

        let index_file = index_file.into_inner().map_err(|e| {
            StoreError::Storage(format!("Failed to flush segment index: {}", e))
        })?;
        if self.sync {
            index_file.sync_all()?;
        }
        let index_size = index_file.metadata()?.len();

        tracing::trace!(
            seq = self.seq,
            data = %self.data_path.display(),
            entries = index.entry_count,
            "segment files written"
        );

        Ok(SegmentMeta {
            seq: self.seq,
            entry_count: index.entry_count,
            payload_bytes: index.payload_bytes,
            min_key: index.min_key,
            max_key: index.max_key,
            data_size,
            index_size,
        })
    }
}
