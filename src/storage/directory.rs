//! Segment Directory
//!
//! Owns the on-disk layout of segments.
//!
//! ## Responsibilities
//! - Validate the working directory on startup
//! - Discover committed segments, oldest → newest
//! - Remove temporary and uncommitted files left by a crash
//! - Publish new segments atomically
//!
//! ## Publication protocol
//! Both files are written under `*.tmp` names and synced. The data file is
//! renamed first and the index last: a segment exists exactly when its
//! index file exists under its final name. A data file without an index is
//! the remains of an interrupted flush and is removed at startup.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::entry::Entry;
use crate::error::{Result, StoreError};

use super::{Segment, SegmentBuilder};

const FILE_PREFIX: &str = "segment_";
const DATA_EXT: &str = "data";
const INDEX_EXT: &str = "index";
const TMP_EXT: &str = "tmp";

/// Handle on the `segments/` directory inside the working directory
#[derive(Debug, Clone)]
pub struct SegmentDirectory {
    dir: PathBuf,
    sync: bool,
}

impl SegmentDirectory {
    /// Name of the segments directory under the working directory
    pub const SEGMENT_DIR: &'static str = "segments";

    /// Open or create the segment directory and load committed segments
    ///
    /// Returns the directory handle and the segments ordered oldest first.
    /// An unusable working directory is a [`StoreError::Config`] error.
    pub fn open(working_dir: &Path, sync: bool) -> Result<(Self, Vec<Arc<Segment>>)> {
        if working_dir.exists() && !working_dir.is_dir() {
            return Err(StoreError::Config(format!(
                "working directory {} is not a directory",
                working_dir.display()
            )));
        }

        let dir = working_dir.join(Self::SEGMENT_DIR);
        fs::create_dir_all(&dir).map_err(|e| {
            StoreError::Config(format!("cannot use {}: {}", dir.display(), e))
        })?;

        let directory = Self { dir, sync };
        let segments = directory.load()?;
        Ok((directory, segments))
    }

    /// Scan the directory, clean up leftovers, open committed segments
    fn load(&self) -> Result<Vec<Arc<Segment>>> {
        // seq → (has data file, has index file)
        let mut found: BTreeMap<u64, (bool, bool)> = BTreeMap::new();

        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if !path.is_file() {
                continue;
            }

            if path.extension().is_some_and(|ext| ext == TMP_EXT) {
                warn!(path = %path.display(), "removing temporary segment file");
                remove_if_exists(&path)?;
                continue;
            }

            let Some(seq) = Self::parse_seq(&path) else {
                continue;
            };
            let slot = found.entry(seq).or_insert((false, false));
            match path.extension().and_then(|ext| ext.to_str()) {
                Some(DATA_EXT) => slot.0 = true,
                Some(INDEX_EXT) => slot.1 = true,
                _ => {}
            }
        }

        let mut segments = Vec::with_capacity(found.len());
        for (seq, (has_data, has_index)) in found {
            let data_path = self.data_path(seq);
            let index_path = self.index_path(seq);
            match (has_data, has_index) {
                (true, true) => {
                    segments.push(Arc::new(Segment::open(seq, &data_path, &index_path)?));
                }
                (true, false) => {
                    warn!(seq, path = %data_path.display(), "removing uncommitted segment data");
                    remove_if_exists(&data_path)?;
                }
                (false, true) => {
                    return Err(StoreError::corruption(
                        data_path,
                        "segment index exists but its data file is missing",
                    ));
                }
                (false, false) => {}
            }
        }

        info!(
            dir = %self.dir.display(),
            segments = segments.len(),
            "segment directory loaded"
        );
        Ok(segments)
    }

    /// Write `entries` (sorted, unique keys) as segment `seq` and publish it
    ///
    /// On error nothing is left behind under a committed name and the caller
    /// may retry with the same sequence number.
    pub fn write_segment(&self, seq: u64, entries: &[(bytes::Bytes, Entry)]) -> Result<Arc<Segment>> {
        let data_path = self.data_path(seq);
        let index_path = self.index_path(seq);
        let data_tmp = tmp_path(&data_path);
        let index_tmp = tmp_path(&index_path);

        let written = self.write_files(seq, entries, &data_tmp, &index_tmp);
        if let Err(e) = written {
            self.discard(&[&data_tmp, &index_tmp, &data_path]);
            return Err(e);
        }

        let committed = self.commit(&data_tmp, &data_path, &index_tmp, &index_path);
        if let Err(e) = committed {
            self.discard(&[&data_tmp, &index_tmp, &index_path, &data_path]);
            return Err(e);
        }

        match Segment::open(seq, &data_path, &index_path) {
            Ok(segment) => Ok(Arc::new(segment)),
            Err(e) => {
                self.discard(&[&index_path, &data_path]);
                Err(e)
            }
        }
    }

    fn write_files(
        &self,
        seq: u64,
        entries: &[(bytes::Bytes, Entry)],
        data_tmp: &Path,
        index_tmp: &Path,
    ) -> Result<()> {
        let mut builder = SegmentBuilder::new(data_tmp, index_tmp, seq)?.sync_on_finish(self.sync);
        for (key, entry) in entries {
            builder.add(key, entry)?;
        }
        builder.finish()?;
        Ok(())
    }

    /// Rename data then index into place; the index rename commits
    fn commit(
        &self,
        data_tmp: &Path,
        data_path: &Path,
        index_tmp: &Path,
        index_path: &Path,
    ) -> Result<()> {
        fs::rename(data_tmp, data_path)?;
        fs::rename(index_tmp, index_path)?;
        self.sync_dir()
    }

    /// Best-effort removal of files from a failed publication
    fn discard(&self, paths: &[&Path]) {
        for path in paths {
            if let Err(e) = remove_if_exists(path) {
                warn!(path = %path.display(), error = %e, "failed to remove segment file");
            }
        }
    }

    fn sync_dir(&self) -> Result<()> {
        if self.sync {
            File::open(&self.dir)?.sync_all()?;
        }
        Ok(())
    }

    // =========================================================================
    // Paths
    // =========================================================================

    /// Directory holding segment files
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// "segment_000042.data"
    pub fn data_path(&self, seq: u64) -> PathBuf {
        self.dir.join(format!("{}{:06}.{}", FILE_PREFIX, seq, DATA_EXT))
    }

    /// "segment_000042.index"
    pub fn index_path(&self, seq: u64) -> PathBuf {
        self.dir.join(format!("{}{:06}.{}", FILE_PREFIX, seq, INDEX_EXT))
    }

    /// Parse the sequence number from a segment file name
    /// "segment_000042.data" → Some(42)
    pub fn parse_seq(path: &Path) -> Option<u64> {
        let name = path.file_stem()?.to_str()?;
        name.strip_prefix(FILE_PREFIX)?.parse().ok()
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(TMP_EXT);
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
