//! Configuration for segstore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, StoreError};

/// Default flush threshold: 4 MB
pub const DEFAULT_FLUSH_THRESHOLD_BYTES: usize = 4 * 1024 * 1024;

/// Main configuration for a store instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {working_dir}/
    ///     └── segments/
    ///           ├── segment_000001.data
    ///           └── segment_000001.index
    pub working_dir: PathBuf,

    /// fsync segment files and the segments directory when publishing.
    /// Renames still make publication atomic when disabled.
    pub sync_on_flush: bool,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// MemTable size (key + value bytes) at which a flush is triggered
    pub flush_threshold_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("./segstore_data"),
            sync_on_flush: true,
            flush_threshold_bytes: DEFAULT_FLUSH_THRESHOLD_BYTES,
        }
    }
}

impl Config {
    /// Create a config for `working_dir` flushing at `flush_threshold_bytes`
    pub fn new(working_dir: impl Into<PathBuf>, flush_threshold_bytes: usize) -> Self {
        Self {
            working_dir: working_dir.into(),
            flush_threshold_bytes,
            ..Self::default()
        }
    }

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check values that cannot be fixed up at open time
    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold_bytes == 0 {
            return Err(StoreError::Config(
                "flush threshold must be a positive number of bytes".to_string(),
            ));
        }
        if self.working_dir.as_os_str().is_empty() {
            return Err(StoreError::Config("working directory is empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the working directory (root for all storage)
    pub fn working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_dir = path.into();
        self
    }

    /// Set the flush threshold (in bytes)
    pub fn flush_threshold_bytes(mut self, size: usize) -> Self {
        self.config.flush_threshold_bytes = size;
        self
    }

    /// Enable or disable fsync on flush
    pub fn sync_on_flush(mut self, sync: bool) -> Self {
        self.config.sync_on_flush = sync;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
