//! # segstore
//!
//! A persistent key-value store with:
//! - An in-memory sorted memtable that absorbs writes
//! - Threshold-triggered flushes to immutable sorted segments
//! - Merged reads across the memtable and all segments, newest wins
//! - Tombstones for deletes, distinct from empty values
//! - Crash-consistent segment publication and a flushing `close()`
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Store (facade)                         │
//! │          get / upsert / range / flush / close               │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │ writes                       │ reads
//!                ▼                              ▼
//!         ┌─────────────┐               ┌──────────────┐
//!         │  MemTable   │◄──────────────│ Merge Reader │
//!         │  (RwLock)   │               │ newest first │
//!         └──────┬──────┘               └──────┬───────┘
//!                │ size >= threshold           │
//!                ▼                             │
//!      ┌───────────────────┐                   │
//!      │ Flush Coordinator │                   │
//!      │  (one at a time)  │                   │
//!      └─────────┬─────────┘                   │
//!                ▼                             ▼
//!         ┌─────────────────────────────────────────┐
//!         │     Segments (data + index, mmap)       │
//!         └─────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod entry;
pub mod flush;
pub mod memtable;
pub mod merge;
pub mod storage;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use entry::Entry;
pub use error::{Result, StoreError};
pub use merge::MergeIterator;
pub use store::{Store, StoreStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of segstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
