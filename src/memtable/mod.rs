//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Track size (key + value bytes) for flush triggers
//! - Ordered iteration for segment creation and range scans
//!
//! ## Data Structure Choice
//! BTreeMap wrapped in a parking_lot RwLock:
//! - Ordered keys (required for segment generation)
//! - Many concurrent readers, writers serialized per table
//!
//! A table never blocks on I/O. When it fills up the store swaps it for a
//! fresh one and the old table becomes a read-only frozen snapshot.

mod table;

pub use table::MemTable;
