//! Storage Module
//!
//! Persistent storage layer made of immutable sorted segments.
//!
//! ## Responsibilities
//! - Persist frozen memtables to disk in sorted format
//! - Point lookups in O(log n) key comparisons
//! - Lazy range iteration for merged scans
//! - Discover committed segments on startup, in creation order
//!
//! ## Layout
//! ```text
//! {working_dir}/segments/
//!   segment_000001.data     records, sorted by key
//!   segment_000001.index    offsets + metadata, written last (commit point)
//!   segment_000002.data
//!   segment_000002.index
//! ```

mod directory;
pub mod segment;

pub use directory::SegmentDirectory;
pub use segment::{Segment, SegmentBuilder, SegmentIterator, SegmentMeta};
