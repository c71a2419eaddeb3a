//! Segment Directory Tests
//!
//! Tests verify:
//! - Directory creation and working directory validation
//! - Atomic publication of new segments
//! - Loading committed segments in sequence order
//! - Cleanup of temporary and uncommitted files

use std::fs;

use bytes::Bytes;
use segstore::storage::SegmentDirectory;
use segstore::{Entry, StoreError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

fn entries(pairs: &[(&str, Option<&str>)]) -> Vec<(Bytes, Entry)> {
    pairs
        .iter()
        .map(|(k, v)| {
            let entry = match v {
                Some(v) => Entry::Value(Bytes::copy_from_slice(v.as_bytes())),
                None => Entry::Tombstone,
            };
            (Bytes::copy_from_slice(k.as_bytes()), entry)
        })
        .collect()
}

fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_segment_dir() {
    let temp_dir = setup_temp_dir();
    let working_dir = temp_dir.path().join("store");

    let (directory, segments) = SegmentDirectory::open(&working_dir, false).unwrap();

    assert!(segments.is_empty());
    assert!(directory.path().is_dir());
    assert_eq!(directory.path(), working_dir.join("segments"));
}

#[test]
fn test_open_rejects_file_as_working_dir() {
    let temp_dir = setup_temp_dir();
    let file_path = temp_dir.path().join("not_a_dir");
    fs::write(&file_path, b"data").unwrap();

    let result = SegmentDirectory::open(&file_path, false);

    assert!(matches!(result, Err(StoreError::Config(_))));
}

// =============================================================================
// Publication Tests
// =============================================================================

#[test]
fn test_write_segment_publishes_both_files() {
    let temp_dir = setup_temp_dir();
    let (directory, _) = SegmentDirectory::open(temp_dir.path(), false).unwrap();

    let segment = directory
        .write_segment(1, &entries(&[("a", Some("1")), ("b", None)]))
        .unwrap();

    assert_eq!(segment.seq(), 1);
    assert_eq!(segment.entry_count(), 2);
    assert_eq!(
        file_names(directory.path()),
        vec!["segment_000001.data", "segment_000001.index"]
    );
}

#[test]
fn test_write_segment_readable() {
    let temp_dir = setup_temp_dir();
    let (directory, _) = SegmentDirectory::open(temp_dir.path(), true).unwrap();

    let segment = directory
        .write_segment(1, &entries(&[("k", Some("v")), ("t", None)]))
        .unwrap();

    assert_eq!(
        segment.get(b"k").unwrap(),
        Some(Entry::Value(Bytes::from_static(b"v")))
    );
    assert_eq!(segment.get(b"t").unwrap(), Some(Entry::Tombstone));
}

#[test]
fn test_write_segment_failure_leaves_nothing() {
    let temp_dir = setup_temp_dir();
    let (directory, _) = SegmentDirectory::open(temp_dir.path(), false).unwrap();

    // Unsorted input is rejected by the builder
    let result = directory.write_segment(1, &entries(&[("b", Some("1")), ("a", Some("2"))]));

    assert!(result.is_err());
    assert!(file_names(directory.path()).is_empty());

    // The same sequence number can be reused
    directory
        .write_segment(1, &entries(&[("a", Some("2")), ("b", Some("1"))]))
        .unwrap();
}

// =============================================================================
// Load Tests
// =============================================================================

#[test]
fn test_load_orders_by_sequence() {
    let temp_dir = setup_temp_dir();
    {
        let (directory, _) = SegmentDirectory::open(temp_dir.path(), false).unwrap();
        for seq in [3, 1, 10, 2] {
            directory
                .write_segment(seq, &entries(&[("k", Some("v"))]))
                .unwrap();
        }
    }

    let (_, segments) = SegmentDirectory::open(temp_dir.path(), false).unwrap();
    let seqs: Vec<u64> = segments.iter().map(|s| s.seq()).collect();

    assert_eq!(seqs, vec![1, 2, 3, 10]);
}

#[test]
fn test_load_removes_temporary_files() {
    let temp_dir = setup_temp_dir();
    let (directory, _) = SegmentDirectory::open(temp_dir.path(), false).unwrap();
    directory
        .write_segment(1, &entries(&[("k", Some("v"))]))
        .unwrap();

    fs::write(directory.path().join("segment_000002.data.tmp"), b"partial").unwrap();
    fs::write(directory.path().join("segment_000002.index.tmp"), b"partial").unwrap();

    let (directory, segments) = SegmentDirectory::open(temp_dir.path(), false).unwrap();

    assert_eq!(segments.len(), 1);
    assert_eq!(
        file_names(directory.path()),
        vec!["segment_000001.data", "segment_000001.index"]
    );
}

#[test]
fn test_load_removes_uncommitted_data() {
    let temp_dir = setup_temp_dir();
    let (directory, _) = SegmentDirectory::open(temp_dir.path(), false).unwrap();
    directory
        .write_segment(1, &entries(&[("k", Some("v"))]))
        .unwrap();
    directory
        .write_segment(2, &entries(&[("k", Some("w"))]))
        .unwrap();

    // Crash between the data rename and the index rename
    fs::remove_file(directory.index_path(2)).unwrap();

    let (directory, segments) = SegmentDirectory::open(temp_dir.path(), false).unwrap();

    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].seq(), 1);
    assert!(!directory.data_path(2).exists());
}

#[test]
fn test_load_index_without_data_is_corruption() {
    let temp_dir = setup_temp_dir();
    let (directory, _) = SegmentDirectory::open(temp_dir.path(), false).unwrap();
    directory
        .write_segment(1, &entries(&[("k", Some("v"))]))
        .unwrap();

    fs::remove_file(directory.data_path(1)).unwrap();

    let result = SegmentDirectory::open(temp_dir.path(), false);

    assert!(matches!(result, Err(StoreError::Corruption { .. })));
}

#[test]
fn test_load_ignores_foreign_files() {
    let temp_dir = setup_temp_dir();
    let (directory, _) = SegmentDirectory::open(temp_dir.path(), false).unwrap();
    fs::write(directory.path().join("README"), b"notes").unwrap();

    let (directory, segments) = SegmentDirectory::open(temp_dir.path(), false).unwrap();

    assert!(segments.is_empty());
    assert!(directory.path().join("README").exists());
}

// =============================================================================
// Path Tests
// =============================================================================

#[test]
fn test_segment_paths() {
    let temp_dir = setup_temp_dir();
    let (directory, _) = SegmentDirectory::open(temp_dir.path(), false).unwrap();

    let data = directory.data_path(42);
    let index = directory.index_path(42);

    assert!(data.ends_with("segment_000042.data"));
    assert!(index.ends_with("segment_000042.index"));
    assert_eq!(SegmentDirectory::parse_seq(&data), Some(42));
    assert_eq!(SegmentDirectory::parse_seq(&index), Some(42));
    assert_eq!(SegmentDirectory::parse_seq(std::path::Path::new("other.data")), None);
}
