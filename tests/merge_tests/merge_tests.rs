//! Merge Reader Tests
//!
//! Tests verify:
//! - Newest source wins for point lookups
//! - Tombstones shadow older values
//! - Range scans are ascending, de-duplicated and tombstone-free
//! - Merging memtables with segments

use std::sync::Arc;

use bytes::Bytes;
use segstore::memtable::MemTable;
use segstore::merge::{MergeReader, Source};
use segstore::storage::{Segment, SegmentBuilder};
use segstore::Entry;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn memtable(pairs: &[(&str, Option<&str>)]) -> Source {
    let table = MemTable::new();
    for (key, value) in pairs {
        match value {
            Some(v) => table.put_value(key.as_bytes().to_vec(), v.as_bytes().to_vec()),
            None => table.delete(key.as_bytes().to_vec()),
        };
    }
    Source::MemTable(Arc::new(table))
}

fn segment(dir: &TempDir, seq: u64, pairs: &[(&str, Option<&str>)]) -> Source {
    let data_path = dir.path().join(format!("{}.data", seq));
    let index_path = dir.path().join(format!("{}.index", seq));

    let mut builder = SegmentBuilder::new(&data_path, &index_path, seq)
        .unwrap()
        .sync_on_finish(false);
    for (key, value) in pairs {
        match value {
            Some(v) => builder.add_value(key.as_bytes(), v.as_bytes()).unwrap(),
            None => builder.add_tombstone(key.as_bytes()).unwrap(),
        }
    }
    builder.finish().unwrap();

    Source::Segment(Arc::new(
        Segment::open(seq, &data_path, &index_path).unwrap(),
    ))
}

fn scan(reader: &MergeReader, from: Option<&str>, to: Option<&str>) -> Vec<(String, String)> {
    reader
        .range(from.map(str::as_bytes), to.map(str::as_bytes))
        .unwrap()
        .map(|item| {
            let (k, v) = item.unwrap();
            (
                String::from_utf8(k.to_vec()).unwrap(),
                String::from_utf8(v.to_vec()).unwrap(),
            )
        })
        .collect()
}

fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    expected
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// =============================================================================
// Point Lookup Tests
// =============================================================================

#[test]
fn test_get_empty_reader() {
    let reader = MergeReader::new(Vec::new());

    assert_eq!(reader.get(b"key").unwrap(), None);
    assert_eq!(reader.range(None, None).unwrap().count(), 0);
}

#[test]
fn test_get_newest_source_wins() {
    let dir = TempDir::new().unwrap();
    let reader = MergeReader::new(vec![
        memtable(&[("a", Some("mem"))]),
        segment(&dir, 2, &[("a", Some("seg2")), ("b", Some("seg2"))]),
        segment(&dir, 1, &[("a", Some("seg1")), ("b", Some("seg1")), ("c", Some("seg1"))]),
    ]);

    assert_eq!(
        reader.get(b"a").unwrap(),
        Some(Entry::Value(Bytes::from_static(b"mem")))
    );
    assert_eq!(
        reader.get(b"b").unwrap(),
        Some(Entry::Value(Bytes::from_static(b"seg2")))
    );
    assert_eq!(
        reader.get(b"c").unwrap(),
        Some(Entry::Value(Bytes::from_static(b"seg1")))
    );
    assert_eq!(reader.get(b"d").unwrap(), None);
}

#[test]
fn test_get_tombstone_shadows_older_value() {
    let dir = TempDir::new().unwrap();
    let reader = MergeReader::new(vec![
        segment(&dir, 2, &[("a", None)]),
        segment(&dir, 1, &[("a", Some("old"))]),
    ]);

    assert_eq!(reader.get(b"a").unwrap(), Some(Entry::Tombstone));
}

#[test]
fn test_get_value_revives_older_tombstone() {
    let dir = TempDir::new().unwrap();
    let reader = MergeReader::new(vec![
        memtable(&[("a", Some("new"))]),
        segment(&dir, 1, &[("a", None)]),
    ]);

    assert_eq!(
        reader.get(b"a").unwrap(),
        Some(Entry::Value(Bytes::from_static(b"new")))
    );
}

// =============================================================================
// Range Tests
// =============================================================================

#[test]
fn test_range_merges_disjoint_sources() {
    let dir = TempDir::new().unwrap();
    let reader = MergeReader::new(vec![
        memtable(&[("b", Some("2")), ("e", Some("5"))]),
        segment(&dir, 2, &[("c", Some("3"))]),
        segment(&dir, 1, &[("a", Some("1")), ("d", Some("4"))]),
    ]);

    assert_eq!(
        scan(&reader, None, None),
        pairs(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "5")])
    );
}

#[test]
fn test_range_newest_version_per_key() {
    let dir = TempDir::new().unwrap();
    let reader = MergeReader::new(vec![
        memtable(&[("b", Some("mem"))]),
        segment(&dir, 2, &[("a", Some("s2")), ("b", Some("s2"))]),
        segment(&dir, 1, &[("a", Some("s1")), ("b", Some("s1")), ("c", Some("s1"))]),
    ]);

    assert_eq!(
        scan(&reader, None, None),
        pairs(&[("a", "s2"), ("b", "mem"), ("c", "s1")])
    );
}

#[test]
fn test_range_skips_tombstones() {
    let dir = TempDir::new().unwrap();
    let reader = MergeReader::new(vec![
        memtable(&[("a", None), ("z", None)]),
        segment(&dir, 1, &[("a", Some("1")), ("b", Some("2"))]),
    ]);

    assert_eq!(scan(&reader, None, None), pairs(&[("b", "2")]));
}

#[test]
fn test_range_bounds_across_sources() {
    let dir = TempDir::new().unwrap();
    let reader = MergeReader::new(vec![
        memtable(&[("a", Some("1")), ("c", Some("3")), ("e", Some("5"))]),
        segment(&dir, 1, &[("b", Some("2")), ("d", Some("4")), ("f", Some("6"))]),
    ]);

    assert_eq!(
        scan(&reader, Some("b"), Some("e")),
        pairs(&[("b", "2"), ("c", "3"), ("d", "4")])
    );
    assert_eq!(scan(&reader, Some("f"), None), pairs(&[("f", "6")]));
    assert!(scan(&reader, Some("x"), Some("a")).is_empty());
}

#[test]
fn test_range_matches_point_lookups() {
    let dir = TempDir::new().unwrap();
    let reader = MergeReader::new(vec![
        memtable(&[("k03", None), ("k05", Some("m")), ("k09", Some("m"))]),
        segment(&dir, 2, &[("k01", None), ("k03", Some("s2")), ("k07", Some("s2"))]),
        segment(&dir, 1, &[("k01", Some("s1")), ("k05", Some("s1")), ("k08", Some("s1"))]),
    ]);

    for (key, value) in scan(&reader, None, None) {
        assert_eq!(
            reader.get(key.as_bytes()).unwrap(),
            Some(Entry::Value(Bytes::from(value)))
        );
    }
    assert_eq!(
        scan(&reader, None, None),
        pairs(&[("k05", "m"), ("k07", "s2"), ("k08", "s1"), ("k09", "m")])
    );
}

#[test]
fn test_reader_keeps_sources() {
    let reader = MergeReader::new(vec![memtable(&[]), memtable(&[])]);

    assert_eq!(reader.sources().len(), 2);
}
