//! Record Log Tests
//!
//! Tests verify:
//! - Record validation and id canonicalization
//! - Line serialization keeps a contiguous `"id":<n>` token
//! - Append offsets and positioned reads
//! - Growing reads for records larger than the chunk size
//! - Recovery scan: offsets, skipped lines, idempotence

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use offsetdb::config::LogSyncStrategy;
use offsetdb::index::PositionIndex;
use offsetdb::log::{Record, RecordLog, RecoveryScanner};
use offsetdb::OffsetDbError;
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn log_path(dir: &TempDir) -> PathBuf {
    dir.path().join("records.jsonl")
}

fn open_log(path: &Path) -> RecordLog {
    RecordLog::open(path, LogSyncStrategy::EveryWrite).unwrap()
}

fn write_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().create(true).append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

// =============================================================================
// Record Tests
// =============================================================================

#[test]
fn test_record_requires_id() {
    let err = Record::from_value(json!({"name": "A"})).unwrap_err();
    assert!(matches!(err, OffsetDbError::Validation(_)));
}

#[test]
fn test_record_rejects_non_object() {
    let err = Record::from_value(json!([1, 2, 3])).unwrap_err();
    assert!(matches!(err, OffsetDbError::Validation(_)));
}

#[test]
fn test_record_rejects_negative_and_fractional_ids() {
    for bad in [json!(-1), json!(1.5), json!(null), json!(true), json!("12a"), json!("")] {
        let err = Record::from_value(json!({"id": bad})).unwrap_err();
        assert!(matches!(err, OffsetDbError::Validation(_)));
    }
}

#[test]
fn test_record_accepts_id_zero() {
    let record = Record::from_value(json!({"id": 0})).unwrap();
    assert_eq!(record.id(), 0);
}

#[test]
fn test_record_string_id_is_canonicalized() {
    let record = Record::from_value(json!({"id": "42", "name": "A"})).unwrap();

    assert_eq!(record.id(), 42);
    assert_eq!(record.get("id"), Some(&json!(42)));
    assert_eq!(record.into_value(), json!({"id": 42, "name": "A"}));
}

#[test]
fn test_merged_id_wins() {
    let partial = json!({"id": 99, "name": "B"});
    let record = Record::merged(7, partial.as_object().unwrap().clone());

    assert_eq!(record.id(), 7);
    assert_eq!(record.get("name"), Some(&json!("B")));
}

#[test]
fn test_with_field_cannot_change_id() {
    let record = Record::new(3).with_field("id", 4).with_field("name", "C");
    assert_eq!(record.id(), 3);
    assert_eq!(record.get("name"), Some(&json!("C")));
}

#[test]
fn test_to_line_is_compact_and_newline_terminated() {
    let record = Record::from_value(json!({"id": 12, "name": "A B"})).unwrap();
    let line = record.to_line().unwrap();
    let text = String::from_utf8(line).unwrap();

    assert!(text.ends_with('\n'));
    assert_eq!(text.matches('\n').count(), 1);
    assert!(text.contains("\"id\":12"));
}

#[test]
fn test_parse_line_ignores_whitespace() {
    let record = Record::parse_line(br#"{ "name" : "A",   "id" :   5 }"#).unwrap();
    assert_eq!(record.id(), 5);
}

#[test]
fn test_parse_line_rejects_truncated_json() {
    assert!(Record::parse_line(br#"{"id":3,"name":"tru"#).is_err());
}

// =============================================================================
// RecordLog Tests
// =============================================================================

#[test]
fn test_open_creates_file() {
    let dir = TempDir::new().unwrap();
    let path = log_path(&dir);

    let log = open_log(&path);

    assert!(path.exists());
    assert!(log.is_empty().unwrap());
}

#[test]
fn test_append_returns_length_before_write() {
    let dir = TempDir::new().unwrap();
    let mut log = open_log(&log_path(&dir));

    let first = log.append(b"{\"id\":1}\n").unwrap();
    let second = log.append(b"{\"id\":2,\"x\":1}\n").unwrap();

    assert_eq!(first, 0);
    assert_eq!(second, 9);
    assert_eq!(log.len().unwrap(), 9 + 15);
}

#[test]
fn test_read_at_short_near_eof() {
    let dir = TempDir::new().unwrap();
    let mut log = open_log(&log_path(&dir));
    log.append(b"abc\n").unwrap();

    assert_eq!(log.read_at(0, 100).unwrap(), b"abc\n".to_vec());
    assert_eq!(log.read_at(2, 100).unwrap(), b"c\n".to_vec());
    assert!(log.read_at(10, 100).unwrap().is_empty());
}

#[test]
fn test_read_line_stops_at_newline() {
    let dir = TempDir::new().unwrap();
    let mut log = open_log(&log_path(&dir));
    let a = log.append(b"first\n").unwrap();
    let b = log.append(b"second\n").unwrap();

    assert_eq!(log.read_line(a, 4096).unwrap(), Some(b"first".to_vec()));
    assert_eq!(log.read_line(b, 4096).unwrap(), Some(b"second".to_vec()));
    assert_eq!(log.read_line(1000, 4096).unwrap(), None);
}

#[test]
fn test_read_line_grows_past_chunk_size() {
    let dir = TempDir::new().unwrap();
    let mut log = open_log(&log_path(&dir));

    let big = "x".repeat(10_000);
    let offset = log.append(format!("{}\n", big).as_bytes()).unwrap();
    log.append(b"next\n").unwrap();

    let line = log.read_line(offset, 16).unwrap().unwrap();
    assert_eq!(line.len(), 10_000);
}

#[test]
fn test_read_with_unbounded_size_stops_at_eof() {
    let dir = TempDir::new().unwrap();
    let mut log = open_log(&log_path(&dir));
    let a = log.append(b"first\n").unwrap();
    let b = log.append(b"second\n").unwrap();

    assert_eq!(log.read_at(b, usize::MAX).unwrap(), b"second\n".to_vec());
    assert_eq!(log.read_line(a, usize::MAX).unwrap(), Some(b"first".to_vec()));
    assert_eq!(log.read_line(1000, usize::MAX).unwrap(), None);
}

#[test]
fn test_open_terminates_partial_trailing_line() {
    let dir = TempDir::new().unwrap();
    let path = log_path(&dir);
    write_raw(&path, b"{\"id\":1}\n{\"id\":2,\"na");

    let mut log = open_log(&path);
    let offset = log.append(b"{\"id\":3}\n").unwrap();

    let content = fs::read(&path).unwrap();
    assert_eq!(content, b"{\"id\":1}\n{\"id\":2,\"na\n{\"id\":3}\n".to_vec());
    assert_eq!(log.read_line(offset, 64).unwrap(), Some(b"{\"id\":3}".to_vec()));
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_scan_tracks_byte_offsets() {
    let dir = TempDir::new().unwrap();
    let path = log_path(&dir);
    // Multi-byte UTF-8 must be counted in bytes, not characters
    write_raw(&path, "{\"id\":1,\"name\":\"Zoë\"}\n{\"id\":2}\n".as_bytes());

    let mut index = PositionIndex::new();
    let result = RecoveryScanner::scan(&path, &mut index).unwrap();

    let first_len = "{\"id\":1,\"name\":\"Zoë\"}\n".len() as u64;
    assert_eq!(index.find_position(1), Some(0));
    assert_eq!(index.find_position(2), Some(first_len));
    assert_eq!(result.records_indexed, 2);
    assert_eq!(result.end_offset, first_len + 9);
}

#[test]
fn test_scan_latest_line_wins() {
    let dir = TempDir::new().unwrap();
    let path = log_path(&dir);
    write_raw(&path, b"{\"id\":1,\"v\":1}\n{\"id\":2}\n{\"id\":1,\"v\":2}\n");

    let mut index = PositionIndex::new();
    RecoveryScanner::scan(&path, &mut index).unwrap();

    assert_eq!(index.len(), 2);
    assert_eq!(index.find_position(1), Some(24));
}

#[test]
fn test_scan_skips_malformed_line() {
    let dir = TempDir::new().unwrap();
    let path = log_path(&dir);
    write_raw(&path, b"{\"id\":1}\n{\"id\":2,\"name\":\"bro\n{\"id\":3}\n");

    let mut index = PositionIndex::new();
    let result = RecoveryScanner::scan(&path, &mut index).unwrap();

    assert_eq!(result.records_indexed, 2);
    assert_eq!(result.lines_skipped, 1);
    assert_eq!(index.find_position(1), Some(0));
    assert_eq!(index.find_position(2), None);
    // Offset accounting continues past the bad line
    assert_eq!(index.find_position(3), Some(9 + 20));
}

#[test]
fn test_scan_skips_lines_without_valid_id() {
    let dir = TempDir::new().unwrap();
    let path = log_path(&dir);
    write_raw(&path, b"{\"name\":\"no id\"}\n[1,2]\n{\"id\":-4}\n{\"id\":5}\n");

    let mut index = PositionIndex::new();
    let result = RecoveryScanner::scan(&path, &mut index).unwrap();

    assert_eq!(result.lines_skipped, 3);
    assert_eq!(index.len(), 1);
    assert!(index.contains(5));
}

#[test]
fn test_scan_ignores_blank_lines() {
    let dir = TempDir::new().unwrap();
    let path = log_path(&dir);
    write_raw(&path, b"\n{\"id\":1}\n\n   \n{\"id\":2}\n");

    let mut index = PositionIndex::new();
    let result = RecoveryScanner::scan(&path, &mut index).unwrap();

    assert_eq!(result.lines_skipped, 0);
    assert_eq!(index.find_position(1), Some(1));
    assert_eq!(index.find_position(2), Some(1 + 9 + 1 + 4));
}

#[test]
fn test_scan_accepts_spaced_id() {
    let dir = TempDir::new().unwrap();
    let path = log_path(&dir);
    write_raw(&path, b"{\"id\" : 8, \"name\": \"spaced\"}\n");

    let mut index = PositionIndex::new();
    RecoveryScanner::scan(&path, &mut index).unwrap();

    assert_eq!(index.find_position(8), Some(0));
}

#[test]
fn test_scan_from_offset() {
    let dir = TempDir::new().unwrap();
    let path = log_path(&dir);
    write_raw(&path, b"{\"id\":1}\n{\"id\":2}\n");

    let mut index = PositionIndex::new();
    let result = RecoveryScanner::scan_from(&path, 9, &mut index).unwrap();

    assert_eq!(index.len(), 1);
    assert_eq!(index.find_position(2), Some(9));
    assert_eq!(result.bytes_scanned, 9);
    assert_eq!(result.end_offset, 18);
}

#[test]
fn test_scan_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = log_path(&dir);
    write_raw(&path, b"{\"id\":3}\n{\"id\":1}\nbad\n{\"id\":3,\"v\":2}\n{\"id\":2}\n");

    let mut first = PositionIndex::new();
    let first_result = RecoveryScanner::scan(&path, &mut first).unwrap();
    let mut second = PositionIndex::new();
    let second_result = RecoveryScanner::scan(&path, &mut second).unwrap();

    assert_eq!(first.entries(), second.entries());
    assert_eq!(first_result, second_result);

    // Scanning again into the same index changes nothing either
    RecoveryScanner::scan(&path, &mut first).unwrap();
    assert_eq!(first.entries(), second.entries());
}

#[test]
fn test_verify_reports_without_index() {
    let dir = TempDir::new().unwrap();
    let path = log_path(&dir);
    write_raw(&path, b"{\"id\":1}\nnot json\n");

    let result = RecoveryScanner::verify(&path).unwrap();

    assert_eq!(result.records_indexed, 1);
    assert_eq!(result.lines_skipped, 1);
    assert_eq!(result.bytes_scanned, 18);
}
