//! Tests for the store file journal
//!
//! These tests verify:
//! - Header creation and frame appends
//! - Recovery from a clean file and an empty file
//! - Recovery with a torn final frame (truncated on open)
//! - Corruption errors for damaged frames followed by more data
//! - Zero-filled tails treated as torn writes, oversized lengths as corruption
//! - Exclusive locking of the store file
//! - Rewrite (compaction) replaces the contents atomically

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use atlasdb::config::SyncStrategy;
use atlasdb::journal::{encode_frame, Journal, JournalRecovery, Operation, FRAME_HEADER_SIZE, HEADER_SIZE};
use atlasdb::{AtlasError, ErrorKind, Schema};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_file() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");
    (temp_dir, path)
}

fn put(key: u64) -> Operation {
    Operation::Put {
        bucket: "Entry".to_string(),
        key,
        record: format!("record{}", key).into_bytes(),
    }
}

/// Schema frame followed by `count` puts
fn write_ops(path: &Path, count: u64) {
    let (mut journal, _, _) = Journal::open(path, SyncStrategy::EveryWrite).unwrap();
    journal.append(&Operation::Schema(Schema::new("Entry"))).unwrap();
    for key in 1..=count {
        journal.append(&put(key)).unwrap();
    }
    journal.close().unwrap();
}

fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

fn flip_byte(path: &Path, offset: usize) {
    let mut bytes = fs::read(path).unwrap();
    bytes[offset] ^= 0xff;
    fs::write(path, bytes).unwrap();
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_open_creates_file_with_header() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("dir").join("store.db");

    let (journal, operations, report) = Journal::open(&path, SyncStrategy::EveryWrite).unwrap();

    assert!(operations.is_empty());
    assert_eq!(report.frames_recovered, 0);
    assert_eq!(journal.offset(), HEADER_SIZE);
    journal.close().unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], b"ATDB");
    assert_eq!(bytes.len() as u64, HEADER_SIZE);
}

#[test]
fn test_append_advances_offset_by_frame_size() {
    let (_temp, path) = setup_temp_file();
    let (mut journal, _, _) = Journal::open(&path, SyncStrategy::EveryWrite).unwrap();

    let frame = encode_frame(&put(1)).unwrap();
    let first = journal.append(&put(1)).unwrap();
    let second = journal.append(&put(2)).unwrap();

    assert_eq!(first, HEADER_SIZE);
    assert_eq!(second, HEADER_SIZE + frame.len() as u64);
    assert_eq!(journal.offset(), fs::metadata(&path).unwrap().len());
}

#[test]
fn test_frame_layout() {
    let frame = encode_frame(&put(9)).unwrap();
    let len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    let crc = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);

    assert_eq!(len, frame.len() - FRAME_HEADER_SIZE as usize);
    assert_eq!(crc, crc32fast::hash(&frame[FRAME_HEADER_SIZE as usize..]));
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, path) = setup_temp_file();
    fs::File::create(&path).unwrap();

    let (operations, report) = JournalRecovery::recover(&path).unwrap();

    assert!(operations.is_empty());
    assert_eq!(report.valid_len, 0);
    assert!(!report.was_truncated());
}

#[test]
fn test_recover_clean_file_in_order() {
    let (_temp, path) = setup_temp_file();
    write_ops(&path, 3);

    let (operations, report) = JournalRecovery::recover(&path).unwrap();

    assert_eq!(operations.len(), 4);
    assert_eq!(report.frames_recovered, 4);
    assert!(!report.was_truncated());
    assert!(matches!(operations[0], Operation::Schema(_)));
    assert_eq!(operations[1], put(1));
    assert_eq!(operations[3], put(3));
}

#[test]
fn test_torn_final_frame_is_reported_by_verify() {
    let (_temp, path) = setup_temp_file();
    write_ops(&path, 2);

    let frame = encode_frame(&put(3)).unwrap();
    append_raw(&path, &frame[..frame.len() / 2]);

    let report = JournalRecovery::verify(&path).unwrap();
    assert_eq!(report.frames_recovered, 3);
    assert_eq!(report.bytes_truncated, (frame.len() / 2) as u64);
}

#[test]
fn test_open_truncates_torn_tail() {
    let (_temp, path) = setup_temp_file();
    write_ops(&path, 2);
    let clean_len = fs::metadata(&path).unwrap().len();

    let frame = encode_frame(&put(3)).unwrap();
    append_raw(&path, &frame[..frame.len() - 1]);

    let (mut journal, operations, report) = Journal::open(&path, SyncStrategy::EveryWrite).unwrap();
    assert_eq!(operations.len(), 3);
    assert!(report.was_truncated());
    assert_eq!(report.valid_len, clean_len);
    assert_eq!(fs::metadata(&path).unwrap().len(), clean_len);

    // New appends land where the torn frame started
    assert_eq!(journal.append(&put(3)).unwrap(), clean_len);
    journal.close().unwrap();

    let (operations, _) = JournalRecovery::recover(&path).unwrap();
    assert_eq!(operations.last(), Some(&put(3)));
}

#[test]
fn test_partial_frame_header_is_torn() {
    let (_temp, path) = setup_temp_file();
    write_ops(&path, 1);
    append_raw(&path, &[1, 2, 3]);

    let (operations, report) = JournalRecovery::recover(&path).unwrap();
    assert_eq!(operations.len(), 2);
    assert_eq!(report.bytes_truncated, 3);
}

#[test]
fn test_crc_mismatch_on_final_frame_is_torn() {
    let (_temp, path) = setup_temp_file();
    write_ops(&path, 2);

    let len = fs::metadata(&path).unwrap().len() as usize;
    flip_byte(&path, len - 1);

    let (operations, report) = JournalRecovery::recover(&path).unwrap();
    assert_eq!(operations.len(), 2);
    assert!(report.was_truncated());
}

#[test]
fn test_crc_mismatch_mid_file_is_corruption() {
    let (_temp, path) = setup_temp_file();
    write_ops(&path, 3);

    // Inside the payload of the first frame (the schema)
    flip_byte(&path, (HEADER_SIZE + FRAME_HEADER_SIZE + 2) as usize);

    let err = JournalRecovery::recover(&path).unwrap_err();
    assert!(matches!(err, AtlasError::Corruption(_)));
    assert_eq!(err.kind(), ErrorKind::StorageIo);
}

#[test]
fn test_oversized_frame_length_is_corruption() {
    let (_temp, path) = setup_temp_file();
    write_ops(&path, 5);
    let len = fs::metadata(&path).unwrap().len();

    // High byte of the first frame's length
    let mut bytes = fs::read(&path).unwrap();
    bytes[HEADER_SIZE as usize + 3] = 0x7f;
    fs::write(&path, bytes).unwrap();

    let err = Journal::open(&path, SyncStrategy::EveryWrite).err().unwrap();
    assert!(matches!(err, AtlasError::Corruption(_)));

    // Nothing was cut off
    assert_eq!(fs::metadata(&path).unwrap().len(), len);
}

#[test]
fn test_zero_filled_tail_is_torn() {
    let (_temp, path) = setup_temp_file();
    write_ops(&path, 2);
    let clean_len = fs::metadata(&path).unwrap().len();
    append_raw(&path, &[0u8; 64]);

    let (mut journal, operations, report) = Journal::open(&path, SyncStrategy::EveryWrite).unwrap();
    assert_eq!(operations.len(), 3);
    assert_eq!(report.valid_len, clean_len);
    assert_eq!(report.bytes_truncated, 64);
    assert_eq!(fs::metadata(&path).unwrap().len(), clean_len);

    journal.append(&put(3)).unwrap();
    journal.close().unwrap();

    let (operations, report) = JournalRecovery::recover(&path).unwrap();
    assert_eq!(operations.len(), 4);
    assert!(!report.was_truncated());
}

#[test]
fn test_zeros_followed_by_data_is_corruption() {
    let (_temp, path) = setup_temp_file();
    write_ops(&path, 1);
    append_raw(&path, &[0u8; 16]);
    append_raw(&path, &encode_frame(&put(2)).unwrap());

    let err = JournalRecovery::recover(&path).unwrap_err();
    assert!(matches!(err, AtlasError::Corruption(_)));
}

#[test]
fn test_bad_magic_is_corruption() {
    let (_temp, path) = setup_temp_file();
    fs::write(&path, b"NOPE\x01\x00rest-of-file").unwrap();

    let err = JournalRecovery::recover(&path).unwrap_err();
    assert!(matches!(err, AtlasError::Corruption(_)));
}

// =============================================================================
// Locking Tests
// =============================================================================

#[test]
fn test_second_open_is_locked() {
    let (_temp, path) = setup_temp_file();
    let (journal, _, _) = Journal::open(&path, SyncStrategy::EveryWrite).unwrap();

    let err = Journal::open(&path, SyncStrategy::EveryWrite).err().unwrap();
    assert!(matches!(err, AtlasError::Locked(_)));
    assert_eq!(err.kind(), ErrorKind::Concurrency);

    journal.close().unwrap();
    assert!(Journal::open(&path, SyncStrategy::EveryWrite).is_ok());
}

// =============================================================================
// Rewrite Tests
// =============================================================================

#[test]
fn test_rewrite_replaces_contents() {
    let (_temp, path) = setup_temp_file();
    write_ops(&path, 10);
    let before = fs::metadata(&path).unwrap().len();

    let (mut journal, _, _) = Journal::open(&path, SyncStrategy::EveryWrite).unwrap();
    let live = vec![Operation::Schema(Schema::new("Entry")), put(10)];
    journal.rewrite(&live).unwrap();

    let after = journal.offset();
    assert!(after < before);
    assert_eq!(fs::metadata(&path).unwrap().len(), after);

    // The handle keeps appending to the rewritten file
    journal.append(&put(11)).unwrap();
    journal.close().unwrap();

    let (operations, _) = JournalRecovery::recover(&path).unwrap();
    assert_eq!(operations, vec![Operation::Schema(Schema::new("Entry")), put(10), put(11)]);
    assert!(!path.with_extension("db.compact").exists());
}

#[test]
fn test_failed_rewrite_keeps_old_file() {
    let (_temp, path) = setup_temp_file();
    write_ops(&path, 3);
    let before = fs::metadata(&path).unwrap().len();

    // The compaction target cannot be created as a file
    let blocker = PathBuf::from(format!("{}.compact", path.display()));
    fs::create_dir(&blocker).unwrap();

    let (mut journal, _, _) = Journal::open(&path, SyncStrategy::EveryWrite).unwrap();
    assert!(journal.rewrite(&[Operation::Schema(Schema::new("Entry"))]).is_err());
    assert_eq!(journal.offset(), before);

    journal.append(&put(4)).unwrap();
    journal.close().unwrap();

    let (operations, _) = JournalRecovery::recover(&path).unwrap();
    assert_eq!(operations.len(), 5);
    assert_eq!(operations.last(), Some(&put(4)));
    assert!(blocker.is_dir());
}
