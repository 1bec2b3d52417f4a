//! Journal Recovery
//!
//! Reads the store file front to back and returns every intact operation.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{AtlasError, Result};

use super::entry::{
    decode_payload, file_header, FRAME_HEADER_SIZE, HEADER_SIZE, MAGIC, MAX_FRAME_SIZE, VERSION,
};
use super::Operation;

/// Handles journal recovery after a restart or crash
pub struct JournalRecovery;

/// Result of a recovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Number of intact frames replayed
    pub frames_recovered: u64,

    /// Length of the file prefix that holds only intact data
    pub valid_len: u64,

    /// Bytes after `valid_len` belonging to a torn final write
    pub bytes_truncated: u64,
}

impl RecoveryReport {
    /// Whether a torn tail was found (and, on open, cut off)
    pub fn was_truncated(&self) -> bool {
        self.bytes_truncated > 0
    }
}

impl JournalRecovery {
    /// Recover all operations from a store file
    ///
    /// This will:
    /// 1. Validate the file header
    /// 2. Read frames in order, checking length and CRC
    /// 3. Treat a damaged *final* frame, or a zero-filled tail, as a torn
    ///    write (reported, not fatal)
    /// 4. Fail with `Corruption` if a damaged frame is followed by more data,
    ///    or a length field exceeds `MAX_FRAME_SIZE`
    pub fn recover(path: &Path) -> Result<(Vec<Operation>, RecoveryReport)> {
        let mut file = File::open(path)?;
        Self::recover_from(&mut file)
    }

    /// Verify integrity of a store file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryReport> {
        Self::recover(path).map(|(_, report)| report)
    }

    /// Recover from an already open file handle (position is reset)
    pub(crate) fn recover_from(file: &mut File) -> Result<(Vec<Operation>, RecoveryReport)> {
        let file_len = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(file);

        // A brand new (or never written) file
        if file_len == 0 {
            return Ok((Vec::new(), RecoveryReport::default()));
        }

        if file_len < HEADER_SIZE {
            let mut prefix = vec![0u8; file_len as usize];
            reader.read_exact(&mut prefix)?;
            if prefix[..] != file_header()[..file_len as usize] {
                return Err(AtlasError::Corruption(
                    "File is too short to be an AtlasDB store".to_string(),
                ));
            }
            warn!(file_len, "torn store header; file will be reinitialized");
            return Ok((
                Vec::new(),
                RecoveryReport {
                    frames_recovered: 0,
                    valid_len: 0,
                    bytes_truncated: file_len,
                },
            ));
        }

        Self::check_header(&mut reader)?;

        let mut operations = Vec::new();
        let mut offset = HEADER_SIZE;

        while offset < file_len {
            let remaining = file_len - offset;
            if remaining < FRAME_HEADER_SIZE {
                warn!(offset, remaining, "partial frame header at end of store file");
                break;
            }

            let mut header = [0u8; FRAME_HEADER_SIZE as usize];
            reader.read_exact(&mut header)?;
            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length == 0 {
                // A preallocated tail that never received its data
                if expected_crc == 0 && Self::rest_is_zeroed(&mut reader)? {
                    warn!(offset, remaining, "zero-filled tail at end of store file");
                    break;
                }
                return Err(AtlasError::Corruption(format!(
                    "Empty frame at offset {}",
                    offset
                )));
            }

            if length > MAX_FRAME_SIZE as u64 {
                return Err(AtlasError::Corruption(format!(
                    "Frame length {} at offset {} exceeds maximum {}",
                    length, offset, MAX_FRAME_SIZE
                )));
            }

            let frame_end = offset + FRAME_HEADER_SIZE + length;
            if frame_end > file_len {
                warn!(offset, length, file_len, "frame runs past end of store file");
                break;
            }

            let mut payload = vec![0u8; length as usize];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                if frame_end == file_len {
                    warn!(offset, "CRC mismatch on final frame; treating as torn write");
                    break;
                }
                return Err(AtlasError::Corruption(format!(
                    "CRC mismatch at offset {} (expected {:08x}, got {:08x})",
                    offset, expected_crc, actual_crc
                )));
            }

            let operation = decode_payload(&payload).map_err(|e| {
                AtlasError::Corruption(format!("Undecodable frame at offset {}: {}", offset, e))
            })?;
            operations.push(operation);
            offset = frame_end;
        }

        let report = RecoveryReport {
            frames_recovered: operations.len() as u64,
            valid_len: offset,
            bytes_truncated: file_len - offset,
        };
        debug!(
            frames = report.frames_recovered,
            truncated = report.bytes_truncated,
            "journal recovery complete"
        );

        Ok((operations, report))
    }

    fn rest_is_zeroed<R: Read>(reader: &mut R) -> Result<bool> {
        let mut buf = [0u8; 4096];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                return Ok(true);
            }
            if buf[..n].iter().any(|&b| b != 0) {
                return Ok(false);
            }
        }
    }

    fn check_header<R: Read>(reader: &mut R) -> Result<()> {
        let mut header = [0u8; HEADER_SIZE as usize];
        reader.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(AtlasError::Corruption(format!(
                "Invalid store magic: expected ATDB, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(AtlasError::Corruption(format!(
                "Unsupported store version: {}",
                version
            )));
        }

        Ok(())
    }
}
