//! Journal Writer
//!
//! Owns the store file: holds its exclusive lock, appends frames, and swaps
//! in a compacted copy.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::config::SyncStrategy;
use crate::error::{AtlasError, Result};

use super::entry::{encode_frame, file_header, HEADER_SIZE};
use super::recovery::{JournalRecovery, RecoveryReport};
use super::Operation;

/// Appends operations to the store file
pub struct Journal {
    path: PathBuf,
    file: File,
    /// End of the last fully written frame
    offset: u64,
    sync_strategy: SyncStrategy,
    /// Frames written since the last fsync
    unsynced: usize,
}

impl Journal {
    /// Open or create the store file, lock it, and recover its operations
    ///
    /// A torn final frame is cut off before the journal accepts new writes.
    pub fn open(
        path: &Path,
        sync_strategy: SyncStrategy,
    ) -> Result<(Self, Vec<Operation>, RecoveryReport)> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        lock_exclusive(&file, path)?;

        let (operations, report) = JournalRecovery::recover_from(&mut file)?;

        if report.was_truncated() {
            warn!(
                path = %path.display(),
                bytes = report.bytes_truncated,
                "truncating torn write at end of store file"
            );
            file.set_len(report.valid_len)?;
            file.sync_all()?;
        }

        let mut offset = report.valid_len;
        if offset == 0 {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&file_header())?;
            file.sync_all()?;
            offset = HEADER_SIZE;
        }
        file.seek(SeekFrom::Start(offset))?;

        let journal = Self {
            path: path.to_path_buf(),
            file,
            offset,
            sync_strategy,
            unsynced: 0,
        };

        Ok((journal, operations, report))
    }

    /// Append an operation; returns the offset it was written at
    ///
    /// A failed write is rolled back by truncating to the previous offset.
    pub fn append(&mut self, operation: &Operation) -> Result<u64> {
        let frame = encode_frame(operation)?;
        let start = self.offset;

        if let Err(e) = self.write_frame(&frame) {
            warn!(offset = start, error = %e, "journal append failed; rolling back");
            self.rollback(start)?;
            return Err(e);
        }

        self.offset += frame.len() as u64;
        debug!(offset = start, len = frame.len(), bucket = operation.bucket(), "journal append");
        Ok(start)
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.file.write_all(frame)?;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count.max(1),
        };
        if due {
            self.sync()?;
        }
        Ok(())
    }

    fn rollback(&mut self, offset: u64) -> Result<()> {
        self.file.set_len(offset)?;
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Replace the file contents with `operations`
    ///
    /// The new contents are written to `{path}.compact`, synced, locked and
    /// renamed over the store file, so a crash leaves either the old or the
    /// new file in place. On failure the partial copy is removed and the
    /// journal keeps appending to the old file.
    pub fn rewrite(&mut self, operations: &[Operation]) -> Result<()> {
        let tmp_path = compaction_path(&self.path);

        let swapped = write_compacted(&tmp_path, operations).and_then(|tmp| {
            fs::rename(&tmp_path, &self.path)?;
            Ok(tmp)
        });
        let mut tmp = match swapped {
            Ok(tmp) => tmp,
            Err(e) => {
                if tmp_path.is_file() {
                    if let Err(cleanup) = fs::remove_file(&tmp_path) {
                        warn!(
                            path = %tmp_path.display(),
                            error = %cleanup,
                            "could not remove partial compaction file"
                        );
                    }
                }
                return Err(e);
            }
        };

        let before = self.offset;
        let offset = tmp.seek(SeekFrom::End(0))?;
        self.file = tmp;
        self.offset = offset;
        self.unsynced = 0;

        info!(
            path = %self.path.display(),
            before,
            after = offset,
            frames = operations.len(),
            "store file compacted"
        );
        Ok(())
    }

    /// Sync and release the file lock
    pub fn close(mut self) -> Result<()> {
        self.sync()?;
        FileExt::unlock(&self.file)?;
        Ok(())
    }

    /// Current end-of-data offset (file size)
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

fn write_compacted(tmp_path: &Path, operations: &[Operation]) -> Result<File> {
    let tmp = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp_path)?;
    lock_exclusive(&tmp, tmp_path)?;

    let mut writer = BufWriter::new(tmp);
    writer.write_all(&file_header())?;
    for operation in operations {
        writer.write_all(&encode_frame(operation)?)?;
    }
    writer.flush()?;

    let tmp = writer.into_inner().map_err(|e| AtlasError::Io(e.into_error()))?;
    tmp.sync_all()?;
    Ok(tmp)
}

fn compaction_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".compact");
    PathBuf::from(name)
}

fn lock_exclusive(file: &File, path: &Path) -> Result<()> {
    file.try_lock_exclusive().map_err(|e| {
        if e.kind() == fs2::lock_contended_error().kind() {
            AtlasError::Locked(format!("{} is open in another handle", path.display()))
        } else {
            AtlasError::Io(e)
        }
    })
}
