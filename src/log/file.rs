//! Record Log file
//!
//! Appends records at end-of-file and reads single lines back by offset.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::LogSyncStrategy;
use crate::error::Result;

/// Append-only record log
///
/// There is no stored record length: a read over-fetches from the offset
/// and cuts at the first newline.
pub struct RecordLog {
    /// Path of the log file (recovery scans open their own handle)
    path: PathBuf,

    /// Read + append handle
    file: File,

    /// fsync cadence
    sync_strategy: LogSyncStrategy,

    /// Appends since the last fsync
    unsynced: usize,
}

impl RecordLog {
    /// Open or create the log file
    ///
    /// A final line left without its newline (a crash mid-append) is
    /// terminated so the next append starts on a fresh line.
    pub fn open(path: &Path, sync_strategy: LogSyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let mut log = Self {
            path: path.to_path_buf(),
            file,
            sync_strategy,
            unsynced: 0,
        };

        if !log.is_empty()? {
            let len = log.len()?;
            let tail = log.read_at(len - 1, 1)?;
            if tail.first() != Some(&b'\n') {
                tracing::warn!(
                    path = %log.path.display(),
                    offset = len,
                    "record log ends mid-line, terminating partial record"
                );
                log.file.write_all(b"\n")?;
                log.file.sync_data()?;
            }
        }

        Ok(log)
    }

    /// Append bytes, returning the offset they start at
    ///
    /// The offset is the file length queried immediately before the write.
    /// Safe only because the engine is the single writer.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.len()?;
        self.file.write_all(bytes)?;
        self.unsynced += 1;

        let should_sync = match self.sync_strategy {
            LogSyncStrategy::EveryWrite => true,
            LogSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if should_sync {
            self.sync()?;
        }

        Ok(offset)
    }

    /// Positioned read of up to `max_bytes` starting at `offset`.
    /// Returns fewer bytes near end-of-file.
    pub fn read_at(&mut self, offset: u64, max_bytes: usize) -> Result<Vec<u8>> {
        // Never reserve more than the file can actually hand back
        let remaining = self.len()?.saturating_sub(offset);
        let capacity = (max_bytes as u64).min(remaining) as usize;

        self.file.seek(SeekFrom::Start(offset))?;

        let mut buf = Vec::with_capacity(capacity);
        (&mut self.file).take(max_bytes as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Read the line starting at `offset`, without its newline
    ///
    /// Starts with a `chunk_size` read and doubles it until a newline or
    /// end-of-file shows up, so records larger than the chunk are never
    /// truncated. Returns `None` when `offset` is at or past end-of-file.
    pub fn read_line(&mut self, offset: u64, chunk_size: usize) -> Result<Option<Vec<u8>>> {
        let mut size = chunk_size.max(1);
        loop {
            let mut buf = self.read_at(offset, size)?;

            if let Some(end) = buf.iter().position(|&b| b == b'\n') {
                buf.truncate(end);
                return Ok(Some(buf));
            }

            // Short read: we hit end-of-file without a newline
            if buf.len() < size {
                return Ok(if buf.is_empty() { None } else { Some(buf) });
            }

            size = size.saturating_mul(2);
        }
    }

    /// Current file length in bytes
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Whether the log holds no bytes
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Force appended data to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
