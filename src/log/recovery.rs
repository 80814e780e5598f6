//! Log Recovery
//!
//! Rebuilds the position index by scanning the record log line by line.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use crate::error::Result;
use crate::index::PositionIndex;

use super::Record;

/// Scans the record log to reconstruct a position index
pub struct RecoveryScanner;

/// Result of a recovery scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of lines that parsed and were inserted into the index
    pub records_indexed: u64,

    /// Number of non-empty lines that failed to parse (left unreachable)
    pub lines_skipped: u64,

    /// Bytes read by the scan
    pub bytes_scanned: u64,

    /// Offset just past the last byte scanned
    pub end_offset: u64,
}

impl RecoveryScanner {
    /// Scan the whole log into `index`
    pub fn scan(path: &Path, index: &mut PositionIndex) -> Result<RecoveryResult> {
        Self::scan_from(path, 0, index)
    }

    /// Scan the log from `start` (which must be a line boundary) into `index`
    ///
    /// Every line's offset is tracked from its byte length, newline
    /// included. Lines that do not parse as a record with a valid `id` are
    /// skipped; their bytes stay in the log. Later lines for an id replace
    /// earlier ones, so rescanning an unchanged log is idempotent.
    pub fn scan_from(path: &Path, start: u64, index: &mut PositionIndex) -> Result<RecoveryResult> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(start))?;
        let mut reader = BufReader::new(file);

        let mut result = RecoveryResult {
            end_offset: start,
            ..RecoveryResult::default()
        };
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line)?;
            if read == 0 {
                break;
            }

            let line_start = result.end_offset;
            result.end_offset += read as u64;
            result.bytes_scanned += read as u64;

            let content = trim_line(&line);
            if content.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match Record::parse_line(content) {
                Ok(record) => {
                    index.insert(record.id(), line_start);
                    result.records_indexed += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        offset = line_start,
                        len = content.len(),
                        error = %e,
                        "skipping unreadable log line"
                    );
                    result.lines_skipped += 1;
                }
            }
        }

        tracing::debug!(
            start,
            end = result.end_offset,
            indexed = result.records_indexed,
            skipped = result.lines_skipped,
            "log scan finished"
        );

        Ok(result)
    }

    /// Scan the log without keeping the index it builds
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let mut scratch = PositionIndex::new();
        Self::scan(path, &mut scratch)
    }
}

/// Strip the trailing `\n` (and a `\r` before it)
fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
