//! Snapshot Store
//!
//! Persists the position index so a restart does not have to rescan the log.
//!
//! ## File Format
//! One JSON array of `{"i": <id>, "p": <offset>}` objects, ascending by id:
//! ```text
//! [{"i":1,"p":40},{"i":2,"p":20}]
//! ```
//! The snapshot is a cache. Anything it says can be rebuilt from the log.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::error::{OffsetDbError, Result};
use crate::index::{IndexEntry, PositionIndex};

/// Reads and writes the snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Overwrite the snapshot with the index's ascending enumeration.
    ///
    /// Writes to a sibling temp file, fsyncs, then renames over the old
    /// snapshot, so a crash leaves either the old or the new file intact.
    /// Returns the number of entries written.
    pub fn save(&self, index: &PositionIndex) -> Result<usize> {
        let tmp_path = self.tmp_path();

        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &Ascending(index))?;
        writer.flush()?;

        let file = writer
            .into_inner()
            .map_err(|e| OffsetDbError::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(path = %self.path.display(), entries = index.len(), "snapshot saved");
        Ok(index.len())
    }

    /// Load the snapshot's entries
    ///
    /// Fails with `OffsetDbError::Snapshot` when the file is missing,
    /// malformed, or not strictly ascending by id. Never returns a partial
    /// list.
    pub fn load(&self) -> Result<Vec<IndexEntry>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(OffsetDbError::Snapshot(format!(
                    "no snapshot at {}",
                    self.path.display()
                )));
            }
            Err(e) => {
                return Err(OffsetDbError::Snapshot(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let entries: Vec<IndexEntry> = serde_json::from_slice(&bytes).map_err(|e| {
            OffsetDbError::Snapshot(format!("malformed snapshot {}: {}", self.path.display(), e))
        })?;

        if let Some(pair) = entries.windows(2).find(|w| w[0].id >= w[1].id) {
            return Err(OffsetDbError::Snapshot(format!(
                "snapshot ids out of order: {} then {}",
                pair[0].id, pair[1].id
            )));
        }

        Ok(entries)
    }

    /// Whether a snapshot file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Serializes an index as a JSON array without collecting it first
struct Ascending<'a>(&'a PositionIndex);

impl Serialize for Ascending<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}
