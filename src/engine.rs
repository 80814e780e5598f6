//! Engine Module
//!
//! The storage engine that owns the record log, the position index, and
//! the snapshot file.
//!
//! ## Responsibilities
//! - Choose the startup path: snapshot load, full log rescan, or fresh log
//! - Append records and keep the index pointing at their latest line
//! - Persist the index according to the snapshot policy
//! - Serve point lookups and ascending-id pages

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;

use crate::config::{Config, SnapshotPolicy};
use crate::error::{OffsetDbError, Result};
use crate::index::PositionIndex;
use crate::log::{Record, RecordId, RecordLog, RecoveryResult, RecoveryScanner};
use crate::snapshot::SnapshotStore;

/// One page of records, ascending by id
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Records on this page (unreadable entries are skipped)
    pub data: Vec<Record>,

    /// Number of ids in the index
    pub total: usize,

    /// Requested page number (1-based)
    pub page: usize,

    /// `ceil(total / limit)`
    pub total_pages: usize,
}

/// How the index was populated at the last open or rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    /// Loaded from the snapshot, plus any log tail it did not cover
    Snapshot,

    /// Rebuilt by scanning the whole log
    Rescan,

    /// The log did not exist and was created empty
    Fresh,
}

/// Point-in-time engine statistics
#[derive(Debug, Clone)]
pub struct EngineStats {
    /// Distinct ids in the index
    pub records: usize,

    /// Record log size in bytes
    pub log_bytes: u64,

    /// How the index was populated
    pub source: IndexSource,

    /// Log scan performed at open/rebuild (the tail scan after a snapshot load)
    pub recovery: RecoveryResult,

    /// Writes not yet reflected in the snapshot file
    pub writes_since_snapshot: u64,

    /// Lookups that found an offset but could not parse the line there
    pub unreadable_reads: u64,
}

/// The main storage engine
///
/// ## Concurrency Model: Single Writer
///
/// - **Writes** (insert/update/bulk load/rebuild): hold the `log` lock for
///   their whole duration, then take the index write lock. Lock order is
///   always log → index.
/// - **Reads** (find/get_many): take the index read lock to resolve offsets,
///   release it, then take the `log` lock for the positioned reads.
///
/// Offsets are never invalidated (the log is append-only), so a read that
/// races a write returns either the old or the new version of a record.
///
/// The engine is `Send + Sync`; wrap it in an `Arc` to share one instance
/// between request handlers.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Append-only record log; its lock also serializes writers
    log: Mutex<RecordLog>,

    /// id → offset of the latest line
    index: RwLock<PositionIndex>,

    /// Snapshot file for fast restarts
    snapshot: SnapshotStore,

    /// How the index was populated, and the scan that did it
    load_report: Mutex<(IndexSource, RecoveryResult)>,

    /// Writes since the last snapshot save
    writes_since_snapshot: AtomicU64,

    /// Reads that hit an unparsable line
    unreadable_reads: AtomicU64,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const LOG_FILENAME: &'static str = "records.jsonl";
    const SNAPSHOT_FILENAME: &'static str = "records.idx";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. No log yet: create it empty (and optionally seed it)
    /// 3. Log present: load the snapshot and replay the log tail it does
    ///    not cover
    /// 4. Snapshot missing or unusable: rescan the whole log, then save a
    ///    fresh snapshot
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Create data directory if it doesn't exist
        fs::create_dir_all(&config.data_dir)?;

        let log_path = config.data_dir.join(Self::LOG_FILENAME);
        let snapshot = SnapshotStore::new(config.data_dir.join(Self::SNAPSHOT_FILENAME));

        let log_existed = log_path.exists();
        let mut log = RecordLog::open(&log_path, config.sync_strategy)?;
        let mut index = PositionIndex::new();

        // Step 2-4: Populate the index
        let (source, recovery) = if !log_existed {
            tracing::info!(path = %log_path.display(), "created new record log");
            if snapshot.exists() {
                tracing::warn!(
                    path = %snapshot.path().display(),
                    "discarding snapshot left behind by a removed log"
                );
            }
            snapshot.save(&index)?;
            (IndexSource::Fresh, RecoveryResult::default())
        } else {
            match Self::load_snapshot(&snapshot, &mut log, &mut index, config.read_chunk_size) {
                Ok(tail) => {
                    tracing::info!(
                        records = index.len(),
                        tail_records = tail.records_indexed,
                        "loaded index from snapshot"
                    );
                    if tail.records_indexed > 0 || tail.lines_skipped > 0 {
                        snapshot.save(&index)?;
                    }
                    (IndexSource::Snapshot, tail)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "snapshot unusable, rebuilding index from log");
                    index.clear();
                    let result = RecoveryScanner::scan(&log_path, &mut index)?;
                    tracing::info!(
                        records = index.len(),
                        skipped = result.lines_skipped,
                        bytes = result.bytes_scanned,
                        "rebuilt index from log"
                    );
                    snapshot.save(&index)?;
                    (IndexSource::Rescan, result)
                }
            }
        };

        let engine = Self {
            config,
            log: Mutex::new(log),
            index: RwLock::new(index),
            snapshot,
            load_report: Mutex::new((source, recovery)),
            writes_since_snapshot: AtomicU64::new(0),
            unreadable_reads: AtomicU64::new(0),
        };

        // Step 5: Seed a brand-new log if asked to
        if source == IndexSource::Fresh {
            if let Some(count) = engine.config.seed_on_create {
                engine.bulk_load(count)?;
            }
        }

        Ok(engine)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Insert a record
    ///
    /// Fails with `Validation` if the value is not an object or its `id` is
    /// missing or not a non-negative integer. An existing id is overwritten
    /// (the new line becomes the live version). Returns the stored record
    /// with its canonical numeric id.
    pub fn insert(&self, value: Value) -> Result<Record> {
        let record = Record::from_value(value)?;
        self.insert_record(record)
    }

    /// Insert an already-validated record
    pub fn insert_record(&self, record: Record) -> Result<Record> {
        let mut log = self.log.lock();
        self.append_locked(&mut log, &record)?;
        tracing::debug!(id = record.id(), "saved record");
        Ok(record)
    }

    /// Update the record stored under `id`
    ///
    /// `partial` must be a JSON object; it replaces the stored fields, and
    /// `id` always wins over any id inside it. Returns `Ok(None)` when `id`
    /// has no live entry; nothing is written in that case.
    pub fn update(&self, id: RecordId, partial: Value) -> Result<Option<Record>> {
        let Value::Object(fields) = partial else {
            return Err(OffsetDbError::Validation(
                "update payload must be a JSON object".to_string(),
            ));
        };

        let mut log = self.log.lock();
        if !self.index.read().contains(id) {
            return Ok(None);
        }

        let record = Record::merged(id, fields);
        self.append_locked(&mut log, &record)?;
        tracing::debug!(id, "updated record");
        Ok(Some(record))
    }

    /// Look up a record by id
    ///
    /// Returns `None` for an unknown id, and also when the line at the
    /// indexed offset cannot be parsed (counted in `unreadable_reads`).
    pub fn find(&self, id: RecordId) -> Result<Option<Record>> {
        let Some(offset) = self.index.read().find_position(id) else {
            return Ok(None);
        };

        let mut log = self.log.lock();
        self.read_record(&mut log, id, offset)
    }

    /// Fetch page `page` (1-based) of `limit` records, ascending by id
    ///
    /// A page past the end returns no data but the correct totals. Entries
    /// that fail to read or parse are logged, counted in `unreadable_reads`
    /// and left out of `data`.
    pub fn get_many(&self, page: usize, limit: usize) -> Result<Page> {
        if page == 0 {
            return Err(OffsetDbError::Validation("page starts at 1".to_string()));
        }
        if limit == 0 {
            return Err(OffsetDbError::Validation(
                "limit must be greater than zero".to_string(),
            ));
        }

        let start = (page - 1).saturating_mul(limit);
        let (total, window) = {
            let index = self.index.read();
            let window: Vec<_> = index.iter().skip(start).take(limit).collect();
            (index.len(), window)
        };

        let mut data = Vec::with_capacity(window.len());
        if !window.is_empty() {
            let mut log = self.log.lock();
            for entry in window {
                match self.read_record(&mut log, entry.id, entry.offset) {
                    Ok(Some(record)) => data.push(record),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            id = entry.id,
                            offset = entry.offset,
                            error = %e,
                            "failed to read record, skipping"
                        );
                        self.unreadable_reads.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }

        Ok(Page {
            data,
            total,
            page,
            total_pages: total.div_ceil(limit),
        })
    }

    /// Seed `count` demo records with ids `1..=count`
    ///
    /// Writes one snapshot at the end instead of one per record.
    pub fn bulk_load(&self, count: u64) -> Result<usize> {
        self.bulk_insert((1..=count).map(demo_record))
    }

    /// Append many records, persisting the snapshot once at the end
    pub fn bulk_insert<I>(&self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = Record>,
    {
        let started = Instant::now();
        let mut log = self.log.lock();

        let mut written = 0;
        {
            let mut index = self.index.write();
            for record in records {
                let offset = log.append(&record.to_line()?)?;
                index.insert(record.id(), offset);
                written += 1;
            }
        }

        log.sync()?;
        self.persist_snapshot()?;

        tracing::info!(
            records = written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "bulk load complete"
        );
        Ok(written)
    }

    /// Discard the index and rebuild it by scanning the whole log
    pub fn rebuild_index(&self) -> Result<RecoveryResult> {
        let log = self.log.lock();

        let mut rebuilt = PositionIndex::new();
        let result = RecoveryScanner::scan(log.path(), &mut rebuilt)?;
        *self.index.write() = rebuilt;
        self.persist_snapshot()?;

        *self.load_report.lock() = (IndexSource::Rescan, result.clone());
        tracing::info!(
            records = result.records_indexed,
            skipped = result.lines_skipped,
            "index rebuilt on request"
        );
        Ok(result)
    }

    /// Sync the log and write the snapshot
    pub fn flush(&self) -> Result<()> {
        let mut log = self.log.lock();
        log.sync()?;
        self.persist_snapshot()
    }

    /// Close the engine gracefully
    ///
    /// Flushes so the next open can load the snapshot without a tail replay
    pub fn close(self) -> Result<()> {
        self.flush()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Number of distinct ids
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Current statistics
    pub fn stats(&self) -> Result<EngineStats> {
        let log_bytes = self.log.lock().len()?;
        let (source, recovery) = self.load_report.lock().clone();

        Ok(EngineStats {
            records: self.len(),
            log_bytes,
            source,
            recovery,
            writes_since_snapshot: self.writes_since_snapshot.load(Ordering::Relaxed),
            unreadable_reads: self.unreadable_reads.load(Ordering::Relaxed),
        })
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Path of the record log
    pub fn log_path(&self) -> PathBuf {
        self.config.data_dir.join(Self::LOG_FILENAME)
    }

    /// Path of the snapshot file
    pub fn snapshot_path(&self) -> &Path {
        self.snapshot.path()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Load the snapshot into `index`, then replay the log lines written
    /// after the snapshot's newest entry.
    ///
    /// The newest entry (highest offset) must point at a parsable line with
    /// the same id, otherwise the snapshot does not match this log.
    fn load_snapshot(
        snapshot: &SnapshotStore,
        log: &mut RecordLog,
        index: &mut PositionIndex,
        chunk_size: usize,
    ) -> Result<RecoveryResult> {
        let entries = snapshot.load()?;
        let log_len = log.len()?;

        let covered = match entries.iter().max_by_key(|e| e.offset) {
            None => 0,
            Some(last) => {
                if last.offset >= log_len {
                    return Err(OffsetDbError::Snapshot(format!(
                        "snapshot offset {} is past the end of the log ({} bytes)",
                        last.offset, log_len
                    )));
                }

                let line = log.read_line(last.offset, chunk_size)?.ok_or_else(|| {
                    OffsetDbError::Snapshot(format!("no log line at offset {}", last.offset))
                })?;
                let record = Record::parse_line(&line).map_err(|e| {
                    OffsetDbError::Snapshot(format!(
                        "log line at offset {} is unreadable: {}",
                        last.offset, e
                    ))
                })?;
                if record.id() != last.id {
                    return Err(OffsetDbError::Snapshot(format!(
                        "log line at offset {} holds id {}, snapshot expects {}",
                        last.offset,
                        record.id(),
                        last.id
                    )));
                }

                (last.offset + line.len() as u64 + 1).min(log_len)
            }
        };

        index.rebuild_from(entries);
        RecoveryScanner::scan_from(log.path(), covered, index)
    }

    /// Append `record` and point the index at it. Caller holds the log lock.
    fn append_locked(&self, log: &mut RecordLog, record: &Record) -> Result<()> {
        let line = record.to_line()?;
        let offset = log.append(&line)?;
        self.index.write().insert(record.id(), offset);

        let pending = self.writes_since_snapshot.fetch_add(1, Ordering::Relaxed) + 1;
        let due = match self.config.snapshot_policy {
            SnapshotPolicy::EveryWrite => true,
            SnapshotPolicy::EveryNWrites { count } => pending >= count as u64,
        };
        if due {
            self.persist_snapshot()?;
        }

        Ok(())
    }

    /// Write the snapshot. Caller holds the log lock.
    fn persist_snapshot(&self) -> Result<()> {
        self.snapshot.save(&self.index.read())?;
        self.writes_since_snapshot.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Read and parse the line at `offset`; `None` if it does not parse
    fn read_record(&self, log: &mut RecordLog, id: RecordId, offset: u64) -> Result<Option<Record>> {
        let line = log.read_line(offset, self.config.read_chunk_size)?;

        let parsed = match line {
            Some(line) => Record::parse_line(&line),
            None => Err(OffsetDbError::Validation(format!(
                "offset {} is past the end of the log",
                offset
            ))),
        };

        match parsed {
            Ok(record) if record.id() == id => Ok(Some(record)),
            Ok(record) => {
                tracing::warn!(id, offset, found = record.id(), "indexed line holds another id");
                self.unreadable_reads.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(id, offset, error = %e, "unreadable record");
                self.unreadable_reads.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }
}

/// Demo user written by `bulk_load`; every tenth one is an admin
fn demo_record(i: u64) -> Record {
    let role = if i % 10 == 0 { "Admin" } else { "User" };
    Record::new(i)
        .with_field("name", format!("User_{}", i))
        .with_field("role", role)
        .with_field("bio", format!("This is an auto-generated bio for User number {}.", i))
}
