//! Append-only JSONL log of newly catalogued files
//!
//! Each record is written with a single `write_all`, then flushed and
//! synced before `append` returns. A crash can therefore lose at most the
//! record being written, never one that was reported as appended.

use crate::error::{StoreError, StoreResult};
use crate::remote::CatalogueEntry;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Log path used when none is given: the store path with a `.jsonl` extension
pub fn default_log_path(store_path: &Path) -> PathBuf {
    store_path.with_extension("jsonl")
}

/// Append-only record log shared by all workers of a crawl
pub struct AppendLog {
    file: Mutex<File>,
    path: PathBuf,
    appended: AtomicU64,
}

impl AppendLog {
    /// Open `path` for appending, creating it if missing
    ///
    /// Existing records are kept.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| StoreError::LogOpen {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            appended: AtomicU64::new(0),
        })
    }

    /// Log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this handle
    pub fn appended(&self) -> u64 {
        self.appended.load(Ordering::Relaxed)
    }

    /// Append one record and sync it to disk
    pub fn append(&self, entry: &CatalogueEntry) -> StoreResult<()> {
        let line = encode_record(entry)?;

        {
            let mut file = self.file.lock();
            write_synced(&mut file, line.as_bytes()).map_err(|source| self.write_error(source))?;
        }

        self.appended.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Sync file metadata; later appends are still accepted
    pub fn close(&self) -> StoreResult<()> {
        let file = self.file.lock();
        file.sync_all().map_err(|source| self.write_error(source))
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::LogWrite {
            path: self.path.clone(),
            source,
        }
    }
}

/// One log line, newline included
fn encode_record(entry: &CatalogueEntry) -> StoreResult<String> {
    let mut line = serde_json::to_string(entry).map_err(|source| StoreError::Encode {
        path: entry.path.clone(),
        source,
    })?;
    line.push('\n');
    Ok(line)
}

fn write_synced(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_data()
}

/// Read every record of an existing log
///
/// Blank lines are ignored; line numbers in errors are 1-based.
pub fn read_log(path: &Path) -> StoreResult<Vec<CatalogueEntry>> {
    let open_error = |source| StoreError::LogOpen {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(open_error)?);

    let mut entries = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(open_error)?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line).map_err(|source| StoreError::Record {
            line: idx + 1,
            source,
        })?;
        entries.push(entry);
    }
    Ok(entries)
}
