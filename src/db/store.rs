//! Durable catalogue of observed files
//!
//! One SQLite connection guarded by a mutex. Every insert runs in its own
//! implicit transaction, so when `insert_if_absent` returns the row is on
//! disk and the caller may append it to the log.

use crate::db::schema::{self, keys};
use crate::error::{StoreError, StoreResult};
use crate::remote::types::{format_iso, parse_iso};
use crate::remote::CatalogueEntry;
use crate::resume::{PathLayout, ResumeIndex};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// SQLite-backed, insert-only file catalogue
pub struct CatalogueStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl CatalogueStore {
    /// Open or create the catalogue at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::init(conn, path.to_path_buf())
    }

    /// Private in-memory catalogue
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> StoreResult<Self> {
        schema::create_database(&conn)?;
        schema::set_crawl_info(
            &conn,
            keys::SCHEMA_VERSION,
            &schema::SCHEMA_VERSION.to_string(),
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file this store was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if `path` is already catalogued
    pub fn exists(&self, path: &str) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row("SELECT 1 FROM files WHERE path = ?1", [path], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert `entry` unless its path is already catalogued
    ///
    /// Returns true if a row was written. An existing row is left untouched
    /// even if size or mtime differ.
    pub fn insert_if_absent(&self, entry: &CatalogueEntry) -> StoreResult<bool> {
        let size = i64::try_from(entry.size_bytes).map_err(|_| StoreError::SizeOverflow {
            path: entry.path.clone(),
            size: entry.size_bytes,
        })?;

        let conn = self.conn.lock();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO files (path, size_bytes, last_modified) VALUES (?1, ?2, ?3)",
            params![entry.path, size, format_iso(&entry.last_modified)],
        )?;
        Ok(changed == 1)
    }

    /// Look up one entry by path
    pub fn get(&self, path: &str) -> StoreResult<Option<CatalogueEntry>> {
        let row: Option<(String, i64, String)> = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT path, size_bytes, last_modified FROM files WHERE path = ?1",
                [path],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
        };
        row.map(into_entry).transpose()
    }

    /// Number of catalogued files
    pub fn count(&self) -> StoreResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Every entry, ordered by path
    pub fn entries(&self) -> StoreResult<Vec<CatalogueEntry>> {
        let rows: Vec<(String, i64, String)> = {
            let conn = self.conn.lock();
            let mut stmt =
                conn.prepare("SELECT path, size_bytes, last_modified FROM files ORDER BY path")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<Result<_, _>>()?;
            rows
        };
        rows.into_iter().map(into_entry).collect()
    }

    /// Paths of every entry at or below `root`
    pub fn paths_under(&self, root: &str) -> StoreResult<Vec<String>> {
        let prefix = if root.ends_with('/') {
            root.to_string()
        } else {
            format!("{}/", root)
        };

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT path FROM files WHERE instr(path, ?1) = 1 ORDER BY path",
        )?;
        let paths = stmt
            .query_map([prefix], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(paths)
    }

    /// Latest date partition per product, as fixed-width strings
    pub fn query_resume_boundaries(
        &self,
        layout: &PathLayout,
    ) -> StoreResult<BTreeMap<String, String>> {
        Ok(ResumeIndex::load(self, layout)?.to_strings())
    }

    /// Store crawl metadata
    pub fn set_info(&self, key: &str, value: &str) -> StoreResult<()> {
        schema::set_crawl_info(&self.conn.lock(), key, value)
    }

    /// Get crawl metadata
    pub fn get_info(&self, key: &str) -> StoreResult<Option<String>> {
        schema::get_crawl_info(&self.conn.lock(), key)
    }
}

fn into_entry((path, size, modified): (String, i64, String)) -> StoreResult<CatalogueEntry> {
    let last_modified = parse_iso(&modified).ok_or_else(|| StoreError::InvalidTimestamp {
        path: path.clone(),
        value: modified.clone(),
    })?;
    Ok(CatalogueEntry::new(path, size.max(0) as u64, last_modified))
}
