//! Database schema definitions and creation
//!
//! This module defines the SQLite schema for the catalogue and provides
//! functions to create and configure the database.

use crate::error::StoreResult;
use rusqlite::{Connection, OptionalExtension};

/// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

/// SQL to create the catalogue table
///
/// Column layout matches catalogues written by earlier crawler versions, so
/// an existing store can be resumed in place.
const CREATE_FILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT UNIQUE NOT NULL,
    size_bytes INTEGER NOT NULL,
    last_modified TEXT NOT NULL    -- ISO-8601, second precision
)
"#;

/// SQL to create crawl metadata table
const CREATE_CRAWL_INFO_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS crawl_info (
    key TEXT PRIMARY KEY,
    value TEXT
)
"#;

/// SQLite pragmas for durable per-entry commits
///
/// Every insert is its own transaction; FULL sync means a returned insert
/// survives a crash.
const DURABLE_PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = FULL;
PRAGMA busy_timeout = 5000;
PRAGMA temp_store = MEMORY;
"#;

/// Create and configure the catalogue database
pub fn create_database(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(DURABLE_PRAGMAS)?;

    conn.execute(CREATE_FILES_TABLE, [])?;
    conn.execute(CREATE_CRAWL_INFO_TABLE, [])?;

    Ok(())
}

/// Store crawl metadata
pub fn set_crawl_info(conn: &Connection, key: &str, value: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO crawl_info (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

/// Get crawl metadata
pub fn get_crawl_info(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM crawl_info WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Metadata keys used by the crawler
pub mod keys {
    /// Remote target that was crawled
    pub const SOURCE: &str = "source";

    /// Root path the crawl started from
    pub const ROOT: &str = "root";

    /// Timestamp when the latest crawl started (RFC 3339)
    pub const START_TIME: &str = "start_time";

    /// Timestamp when the latest crawl ended (RFC 3339)
    pub const END_TIME: &str = "end_time";

    /// Duration of the latest crawl in seconds
    pub const DURATION_SECS: &str = "duration_secs";

    /// Directories listed by the latest crawl
    pub const DIRS_LISTED: &str = "dirs_listed";

    /// Files seen by the latest crawl
    pub const FILES_SEEN: &str = "files_seen";

    /// Files newly catalogued by the latest crawl
    pub const FILES_NEW: &str = "files_new";

    /// Subtrees abandoned by the latest crawl
    pub const ABANDONED: &str = "abandoned_subtrees";

    /// Schema version
    pub const SCHEMA_VERSION: &str = "schema_version";

    /// Crawler version
    pub const CRAWLER_VERSION: &str = "crawler_version";

    /// Crawl status: "running", "completed", "cancelled", "failed"
    pub const STATUS: &str = "status";
}
