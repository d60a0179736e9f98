//! sftp-catalogue - Incremental SFTP Catalogue Crawler
//!
//! Walks a large, slowly changing remote tree over SFTP and records every
//! file it finds (path, size, modification time) so later pipeline stages
//! can find new files without re-scanning the whole server.
//!
//! # Features
//!
//! - **Deduplicated catalogue**: SQLite table keyed by remote path; each
//!   insert is committed before the crawler moves on.
//!
//! - **Append log**: every newly catalogued file is also appended to a JSONL
//!   log, flushed and synced per record.
//!
//! - **Incremental resume**: date partitions older than the newest one
//!   already catalogued for a product are not listed again.
//!
//! - **Polite traversal**: a configurable pause after every listing and a
//!   global limit on outstanding listings, even with several workers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SFTP Server                               │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ readdir (through ListingGate)
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Crawler / CrawlContext                       │
//! │  ┌─────────┐  ┌─────────┐          ┌─────────┐                  │
//! │  │Worker 1 │  │Worker 2 │   ...    │Worker N │  one session each │
//! │  └────┬────┘  └────┬────┘          └────┬────┘                  │
//! │       └────────────┼────────────────────┘                       │
//! │                    │ classify: record / descend / skip          │
//! │                    ▼                                            │
//! │   ResumeIndex (snapshot)     exclusions     depth limit          │
//! └────────────────────┬────────────────────────────────────────────┘
//!                      │ insert_if_absent, then append if new
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌──────────────────┐    ┌──────────────────┐
//! │  SQLite store    │    │   JSONL log      │
//! │  (catalogue.db)  │    │ (catalogue.jsonl)│
//! └──────────────────┘    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # First run catalogues everything under /free
//! SFTP_USERNAME=me SFTP_KEY=~/.ssh/key sftp-catalogue /tmp/sftp_catalogue.db
//!
//! # Later runs only list partitions at or after each product's boundary
//! sftp-catalogue /tmp/sftp_catalogue.db
//!
//! # Inspect the boundaries
//! sftp-catalogue boundaries /tmp/sftp_catalogue.db
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod progress;
pub mod remote;
pub mod resume;
pub mod walker;

pub use config::{CliArgs, ConnectionConfig, CrawlConfig};
pub use error::{CrawlerError, Result};
pub use walker::{CrawlReport, CrawlState, Crawler};
