//! Catalogue persistence
//!
//! Two artifacts are written per crawl:
//!
//! ```text
//! ┌──────────────────────────┐   insert_if_absent   ┌──────────────────────┐
//! │      CrawlContext        │ ───────────────────► │ CatalogueStore       │
//! │  (one per crawl, shared  │                      │ SQLite, WAL, FULL    │
//! │   by all workers)        │   append (new only)  ├──────────────────────┤
//! │                          │ ───────────────────► │ AppendLog            │
//! └──────────────────────────┘                      │ JSONL, synced/record │
//!                                                   └──────────────────────┘
//! ```
//!
//! The store is the source of truth for deduplication and resume
//! boundaries; the log lists what each run added, in discovery order. A
//! store insert always commits before the matching log append.

pub mod log;
pub mod schema;
pub mod store;

pub use log::{default_log_path, read_log, AppendLog};
pub use schema::{create_database, keys};
pub use store::CatalogueStore;
