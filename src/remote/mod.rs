//! Remote directory access
//!
//! The crawler only needs one capability from the remote side: list the
//! children of a directory with their metadata. This module defines that
//! seam and its implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Connector                        │
//! │  - Knows how to open a session (one per worker)     │
//! └──────────────────────────┬──────────────────────────┘
//!                            │ connect()
//!                            ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                   RemoteSource                       │
//! │  - list(dir) -> Vec<RemoteEntry>                    │
//! │  - close() releases the session (also on drop)      │
//! └──────────────────────────┬──────────────────────────┘
//!                            │ every call goes through
//!                            ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                   ListingGate                        │
//! │  - Bounds outstanding listings across all workers   │
//! │  - Applies the courtesy delay after each listing    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! `SftpConnector` talks to a real server through libssh2; `MemoryTree` is
//! an in-process tree used by tests and benchmarks.

pub mod memory;
pub mod sftp;
pub mod throttle;
pub mod types;

pub use memory::{MemoryConnector, MemoryTree};
pub use sftp::{SftpConnector, SftpSession, SftpSessionBuilder, SftpTarget};
pub use throttle::ListingGate;
pub use types::{CatalogueEntry, EntryKind, RemoteEntry};

use crate::error::RemoteResult;

/// An open session that can list remote directories
pub trait RemoteSource {
    /// List the children of `path`, excluding "." and ".."
    fn list(&mut self, path: &str) -> RemoteResult<Vec<RemoteEntry>>;

    /// Release the session. Calling it twice is a no-op.
    fn close(&mut self) -> RemoteResult<()>;
}

/// Factory for remote sessions
///
/// Each worker acquires its own session at crawl start.
pub trait Connector: Send + Sync {
    type Source: RemoteSource + Send;

    /// Open and authenticate a new session
    fn connect(&self) -> RemoteResult<Self::Source>;

    /// Human-readable description of the target, for logs and metadata
    fn describe(&self) -> String;
}
