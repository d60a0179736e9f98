//! Error types for sftp-catalogue
//!
//! This module defines the error hierarchy used by the crawler:
//! - Remote session and listing errors
//! - Catalogue store and append log errors
//! - Configuration and CLI errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Name the remote path that was being processed when a crawl fails
//! - Preserve error chains for debugging

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a crawl
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// Remote session errors not tied to a particular directory
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Store or log errors not tied to a particular entry
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Listing a directory failed fatally
    #[error("Failed while listing '{path}': {source}")]
    Listing {
        path: String,
        #[source]
        source: RemoteError,
    },

    /// Recording an observed file failed
    #[error("Failed while recording '{path}': {source}")]
    Record {
        path: String,
        #[source]
        source: StoreError,
    },

    /// Subtrees were abandoned and the crawl runs in strict mode
    #[error("{count} subtree(s) abandoned, first at '{first}'")]
    Incomplete { count: usize, first: String },

    /// Cancelled by signal or deadline
    #[error("Crawl cancelled before completion (last directory: '{path}')")]
    Cancelled { path: String },

    /// A worker thread panicked
    #[error("Worker {id} panicked")]
    WorkerPanicked { id: usize },
}

impl CrawlerError {
    /// Remote path associated with this failure, if any
    pub fn remote_path(&self) -> Option<&str> {
        match self {
            CrawlerError::Listing { path, .. }
            | CrawlerError::Record { path, .. }
            | CrawlerError::Cancelled { path } => Some(path),
            CrawlerError::Incomplete { first, .. } => Some(first),
            _ => None,
        }
    }
}

/// Remote session and protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Target description could not be parsed
    #[error("Invalid remote target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// TCP connect or SSH handshake failed
    #[error("Failed to connect to '{server}': {reason}")]
    ConnectionFailed { server: String, reason: String },

    /// Authentication was rejected
    #[error("Authentication failed for user '{username}': {reason}")]
    AuthFailed { username: String, reason: String },

    /// Session dropped while in use
    #[error("Remote session lost: {reason}")]
    SessionLost { reason: String },

    /// Directory does not exist
    #[error("Path not found: '{path}'")]
    NotFound { path: String },

    /// Directory is not readable
    #[error("Permission denied: '{path}'")]
    PermissionDenied { path: String },

    /// Other protocol-level failure with a server status code
    #[error("SFTP error {code} on '{path}': {message}")]
    Protocol {
        path: String,
        code: i32,
        message: String,
    },
}

impl RemoteError {
    /// Whether the walk can abandon the affected subtree and carry on
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RemoteError::NotFound { .. } | RemoteError::PermissionDenied { .. }
        )
    }

    /// Whether this error means the session itself is unusable
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            RemoteError::ConnectionFailed { .. }
                | RemoteError::AuthFailed { .. }
                | RemoteError::SessionLost { .. }
        )
    }
}

/// Catalogue store and append log errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to open the store file
    #[error("Failed to open catalogue at '{path}': {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    /// Failed to open the append log
    #[error("Failed to open log at '{path}': {source}")]
    LogOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write or sync a log record
    #[error("Failed to append to log at '{path}': {source}")]
    LogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be encoded for the log
    #[error("Failed to encode log record for '{path}': {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A log line could not be decoded
    #[error("Log record error at line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Stored timestamp could not be parsed
    #[error("Invalid timestamp '{value}' stored for '{path}'")]
    InvalidTimestamp { path: String, value: String },

    /// Size does not fit the storage column
    #[error("Size {size} of '{path}' exceeds the storable range")]
    SizeOverflow { path: String, size: u64 },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Missing required setting
    #[error("Missing required setting '{name}' (flag or environment variable {env})")]
    Missing { name: &'static str, env: &'static str },

    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid concurrent listing limit
    #[error("Invalid listing limit {limit}: must be at least 1")]
    InvalidListingLimit { limit: usize },

    /// Invalid product pattern
    #[error("Invalid product pattern '{pattern}': {reason}")]
    InvalidProductPattern { pattern: String, reason: String },

    /// Invalid exclusion name
    #[error("Invalid exclusion '{name}': {reason}")]
    InvalidExclusion { name: String, reason: String },

    /// Invalid root path
    #[error("Invalid root path '{path}': {reason}")]
    InvalidRoot { path: String, reason: String },

    /// Output path error
    #[error("Invalid output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },

    /// Private key not readable
    #[error("Private key '{path}' is not readable: {reason}")]
    InvalidKey { path: PathBuf, reason: String },
}

/// Result type alias for CrawlerError
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for RemoteError
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Result type alias for StoreError
pub type StoreResult<T> = std::result::Result<T, StoreError>;
