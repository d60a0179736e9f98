//! Configuration types for sftp-catalogue
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros, with environment fallbacks
//! - Runtime crawl configuration with validation
//! - SFTP connection settings

use crate::db::default_log_path;
use crate::error::ConfigError;
use crate::remote::SftpTarget;
use crate::resume::{default_product_regex, PathLayout, DEFAULT_PRODUCT_PATTERN};
use clap::Parser;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 64;

/// Bulk data host the catalogue is normally built from
pub const DEFAULT_HOST: &str = "bulk-live.companieshouse.gov.uk";

/// Remote directory crawled when no root is given
pub const DEFAULT_ROOT: &str = "/free";

/// Entry name skipped by default (very large image archive)
pub const DEFAULT_EXCLUSION: &str = "bulkimage";

/// Incremental SFTP catalogue crawler
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sftp-catalogue",
    version,
    about = "Incremental SFTP catalogue crawler with SQLite and JSONL output",
    long_about = "Walks a remote SFTP tree and records every file (path, size, mtime) in a\n\
                  deduplicated SQLite catalogue plus an append-only JSONL log.\n\n\
                  Re-running against an existing catalogue skips date partitions older than the\n\
                  latest one already catalogued for each product.\n\n\
                  On success the catalogue path and the log path are printed to stdout.",
    after_help = "EXAMPLES:\n    \
        SFTP_USERNAME=me SFTP_KEY=~/.ssh/id_rsa sftp-catalogue /tmp/sftp_catalogue.db\n    \
        sftp-catalogue catalogue.db --root /free/prod195 --delay-ms 0 -v\n    \
        sftp-catalogue catalogue.db -w 4 --max-listings 2 --deadline 3600\n    \
        sftp-catalogue boundaries catalogue.db",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct CliArgs {
    /// Catalogue database file (created if missing, resumed if present)
    #[arg(value_name = "STORE_PATH")]
    pub store_path: Option<PathBuf>,

    /// Subcommand (boundaries)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Append log file (default: STORE_PATH with a .jsonl extension)
    #[arg(long = "log", env = "CATALOGUE_LOG", value_name = "FILE")]
    pub log_path: Option<PathBuf>,

    /// SFTP server hostname
    #[arg(long, env = "SFTP_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// SFTP server port
    #[arg(long, env = "SFTP_PORT", default_value_t = 22)]
    pub port: u16,

    /// Login name
    #[arg(short = 'u', long, env = "SFTP_USERNAME")]
    pub username: Option<String>,

    /// Private key file used for public-key authentication
    #[arg(short = 'k', long = "key", env = "SFTP_KEY", value_name = "FILE")]
    pub key_path: Option<PathBuf>,

    /// Passphrase of the private key
    #[arg(long, env = "SFTP_KEY_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Remote directory to crawl
    #[arg(short = 'r', long, env = "SFTP_ROOT", default_value = DEFAULT_ROOT)]
    pub root: String,

    /// Entry names never recorded or descended into (repeatable, comma separated)
    #[arg(
        long = "exclude",
        env = "CATALOGUE_EXCLUDE",
        value_name = "NAME",
        value_delimiter = ',',
        default_value = DEFAULT_EXCLUSION,
        action = clap::ArgAction::Append
    )]
    pub exclusions: Vec<String>,

    /// Regex matching product directory names below the root
    #[arg(long, env = "CATALOGUE_PRODUCT_PATTERN", default_value = DEFAULT_PRODUCT_PATTERN)]
    pub product_pattern: String,

    /// Pause after each directory listing, in milliseconds (0 disables)
    #[arg(long, env = "CATALOGUE_DELAY_MS", default_value_t = 1000, value_name = "MS")]
    pub delay_ms: u64,

    /// Number of worker sessions
    #[arg(short = 'w', long, env = "CATALOGUE_WORKERS", default_value_t = 1, value_name = "NUM")]
    pub workers: usize,

    /// Maximum directory listings outstanding at once, across all workers
    #[arg(long, env = "CATALOGUE_MAX_LISTINGS", default_value_t = 1, value_name = "NUM")]
    pub max_listings: usize,

    /// Maximum directory depth below the root (unlimited if not set)
    #[arg(short = 'd', long, value_name = "NUM")]
    pub max_depth: Option<usize>,

    /// Stop scheduling listings after this many seconds
    #[arg(long, env = "CATALOGUE_DEADLINE", value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Fail the crawl if any subtree had to be abandoned
    #[arg(long)]
    pub strict: bool,

    /// Connection timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    pub timeout: u32,

    /// Number of retry attempts for the initial connection
    #[arg(long, default_value = "3", value_name = "NUM")]
    pub retries: u32,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Subcommands
#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the resume boundaries of an existing catalogue as JSON
    Boundaries {
        /// Catalogue database file
        #[arg(value_name = "STORE_PATH")]
        store_path: PathBuf,

        /// Remote root the catalogue was crawled from
        #[arg(short = 'r', long, env = "SFTP_ROOT", default_value = DEFAULT_ROOT)]
        root: String,

        /// Regex matching product directory names below the root
        #[arg(long, env = "CATALOGUE_PRODUCT_PATTERN", default_value = DEFAULT_PRODUCT_PATTERN)]
        product_pattern: String,
    },
}

/// Validated crawl configuration
///
/// Everything a crawl needs except how to reach the server.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Remote directory to crawl
    pub root: String,

    /// Catalogue database path
    pub store_path: PathBuf,

    /// Append log path
    pub log_path: PathBuf,

    /// Number of worker sessions
    pub worker_count: usize,

    /// Outstanding listing limit
    pub max_listings: usize,

    /// Courtesy pause after each listing
    pub delay: Duration,

    /// Entry names skipped entirely
    pub exclusions: Vec<String>,

    /// Compiled product pattern
    pub product_pattern: Regex,

    /// Maximum traversal depth
    pub max_depth: Option<usize>,

    /// Stop scheduling listings after this long
    pub deadline: Option<Duration>,

    /// Abandoned subtrees fail the crawl
    pub strict: bool,

    /// Show progress indicator
    pub show_progress: bool,
}

impl CrawlConfig {
    /// Configuration with defaults for everything but the root and store
    pub fn new(root: impl Into<String>, store_path: impl Into<PathBuf>) -> Self {
        let store_path = store_path.into();
        Self {
            root: root.into(),
            log_path: default_log_path(&store_path),
            store_path,
            worker_count: 1,
            max_listings: 1,
            delay: Duration::from_secs(1),
            exclusions: vec![DEFAULT_EXCLUSION.to_string()],
            product_pattern: default_product_regex(),
            max_depth: None,
            deadline: None,
            strict: false,
            show_progress: false,
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let store_path = args
            .store_path
            .clone()
            .ok_or_else(|| ConfigError::InvalidOutputPath {
                path: PathBuf::new(),
                reason: "STORE_PATH is required for a crawl".to_string(),
            })?;

        // Validate worker count
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        if args.max_listings == 0 {
            return Err(ConfigError::InvalidListingLimit {
                limit: args.max_listings,
            });
        }

        let root = validate_root(&args.root)?;
        let product_pattern = compile_product_pattern(&args.product_pattern)?;
        let exclusions = validate_exclusions(&args.exclusions)?;

        let log_path = args
            .log_path
            .clone()
            .unwrap_or_else(|| default_log_path(&store_path));

        validate_output_path(&store_path)?;
        validate_output_path(&log_path)?;
        if log_path == store_path {
            return Err(ConfigError::InvalidOutputPath {
                path: log_path,
                reason: "Log path must differ from the catalogue path".to_string(),
            });
        }

        Ok(Self {
            root,
            store_path,
            log_path,
            worker_count: args.workers,
            max_listings: args.max_listings,
            delay: Duration::from_millis(args.delay_ms),
            exclusions,
            product_pattern,
            max_depth: args.max_depth,
            deadline: args.deadline.map(Duration::from_secs),
            strict: args.strict,
            show_progress: !args.quiet,
        })
    }

    /// Product layout below the crawl root
    pub fn layout(&self) -> PathLayout {
        PathLayout::new(&self.root, self.product_pattern.clone())
    }
}

/// How to reach the SFTP server
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub target: SftpTarget,

    /// Connect and per-operation timeout
    pub timeout: Duration,

    /// Retries for the initial connect
    pub retries: u32,
}

impl ConnectionConfig {
    /// Create and validate connection settings from CLI arguments
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let username = args
            .username
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::Missing {
                name: "username",
                env: "SFTP_USERNAME",
            })?;

        let key_path = args.key_path.clone().ok_or(ConfigError::Missing {
            name: "key",
            env: "SFTP_KEY",
        })?;

        if let Err(e) = std::fs::metadata(&key_path) {
            return Err(ConfigError::InvalidKey {
                path: key_path,
                reason: e.to_string(),
            });
        }

        Ok(Self {
            target: SftpTarget {
                host: args.host.clone(),
                port: args.port,
                username,
                key_path,
                passphrase: args.passphrase.clone().filter(|p| !p.is_empty()),
            },
            timeout: Duration::from_secs(args.timeout.max(1) as u64),
            retries: args.retries,
        })
    }
}

/// Compile a product pattern
pub fn compile_product_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidProductPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Normalise and validate the remote root
///
/// Must be absolute; a trailing slash is dropped.
pub fn validate_root(root: &str) -> Result<String, ConfigError> {
    let trimmed = root.trim();
    if !trimmed.starts_with('/') {
        return Err(ConfigError::InvalidRoot {
            path: root.to_string(),
            reason: "Root must be an absolute path".to_string(),
        });
    }
    if trimmed.split('/').any(|seg| seg == "." || seg == "..") {
        return Err(ConfigError::InvalidRoot {
            path: root.to_string(),
            reason: "Root must not contain '.' or '..' segments".to_string(),
        });
    }

    let normalised = trimmed.trim_end_matches('/');
    Ok(if normalised.is_empty() {
        "/".to_string()
    } else {
        normalised.to_string()
    })
}

fn validate_exclusions(names: &[String]) -> Result<Vec<String>, ConfigError> {
    let mut exclusions = Vec::with_capacity(names.len());
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        if name.contains('/') {
            return Err(ConfigError::InvalidExclusion {
                name: name.to_string(),
                reason: "Exclusions are entry names, not paths".to_string(),
            });
        }
        if !exclusions.iter().any(|e| e == name) {
            exclusions.push(name.to_string());
        }
    }
    Ok(exclusions)
}

fn validate_output_path(path: &Path) -> Result<(), ConfigError> {
    if path.is_dir() {
        return Err(ConfigError::InvalidOutputPath {
            path: path.to_path_buf(),
            reason: "Path is a directory".to_string(),
        });
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ConfigError::InvalidOutputPath {
                path: path.to_path_buf(),
                reason: format!("Parent directory '{}' does not exist", parent.display()),
            });
        }
    }
    Ok(())
}
