//! Traversal state of one crawl
//!
//! `CrawlContext` owns everything a worker needs to process a directory:
//! the store and log it writes to, the resume snapshot and exclusions it
//! decides with, and the gate and counters it reports through. It is
//! shared by reference between workers; each worker brings its own
//! `RemoteSource`.

use crate::db::{AppendLog, CatalogueStore};
use crate::error::{CrawlerError, Result, StoreResult};
use crate::remote::types::join_path;
use crate::remote::{CatalogueEntry, EntryKind, ListingGate, RemoteEntry, RemoteSource};
use crate::resume::{PathLayout, ResumeDecision, ResumeIndex};
use crate::walker::cancel::CancelToken;
use crate::walker::stats::CrawlStats;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Directory waiting to be listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirWork {
    pub path: String,

    /// 0 for the crawl root
    pub depth: usize,
}

/// What to do with one child of a listed directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildAction {
    /// Regular file: catalogue it
    Record,

    /// Directory: list it later
    Descend,

    /// Directory older than the product's resume boundary
    SkipResume,

    /// Name is on the exclusion list
    Exclude,

    /// Directory below the depth limit
    BeyondDepth,

    /// Symlink or special file
    Ignore,
}

/// Shared state for every worker of one crawl
pub struct CrawlContext {
    store: CatalogueStore,
    log: AppendLog,
    index: ResumeIndex,
    layout: PathLayout,
    exclusions: HashSet<String>,
    max_depth: Option<usize>,
    gate: ListingGate,
    stats: Arc<CrawlStats>,
    cancel: CancelToken,
}

impl CrawlContext {
    /// Build a context, taking the resume snapshot from `store`
    pub fn new(store: CatalogueStore, log: AppendLog, layout: PathLayout) -> StoreResult<Self> {
        let index = ResumeIndex::load(&store, &layout)?;
        Ok(Self::with_index(store, log, layout, index))
    }

    /// Build a context around an existing snapshot
    pub fn with_index(
        store: CatalogueStore,
        log: AppendLog,
        layout: PathLayout,
        index: ResumeIndex,
    ) -> Self {
        Self {
            store,
            log,
            index,
            layout,
            exclusions: HashSet::new(),
            max_depth: None,
            gate: ListingGate::unthrottled(),
            stats: Arc::new(CrawlStats::new()),
            cancel: CancelToken::new(),
        }
    }

    /// Set entry names that are never recorded or descended into
    pub fn exclusions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set maximum traversal depth below the root
    pub fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the listing gate shared by all workers
    pub fn gate(mut self, gate: ListingGate) -> Self {
        self.gate = gate;
        self
    }

    /// Share counters with the owning crawler
    pub fn stats(mut self, stats: Arc<CrawlStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Set the token checked before each listing
    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get the catalogue store
    pub fn store(&self) -> &CatalogueStore {
        &self.store
    }

    /// Get the append log
    pub fn log(&self) -> &AppendLog {
        &self.log
    }

    /// Get the resume snapshot taken at crawl start
    pub fn index(&self) -> &ResumeIndex {
        &self.index
    }

    /// Get the product layout below the root
    pub fn layout(&self) -> &PathLayout {
        &self.layout
    }

    /// Get live crawl counters
    pub fn counters(&self) -> &CrawlStats {
        &self.stats
    }

    /// Get the cancellation token
    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    /// Get the listing gate
    pub fn listing_gate(&self) -> &ListingGate {
        &self.gate
    }

    /// Work item for the crawl root
    pub fn root_work(&self) -> DirWork {
        DirWork {
            path: self.layout.root().to_string(),
            depth: 0,
        }
    }

    /// Decide what to do with `entry`, a child of `dir`
    pub fn classify(&self, dir: &DirWork, entry: &RemoteEntry) -> ChildAction {
        if self.exclusions.contains(&entry.name) {
            return ChildAction::Exclude;
        }

        match entry.kind {
            EntryKind::File => ChildAction::Record,
            EntryKind::Directory => {
                if self.max_depth.is_some_and(|max| dir.depth + 1 > max) {
                    return ChildAction::BeyondDepth;
                }
                let child = join_path(&dir.path, &entry.name);
                match self.index.decide(&self.layout, &child) {
                    ResumeDecision::Skip { .. } => ChildAction::SkipResume,
                    ResumeDecision::Descend => ChildAction::Descend,
                }
            }
            EntryKind::Symlink | EntryKind::Other => ChildAction::Ignore,
        }
    }

    /// Catalogue a file child of `dir`
    ///
    /// The store commit happens first; the log only receives entries the
    /// store did not already hold. Returns whether the file was new.
    pub fn record_file(&self, dir: &str, entry: &RemoteEntry) -> Result<bool> {
        let record = CatalogueEntry::from_remote(dir, entry);
        CrawlStats::bump(&self.stats.files_seen);

        let inserted = self
            .store
            .insert_if_absent(&record)
            .map_err(|source| CrawlerError::Record {
                path: record.path.clone(),
                source,
            })?;

        if inserted {
            self.log
                .append(&record)
                .map_err(|source| CrawlerError::Record {
                    path: record.path.clone(),
                    source,
                })?;
            self.stats.file_recorded(record.size_bytes);
            debug!(path = %record.path, size = record.size_bytes, "New file");
        }

        Ok(inserted)
    }

    /// List one directory, record its files and return its subdirectories
    ///
    /// Subdirectories come back in listing order. A missing or unreadable
    /// directory below the root is abandoned and yields no children.
    pub fn process_dir<S>(&self, source: &mut S, work: &DirWork) -> Result<Vec<DirWork>>
    where
        S: RemoteSource + ?Sized,
    {
        let entries = match self.gate.list(source, &work.path) {
            Ok(entries) => entries,
            Err(e) if e.is_recoverable() && work.depth > 0 => {
                warn!(path = %work.path, error = %e, "Abandoning subtree");
                self.stats.abandon(&work.path, e.to_string());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(CrawlerError::Listing {
                    path: work.path.clone(),
                    source,
                })
            }
        };
        CrawlStats::bump(&self.stats.dirs_listed);
        debug!(path = %work.path, entries = entries.len(), "Listed directory");

        let mut subdirs = Vec::new();
        for entry in &entries {
            match self.classify(work, entry) {
                ChildAction::Record => {
                    self.record_file(&work.path, entry)?;
                }
                ChildAction::Descend => subdirs.push(DirWork {
                    path: join_path(&work.path, &entry.name),
                    depth: work.depth + 1,
                }),
                ChildAction::SkipResume => {
                    CrawlStats::bump(&self.stats.skipped_resume);
                    debug!(dir = %work.path, name = %entry.name, "Skipping partition before resume boundary");
                }
                ChildAction::Exclude => {
                    CrawlStats::bump(&self.stats.excluded);
                    debug!(dir = %work.path, name = %entry.name, "Excluded");
                }
                ChildAction::BeyondDepth | ChildAction::Ignore => {
                    CrawlStats::bump(&self.stats.ignored);
                    debug!(dir = %work.path, name = %entry.name, kind = ?entry.kind, "Ignored");
                }
            }
        }

        Ok(subdirs)
    }

    /// Depth-first walk of the subtree rooted at `start`
    ///
    /// Stops with `Cancelled` before the next listing once the token trips.
    pub fn walk<S>(&self, source: &mut S, start: DirWork) -> Result<()>
    where
        S: RemoteSource + ?Sized,
    {
        let mut stack = vec![start];

        while let Some(work) = stack.pop() {
            if self.cancel.is_cancelled() {
                return Err(CrawlerError::Cancelled { path: work.path });
            }
            let subdirs = self.process_dir(source, &work)?;
            // reversed so the first listed child is walked first
            stack.extend(subdirs.into_iter().rev());
        }

        Ok(())
    }
}
