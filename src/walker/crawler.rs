//! Crawl lifecycle
//!
//! A `Crawler` runs one crawl through a fixed sequence of states:
//!
//! ```text
//! Idle ──► Connecting ──► Walking ──► Draining ──► Closed
//!               │                         │
//!               └────────► Failed ◄───────┘
//! ```
//!
//! With one worker the whole tree is walked depth-first on one session.
//! With N workers the first session lists the root, and every top-level
//! subdirectory becomes a unit of work on a bounded channel:
//!
//! ```text
//! Session 0: list root ──► units ──► channel ──┬── Worker 0: walk unit (session 0)
//!                                              ├── Worker 1: walk unit (session 1)
//!                                              └── Worker N: walk unit (session N)
//! ```
//!
//! All workers share one `CrawlContext`; the `ListingGate` inside it bounds
//! outstanding listings across all of them.

use crate::config::CrawlConfig;
use crate::db::{keys, AppendLog, CatalogueStore};
use crate::error::{CrawlerError, RemoteResult, Result};
use crate::remote::{Connector, ListingGate, RemoteSource};
use crate::walker::cancel::CancelToken;
use crate::walker::context::{CrawlContext, DirWork};
use crate::walker::stats::{AbandonedSubtree, CrawlProgress, CrawlStats};
use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle state of a crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Connecting,
    Walking,
    Draining,
    Closed,
    Failed { reason: String },
}

impl CrawlState {
    pub fn name(&self) -> &'static str {
        match self {
            CrawlState::Idle => "idle",
            CrawlState::Connecting => "connecting",
            CrawlState::Walking => "walking",
            CrawlState::Draining => "draining",
            CrawlState::Closed => "closed",
            CrawlState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CrawlState::Closed | CrawlState::Failed { .. })
    }
}

/// Result of a finished crawl
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub state: CrawlState,
    pub store_path: PathBuf,
    pub log_path: PathBuf,
    pub workers: usize,
    pub dirs_listed: u64,
    pub files_seen: u64,
    pub files_new: u64,
    pub bytes_new: u64,
    pub skipped_resume: u64,
    pub excluded: u64,
    pub ignored: u64,
    pub abandoned: Vec<AbandonedSubtree>,

    /// Products that had a resume boundary at start
    pub boundaries: usize,

    /// Catalogue size after the crawl
    pub catalogued: u64,
    pub duration: Duration,
}

impl CrawlReport {
    /// Closed without abandoning anything
    pub fn is_complete(&self) -> bool {
        self.state == CrawlState::Closed && self.abandoned.is_empty()
    }
}

/// Incremental catalogue crawler over any `Connector`
///
/// A crawler runs once; build a new one for the next crawl.
pub struct Crawler<C: Connector> {
    config: CrawlConfig,
    connector: C,
    state: Mutex<CrawlState>,
    stats: Arc<CrawlStats>,
    cancel: CancelToken,
}

impl<C: Connector> Crawler<C> {
    pub fn new(config: CrawlConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            state: Mutex::new(CrawlState::Idle),
            stats: Arc::new(CrawlStats::new()),
            cancel: CancelToken::new(),
        }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Token that stops the crawl before its next listing
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> CrawlState {
        self.state.lock().clone()
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    pub fn progress(&self, elapsed: Duration) -> CrawlProgress {
        self.stats.progress(elapsed)
    }

    fn transition(&self, next: CrawlState) {
        let mut state = self.state.lock();
        debug!(from = state.name(), to = next.name(), "Crawl state");
        *state = next;
    }

    fn fail(&self, error: CrawlerError) -> CrawlerError {
        self.transition(CrawlState::Failed {
            reason: error.to_string(),
        });
        error
    }

    /// Run the crawl to completion
    ///
    /// Whatever was committed before a failure stays in the store and log.
    pub fn run(&self) -> Result<CrawlReport> {
        let start = Instant::now();
        info!(
            source = %self.connector.describe(),
            root = %self.config.root,
            workers = self.config.worker_count,
            "Starting crawl"
        );

        self.transition(CrawlState::Connecting);
        let ctx = self.open_context().map_err(|e| self.fail(e))?;

        let mut sources = match self.connect_all() {
            Ok(sources) => sources,
            Err(e) => {
                let err = CrawlerError::Remote(e);
                if let Err(close_err) = ctx.log().close() {
                    warn!(error = %close_err, "Failed to close log");
                }
                self.record_outcome(&ctx, start, Some(&err));
                return Err(self.fail(err));
            }
        };

        self.transition(CrawlState::Walking);
        let walked = match sources.as_mut_slice() {
            [single] => ctx.walk(single, ctx.root_work()),
            many => self.walk_parallel(&ctx, many),
        };

        self.transition(CrawlState::Draining);
        let outcome = self.drain(&ctx, &mut sources, walked);
        self.record_outcome(&ctx, start, outcome.as_ref().err());

        match outcome.and_then(|()| self.report(&ctx, start)) {
            Ok(report) => {
                self.transition(CrawlState::Closed);
                info!(
                    dirs = report.dirs_listed,
                    files_new = report.files_new,
                    skipped = report.skipped_resume,
                    abandoned = report.abandoned.len(),
                    "Crawl completed"
                );
                Ok(report)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Run with a progress callback invoked every 100ms
    ///
    /// The callback always runs at least once.
    pub fn run_with_progress<F>(&self, progress_callback: F) -> Result<CrawlReport>
    where
        F: Fn(CrawlProgress) + Send,
    {
        let start = Instant::now();
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            let done = &done;
            let stats = &self.stats;
            scope.spawn(move || {
                loop {
                    progress_callback(stats.progress(start.elapsed()));
                    if done.load(Ordering::Relaxed) {
                        break;
                    }
                    thread::sleep(Duration::from_millis(100));
                }
            });

            let result = self.run();
            done.store(true, Ordering::SeqCst);
            result
        })
    }

    fn open_context(&self) -> Result<CrawlContext> {
        info!("Opening catalogue: {}", self.config.store_path.display());
        let store = CatalogueStore::open(&self.config.store_path)?;
        let log = AppendLog::open(&self.config.log_path)?;

        let cancel = match self.config.deadline {
            Some(limit) => self.cancel.deadline_from_now(limit),
            None => self.cancel.clone(),
        };

        let ctx = CrawlContext::new(store, log, self.config.layout())?
            .exclusions(self.config.exclusions.iter().cloned())
            .max_depth(self.config.max_depth)
            .gate(ListingGate::new(self.config.max_listings, self.config.delay))
            .stats(Arc::clone(&self.stats))
            .cancel_token(cancel);

        info!(
            products = ctx.index().len(),
            catalogued = ctx.store().count()?,
            "Loaded resume boundaries"
        );
        for (product, boundary) in ctx.index().to_strings() {
            debug!(%product, %boundary, "Resume boundary");
        }

        let store = ctx.store();
        store.set_info(keys::SOURCE, &self.connector.describe())?;
        store.set_info(keys::ROOT, &self.config.root)?;
        store.set_info(keys::START_TIME, &chrono::Utc::now().to_rfc3339())?;
        store.set_info(keys::CRAWLER_VERSION, env!("CARGO_PKG_VERSION"))?;
        store.set_info(keys::STATUS, "running")?;

        Ok(ctx)
    }

    fn connect_all(&self) -> RemoteResult<Vec<C::Source>> {
        (0..self.config.worker_count)
            .map(|id| {
                let source = self.connector.connect()?;
                debug!(worker = id, "Session open");
                Ok(source)
            })
            .collect()
    }

    fn walk_parallel(&self, ctx: &CrawlContext, sources: &mut [C::Source]) -> Result<()> {
        let root = ctx.root_work();
        let Some(first) = sources.first_mut() else {
            return Ok(());
        };
        if ctx.cancel().is_cancelled() {
            return Err(CrawlerError::Cancelled { path: root.path });
        }
        let units = ctx.process_dir(first, &root)?;
        info!(units = units.len(), workers = sources.len(), "Distributing top-level subtrees");

        let (tx, rx) = bounded::<DirWork>(sources.len() * 2);
        let mut undispatched = None;

        let results: Vec<thread::Result<Result<()>>> = thread::scope(|scope| {
            let handles: Vec<_> = sources
                .iter_mut()
                .enumerate()
                .map(|(id, source)| {
                    let rx = rx.clone();
                    scope.spawn(move || worker_loop(id, ctx, source, rx))
                })
                .collect();
            drop(rx);

            for unit in units {
                if ctx.cancel().is_cancelled() {
                    undispatched = Some(unit.path);
                    break;
                }
                if let Err(e) = tx.send(unit) {
                    // every worker has stopped
                    undispatched = Some(e.into_inner().path);
                    break;
                }
            }
            drop(tx);

            handles.into_iter().map(|h| h.join()).collect()
        });

        let mut first_error: Option<CrawlerError> = None;
        for (id, result) in results.into_iter().enumerate() {
            let err = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(_) => CrawlerError::WorkerPanicked { id },
            };
            let replace = match &first_error {
                None => true,
                Some(CrawlerError::Cancelled { .. }) => {
                    !matches!(err, CrawlerError::Cancelled { .. })
                }
                Some(_) => false,
            };
            if replace {
                first_error = Some(err);
            }
        }

        match (first_error, undispatched) {
            (Some(e), _) => Err(e),
            (None, Some(path)) => Err(CrawlerError::Cancelled { path }),
            (None, None) => Ok(()),
        }
    }

    /// Close the log, then every session, whatever the walk outcome
    fn drain(
        &self,
        ctx: &CrawlContext,
        sources: &mut [C::Source],
        walked: Result<()>,
    ) -> Result<()> {
        let log_closed = ctx.log().close();
        for (id, source) in sources.iter_mut().enumerate() {
            if let Err(e) = source.close() {
                warn!(worker = id, error = %e, "Failed to close session cleanly");
            }
        }

        walked?;
        log_closed?;

        if self.config.strict {
            let abandoned = ctx.counters().abandoned();
            if let Some(first) = abandoned.first() {
                return Err(CrawlerError::Incomplete {
                    count: abandoned.len(),
                    first: first.path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Record totals and status in `crawl_info`; failures here are logged only
    fn record_outcome(&self, ctx: &CrawlContext, start: Instant, error: Option<&CrawlerError>) {
        let status = match error {
            None => "completed",
            Some(CrawlerError::Cancelled { .. }) => "cancelled",
            Some(_) => "failed",
        };
        let progress = self.stats.progress(start.elapsed());
        let values = [
            (keys::END_TIME, chrono::Utc::now().to_rfc3339()),
            (keys::DURATION_SECS, start.elapsed().as_secs().to_string()),
            (keys::DIRS_LISTED, progress.dirs_listed.to_string()),
            (keys::FILES_SEEN, progress.files_seen.to_string()),
            (keys::FILES_NEW, progress.files_new.to_string()),
            (keys::ABANDONED, progress.abandoned.to_string()),
            (keys::STATUS, status.to_string()),
        ];

        for (key, value) in &values {
            if let Err(e) = ctx.store().set_info(key, value) {
                warn!(key, error = %e, "Failed to record crawl info");
                break;
            }
        }
    }

    /// Report for a crawl that drained cleanly
    fn report(&self, ctx: &CrawlContext, start: Instant) -> Result<CrawlReport> {
        let stats = &self.stats;
        Ok(CrawlReport {
            state: CrawlState::Closed,
            store_path: self.config.store_path.clone(),
            log_path: self.config.log_path.clone(),
            workers: self.config.worker_count,
            dirs_listed: stats.dirs_listed.load(Ordering::Relaxed),
            files_seen: stats.files_seen.load(Ordering::Relaxed),
            files_new: stats.files_new.load(Ordering::Relaxed),
            bytes_new: stats.bytes_new.load(Ordering::Relaxed),
            skipped_resume: stats.skipped_resume.load(Ordering::Relaxed),
            excluded: stats.excluded.load(Ordering::Relaxed),
            ignored: stats.ignored.load(Ordering::Relaxed),
            abandoned: stats.abandoned(),
            boundaries: ctx.index().len(),
            catalogued: ctx.store().count()?,
            duration: start.elapsed(),
        })
    }
}

/// Worker thread - walks whole units until the channel is drained
fn worker_loop<S>(id: usize, ctx: &CrawlContext, source: &mut S, units: Receiver<DirWork>) -> Result<()>
where
    S: RemoteSource + ?Sized,
{
    debug!(worker = id, "Worker started");

    for unit in units.iter() {
        debug!(worker = id, unit = %unit.path, "Walking unit");
        if let Err(e) = ctx.walk(source, unit) {
            if !matches!(e, CrawlerError::Cancelled { .. }) {
                // stop the other workers before their next listing
                ctx.cancel().cancel();
            }
            debug!(worker = id, error = %e, "Worker stopped");
            return Err(e);
        }
    }

    debug!(worker = id, "Worker finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::remote::MemoryTree;
    use tempfile::tempdir;

    fn config(dir: &tempfile::TempDir) -> CrawlConfig {
        let mut config = CrawlConfig::new("/free", dir.path().join("c.db"));
        config.delay = Duration::ZERO;
        config
    }

    fn sample_tree() -> MemoryTree {
        let tree = MemoryTree::new();
        tree.add_file("/free/prodA/2024-01-01/a.csv", 10, 1_704_067_200);
        tree.add_file("/free/prodA/2024-01-02/b.csv", 20, 1_704_153_600);
        tree.add_file("/free/prodB/2023/12/31/c.zip", 30, 1_703_980_800);
        tree.add_file("/free/bulkimage/huge.tif", 1 << 30, 0);
        tree
    }

    #[test]
    fn test_state_progression() {
        let dir = tempdir().unwrap();
        let tree = sample_tree();
        let crawler = Crawler::new(config(&dir), tree.connector());
        assert_eq!(crawler.state(), CrawlState::Idle);

        let report = crawler.run().unwrap();
        assert_eq!(crawler.state(), CrawlState::Closed);
        assert_eq!(report.state, CrawlState::Closed);
        assert!(report.is_complete());
        assert_eq!(report.files_new, 3);
        assert_eq!(report.bytes_new, 60);
        assert_eq!(report.excluded, 1);
        assert_eq!(report.catalogued, 3);
        assert_eq!(tree.session_counts(), (1, 1));
    }

    #[test]
    fn test_connect_failure_is_failed_state() {
        let dir = tempdir().unwrap();
        let tree = sample_tree();
        tree.fail_connect(RemoteError::ConnectionFailed {
            server: "memory".into(),
            reason: "refused".into(),
        });

        let crawler = Crawler::new(config(&dir), tree.connector());
        let err = crawler.run().unwrap_err();
        assert!(matches!(err, CrawlerError::Remote(_)));
        assert!(matches!(crawler.state(), CrawlState::Failed { .. }));
        assert!(tree.listed().is_empty());

        let store = CatalogueStore::open(&dir.path().join("c.db")).unwrap();
        assert_eq!(store.get_info(keys::STATUS).unwrap().as_deref(), Some("failed"));
    }

    #[test]
    fn test_session_lost_mid_walk_keeps_committed_entries() {
        let dir = tempdir().unwrap();
        let tree = sample_tree();
        // "/free", "/free/prodA", "/free/prodA/2024-01-01" succeed
        tree.drop_session_after(3);

        let crawler = Crawler::new(config(&dir), tree.connector());
        let err = crawler.run().unwrap_err();
        assert!(matches!(
            err,
            CrawlerError::Listing {
                source: RemoteError::SessionLost { .. },
                ..
            }
        ));
        assert_eq!(err.remote_path(), Some("/free/prodA/2024-01-02"));

        let store = CatalogueStore::open(&dir.path().join("c.db")).unwrap();
        assert!(store.exists("/free/prodA/2024-01-01/a.csv").unwrap());
        assert_eq!(store.count().unwrap(), 1);
        // sessions closed during draining
        assert_eq!(tree.session_counts(), (1, 1));
    }

    #[test]
    fn test_strict_mode_fails_on_abandoned_subtree() {
        let dir = tempdir().unwrap();
        let tree = sample_tree();
        tree.fail_listing(
            "/free/prodB",
            RemoteError::PermissionDenied {
                path: "/free/prodB".into(),
            },
        );

        let mut cfg = config(&dir);
        cfg.strict = true;
        let err = Crawler::new(cfg, tree.connector()).run().unwrap_err();
        assert!(matches!(err, CrawlerError::Incomplete { count: 1, .. }));
        assert_eq!(err.remote_path(), Some("/free/prodB"));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let tree = sample_tree();
        for n in 0..6 {
            tree.add_file(&format!("/free/prodC{n}/2024-02-0{}/x.csv", n + 1), 1, 0);
        }

        let seq_dir = tempdir().unwrap();
        let seq = Crawler::new(config(&seq_dir), tree.connector()).run().unwrap();

        let par_dir = tempdir().unwrap();
        let mut cfg = config(&par_dir);
        cfg.worker_count = 3;
        cfg.max_listings = 2;
        let par = Crawler::new(cfg, tree.connector()).run().unwrap();

        assert_eq!(par.files_new, seq.files_new);
        assert_eq!(par.dirs_listed, seq.dirs_listed);

        let seq_store = CatalogueStore::open(&seq_dir.path().join("c.db")).unwrap();
        let par_store = CatalogueStore::open(&par_dir.path().join("c.db")).unwrap();
        assert_eq!(seq_store.entries().unwrap(), par_store.entries().unwrap());
    }

    #[test]
    fn test_cancelled_before_start() {
        let dir = tempdir().unwrap();
        let tree = sample_tree();
        let crawler = Crawler::new(config(&dir), tree.connector());
        crawler.cancel_token().cancel();

        let err = crawler.run().unwrap_err();
        assert!(matches!(err, CrawlerError::Cancelled { .. }));

        let store = CatalogueStore::open(&dir.path().join("c.db")).unwrap();
        assert_eq!(store.get_info(keys::STATUS).unwrap().as_deref(), Some("cancelled"));
    }

    #[test]
    fn test_run_with_progress_reports() {
        let dir = tempdir().unwrap();
        let tree = sample_tree();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let crawler = Crawler::new(config(&dir), tree.connector());
        let report = crawler
            .run_with_progress(move |p| sink.lock().push(p.dirs_listed))
            .unwrap();

        assert_eq!(report.files_new, 3);
        assert!(!seen.lock().is_empty());
    }
}
