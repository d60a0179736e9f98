//! Crawl counters shared by all workers

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A subtree the crawl gave up on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbandonedSubtree {
    pub path: String,
    pub reason: String,
}

/// Live counters, updated with relaxed atomics
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub dirs_listed: AtomicU64,
    pub files_seen: AtomicU64,
    pub files_new: AtomicU64,
    pub bytes_new: AtomicU64,
    pub skipped_resume: AtomicU64,
    pub excluded: AtomicU64,
    pub ignored: AtomicU64,
    abandoned: Mutex<Vec<AbandonedSubtree>>,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn file_recorded(&self, size: u64) {
        self.files_new.fetch_add(1, Ordering::Relaxed);
        self.bytes_new.fetch_add(size, Ordering::Relaxed);
    }

    pub(crate) fn abandon(&self, path: &str, reason: String) {
        self.abandoned.lock().push(AbandonedSubtree {
            path: path.to_string(),
            reason,
        });
    }

    pub fn abandoned(&self) -> Vec<AbandonedSubtree> {
        self.abandoned.lock().clone()
    }

    pub fn abandoned_count(&self) -> usize {
        self.abandoned.lock().len()
    }

    /// Point-in-time copy for progress display
    pub fn progress(&self, elapsed: Duration) -> CrawlProgress {
        CrawlProgress {
            dirs_listed: self.dirs_listed.load(Ordering::Relaxed),
            files_seen: self.files_seen.load(Ordering::Relaxed),
            files_new: self.files_new.load(Ordering::Relaxed),
            bytes_new: self.bytes_new.load(Ordering::Relaxed),
            skipped: self.skipped_resume.load(Ordering::Relaxed),
            abandoned: self.abandoned_count() as u64,
            elapsed,
        }
    }
}

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct CrawlProgress {
    pub dirs_listed: u64,
    pub files_seen: u64,
    pub files_new: u64,
    pub bytes_new: u64,
    pub skipped: u64,
    pub abandoned: u64,
    pub elapsed: Duration,
}

impl CrawlProgress {
    pub fn dirs_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.dirs_listed as f64 / secs
        } else {
            0.0
        }
    }
}
