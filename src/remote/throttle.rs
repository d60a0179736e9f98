//! Global listing gate
//!
//! Limits how many directory listings are outstanding at once across every
//! worker, and keeps the permit held for the courtesy delay after each
//! listing so the pacing applies in aggregate rather than per worker.

use crate::error::RemoteResult;
use crate::remote::{RemoteEntry, RemoteSource};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Counting gate shared by all workers of one crawl
#[derive(Debug)]
pub struct ListingGate {
    /// Permits currently available
    available: Mutex<usize>,

    /// Signalled when a permit is returned
    returned: Condvar,

    /// Maximum outstanding listings
    limit: usize,

    /// Pause after each listing (zero disables)
    delay: Duration,

    /// Listings performed through this gate
    listings: AtomicU64,
}

impl ListingGate {
    /// Create a gate allowing `limit` concurrent listings
    ///
    /// A limit of 0 is treated as 1.
    pub fn new(limit: usize, delay: Duration) -> Self {
        let limit = limit.max(1);
        Self {
            available: Mutex::new(limit),
            returned: Condvar::new(),
            limit,
            delay,
            listings: AtomicU64::new(0),
        }
    }

    /// Gate with no delay and a single permit
    pub fn unthrottled() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Maximum outstanding listings
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Pause applied after each listing
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Total listings performed so far
    pub fn listings(&self) -> u64 {
        self.listings.load(Ordering::Relaxed)
    }

    /// List `path` on `source` while holding a permit
    pub fn list<S>(&self, source: &mut S, path: &str) -> RemoteResult<Vec<RemoteEntry>>
    where
        S: RemoteSource + ?Sized,
    {
        let _permit = self.acquire();
        let result = source.list(path);
        self.listings.fetch_add(1, Ordering::Relaxed);

        if !self.delay.is_zero() {
            trace!(delay_ms = self.delay.as_millis() as u64, "Courtesy pause");
            thread::sleep(self.delay);
        }

        result
    }

    fn acquire(&self) -> Permit<'_> {
        let mut available = self.available.lock();
        while *available == 0 {
            self.returned.wait(&mut available);
        }
        *available -= 1;
        Permit { gate: self }
    }

    fn release(&self) {
        let mut available = self.available.lock();
        *available += 1;
        self.returned.notify_one();
    }
}

/// RAII permit; returned to the gate on drop
struct Permit<'a> {
    gate: &'a ListingGate,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
