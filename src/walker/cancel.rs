//! Cooperative cancellation
//!
//! Workers check the token before each listing. Writes already in flight
//! are allowed to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that also trips once `limit` has elapsed from now
    pub fn with_deadline(limit: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(limit),
        }
    }

    /// Same flag, new deadline counted from now
    pub fn deadline_from_now(&self, limit: Duration) -> Self {
        Self {
            flag: Arc::clone(&self.flag),
            deadline: Instant::now().checked_add(limit),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.cancel();
                true
            }
            _ => false,
        }
    }

    /// Raw flag, for signal handlers
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_deadline_trips() {
        let token = CancelToken::with_deadline(Duration::ZERO);
        assert!(token.is_cancelled());
        assert!(token.flag().load(Ordering::SeqCst));
    }

    #[test]
    fn test_flag_from_signal_handler() {
        let token = CancelToken::with_deadline(Duration::from_secs(3600));
        token.flag().store(true, Ordering::SeqCst);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_deadline_from_now_shares_flag() {
        let token = CancelToken::new();
        let timed = token.deadline_from_now(Duration::from_secs(3600));
        token.cancel();
        assert!(timed.is_cancelled());
    }
}
