//! Monotonic-clock deadline tracking. Every processor polls the deadline every
//! `poll_interval` `next` calls rather than on every call, to keep the hot
//! path cheap.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What happens to a request when its deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// Discard everything produced so far; emit a single timeout error.
    Fail,
    /// Emit whatever was produced, plus a `TIMEDOUT` warning.
    Return,
}

/// A handle that can cancel a running pipeline from another thread (e.g. a
/// `FT.CURSOR DEL` arriving while a depleter is still draining).
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-request deadline plus a debug hook to force deterministic timeout
/// testing.
#[derive(Debug)]
pub struct QueryTimeout {
    start: Instant,
    duration: Option<Duration>,
    policy: TimeoutPolicy,
    poll_interval: u32,
    calls_since_poll: AtomicU32,
    cancelled: Arc<AtomicBool>,
    debug_after_n: Option<u32>,
    calls_total: AtomicU32,
}

impl QueryTimeout {
    pub fn new(duration: Option<Duration>, policy: TimeoutPolicy, poll_interval: u32) -> Self {
        QueryTimeout {
            start: Instant::now(),
            duration,
            policy,
            poll_interval: poll_interval.max(1),
            calls_since_poll: AtomicU32::new(0),
            cancelled: Arc::new(AtomicBool::new(false)),
            debug_after_n: None,
            calls_total: AtomicU32::new(0),
        }
    }

    pub fn policy(&self) -> TimeoutPolicy {
        self.policy
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: self.cancelled.clone(),
        }
    }

    /// Forces `check_expired` to report timed-out after exactly `n` calls,
    /// regardless of wall-clock elapsed — used by `_FT.DEBUG` to exercise
    /// timeout propagation deterministically in tests.
    pub fn debug_after_n(mut self, n: u32) -> Self {
        self.debug_after_n = Some(n);
        self
    }

    /// Polls the deadline, only actually checking the clock every
    /// `poll_interval` calls.
    pub fn check_expired(&self) -> bool {
        let total = self.calls_total.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(n) = self.debug_after_n {
            if total >= n {
                return true;
            }
        }
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        let prev = self.calls_since_poll.fetch_add(1, Ordering::Relaxed);
        if prev + 1 < self.poll_interval {
            return false;
        }
        self.calls_since_poll.store(0, Ordering::Relaxed);
        match self.duration {
            None => false,
            Some(d) => self.start.elapsed() >= d,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_expires_without_a_duration() {
        let t = QueryTimeout::new(None, TimeoutPolicy::Return, 1);
        for _ in 0..10 {
            assert!(!t.check_expired());
        }
    }

    #[test]
    fn expires_after_duration_elapses() {
        let t = QueryTimeout::new(Some(Duration::from_millis(1)), TimeoutPolicy::Fail, 1);
        std::thread::sleep(Duration::from_millis(5));
        assert!(t.check_expired());
    }

    #[test]
    fn debug_after_n_forces_deterministic_timeout() {
        let t = QueryTimeout::new(None, TimeoutPolicy::Return, 1).debug_after_n(3);
        assert!(!t.check_expired());
        assert!(!t.check_expired());
        assert!(t.check_expired());
    }

    #[test]
    fn cancel_handle_forces_expiry() {
        let t = QueryTimeout::new(None, TimeoutPolicy::Return, 1);
        let handle = t.cancel_handle();
        handle.cancel();
        assert!(t.check_expired());
    }
}
