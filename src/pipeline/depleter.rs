//! DEPLETER processor: drains its upstream on a background
//! worker. `DepleterSync` is the shared condvar that lets a downstream
//! waiter (the hybrid merger) wake when *any* depleter finishes.

use super::{RpStatus, SearchResult};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepleterState {
    Idle,
    Depleting,
    Done,
}

/// Shared between every depleter in a hybrid request (or any group of
/// depleters draining concurrently): a count of not-yet-done depleters plus
/// a condvar broadcast every time one finishes.
pub struct DepleterSync {
    remaining: AtomicUsize,
    lock: Mutex<()>,
    condvar: Condvar,
}

impl DepleterSync {
    pub fn new(depleter_count: usize) -> Arc<Self> {
        Arc::new(DepleterSync {
            remaining: AtomicUsize::new(depleter_count),
            lock: Mutex::new(()),
            condvar: Condvar::new(),
        })
    }

    fn mark_one_done(&self) {
        self.remaining.fetch_sub(1, Ordering::SeqCst);
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }

    pub fn all_done(&self) -> bool {
        self.remaining() == 0
    }

    /// Blocks until at least one depleter finishes since the last wake, or
    /// until all are already done.
    pub fn wait_for_progress(&self) {
        if self.all_done() {
            return;
        }
        let mut guard = self.lock.lock();
        if !self.all_done() {
            self.condvar.wait(&mut guard);
        }
    }
}

/// Drains upstream on a rayon worker thread. Buffered results accumulate in
/// a queue the owning thread drains via repeated `next()` calls.
pub struct DepleterProcessor {
    sync: Arc<DepleterSync>,
    state: DepleterState,
    buffer: Arc<Mutex<Vec<SearchResult>>>,
    done: Arc<std::sync::atomic::AtomicBool>,
    yield_pos: usize,
}

impl DepleterProcessor {
    pub fn new(sync: Arc<DepleterSync>) -> Self {
        DepleterProcessor {
            sync,
            state: DepleterState::Idle,
            buffer: Arc::new(Mutex::new(Vec::new())),
            done: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            yield_pos: 0,
        }
    }

    /// Spawns the background drain task. `drain` pulls an entire upstream
    /// pipeline to EOF; called on a rayon worker thread so the caller's
    /// `next()` never blocks.
    pub fn start<F>(&mut self, drain: F)
    where
        F: FnOnce() -> Vec<SearchResult> + Send + 'static,
    {
        self.state = DepleterState::Depleting;
        let buffer = self.buffer.clone();
        let done = self.done.clone();
        let sync = self.sync.clone();
        rayon::spawn(move || {
            let results = drain();
            *buffer.lock() = results;
            done.store(true, Ordering::SeqCst);
            sync.mark_one_done();
        });
    }

    pub fn next(&mut self) -> (RpStatus, Option<SearchResult>) {
        match self.state {
            DepleterState::Idle => (RpStatus::Depleting, None),
            DepleterState::Depleting => {
                if self.done.load(Ordering::SeqCst) {
                    self.state = DepleterState::Done;
                    self.next()
                } else {
                    (RpStatus::Depleting, None)
                }
            }
            DepleterState::Done => {
                let buffer = self.buffer.lock();
                if self.yield_pos < buffer.len() {
                    let result = buffer[self.yield_pos].clone();
                    self.yield_pos += 1;
                    (RpStatus::Ok, Some(result))
                } else {
                    (RpStatus::Eof, None)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depleter_reports_depleting_until_drain_completes() {
        let sync = DepleterSync::new(1);
        let mut depleter = DepleterProcessor::new(sync.clone());
        depleter.start(|| {
            std::thread::sleep(std::time::Duration::from_millis(10));
            vec![SearchResult { doc_id: 1, score: 0.0, row: Default::default() }]
        });
        assert_eq!(depleter.next().0, RpStatus::Depleting);
        sync.wait_for_progress();
        let mut statuses = Vec::new();
        loop {
            let (status, result) = depleter.next();
            statuses.push(status);
            if status == RpStatus::Eof || result.is_some() {
                break;
            }
        }
        assert!(statuses.contains(&RpStatus::Ok) || statuses.last() == Some(&RpStatus::Eof));
    }
}
