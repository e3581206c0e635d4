//! PROFILE processor: a transparent wrapper
//! that accumulates call count and cumulative wall time for the subtree
//! upstream of it, then passes results through unchanged.
//!
//! `Pipeline::next_from` times the recursive call into upstream itself and
//! hands the elapsed duration to [`ProfileProcessor::next`], so this
//! processor never needs direct access to its siblings.

use super::{RpStatus, SearchResult};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileStats {
    pub calls: u64,
    pub total_time: Duration,
}

pub struct ProfileProcessor {
    label: String,
    stats: ProfileStats,
}

impl ProfileProcessor {
    pub fn new(label: impl Into<String>) -> Self {
        ProfileProcessor { label: label.into(), stats: ProfileStats::default() }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stats(&self) -> ProfileStats {
        self.stats
    }

    pub fn next(
        &mut self,
        upstream: Option<(RpStatus, Option<SearchResult>)>,
        upstream_elapsed: Duration,
    ) -> (RpStatus, Option<SearchResult>) {
        self.stats.calls += 1;
        self.stats.total_time += upstream_elapsed;
        match upstream {
            Some((status, result)) => (status, result),
            None => (RpStatus::Eof, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_calls_and_time_without_altering_results() {
        let mut profiler = ProfileProcessor::new("root");
        let (status, result) = profiler.next(
            Some((RpStatus::Ok, Some(SearchResult::default()))),
            Duration::from_millis(5),
        );
        assert_eq!(status, RpStatus::Ok);
        assert!(result.is_some());
        let (status2, _) = profiler.next(Some((RpStatus::Eof, None)), Duration::from_millis(2));
        assert_eq!(status2, RpStatus::Eof);
        assert_eq!(profiler.stats().calls, 2);
        assert_eq!(profiler.stats().total_time, Duration::from_millis(7));
    }
}
