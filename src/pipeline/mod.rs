//! Result-processor framework: a pull-based chain where each
//! processor's `next` produces one result or a terminal status.
//!
//! Processor polymorphism is a tagged enum (`Processor`) rather than trait
//! objects — each variant's behavior lives in its own submodule and is
//! dispatched from `Processor::next`.

pub mod counter;
pub mod depleter;
pub mod grouper;
pub mod highlighter;
pub mod hybrid_merger;
pub mod loader;
pub mod network;
pub mod pager;
pub mod profile;
pub mod projector;
pub mod scorer;
pub mod sorter;
pub mod timeout;

pub use counter::CounterProcessor;
pub use depleter::DepleterProcessor;
pub use grouper::GrouperProcessor;
pub use highlighter::HighlighterProcessor;
pub use loader::{LoaderProcessor, SafeLoaderProcessor};
pub use pager::PagerProcessor;
pub use projector::{FilterProcessor, ProjectorProcessor};
pub use profile::ProfileStats;
pub use scorer::ScorerProcessor;
pub use sorter::SorterProcessor;
pub use timeout::{CancelHandle, QueryTimeout, TimeoutPolicy};

use crate::error::{AggError, AggResult, Warning};
use crate::value::RLookupRow;

/// Status returned by a processor's `next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpStatus {
    Ok,
    Eof,
    /// The whole pipeline should suspend; the caller owns resumption (used
    /// by cursors to materialize a pause point).
    Paused,
    TimedOut,
    Error,
    /// A depleter is still draining in the background; try again later.
    Depleting,
}

/// A single pulled result: one row plus identifying/scoring metadata.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub doc_id: u64,
    pub score: f64,
    pub row: RLookupRow,
}

impl SearchResult {
    pub fn clear(&mut self) {
        *self = SearchResult::default();
    }
}

/// Shared state every processor in a chain can observe: running totals,
/// soft limits, and the request-wide warning/error sink.
#[derive(Debug, Default)]
pub struct PipelineContext {
    pub total_results: u64,
    /// Soft-stop hint; an INDEX processor may use it to avoid overscanning.
    pub result_limit: Option<u64>,
    pub min_score: f64,
    pub warnings: Vec<Warning>,
    pub error: Option<AggError>,
}

impl PipelineContext {
    pub fn new() -> Self {
        PipelineContext::default()
    }

    pub fn push_warning(&mut self, warning: Warning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }
}

/// One processor kind. Variants not backed
/// by their own submodule (INDEX, METRICS) are small enough to live inline.
pub enum Processor {
    Index(Box<crate::iterators::QueryIterator>),
    Scorer(ScorerProcessor),
    Sorter(SorterProcessor),
    Pager(PagerProcessor),
    Loader(LoaderProcessor),
    SafeLoader(SafeLoaderProcessor),
    Grouper(GrouperProcessor),
    Projector(ProjectorProcessor),
    Filter(FilterProcessor),
    Highlighter(Box<HighlighterProcessor>),
    Counter(CounterProcessor),
    Network(Box<network::NetworkProcessor>),
    Depleter(Box<DepleterProcessor>),
    HybridMerger(Box<hybrid_merger::HybridMergerProcessor>),
    Profile(Box<profile::ProfileProcessor>),
}

/// The processor chain: upstream-to-downstream order, walked from the tail.
pub struct Pipeline {
    processors: Vec<Processor>,
    pub ctx: PipelineContext,
    pub timeout: Option<QueryTimeout>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline {
            processors: Vec::new(),
            ctx: PipelineContext::new(),
            timeout: None,
        }
    }

    /// `PushRP`: appends a processor so it becomes the new chain tail.
    pub fn push_rp(&mut self, processor: Processor) {
        self.processors.push(processor);
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Every `PROFILE` wrapper's accumulated stats, in chain order
    ///; see [`crate::profiling`].
    pub fn profile_stats(&self) -> Vec<(String, ProfileStats)> {
        self.processors
            .iter()
            .filter_map(|p| match p {
                Processor::Profile(pr) => Some((pr.label().to_string(), pr.stats())),
                _ => None,
            })
            .collect()
    }

    /// Pulls the next result from the tail of the chain, recursively pulling
    /// from upstream processors as each one's `next` demands it.
    pub fn next(&mut self) -> AggResult<(RpStatus, Option<SearchResult>)> {
        if let Some(timeout) = &self.timeout {
            if timeout.check_expired() {
                self.ctx.push_warning(Warning::TimedOut);
                return Ok((RpStatus::TimedOut, None));
            }
        }
        if self.processors.is_empty() {
            return Ok((RpStatus::Eof, None));
        }
        self.next_from(self.processors.len() - 1)
    }

    fn next_from(&mut self, idx: usize) -> AggResult<(RpStatus, Option<SearchResult>)> {
        let started = std::time::Instant::now();
        let upstream = if idx == 0 {
            None
        } else {
            Some(self.next_from(idx - 1)?)
        };
        let upstream_elapsed = started.elapsed();

        let (status, result) = match &mut self.processors[idx] {
            Processor::Index(it) => index_next(it, &mut self.ctx),
            Processor::Scorer(p) => p.next(upstream, &mut self.ctx),
            Processor::Sorter(p) => p.next(upstream, &mut self.ctx),
            Processor::Pager(p) => p.next(upstream),
            Processor::Loader(p) => p.next(upstream),
            Processor::SafeLoader(p) => p.next(upstream),
            Processor::Grouper(p) => p.next(upstream, &mut self.ctx),
            Processor::Projector(p) => p.next(upstream),
            Processor::Filter(p) => p.next(upstream, &mut self.ctx),
            Processor::Highlighter(p) => p.next(upstream),
            Processor::Counter(p) => p.next(upstream, &mut self.ctx),
            Processor::Network(p) => p.next(),
            Processor::Depleter(p) => p.next(),
            Processor::HybridMerger(p) => p.next(),
            Processor::Profile(p) => p.next(upstream, upstream_elapsed),
        };

        Ok((status, result))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::new()
    }
}

fn index_next(
    it: &mut crate::iterators::QueryIterator,
    ctx: &mut PipelineContext,
) -> (RpStatus, Option<SearchResult>) {
    use crate::iterators::IteratorStatus;
    match it.read() {
        IteratorStatus::Ok => {
            let rec = it.current().expect("read() == Ok implies current()");
            ctx.total_results += 1;
            (
                RpStatus::Ok,
                Some(SearchResult {
                    doc_id: rec.doc_id,
                    score: rec.weight,
                    row: RLookupRow::new(),
                }),
            )
        }
        IteratorStatus::Eof => (RpStatus::Eof, None),
        IteratorStatus::Abort => (RpStatus::Error, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterators::{QueryIterator, WildcardIterator};

    #[test]
    fn single_index_processor_drains_to_eof() {
        let mut pipeline = Pipeline::new();
        pipeline.push_rp(Processor::Index(Box::new(QueryIterator::Wildcard(
            WildcardIterator::new(2),
        ))));
        let (status1, r1) = pipeline.next().unwrap();
        assert_eq!(status1, RpStatus::Ok);
        assert_eq!(r1.unwrap().doc_id, 1);
        let (status2, _) = pipeline.next().unwrap();
        assert_eq!(status2, RpStatus::Ok);
        let (status3, _) = pipeline.next().unwrap();
        assert_eq!(status3, RpStatus::Eof);
        assert_eq!(pipeline.ctx.total_results, 2);
    }
}
