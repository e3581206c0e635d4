//! FT.PROFILE wrapping: instruments a freshly built
//! pipeline by interleaving PROFILE processors between its stages, then
//! shapes the collected per-stage stats into the reply's profile subtree.
//!
//! [`crate::pipeline::profile`] already ports the original source's
//! transparent profiling wrapper for a single stage; this module adds the
//! two pieces FT.PROFILE needs beyond that: wrapping a whole
//! chain at once, and reading every wrapper's stats back out in order.

use crate::pipeline::{Pipeline, Processor, ProfileStats};

fn processor_label(processor: &Processor) -> &'static str {
    match processor {
        Processor::Index(_) => "INDEX",
        Processor::Scorer(_) => "SCORER",
        Processor::Sorter(_) => "SORTER",
        Processor::Pager(_) => "PAGER",
        Processor::Loader(_) => "LOADER",
        Processor::SafeLoader(_) => "SAFE_LOADER",
        Processor::Grouper(_) => "GROUPER",
        Processor::Projector(_) => "PROJECTOR",
        Processor::Filter(_) => "FILTER",
        Processor::Highlighter(_) => "HIGHLIGHTER",
        Processor::Counter(_) => "COUNTER",
        Processor::Network(_) => "NETWORK",
        Processor::Depleter(_) => "DEPLETER",
        Processor::HybridMerger(_) => "HYBRID_MERGER",
        Processor::Profile(_) => "PROFILE",
    }
}

/// Interleaves a PROFILE processor after each stage in `steps`. Under
/// `limited` (`FT.PROFILE ... LIMITED`) the INDEX stage is left unwrapped —
/// iterator-level detail is what LIMITED mode is meant to skip, since one
/// INDEX stage can fan out into many atomic sub-iterators.
pub fn wrap_for_profiling(steps: Vec<Processor>, limited: bool) -> Vec<Processor> {
    let mut wrapped = Vec::with_capacity(steps.len() * 2);
    for step in steps {
        let skip = limited && matches!(step, Processor::Index(_));
        let label = processor_label(&step);
        wrapped.push(step);
        if !skip {
            wrapped.push(Processor::Profile(Box::new(
                crate::pipeline::profile::ProfileProcessor::new(label),
            )));
        }
    }
    wrapped
}

/// One stage's profiling line for the reply.
#[derive(Debug, Clone)]
pub struct StageProfile {
    pub label: String,
    pub calls: u64,
    pub total_time_ms: f64,
}

fn to_ms(stats: &ProfileStats) -> f64 {
    stats.total_time.as_secs_f64() * 1000.0
}

/// Reads back every PROFILE wrapper's accumulated stats in chain order,
/// plus the summed wall time for the reply's top-level `execution_time`.
pub fn collect(pipeline: &Pipeline) -> (Vec<StageProfile>, f64) {
    let stats = pipeline.profile_stats();
    let total_ms: f64 = stats.iter().map(|(_, s)| to_ms(s)).sum();
    let stages = stats
        .into_iter()
        .map(|(label, s)| StageProfile { label, calls: s.calls, total_time_ms: to_ms(&s) })
        .collect();
    (stages, total_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::scorer::PassThroughScore;
    use crate::pipeline::{RpStatus, ScorerProcessor};
    use crate::iterators::QueryIterator;

    #[test]
    fn wrap_inserts_one_profile_processor_per_stage() {
        let steps = vec![
            Processor::Index(Box::new(QueryIterator::IdList { ids: vec![1, 2], pos: 0 })),
            Processor::Scorer(ScorerProcessor::new(Box::new(PassThroughScore))),
        ];
        let wrapped = wrap_for_profiling(steps, false);
        let profile_count = wrapped.iter().filter(|p| matches!(p, Processor::Profile(_))).count();
        assert_eq!(profile_count, 2);
    }

    #[test]
    fn limited_mode_skips_wrapping_the_index_stage() {
        let steps = vec![Processor::Index(Box::new(QueryIterator::IdList { ids: vec![1], pos: 0 }))];
        let wrapped = wrap_for_profiling(steps, true);
        assert_eq!(wrapped.len(), 1);
    }

    #[test]
    fn collect_reports_calls_after_draining_pipeline() {
        let steps = vec![
            Processor::Index(Box::new(QueryIterator::IdList { ids: vec![1, 2], pos: 0 })),
            Processor::Scorer(ScorerProcessor::new(Box::new(PassThroughScore))),
        ];
        let mut pipeline = Pipeline::new();
        for step in wrap_for_profiling(steps, false) {
            pipeline.push_rp(step);
        }
        loop {
            match pipeline.next().unwrap() {
                (RpStatus::Eof, _) => break,
                _ => continue,
            }
        }
        let (stages, total_ms) = collect(&pipeline);
        assert_eq!(stages.len(), 2);
        assert!(stages.iter().all(|s| s.calls > 0));
        assert!(total_ms >= 0.0);
    }
}
