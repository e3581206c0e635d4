//! Hybrid request builder: wires two sub-pipelines (lexical
//! SEARCH and vector VSIM) through a shared [`DepleterSync`] into a single
//! tail pipeline headed by a HYBRID-MERGER.
//!
//! Command parsing is [`crate::commands`]'s job, not this module's —
//! everything here starts from already-parsed pipeline pieces.

use crate::iterators::QueryIterator;
use crate::pipeline::depleter::{DepleterProcessor, DepleterSync};
use crate::pipeline::hybrid_merger::{HybridMergerProcessor, HybridScoring};
use crate::pipeline::loader::DocStore;
use crate::pipeline::scorer::ScoreFn;
use crate::pipeline::sorter::SortKeys;
use crate::pipeline::{Pipeline, Processor, SearchResult};
use crate::value::{RLookup, RLookupKey};

/// The doc-key field every sub-pipeline writes into its rows, used by the
/// merger to identify "the same document" across both branches.
pub const DOC_KEY_FIELD: &str = "__key";
/// Implicit score field injected when no explicit LOAD exists.
pub const IMPLICIT_SCORE_FIELD: &str = "__hybrid_score";

/// One sub-request's already-parsed pieces (index iterator, scorer,
/// per-branch ARRANGE window, and whether the caller supplied an explicit
/// LOAD that already covers the doc key).
pub struct SubRequest {
    pub index: QueryIterator,
    pub scorer: Box<dyn ScoreFn>,
    pub window: usize,
    pub explicit_load: Option<Vec<String>>,
    pub doc_store: Box<dyn DocStore>,
}

/// Scoring + concurrency knobs for the hybrid request.
pub struct HybridPipelineParams {
    pub scoring: HybridScoring,
    /// Whether the two sub-pipelines may run read locks concurrently; out
    /// of scope for this crate's in-memory `DocStore` seam, kept only so
    /// callers that do have a lock-bearing store can thread it through.
    pub synchronize_read_locks: bool,
}

impl Default for HybridPipelineParams {
    fn default() -> Self {
        HybridPipelineParams {
            scoring: HybridScoring::default(),
            synchronize_read_locks: true,
        }
    }
}

fn build_sub_pipeline(req: SubRequest, lookup: &mut RLookup) -> (Pipeline, RLookupKey, Option<RLookupKey>) {
    let key_field = lookup
        .get_for_write(DOC_KEY_FIELD, true)
        .expect("get_for_write(create=true) always returns Some");

    let needs_implicit_score = req.explicit_load.is_none();
    let score_field = needs_implicit_score.then(|| {
        lookup
            .get_for_write(IMPLICIT_SCORE_FIELD, true)
            .expect("get_for_write(create=true) always returns Some")
    });

    let mut load_fields = vec![DOC_KEY_FIELD.to_string()];
    if needs_implicit_score {
        load_fields.push(IMPLICIT_SCORE_FIELD.to_string());
    }
    if let Some(explicit) = &req.explicit_load {
        load_fields.extend(explicit.iter().cloned());
    }
    for field in &load_fields {
        lookup.get_for_write(field, true);
    }

    let mut pipeline = Pipeline::new();
    pipeline.push_rp(Processor::Index(Box::new(req.index)));
    pipeline.push_rp(Processor::Scorer(crate::pipeline::ScorerProcessor::new(req.scorer)));
    pipeline.push_rp(Processor::Loader(crate::pipeline::LoaderProcessor::new(
        req.doc_store,
        load_fields,
        lookup.clone(),
    )));
    pipeline.push_rp(Processor::Sorter(crate::pipeline::SorterProcessor::new(
        SortKeys::ByScore,
        req.window,
    )));

    (pipeline, key_field, score_field)
}

fn drain_fully(mut pipeline: Pipeline) -> Vec<SearchResult> {
    let mut out = Vec::new();
    loop {
        match pipeline.next() {
            Ok((crate::pipeline::RpStatus::Ok, Some(result))) => out.push(result),
            Ok((crate::pipeline::RpStatus::Ok, None)) => continue,
            _ => break,
        }
    }
    out
}

/// Builds the tail pipeline for a hybrid request.
/// `tail_steps` are appended after the HYBRID-MERGER, in order (the rest
/// of the aggregation pipeline — GROUP, APPLY, etc.); if none of them is a
/// SORTER, an implicit merged-score SORTER is inserted first (step 6).
pub fn build(
    search: SubRequest,
    vector: SubRequest,
    params: HybridPipelineParams,
    tail_steps: Vec<Processor>,
) -> Pipeline {
    let mut lookup = RLookup::new();
    let (search_pipeline, search_key, search_score) = build_sub_pipeline(search, &mut lookup);
    let (vector_pipeline, _vector_key, _vector_score) = build_sub_pipeline(vector, &mut lookup);

    // Both branches register the same field names into `lookup` in the
    // same order, so their keys (and thus row slots) coincide; reading
    // either branch's key/score field back works for both.
    let score_key = search_score;

    let sync = DepleterSync::new(2);
    let mut search_depleter = DepleterProcessor::new(sync.clone());
    search_depleter.start(move || drain_fully(search_pipeline));
    let mut vector_depleter = DepleterProcessor::new(sync);
    vector_depleter.start(move || drain_fully(vector_pipeline));

    let merger = HybridMergerProcessor::new(search_depleter, vector_depleter, search_key, score_key, params.scoring);

    let mut tail = Pipeline::new();
    tail.push_rp(Processor::HybridMerger(Box::new(merger)));

    let has_explicit_sorter = tail_steps.iter().any(|p| matches!(p, Processor::Sorter(_)));
    if !has_explicit_sorter {
        tail.push_rp(Processor::Sorter(crate::pipeline::SorterProcessor::new(
            SortKeys::ByScore,
            usize::MAX,
        )));
    }
    for step in tail_steps {
        tail.push_rp(step);
    }
    tail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterators::QueryIterator;
    use crate::pipeline::scorer::PassThroughScore;
    use crate::value::RSValue;

    struct EmptyStore;
    impl DocStore for EmptyStore {
        fn load(&self, doc_id: u64, field: &str) -> Option<RSValue> {
            if field == DOC_KEY_FIELD {
                Some(RSValue::string(format!("doc{doc_id}")))
            } else {
                Some(RSValue::Number(1.0))
            }
        }
    }

    fn sub_request(ids: Vec<u64>) -> SubRequest {
        SubRequest {
            index: QueryIterator::IdList { ids, pos: 0 },
            scorer: Box::new(PassThroughScore),
            window: 20,
            explicit_load: None,
            doc_store: Box::new(EmptyStore),
        }
    }

    #[test]
    fn build_injects_implicit_sorter_and_merges_both_branches() {
        let mut pipeline = build(
            sub_request(vec![1, 2]),
            sub_request(vec![2, 3]),
            HybridPipelineParams::default(),
            Vec::new(),
        );

        std::thread::sleep(std::time::Duration::from_millis(20));

        let mut doc_ids = Vec::new();
        loop {
            match pipeline.next().unwrap() {
                (crate::pipeline::RpStatus::Ok, Some(r)) => doc_ids.push(r.doc_id),
                (crate::pipeline::RpStatus::Depleting, _) => {
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
                (crate::pipeline::RpStatus::Eof, _) => break,
                _ => break,
            }
        }
        doc_ids.sort_unstable();
        doc_ids.dedup();
        assert_eq!(doc_ids, vec![1, 2, 3]);
    }
}
