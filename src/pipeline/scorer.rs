//! SCORER processor: applies a scoring function and may drop
//! results below `min_score`.

use super::{PipelineContext, RpStatus, SearchResult};

/// A scoring function; `BM25`/`TF-IDF`/`DISMAX`/document-score/HAMMING are
/// all out of scope (they depend on the inverted index's internals) — this
/// models the seam through which any of them plug in.
pub trait ScoreFn: Send {
    fn score(&self, result: &SearchResult) -> f64;
}

/// Score taken verbatim from whatever the upstream iterator already
/// assigned (e.g. the vector iterator's distance-derived weight).
pub struct PassThroughScore;

impl ScoreFn for PassThroughScore {
    fn score(&self, result: &SearchResult) -> f64 {
        result.score
    }
}

pub struct ScorerProcessor {
    score_fn: Box<dyn ScoreFn>,
}

impl ScorerProcessor {
    pub fn new(score_fn: Box<dyn ScoreFn>) -> Self {
        ScorerProcessor { score_fn }
    }

    pub fn next(
        &mut self,
        upstream: Option<(RpStatus, Option<SearchResult>)>,
        ctx: &mut PipelineContext,
    ) -> (RpStatus, Option<SearchResult>) {
        let Some((status, result)) = upstream else {
            return (RpStatus::Eof, None);
        };
        let Some(mut result) = result else {
            return (status, None);
        };
        result.score = self.score_fn.score(&result);
        if result.score < ctx.min_score {
            ctx.total_results = ctx.total_results.saturating_sub(1);
            return (RpStatus::Ok, None);
        }
        (status, Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScore(f64);
    impl ScoreFn for FixedScore {
        fn score(&self, _: &SearchResult) -> f64 {
            self.0
        }
    }

    #[test]
    fn drops_results_below_min_score() {
        let mut ctx = PipelineContext::new();
        ctx.min_score = 0.5;
        ctx.total_results = 1;
        let mut scorer = ScorerProcessor::new(Box::new(FixedScore(0.1)));
        let (status, result) = scorer.next(
            Some((RpStatus::Ok, Some(SearchResult::default()))),
            &mut ctx,
        );
        assert_eq!(status, RpStatus::Ok);
        assert!(result.is_none());
        assert_eq!(ctx.total_results, 0);
    }
}
