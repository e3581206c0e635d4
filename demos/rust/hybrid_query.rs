//! Wires a lexical SEARCH branch and a vector VSIM branch into one merged
//! hybrid result stream via [`aggflow::hybrid::build`], then runs an
//! `FT.HYBRID`-style COMBINE RRF merge over both.
//!
//! ```bash
//! cargo run --example hybrid_query
//! ```

use aggflow::hybrid::{build, HybridPipelineParams, SubRequest, DOC_KEY_FIELD};
use aggflow::iterators::QueryIterator;
use aggflow::pipeline::loader::DocStore;
use aggflow::pipeline::scorer::{PassThroughScore, ScoreFn};
use aggflow::pipeline::{RpStatus, SearchResult};
use aggflow::value::RSValue;

/// Assigns each doc id a fixed score so both branches rank deterministically.
struct FixedScore;
impl ScoreFn for FixedScore {
    fn score(&self, result: &SearchResult) -> f64 {
        result.score
    }
}

struct Catalog;
impl DocStore for Catalog {
    fn load(&self, doc_id: u64, field: &str) -> Option<RSValue> {
        if field == DOC_KEY_FIELD {
            Some(RSValue::string(format!("doc{doc_id}")))
        } else {
            None
        }
    }
}

fn main() {
    // Lexical branch: docs 1, 2, 3 matched the text query.
    let search = SubRequest {
        index: QueryIterator::IdList { ids: vec![1, 2, 3], pos: 0 },
        scorer: Box::new(PassThroughScore),
        window: 20,
        explicit_load: None,
        doc_store: Box::new(Catalog),
    };
    // Vector branch: docs 2, 3, 4 are the nearest neighbors.
    let vector = SubRequest {
        index: QueryIterator::IdList { ids: vec![2, 3, 4], pos: 0 },
        scorer: Box::new(FixedScore),
        window: 20,
        explicit_load: None,
        doc_store: Box::new(Catalog),
    };

    let mut pipeline = build(search, vector, HybridPipelineParams::default(), Vec::new());

    let mut doc_ids = Vec::new();
    loop {
        match pipeline.next().expect("pipeline runs") {
            (RpStatus::Ok, Some(result)) => doc_ids.push(result.doc_id),
            (RpStatus::Ok, None) => continue,
            (RpStatus::Depleting, _) => {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
            (RpStatus::Eof, _) => break,
            _ => break,
        }
    }
    doc_ids.sort_unstable();
    println!("hybrid merged doc ids (union of lexical + vector branches): {doc_ids:?}");
}
