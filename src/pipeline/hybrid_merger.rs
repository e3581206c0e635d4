//! HYBRID-MERGER processor: merges two already-ranked
//! result streams (lexical search + vector KNN/range) into one, scored by
//! either Reciprocal Rank Fusion or a weighted-linear combination.
//!
//! Each upstream is drained by its own [`DepleterProcessor`] so the two
//! sub-pipelines run concurrently; the merger only runs once both report
//! `Done`.

use super::depleter::DepleterProcessor;
use super::{RpStatus, SearchResult};
use crate::value::{RLookupKey, RSValue};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub enum HybridScoring {
    /// `score(doc) = Σ 1 / (constant + rank_i(doc))`; absent input ranks
    /// don't contribute. Default constant 60, window 20.
    Rrf { constant: f64, window: usize },
    /// `score(doc) = Σ w_i * s_i(doc)`; absent input contributes 0.
    Linear { weights: [f64; 2] },
}

impl Default for HybridScoring {
    fn default() -> Self {
        HybridScoring::Rrf { constant: 60.0, window: 20 }
    }
}

enum Phase {
    Draining,
    Yielding(usize),
}

pub struct HybridMergerProcessor {
    search: DepleterProcessor,
    vector: DepleterProcessor,
    key_field: RLookupKey,
    /// Present only when no explicit LOAD covers the doc key's score field;
    /// `None` means the caller-visible score already sits in the row.
    score_key: Option<RLookupKey>,
    scoring: HybridScoring,
    search_buf: Vec<SearchResult>,
    vector_buf: Vec<SearchResult>,
    merged: Vec<SearchResult>,
    phase: Phase,
}

impl HybridMergerProcessor {
    pub fn new(
        search: DepleterProcessor,
        vector: DepleterProcessor,
        key_field: RLookupKey,
        score_key: Option<RLookupKey>,
        scoring: HybridScoring,
    ) -> Self {
        HybridMergerProcessor {
            search,
            vector,
            key_field,
            score_key,
            scoring,
            search_buf: Vec::new(),
            vector_buf: Vec::new(),
            merged: Vec::new(),
            phase: Phase::Draining,
        }
    }

    fn doc_key(&self, result: &SearchResult) -> String {
        result
            .row
            .read(&self.key_field)
            .and_then(RSValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| result.doc_id.to_string())
    }

    fn rank_map(&self, buf: &[SearchResult], window: Option<usize>) -> HashMap<String, usize> {
        let take = window.unwrap_or(buf.len());
        buf.iter()
            .take(take)
            .enumerate()
            .map(|(i, r)| (self.doc_key(r), i + 1))
            .collect()
    }

    fn input_score(&self, result: &SearchResult) -> f64 {
        match &self.score_key {
            Some(key) => result.row.read(key).and_then(RSValue::to_number).unwrap_or(0.0),
            None => result.score,
        }
    }

    fn merge(&mut self) {
        let mut by_key: HashMap<String, SearchResult> = HashMap::new();
        for r in self.search_buf.iter().chain(self.vector_buf.iter()) {
            by_key.entry(self.doc_key(r)).or_insert_with(|| r.clone());
        }

        let scored: Vec<(String, f64)> = match self.scoring {
            HybridScoring::Rrf { constant, window } => {
                let search_ranks = self.rank_map(&self.search_buf, Some(window));
                let vector_ranks = self.rank_map(&self.vector_buf, Some(window));
                by_key
                    .keys()
                    .map(|k| {
                        let mut score = 0.0;
                        if let Some(r) = search_ranks.get(k) {
                            score += 1.0 / (constant + *r as f64);
                        }
                        if let Some(r) = vector_ranks.get(k) {
                            score += 1.0 / (constant + *r as f64);
                        }
                        (k.clone(), score)
                    })
                    .collect()
            }
            HybridScoring::Linear { weights } => {
                let search_scores: HashMap<String, f64> = self
                    .search_buf
                    .iter()
                    .map(|r| (self.doc_key(r), self.input_score(r)))
                    .collect();
                let vector_scores: HashMap<String, f64> = self
                    .vector_buf
                    .iter()
                    .map(|r| (self.doc_key(r), self.input_score(r)))
                    .collect();
                by_key
                    .keys()
                    .map(|k| {
                        let score = weights[0] * search_scores.get(k).copied().unwrap_or(0.0)
                            + weights[1] * vector_scores.get(k).copied().unwrap_or(0.0);
                        (k.clone(), score)
                    })
                    .collect()
            }
        };

        let mut ordered = scored;
        ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));

        self.merged = ordered
            .into_iter()
            .filter_map(|(key, score)| {
                by_key.remove(&key).map(|mut result| {
                    result.score = score;
                    result
                })
            })
            .collect();
    }

    pub fn next(&mut self) -> (RpStatus, Option<SearchResult>) {
        loop {
            match self.phase {
                Phase::Draining => {
                    let (s_status, s_result) = self.search.next();
                    if let Some(r) = s_result {
                        self.search_buf.push(r);
                    }
                    let (v_status, v_result) = self.vector.next();
                    if let Some(r) = v_result {
                        self.vector_buf.push(r);
                    }
                    if s_status == RpStatus::Eof && v_status == RpStatus::Eof {
                        self.merge();
                        self.phase = Phase::Yielding(0);
                        continue;
                    }
                    return (RpStatus::Ok, None);
                }
                Phase::Yielding(pos) => {
                    if pos >= self.merged.len() {
                        return (RpStatus::Eof, None);
                    }
                    self.phase = Phase::Yielding(pos + 1);
                    return (RpStatus::Ok, Some(self.merged[pos].clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::depleter::DepleterSync;
    use crate::value::{RLookup, RLookupRow};

    fn result_with_key(doc_id: u64, key_field: &RLookupKey, key: &str) -> SearchResult {
        let mut row = RLookupRow::new();
        row.write_key(key_field, RSValue::string(key));
        SearchResult { doc_id, score: 0.0, row }
    }

    fn ready_depleter(results: Vec<SearchResult>) -> DepleterProcessor {
        let sync = DepleterSync::new(1);
        let mut depleter = DepleterProcessor::new(sync);
        depleter.start(move || results);
        std::thread::sleep(std::time::Duration::from_millis(20));
        depleter
    }

    #[test]
    fn rrf_ties_break_by_key_ascending() {
        let mut lookup = RLookup::new();
        let key_field = lookup.get_for_write("__key", true).unwrap();

        let search = vec![
            result_with_key(1, &key_field, "A"),
            result_with_key(2, &key_field, "B"),
            result_with_key(3, &key_field, "C"),
        ];
        let vector = vec![
            result_with_key(4, &key_field, "B"),
            result_with_key(5, &key_field, "A"),
            result_with_key(6, &key_field, "D"),
        ];

        let mut merger = HybridMergerProcessor::new(
            ready_depleter(search),
            ready_depleter(vector),
            key_field.clone(),
            None,
            HybridScoring::Rrf { constant: 60.0, window: 20 },
        );

        let mut order = Vec::new();
        loop {
            let (status, result) = merger.next();
            match (status, result) {
                (RpStatus::Ok, Some(r)) => order.push(r.row.read(&key_field).unwrap().as_str().unwrap().to_string()),
                (RpStatus::Eof, _) => break,
                _ => {}
            }
        }
        assert_eq!(order, vec!["A", "B", "C", "D"]);
    }
}
