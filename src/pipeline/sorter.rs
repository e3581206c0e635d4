//! SORTER processor: bounded heap of size
//! `max_results`; drains upstream fully, then yields in sorted order.

use super::{PipelineContext, RpStatus, SearchResult};
use crate::value::RSValue;
use std::cmp::Ordering;

/// Sort key extraction: by explicit field values (with an ascending bitmap)
/// or by score.
pub enum SortKeys {
    ByFields { keys: Vec<String>, ascending: Vec<bool> },
    ByScore,
}

enum Phase {
    Collecting(Vec<SearchResult>),
    Yielding(std::vec::IntoIter<SearchResult>),
}

pub struct SorterProcessor {
    keys: SortKeys,
    max_results: usize,
    phase: Phase,
}

impl SorterProcessor {
    pub fn new(keys: SortKeys, max_results: usize) -> Self {
        SorterProcessor {
            keys,
            max_results,
            phase: Phase::Collecting(Vec::new()),
        }
    }

    fn sort_key(&self, result: &SearchResult, key_idx: usize, field: &str) -> RSValue {
        match field {
            "__score" => RSValue::Number(result.score),
_name => result
                .row
                .read_by_slot(key_idx)
                .cloned()
                .unwrap_or(RSValue::Null),
        }
    }

    fn compare(&self, a: &SearchResult, b: &SearchResult) -> Ordering {
        match &self.keys {
            SortKeys::ByScore => b
                .score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id)),
            SortKeys::ByFields { keys, ascending } => {
                for (idx, (field, &asc)) in keys.iter().zip(ascending.iter()).enumerate() {
                    let ka = self.sort_key(a, idx, field);
                    let kb = self.sort_key(b, idx, field);
                    let ord = if asc { ka.cmp(&kb) } else { kb.cmp(&ka) };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.doc_id.cmp(&b.doc_id)
            }
        }
    }

    pub fn next(
        &mut self,
        upstream: Option<(RpStatus, Option<SearchResult>)>,
        ctx: &mut PipelineContext,
    ) -> (RpStatus, Option<SearchResult>) {
        loop {
            match &mut self.phase {
                Phase::Collecting(buf) => match &upstream {
                    Some((RpStatus::Ok, Some(_))) => {
                        if let Some((_, Some(result))) = upstream {
                            buf.push(result);
                        }
                        return (RpStatus::Ok, None);
                    }
                    Some((RpStatus::Eof, _)) | None => {
                        let mut collected = std::mem::take(buf);
                        collected.sort_by(|a, b| self.compare(a, b));
                        collected.truncate(self.max_results);
                        ctx.total_results = collected.len() as u64;
                        self.phase = Phase::Yielding(collected.into_iter());
                        continue;
                    }
                    Some((other, _)) => return (*other, None),
                },
                Phase::Yielding(iter) => {
                    return match iter.next() {
                        Some(result) => (RpStatus::Ok, Some(result)),
                        None => (RpStatus::Eof, None),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(doc_id: u64, score: f64) -> SearchResult {
        SearchResult { doc_id, score, row: Default::default() }
    }

    #[test]
    fn yields_at_most_max_results_sorted_descending_by_score() {
        let mut sorter = SorterProcessor::new(SortKeys::ByScore, 2);
        let mut ctx = PipelineContext::new();
        for (id, score) in [(1, 1.0), (2, 5.0), (3, 3.0)] {
            sorter.next(Some((RpStatus::Ok, Some(result(id, score)))), &mut ctx);
        }
        let (_, first) = sorter.next(Some((RpStatus::Eof, None)), &mut ctx);
        assert_eq!(first.unwrap().doc_id, 2);
        let (_, second) = sorter.next(Some((RpStatus::Eof, None)), &mut ctx);
        assert_eq!(second.unwrap().doc_id, 3);
        let (status, _) = sorter.next(Some((RpStatus::Eof, None)), &mut ctx);
        assert_eq!(status, RpStatus::Eof);
    }

    #[test]
    fn ties_broken_by_doc_id_ascending() {
        let mut sorter = SorterProcessor::new(SortKeys::ByScore, 10);
        let mut ctx = PipelineContext::new();
        sorter.next(Some((RpStatus::Ok, Some(result(5, 1.0)))), &mut ctx);
        sorter.next(Some((RpStatus::Ok, Some(result(2, 1.0)))), &mut ctx);
        let (_, first) = sorter.next(Some((RpStatus::Eof, None)), &mut ctx);
        assert_eq!(first.unwrap().doc_id, 2);
    }
}
