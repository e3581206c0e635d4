//! Vector KNN/range iterator: produces the top-k (or
//! within-radius) documents by vector distance, optionally filtered by a
//! child query iterator. Three execution modes, chosen up front or
//! switched adaptively mid-query.
//!
//! The actual ANN index is out of scope; [`VectorIndexSource`] abstracts it,
//! with [`HnswVectorIndex`] wrapping `hnsw_rs` as one concrete backing.

mod hnsw_adapter;

pub use hnsw_adapter::HnswVectorIndex;

use crate::iterators::{IterRecord, IteratorStatus, QueryIterator};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorMetric {
    L2,
    Ip,
    Cosine,
}

/// Backing ANN index, abstracted around `hnsw_rs`'s `Hnsw::search` as the
/// one concrete implementation below.
pub trait VectorIndexSource: Send {
    /// One-shot top-k query, ascending distance (`STANDARD_KNN`).
    fn top_k(&self, query: &[f32], k: usize) -> Vec<(u64, f64)>;
    /// Exact distance for a single doc (`HYBRID_ADHOC_BF`).
    fn distance(&self, doc_id: u64, query: &[f32]) -> Option<f64>;
    /// Next batch of candidates in increasing distance order, resuming
    /// after `after_distance` (`HYBRID_BATCHES`).
    fn next_batch(&self, query: &[f32], batch_size: usize, after_distance: Option<f64>) -> Vec<(u64, f64)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorMode {
    StandardKnn,
    HybridAdhocBf,
    HybridBatches,
    /// Mid-query downgrade from BATCHES after the observed child-yield
    /// ratio makes it worse than brute force.
    BatchesToAdhocBf,
}

/// Heuristic mode selection when the caller doesn't force one: a heuristic
/// on estimated filter cardinality, k, and index size.
pub fn choose_mode(has_filter: bool, filter_cardinality: Option<u64>, k: usize, index_size: u64) -> VectorMode {
    if !has_filter {
        return VectorMode::StandardKnn;
    }
    match filter_cardinality {
        Some(card) if card <= (k as u64).saturating_mul(4) => VectorMode::HybridAdhocBf,
        Some(card) if index_size > 0 && card * 20 < index_size => VectorMode::HybridBatches,
        _ => VectorMode::HybridAdhocBf,
    }
}

/// A candidate kept in the min-max heap, ordered by distance descending so
/// the worst match sits at the heap's peek (ties broken by doc id
/// ascending, ).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    doc_id: u64,
    distance: f64,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.doc_id.cmp(&self.doc_id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One emitted hit: either a bare distance (`canTrimDeepResults`) or the
/// full `{vector-distance, child-subtree}` aggregate.
#[derive(Debug, Clone)]
pub enum VectorHit {
    DistanceOnly { doc_id: u64, distance: f64 },
    WithChild { doc_id: u64, distance: f64, child: IterRecord },
}

impl VectorHit {
    pub fn doc_id(&self) -> u64 {
        match self {
            VectorHit::DistanceOnly { doc_id, .. } => *doc_id,
            VectorHit::WithChild { doc_id, .. } => *doc_id,
        }
    }

    pub fn distance(&self) -> f64 {
        match self {
            VectorHit::DistanceOnly { distance, .. } => *distance,
            VectorHit::WithChild { distance, .. } => *distance,
        }
    }
}

/// Starting batch size for `HYBRID_BATCHES`, adjusted at run time from the
/// observed match ratio.
const DEFAULT_BATCH_SIZE: usize = 64;
const MIN_BATCH_SIZE: usize = 8;
const MAX_BATCH_SIZE: usize = 1024;

fn normalize_cosine(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

enum Phase {
    /// STANDARD_KNN: a one-shot result buffer, drained in order.
    DrainingResults { results: Vec<(u64, f64)>, pos: usize },
    /// HYBRID_ADHOC_BF / HYBRID_BATCHES build phase: scanning the child.
    Scanning,
    /// Heap filled; emitting worst-to-best.
    DrainingHeap,
}

pub struct VectorIterator {
    source: Box<dyn VectorIndexSource>,
    query: Vec<f32>,
    k: usize,
    metric: VectorMetric,
    mode: VectorMode,
    child: Option<Box<QueryIterator>>,
    heap: BinaryHeap<Candidate>,
    last_batch_distance: Option<f64>,
    next_batch_size: usize,
    scanned: u64,
    matched: u64,
    can_trim_deep_results: bool,
    current: Option<VectorHit>,
    phase: Phase,
}

impl VectorIterator {
    pub fn new(
        source: Box<dyn VectorIndexSource>,
        mut query: Vec<f32>,
        k: usize,
        metric: VectorMetric,
        mode: VectorMode,
        child: Option<Box<QueryIterator>>,
        can_trim_deep_results: bool,
    ) -> Self {
        if metric == VectorMetric::Cosine {
            normalize_cosine(&mut query);
        }
        let phase = match mode {
            VectorMode::StandardKnn => {
                let results = source.top_k(&query, k);
                Phase::DrainingResults { results, pos: 0 }
            }
            _ => Phase::Scanning,
        };
        VectorIterator {
            source,
            query,
            k,
            metric,
            mode,
            child,
            heap: BinaryHeap::new(),
            last_batch_distance: None,
            next_batch_size: DEFAULT_BATCH_SIZE,
            scanned: 0,
            matched: 0,
            can_trim_deep_results,
            current: None,
            phase,
        }
    }

    fn push_candidate(&mut self, doc_id: u64, distance: f64) {
        self.heap.push(Candidate { doc_id, distance });
        if self.heap.len() > self.k {
            self.heap.pop();
        }
    }

    fn scan_adhoc_bf(&mut self) -> IteratorStatus {
        let Some(child) = self.child.as_mut() else {
            self.phase = Phase::DrainingHeap;
            return IteratorStatus::Ok;
        };
        loop {
            match child.read() {
                IteratorStatus::Ok => {
                    let Some(rec) = child.current() else { continue };
                    self.scanned += 1;
                    if let Some(distance) = self.source.distance(rec.doc_id, &self.query) {
                        self.matched += 1;
                        self.push_candidate(rec.doc_id, distance);
                    }
                }
                IteratorStatus::Eof => {
                    self.phase = Phase::DrainingHeap;
                    return IteratorStatus::Ok;
                }
                IteratorStatus::Abort => return IteratorStatus::Abort,
            }
        }
    }

    fn scan_batches(&mut self) -> IteratorStatus {
        let Some(child) = self.child.as_mut() else {
            self.phase = Phase::DrainingHeap;
            return IteratorStatus::Ok;
        };
        let batch = self.source.next_batch(&self.query, self.next_batch_size, self.last_batch_distance);
        if batch.is_empty() {
            self.phase = Phase::DrainingHeap;
            return IteratorStatus::Ok;
        }
        self.last_batch_distance = batch.last().map(|(_, d)| *d);
        for (doc_id, distance) in batch {
            self.scanned += 1;
            match child.read() {
                IteratorStatus::Abort => return IteratorStatus::Abort,
                _ => {}
            }
            if child.current().map(|r| r.doc_id) == Some(doc_id) {
                self.matched += 1;
                self.push_candidate(doc_id, distance);
            }
        }
        if self.heap.len() >= self.k {
            let yield_ratio = self.matched as f64 / self.scanned.max(1) as f64;
            if yield_ratio < 0.05 {
                self.mode = VectorMode::BatchesToAdhocBf;
                if let Some(child) = self.child.as_mut() {
                    child.rewind();
                }
            } else if yield_ratio < 0.2 {
                // Most of the batch missed; grow it to amortize the round trip.
                self.next_batch_size = self.next_batch_size.saturating_mul(2).min(MAX_BATCH_SIZE);
            } else if yield_ratio > 0.6 {
                // Heap fills fast; shrink the batch to cut scan latency.
                self.next_batch_size = (self.next_batch_size / 2).max(MIN_BATCH_SIZE);
            }
        }
        IteratorStatus::Ok
    }

    pub fn read(&mut self) -> IteratorStatus {
        loop {
            match &mut self.phase {
                Phase::DrainingResults { results, pos } => {
                    if *pos >= results.len() {
                        self.current = None;
                        return IteratorStatus::Eof;
                    }
                    let (doc_id, distance) = results[*pos];
                    *pos += 1;
                    self.current = Some(self.shape_hit(doc_id, distance));
                    return IteratorStatus::Ok;
                }
                Phase::Scanning => {
                    let status = match self.mode {
                        VectorMode::HybridAdhocBf => self.scan_adhoc_bf(),
                        VectorMode::HybridBatches => self.scan_batches(),
                        VectorMode::BatchesToAdhocBf => self.scan_adhoc_bf(),
                        VectorMode::StandardKnn => unreachable!("StandardKnn never enters Scanning"),
                    };
                    if status == IteratorStatus::Abort {
                        return IteratorStatus::Abort;
                    }
                    continue;
                }
                Phase::DrainingHeap => {
                    match self.heap.pop() {
                        Some(candidate) => {
                            self.current = Some(self.shape_hit(candidate.doc_id, candidate.distance));
                            return IteratorStatus::Ok;
                        }
                        None => {
                            self.current = None;
                            return IteratorStatus::Eof;
                        }
                    }
                }
            }
        }
    }

    fn shape_hit(&self, doc_id: u64, distance: f64) -> VectorHit {
        if self.can_trim_deep_results {
            VectorHit::DistanceOnly { doc_id, distance }
        } else {
            let child_rec = self
                .child
                .as_ref()
                .and_then(|c| c.current())
                .unwrap_or(IterRecord { doc_id, weight: 1.0 });
            VectorHit::WithChild { doc_id, distance, child: child_rec }
        }
    }

    pub fn current(&self) -> Option<IterRecord> {
        self.current.as_ref().map(|hit| IterRecord {
            doc_id: hit.doc_id(),
            weight: hit.distance(),
        })
    }

    /// Results are ordered by distance, not doc id, so there is no seek
    /// structure to jump through; this degrades to a linear read until
    /// `target` is reached or passed.
    pub fn skip_to(&mut self, target: u64) -> IteratorStatus {
        loop {
            match self.current() {
                Some(rec) if rec.doc_id >= target => return IteratorStatus::Ok,
                _ => match self.read() {
                    IteratorStatus::Ok => {}
                    other => return other,
                },
            }
        }
    }

    pub fn rewind(&mut self) {
        self.heap.clear();
        self.current = None;
        self.scanned = 0;
        self.matched = 0;
        self.last_batch_distance = None;
        self.next_batch_size = DEFAULT_BATCH_SIZE;
        if let Some(child) = self.child.as_mut() {
            child.rewind();
        }
        self.phase = match self.mode {
            VectorMode::StandardKnn => {
                let results = self.source.top_k(&self.query, self.k);
                Phase::DrainingResults { results, pos: 0 }
            }
            _ => Phase::Scanning,
        };
    }

    /// Aborts if the child iterator reports a concurrent mutation.
    pub fn revalidate(&mut self) -> IteratorStatus {
        match self.child.as_mut() {
            Some(child) => child.revalidate(),
            None => IteratorStatus::Ok,
        }
    }

    pub fn metric(&self) -> VectorMetric {
        self.metric
    }

    pub fn mode(&self) -> VectorMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeIndex {
        points: Vec<(u64, f64)>,
    }

    impl VectorIndexSource for FakeIndex {
        fn top_k(&self, _query: &[f32], k: usize) -> Vec<(u64, f64)> {
            let mut sorted = self.points.clone();
            sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
            sorted.truncate(k);
            sorted
        }

        fn distance(&self, doc_id: u64, _query: &[f32]) -> Option<f64> {
            self.points.iter().find(|(id, _)| *id == doc_id).map(|(_, d)| *d)
        }

        fn next_batch(&self, _query: &[f32], _batch_size: usize, _after: Option<f64>) -> Vec<(u64, f64)> {
            Vec::new()
        }
    }

    #[test]
    fn standard_knn_yields_ascending_distance() {
        let index = FakeIndex { points: vec![(1, 0.9), (2, 0.1), (3, 0.5)] };
        let mut it = VectorIterator::new(
            Box::new(index),
            vec![1.0, 0.0],
            2,
            VectorMetric::L2,
            VectorMode::StandardKnn,
            None,
            true,
        );
        let mut seen = Vec::new();
        while it.read() == IteratorStatus::Ok {
            seen.push(it.current().unwrap().doc_id);
        }
        assert_eq!(seen, vec![2, 3]);
    }

    #[test]
    fn adhoc_bf_keeps_only_top_k_by_distance() {
        let index = FakeIndex { points: vec![(1, 0.9), (2, 0.1), (3, 0.5), (4, 0.05)] };
        let child = QueryIterator::IdList { ids: vec![1, 2, 3, 4], pos: 0 };
        let mut it = VectorIterator::new(
            Box::new(index),
            vec![1.0, 0.0],
            2,
            VectorMetric::L2,
            VectorMode::HybridAdhocBf,
            Some(Box::new(child)),
            true,
        );
        let mut seen = Vec::new();
        while it.read() == IteratorStatus::Ok {
            seen.push(it.current().unwrap().doc_id);
        }
        // heap drains worst-to-best; the kept set should be {2, 4}.
        let mut sorted_seen = seen.clone();
        sorted_seen.sort();
        assert_eq!(sorted_seen, vec![2, 4]);
    }

    #[test]
    fn cosine_metric_normalizes_query_in_place() {
        let index = FakeIndex { points: vec![] };
        let it = VectorIterator::new(
            Box::new(index),
            vec![3.0, 4.0],
            1,
            VectorMetric::Cosine,
            VectorMode::StandardKnn,
            None,
            true,
        );
        let norm: f32 = it.query.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn choose_mode_prefers_standard_knn_without_filter() {
        assert_eq!(choose_mode(false, None, 10, 1_000_000), VectorMode::StandardKnn);
    }
}
