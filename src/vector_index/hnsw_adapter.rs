//! Concrete [`VectorIndexSource`] backed by `hnsw_rs`, grounded on the
//! teacher's `hnsw_index.rs` (same crate, same "rebuild from stored vectors,
//! extend the borrow to `'static` behind an `Arc`" structure).

use super::VectorIndexSource;
use hnsw_rs::hnsw::Hnsw;
use hnsw_rs::prelude::*;
use parking_lot::RwLock;
use std::sync::Arc;

struct Built {
    hnsw: Box<Hnsw<'static, f32, DistL2>>,
    _storage: Arc<Vec<Vec<f32>>>,
    index_to_doc_id: Vec<u64>,
}

unsafe impl Send for Built {}
unsafe impl Sync for Built {}

pub struct HnswVectorIndex {
    inner: RwLock<Option<Built>>,
    vectors: RwLock<Vec<(u64, Vec<f32>)>>,
    m: usize,
    ef_construction: usize,
    ef_search: usize,
}

impl HnswVectorIndex {
    pub fn new(m: usize, ef_construction: usize, ef_search: usize) -> Self {
        HnswVectorIndex {
            inner: RwLock::new(None),
            vectors: RwLock::new(Vec::new()),
            m,
            ef_construction,
            ef_search,
        }
    }

    pub fn insert(&self, doc_id: u64, vector: Vec<f32>) {
        self.vectors.write().push((doc_id, vector));
        self.rebuild();
    }

    fn rebuild(&self) {
        let vectors = self.vectors.read();
        if vectors.is_empty() {
            *self.inner.write() = None;
            return;
        }
        let storage: Vec<Vec<f32>> = vectors.iter().map(|(_, v)| v.clone()).collect();
        let index_to_doc_id: Vec<u64> = vectors.iter().map(|(id, _)| *id).collect();
        let storage = Arc::new(storage);

        // SAFETY: the Arc is moved into `Built._storage` so the refcount
        // stays >= 1 for as long as `hnsw`'s borrow is alive, and struct
        // field drop order drops `hnsw` before `_storage`.
        let storage_ref: &'static Vec<Vec<f32>> =
            unsafe { &*Arc::as_ptr(&storage).cast::<Vec<Vec<f32>>>() };

        let max_elements = storage_ref.len();
        let max_layer = if max_elements <= 1 {
            4
        } else {
            let m = (self.m as f64).max(2.0);
            ((max_elements as f64).ln() / m.ln()).ceil().clamp(4.0, 16.0) as usize
        };
        let mut hnsw: Hnsw<'static, f32, DistL2> =
            Hnsw::new(self.m, max_elements, max_layer, self.ef_construction, DistL2);
        hnsw.set_keeping_pruned(true);
        for (idx, vec) in storage_ref.iter().enumerate() {
            hnsw.insert((vec, idx));
        }

        *self.inner.write() = Some(Built { hnsw: Box::new(hnsw), _storage: storage, index_to_doc_id });
    }
}

impl VectorIndexSource for HnswVectorIndex {
    fn top_k(&self, query: &[f32], k: usize) -> Vec<(u64, f64)> {
        let guard = self.inner.read();
        let Some(built) = guard.as_ref() else { return Vec::new() };
        built
            .hnsw
            .search(query, k, self.ef_search)
            .into_iter()
            .map(|n| (built.index_to_doc_id[n.d_id], n.distance as f64))
            .collect()
    }

    fn distance(&self, doc_id: u64, query: &[f32]) -> Option<f64> {
        let vectors = self.vectors.read();
        let (_, vector) = vectors.iter().find(|(id, _)| *id == doc_id)?;
        let sum: f32 = vector.iter().zip(query).map(|(a, b)| (a - b) * (a - b)).sum();
        Some((sum.sqrt()) as f64)
    }

    fn next_batch(&self, query: &[f32], batch_size: usize, after_distance: Option<f64>) -> Vec<(u64, f64)> {
        let guard = self.inner.read();
        let Some(built) = guard.as_ref() else { return Vec::new() };
        let wanted = batch_size + after_distance.map(|_| batch_size).unwrap_or(0);
        built
            .hnsw
            .search(query, wanted.max(batch_size), self.ef_search)
            .into_iter()
            .map(|n| (built.index_to_doc_id[n.d_id], n.distance as f64))
            .filter(|(_, d)| after_distance.map(|after| *d > after).unwrap_or(true))
            .take(batch_size)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_returns_nearest_inserted_vectors() {
        let index = HnswVectorIndex::new(16, 200, 50);
        index.insert(1, vec![0.0, 0.0]);
        index.insert(2, vec![10.0, 10.0]);
        index.insert(3, vec![0.1, 0.1]);
        let results = index.top_k(&[0.0, 0.0], 2);
        let ids: Vec<u64> = results.iter().map(|(id, _)| *id).collect();
        assert!(ids.contains(&1));
        assert!(ids.contains(&3));
    }
}
