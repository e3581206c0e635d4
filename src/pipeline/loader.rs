//! LOADER / SAFE-LOADER processors: resolve requested field
//! values from the document store into each row.
//!
//! The document/field store is an external collaborator; both
//! processors depend on it only through [`DocStore`].

use super::{RpStatus, SearchResult};
use crate::value::{RLookup, RSValue};

/// Per-document field lookup, out of scope pub trait DocStore: Send {
    fn load(&self, doc_id: u64, field: &str) -> Option<RSValue>;
}

pub struct LoaderProcessor {
    store: Box<dyn DocStore>,
    fields: Vec<String>,
    lookup: RLookup,
}

impl LoaderProcessor {
    pub fn new(store: Box<dyn DocStore>, fields: Vec<String>, lookup: RLookup) -> Self {
        LoaderProcessor { store, fields, lookup }
    }

    pub fn next(
        &mut self,
        upstream: Option<(RpStatus, Option<SearchResult>)>,
    ) -> (RpStatus, Option<SearchResult>) {
        let Some((status, result)) = upstream else {
            return (RpStatus::Eof, None);
        };
        let Some(mut result) = result else {
            return (status, None);
        };
        for field in &self.fields {
            if let Some(key) = self.lookup.get_for_read(field) {
                if result.row.read(key).is_some() {
                    continue; // already resolved (sortable/cached)
                }
                if let Some(value) = self.store.load(result.doc_id, field) {
                    result.row.write_key(key, value);
                }
            }
        }
        (status, Some(result))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SafeLoaderPhase {
    Buffering,
    Yielding,
}

/// Buffers a batch of results, loads them all under a single read lock at
/// once, then yields, trading latency for fewer lock acquisitions.
pub struct SafeLoaderProcessor {
    store: Box<dyn DocStore>,
    fields: Vec<String>,
    lookup: RLookup,
    batch_size: usize,
    phase: SafeLoaderPhase,
    buffer: Vec<SearchResult>,
    yield_pos: usize,
    upstream_eof: bool,
}

impl SafeLoaderProcessor {
    pub fn new(store: Box<dyn DocStore>, fields: Vec<String>, lookup: RLookup, batch_size: usize) -> Self {
        SafeLoaderProcessor {
            store,
            fields,
            lookup,
            batch_size: batch_size.max(1),
            phase: SafeLoaderPhase::Buffering,
            buffer: Vec::new(),
            yield_pos: 0,
            upstream_eof: false,
        }
    }

    fn load_batch(&mut self) {
        for result in &mut self.buffer {
            for field in &self.fields {
                if let Some(key) = self.lookup.get_for_read(field) {
                    if result.row.read(key).is_some() {
                        continue;
                    }
                    if let Some(value) = self.store.load(result.doc_id, field) {
                        result.row.write_key(key, value);
                    }
                }
            }
        }
    }

    pub fn next(
        &mut self,
        upstream: Option<(RpStatus, Option<SearchResult>)>,
    ) -> (RpStatus, Option<SearchResult>) {
        loop {
            match self.phase {
                SafeLoaderPhase::Buffering => match &upstream {
                    Some((RpStatus::Ok, Some(_))) => {
                        if let Some((_, Some(result))) = upstream {
                            self.buffer.push(result);
                        }
                        if self.buffer.len() >= self.batch_size {
                            self.load_batch();
                            self.yield_pos = 0;
                            self.phase = SafeLoaderPhase::Yielding;
                        }
                        return (RpStatus::Ok, None);
                    }
                    Some((RpStatus::Eof, _)) | None => {
                        self.upstream_eof = true;
                        self.load_batch();
                        self.yield_pos = 0;
                        self.phase = SafeLoaderPhase::Yielding;
                        continue;
                    }
                    Some((other, _)) => return (*other, None),
                },
                SafeLoaderPhase::Yielding => {
                    if self.yield_pos < self.buffer.len() {
                        let result = self.buffer[self.yield_pos].clone();
                        self.yield_pos += 1;
                        return (RpStatus::Ok, Some(result));
                    }
                    self.buffer.clear();
                    if self.upstream_eof {
                        return (RpStatus::Eof, None);
                    }
                    self.phase = SafeLoaderPhase::Buffering;
                    return (RpStatus::Ok, None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeStore;
    impl DocStore for FakeStore {
        fn load(&self, doc_id: u64, field: &str) -> Option<RSValue> {
            Some(RSValue::string(format!("{field}-{doc_id}")))
        }
    }

    #[test]
    fn loader_fills_missing_fields() {
        let mut lookup = RLookup::new();
        lookup.get_for_write("title", true);
        let mut loader = LoaderProcessor::new(Box::new(FakeStore), vec!["title".into()], lookup);
        let result = SearchResult { doc_id: 42, score: 0.0, row: Default::default() };
        let (_, loaded) = loader.next(Some((RpStatus::Ok, Some(result))));
        let loaded = loaded.unwrap();
        let key = loader.lookup.get_for_read("title").unwrap();
        assert_eq!(loaded.row.read(key).unwrap().as_str(), Some("title-42"));
    }
}
