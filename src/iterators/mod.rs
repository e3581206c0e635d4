//! Query iterators: the sum-type iterator tree that
//! walks doc ids before any result-processor sees them.
//!
//! Dynamic dispatch is expressed as a tagged enum rather than trait
//! objects — each variant implements the same `Read`/`SkipTo`/`Rewind`/
//! `Revalidate` operations through the inherent methods below.

mod intersection;
mod optional;
mod union;
mod wildcard;

pub use intersection::IntersectionIterator;
pub use optional::OptionalIterator;
pub use union::UnionIterator;
pub use wildcard::WildcardIterator;

/// Outcome of `Read`/`SkipTo` on any iterator variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorStatus {
    Ok,
    Eof,
    /// A concurrent mutation invalidated this iterator's state; abort.
    Abort,
}

/// A materialized hit: a doc id plus the weight/score the iterator assigns
/// it (e.g. OPTIONAL's virtual-record weight).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterRecord {
    pub doc_id: u64,
    pub weight: f64,
}

/// Backing data source for leaf iterators (INDEX, ID_LIST): the inverted
/// index and its doc-ID decoder are out of scope, so this is modeled as a
/// minimal trait with an in-repo fake sufficient for tests.
pub trait IndexSource {
    fn read(&mut self) -> IteratorStatus;
    fn skip_to(&mut self, doc_id: u64) -> IteratorStatus;
    fn current(&self) -> Option<IterRecord>;
    fn rewind(&mut self);
    fn max_doc_id(&self) -> u64;
}

/// The query iterator sum type.
pub enum QueryIterator {
    Index(Box<dyn IndexSource>),
    Union(UnionIterator),
    Intersection(IntersectionIterator),
    Optional(OptionalIterator),
    Wildcard(WildcardIterator),
    /// Hybrid vector KNN/range iterator; defined in [`crate::vector_index`]
    /// to keep the adaptive-mode machinery colocated with its tests.
    HybridVector(Box<crate::vector_index::VectorIterator>),
    Empty,
    /// A fixed, pre-sorted list of doc ids (e.g. explicit id filters).
    IdList { ids: Vec<u64>, pos: usize },
}

impl QueryIterator {
    pub fn read(&mut self) -> IteratorStatus {
        match self {
            QueryIterator::Index(src) => src.read(),
            QueryIterator::Union(it) => it.read(),
            QueryIterator::Intersection(it) => it.read(),
            QueryIterator::Optional(it) => it.read(),
            QueryIterator::Wildcard(it) => it.read(),
            QueryIterator::HybridVector(it) => it.read(),
            QueryIterator::Empty => IteratorStatus::Eof,
            QueryIterator::IdList { ids, pos } => {
                if *pos >= ids.len() {
                    IteratorStatus::Eof
                } else {
                    *pos += 1;
                    IteratorStatus::Ok
                }
            }
        }
    }

    pub fn skip_to(&mut self, doc_id: u64) -> IteratorStatus {
        match self {
            QueryIterator::Index(src) => src.skip_to(doc_id),
            QueryIterator::Union(it) => it.skip_to(doc_id),
            QueryIterator::Intersection(it) => it.skip_to(doc_id),
            QueryIterator::Optional(it) => it.skip_to(doc_id),
            QueryIterator::Wildcard(it) => it.skip_to(doc_id),
            QueryIterator::HybridVector(it) => it.skip_to(doc_id),
            QueryIterator::Empty => IteratorStatus::Eof,
            QueryIterator::IdList { ids, pos } => {
                // `ids` is sorted; land on the first entry >= doc_id.
                *pos = ids.partition_point(|&id| id < doc_id);
                if *pos >= ids.len() {
                    IteratorStatus::Eof
                } else {
                    *pos += 1;
                    IteratorStatus::Ok
                }
            }
        }
    }

    pub fn current(&self) -> Option<IterRecord> {
        match self {
            QueryIterator::Index(src) => src.current(),
            QueryIterator::Union(it) => it.current(),
            QueryIterator::Intersection(it) => it.current(),
            QueryIterator::Optional(it) => it.current(),
            QueryIterator::Wildcard(it) => it.current(),
            QueryIterator::HybridVector(it) => it.current(),
            QueryIterator::Empty => None,
            QueryIterator::IdList { ids, pos } => {
                if *pos == 0 || *pos > ids.len() {
                    None
                } else {
                    Some(IterRecord {
                        doc_id: ids[*pos - 1],
                        weight: 1.0,
                    })
                }
            }
        }
    }

    pub fn rewind(&mut self) {
        match self {
            QueryIterator::Index(src) => src.rewind(),
            QueryIterator::Union(it) => it.rewind(),
            QueryIterator::Intersection(it) => it.rewind(),
            QueryIterator::Optional(it) => it.rewind(),
            QueryIterator::Wildcard(it) => it.rewind(),
            QueryIterator::HybridVector(it) => it.rewind(),
            QueryIterator::Empty => {}
            QueryIterator::IdList { pos, .. } => *pos = 0,
        }
    }

    /// Revalidates after a concurrent index mutation; `Abort` propagates up
    /// through any parent iterator.
    pub fn revalidate(&mut self) -> IteratorStatus {
        match self {
            QueryIterator::Index(_) => IteratorStatus::Ok,
            QueryIterator::HybridVector(it) => it.revalidate(),
            _ => IteratorStatus::Ok,
        }
    }

    /// Optional(Wildcard) reduces to Wildcard, and Optional(Empty) reduces
    /// to an all-virtual-hits Wildcard, both at build time.
    pub fn build_optional(child: QueryIterator, max_doc_id: u64, weight: f64) -> QueryIterator {
        match child {
            QueryIterator::Wildcard(_) => QueryIterator::Wildcard(WildcardIterator::new(max_doc_id)),
            QueryIterator::Empty => QueryIterator::Wildcard(WildcardIterator::new(max_doc_id)),
            other => QueryIterator::Optional(OptionalIterator::new(Box::new(other), max_doc_id, weight)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_of_wildcard_reduces_to_wildcard() {
        let built = QueryIterator::build_optional(QueryIterator::Wildcard(WildcardIterator::new(10)), 10, 1.0);
        assert!(matches!(built, QueryIterator::Wildcard(_)));
    }

    #[test]
    fn optional_of_empty_reduces_to_wildcard() {
        let built = QueryIterator::build_optional(QueryIterator::Empty, 10, 1.0);
        assert!(matches!(built, QueryIterator::Wildcard(_)));
    }

    #[test]
    fn id_list_yields_each_id_once() {
        let mut it = QueryIterator::IdList { ids: vec![3, 7, 9], pos: 0 };
        let mut seen = Vec::new();
        while it.read() == IteratorStatus::Ok {
            seen.push(it.current().unwrap().doc_id);
        }
        assert_eq!(seen, vec![3, 7, 9]);
    }

    #[test]
    fn id_list_skip_to_lands_on_first_id_at_or_past_target() {
        let mut it = QueryIterator::IdList { ids: vec![3, 7, 9], pos: 0 };
        assert_eq!(it.skip_to(5), IteratorStatus::Ok);
        assert_eq!(it.current().unwrap().doc_id, 7);
        assert_eq!(it.skip_to(20), IteratorStatus::Eof);
    }
}
