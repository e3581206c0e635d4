//! INTERSECTION iterator: yields doc ids present in every child, advancing
//! the child with the smallest current id until all children agree.

use super::{IterRecord, IteratorStatus, QueryIterator};

#[derive(Debug)]
pub struct IntersectionIterator {
    children: Vec<QueryIterator>,
    current: Option<IterRecord>,
}

impl IntersectionIterator {
    pub fn new(children: Vec<QueryIterator>) -> Self {
        IntersectionIterator {
            children,
            current: None,
        }
    }

    fn skip_all_to(&mut self, target: u64) -> IteratorStatus {
        for child in &mut self.children {
            if child.current().map(|r| r.doc_id) < Some(target) && child.skip_to(target) == IteratorStatus::Eof {
                return IteratorStatus::Eof;
            }
        }
        IteratorStatus::Ok
    }

    /// Converges all children on a single shared doc id at or after `seed`,
    /// advancing whichever children trail behind the running maximum until
    /// they all agree.
    fn converge(&mut self, seed: u64) -> IteratorStatus {
        let mut target = seed;
        loop {
            if self.skip_all_to(target) == IteratorStatus::Eof {
                self.current = None;
                return IteratorStatus::Eof;
            }
            let ids: Vec<u64> = self.children.iter().filter_map(|c| c.current().map(|r| r.doc_id)).collect();
            let max_id = ids.iter().copied().max().unwrap();
            if ids.iter().all(|&id| id == max_id) {
                self.current = Some(IterRecord { doc_id: max_id, weight: 1.0 });
                return IteratorStatus::Ok;
            }
            target = max_id;
        }
    }

    pub fn read(&mut self) -> IteratorStatus {
        if self.children.is_empty() {
            return IteratorStatus::Eof;
        }
        for child in &mut self.children {
            if child.current().is_none() && child.read() == IteratorStatus::Eof {
                self.current = None;
                return IteratorStatus::Eof;
            }
        }
        let seed = self.children.iter().filter_map(|c| c.current().map(|r| r.doc_id)).max().unwrap();
        let status = self.converge(seed);
        if status == IteratorStatus::Ok {
            for child in &mut self.children {
                child.read();
            }
        }
        status
    }

    /// Skips every child to at least `target`, then converges on the first
    /// shared doc id at or after it. Children are left advanced past the
    /// matched id, same as `read`, so a following `read`/`skip_to` continues
    /// from there instead of re-matching the id `current()` just reported.
    pub fn skip_to(&mut self, target: u64) -> IteratorStatus {
        if self.children.is_empty() {
            self.current = None;
            return IteratorStatus::Eof;
        }
        let status = self.converge(target);
        if status == IteratorStatus::Ok {
            for child in &mut self.children {
                child.read();
            }
        }
        status
    }

    pub fn current(&self) -> Option<IterRecord> {
        self.current
    }

    pub fn rewind(&mut self) {
        for child in &mut self.children {
            child.rewind();
        }
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_list(ids: Vec<u64>) -> QueryIterator {
        QueryIterator::IdList { ids, pos: 0 }
    }

    #[test]
    fn yields_only_ids_present_in_all_children() {
        let mut it = IntersectionIterator::new(vec![
            id_list(vec![1, 2, 3, 5]),
            id_list(vec![2, 3, 4, 5]),
        ]);
        let mut seen = Vec::new();
        while it.read() == IteratorStatus::Ok {
            seen.push(it.current().unwrap().doc_id);
        }
        assert_eq!(seen, vec![2, 3, 5]);
    }

    #[test]
    fn skip_to_converges_children_on_shared_id_at_or_past_target() {
        let mut it = IntersectionIterator::new(vec![
            id_list(vec![1, 2, 3, 5]),
            id_list(vec![2, 3, 4, 5]),
        ]);
        assert_eq!(it.skip_to(3), IteratorStatus::Ok);
        assert_eq!(it.current().unwrap().doc_id, 3);
        assert_eq!(it.read(), IteratorStatus::Ok);
        assert_eq!(it.current().unwrap().doc_id, 5);
        assert_eq!(it.read(), IteratorStatus::Eof);
    }
}
