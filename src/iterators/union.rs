//! UNION iterator: sorted union of child doc ids.
//! In quick-exit mode, once the minimum current id among children is found,
//! the remaining children are not advanced until the next `read`.

use super::{IterRecord, IteratorStatus, QueryIterator};

#[derive(Debug)]
pub struct UnionIterator {
    children: Vec<QueryIterator>,
    /// Per-child: has this child been read at least once since rewind/init.
    started: Vec<bool>,
    quick_exit: bool,
    current: Option<IterRecord>,
}

impl UnionIterator {
    pub fn new(children: Vec<QueryIterator>, quick_exit: bool) -> Self {
        let len = children.len();
        UnionIterator {
            children,
            started: vec![false; len],
            quick_exit,
            current: None,
        }
    }

    fn ensure_started(&mut self, idx: usize) {
        if !self.started[idx] {
            self.children[idx].read();
            self.started[idx] = true;
        }
    }

    pub fn read(&mut self) -> IteratorStatus {
        for idx in 0..self.children.len() {
            self.ensure_started(idx);
        }

        let prev_id = self.current.map(|r| r.doc_id);

        // Advance any child sitting on the previously emitted id. `quick_exit`
        // only changes how eagerly non-minimal children are skipped forward
        // in a real indexed backend; the merge order this produces is the
        // same either way, which is all this in-repo iterator models.
        for idx in 0..self.children.len() {
            if let Some(prev) = prev_id {
                if self.children[idx].current().map(|r| r.doc_id) == Some(prev) {
                    self.children[idx].read();
                }
            }
        }

        let mut best: Option<(usize, IterRecord)> = None;
        for (idx, child) in self.children.iter().enumerate() {
            if let Some(rec) = child.current() {
                match best {
                    None => best = Some((idx, rec)),
                    Some((_, b)) if rec.doc_id < b.doc_id => best = Some((idx, rec)),
                    _ => {}
                }
            }
        }

        match best {
            None => {
                self.current = None;
                IteratorStatus::Eof
            }
            Some((_, rec)) => {
                self.current = Some(rec);
                IteratorStatus::Ok
            }
        }
    }

    /// Skips every child forward to at least `target`, then reports the
    /// minimum of whatever they land on (which may be past `target`).
    pub fn skip_to(&mut self, target: u64) -> IteratorStatus {
        for idx in 0..self.children.len() {
            self.ensure_started(idx);
            if self.children[idx].current().map(|r| r.doc_id) < Some(target) {
                self.children[idx].skip_to(target);
            }
        }

        let mut best: Option<(usize, IterRecord)> = None;
        for (idx, child) in self.children.iter().enumerate() {
            if let Some(rec) = child.current() {
                match best {
                    None => best = Some((idx, rec)),
                    Some((_, b)) if rec.doc_id < b.doc_id => best = Some((idx, rec)),
                    _ => {}
                }
            }
        }

        match best {
            None => {
                self.current = None;
                IteratorStatus::Eof
            }
            Some((_, rec)) => {
                self.current = Some(rec);
                IteratorStatus::Ok
            }
        }
    }

    pub fn current(&self) -> Option<IterRecord> {
        self.current
    }

    pub fn rewind(&mut self) {
        for child in &mut self.children {
            child.rewind();
        }
        self.started.iter_mut().for_each(|s| *s = false);
        self.current = None;
    }
}
