//! Cursor registry: pauses a whole pipeline between
//! `FT.CURSOR READ` calls and garbage-collects ones the client abandons.
//!
//! Grounded on the original source's `cursor.h`: one global lookup-by-id
//! plus an idle array, both behind a single lock, a counter that both
//! mints ids and triggers periodic sweeps, and a weak reference to the
//! owning spec that must be promoted before the paused execution state is
//! touched again. Ported to Rust with a `parking_lot::Mutex`-guarded
//! `HashMap` registry instead of the original's `khash_t` + raw pthread
//! mutex.

use crate::error::{AggError, AggResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// GC every `SWEEP_INTERVAL` reservations (original source: `RSCURSORS_SWEEP_INTERVAL`).
pub const SWEEP_INTERVAL: u64 = 500;
/// Don't re-sweep more often than this even if `Reserve` would trigger it.
pub const SWEEP_THROTTLE: Duration = Duration::from_secs(1);

pub type CursorId = u64;

/// Whether a cursor belongs to the user-facing registry or the
/// coordinator's internal one; also picks the id's parity so a bare id
/// can be routed to the right list (original source's `GetGlobalCursor`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorListKind {
    User,
    Coordinator,
}

impl CursorListKind {
    fn parity(self) -> u64 {
        match self {
            CursorListKind::User => 0,
            CursorListKind::Coordinator => 1,
        }
    }

    /// Picks the registry a raw id belongs to, by parity.
    pub fn for_id(id: CursorId) -> Self {
        if id % 2 == 1 {
            CursorListKind::Coordinator
        } else {
            CursorListKind::User
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Not in the idle array (either never paused, or currently taken for
    /// execution).
    Active,
    /// Index into the idle array.
    Idle(usize),
}

/// One registry entry. Stays resident in the
/// registry for its whole lifetime; `exec_state` is taken out while the
/// cursor is Active and executing, and handed back on `pause`.
struct Entry<S, T> {
    spec_ref: Weak<S>,
    exec_state: Option<T>,
    next_timeout: Option<Instant>,
    timeout_interval: Duration,
    pos: Position,
    is_coord: bool,
    marked_delete: bool,
}

/// The global registry of one kind (user or coordinator).
///
/// Every operation takes the single lock, exactly as the original
/// source's comment describes ("Any manipulation of the cursor list
/// happens with the GIL locked").
pub struct CursorList<S, T> {
    kind: CursorListKind,
    inner: Mutex<Inner<S, T>>,
}

struct Inner<S, T> {
    lookup: HashMap<CursorId, Entry<S, T>>,
    idle: Vec<CursorId>,
    counter: u64,
    last_collect: Option<Instant>,
    next_idle_timeout: Option<Instant>,
}

impl<S, T> CursorList<S, T> {
    pub fn new(kind: CursorListKind) -> Self {
        CursorList {
            kind,
            inner: Mutex::new(Inner {
                lookup: HashMap::new(),
                idle: Vec::new(),
                counter: 0,
                last_collect: None,
                next_idle_timeout: None,
            }),
        }
    }

    pub fn kind(&self) -> CursorListKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocates a new cursor in Active state, not present in the idle
    /// array. Every `SWEEP_INTERVAL` reservations runs `collect_idle`.
    pub fn reserve(&self, spec_ref: Weak<S>, max_idle: Duration) -> AggResult<CursorId> {
        let mut inner = self.inner.lock();
        inner.counter = inner.counter.wrapping_add(1);
        let id = inner.counter * 2 + self.kind.parity();
        if inner.lookup.contains_key(&id) {
            return Err(AggError::CursorAlloc);
        }
        inner.lookup.insert(
            id,
            Entry {
                spec_ref,
                exec_state: None,
                next_timeout: None,
                timeout_interval: max_idle,
                pos: Position::Active,
                is_coord: self.kind == CursorListKind::Coordinator,
                marked_delete: false,
            },
        );
        let should_sweep = inner.counter % SWEEP_INTERVAL == 0;
        drop(inner);
        if should_sweep {
            self.collect_idle(false);
        }
        Ok(id)
    }

    /// If Idle, removes the cursor from the idle array, flips it Active,
    /// and returns its paused execution state. If Active, Marked-Delete,
    /// or missing, returns `None`.
    pub fn take_for_execution(&self, cid: CursorId) -> Option<T> {
        let mut inner = self.inner.lock();
        let entry = inner.lookup.get(&cid)?;
        if entry.marked_delete {
            return None;
        }
        let Position::Idle(pos) = entry.pos else {
            return None;
        };
        remove_idle_at(&mut inner.idle, pos, &mut inner.lookup);
        let entry = inner.lookup.get_mut(&cid)?;
        entry.pos = Position::Active;
        entry.exec_state.take()
    }

    /// Pauses a cursor the caller currently holds (just reserved, or just
    /// taken for execution): if Marked-Delete, frees it immediately;
    /// otherwise stores `exec_state`, schedules the next timeout, and
    /// appends it to the idle array.
    pub fn pause(&self, cid: CursorId, exec_state: T) {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.lookup.get(&cid) else { return };
        if entry.marked_delete {
            inner.lookup.remove(&cid);
            return;
        }
        let deadline = Instant::now() + entry.timeout_interval;
        let pos = inner.idle.len();
        inner.idle.push(cid);
        inner.next_idle_timeout = Some(match inner.next_idle_timeout {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        let entry = inner.lookup.get_mut(&cid).expect("checked above");
        entry.exec_state = Some(exec_state);
        entry.next_timeout = Some(deadline);
        entry.pos = Position::Idle(pos);
    }

    /// Promotes a cursor's weak spec reference to a strong one, per the
    /// "failure to promote ⇒ DROPPED_BACKGROUND" invariant.
    pub fn promote_spec(&self, cid: CursorId) -> AggResult<Arc<S>> {
        let inner = self.inner.lock();
        let entry = inner.lookup.get(&cid).ok_or(AggError::CursorNotFound)?;
        entry.spec_ref.upgrade().ok_or(AggError::DroppedBackground)
    }

    pub fn is_coord(&self, cid: CursorId) -> Option<bool> {
        self.inner.lock().lookup.get(&cid).map(|e| e.is_coord)
    }

    /// Explicit destroy of a cursor the caller currently owns (Active, not
    /// present in the registry's idle bookkeeping in any caller-visible
    /// way beyond its metadata entry).
    pub fn free(&self, cid: CursorId) {
        self.inner.lock().lookup.remove(&cid);
    }

    /// Marks a cursor for deletion: if Idle, frees it now; if Active, sets
    /// the Marked-Delete flag so the next Pause frees it. Returns whether
    /// the cursor existed.
    pub fn purge(&self, cid: CursorId) -> bool {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.lookup.get(&cid) else {
            return false;
        };
        match entry.pos {
            Position::Idle(pos) => {
                remove_idle_at(&mut inner.idle, pos, &mut inner.lookup);
                inner.lookup.remove(&cid);
                true
            }
            Position::Active => {
                inner.lookup.get_mut(&cid).expect("checked above").marked_delete = true;
                true
            }
        }
    }

    /// Sweeps the idle array for expired cursors, freeing them. Throttled
    /// by `SWEEP_THROTTLE` unless `force` is set.
    pub fn collect_idle(&self, force: bool) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        if !force {
            if let Some(last) = inner.last_collect {
                if now.duration_since(last) < SWEEP_THROTTLE {
                    return;
                }
            }
        }
        inner.last_collect = Some(now);

        let expired: Vec<CursorId> = inner
            .idle
            .iter()
            .filter_map(|id| {
                let entry = inner.lookup.get(id)?;
                let deadline = entry.next_timeout?;
                (now >= deadline).then_some(*id)
            })
            .collect();

        for id in &expired {
            inner.lookup.remove(id);
        }
        inner.idle.retain(|id| inner.lookup.contains_key(id));
        let idle = inner.idle.clone();
        for (pos, id) in idle.into_iter().enumerate() {
            if let Some(entry) = inner.lookup.get_mut(&id) {
                entry.pos = Position::Idle(pos);
            }
        }
        inner.next_idle_timeout = inner
            .idle
            .iter()
            .filter_map(|id| inner.lookup.get(id)?.next_timeout)
            .min();
    }

    /// Frees every cursor; Active ones are Marked-Delete instead (freed
    /// once whatever holds them calls `pause`).
    pub fn empty(&self) {
        let mut inner = self.inner.lock();
        let idle_ids: Vec<CursorId> = inner
            .lookup
            .iter()
            .filter(|(_, e)| matches!(e.pos, Position::Idle(_)))
            .map(|(id, _)| *id)
            .collect();
        for id in &idle_ids {
            inner.lookup.remove(id);
        }
        for entry in inner.lookup.values_mut() {
            entry.marked_delete = true;
        }
        inner.idle.clear();
    }
}

fn remove_idle_at<S, T>(idle: &mut Vec<CursorId>, pos: usize, lookup: &mut HashMap<CursorId, Entry<S, T>>) {
    if pos < idle.len() {
        idle.remove(pos);
    }
    for (new_pos, id) in idle.iter().enumerate().skip(pos) {
        if let Some(entry) = lookup.get_mut(id) {
            entry.pos = Position::Idle(new_pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSpec;

    #[test]
    fn reserve_assigns_parity_matching_kind() {
        let list: CursorList<FakeSpec, u32> = CursorList::new(CursorListKind::Coordinator);
        let spec = Arc::new(FakeSpec);
        let id = list.reserve(Arc::downgrade(&spec), Duration::from_secs(1)).unwrap();
        assert_eq!(id % 2, 1);
        assert_eq!(CursorListKind::for_id(id), CursorListKind::Coordinator);
    }

    #[test]
    fn fresh_reservation_is_not_idle_yet() {
        let list: CursorList<FakeSpec, u32> = CursorList::new(CursorListKind::User);
        let spec = Arc::new(FakeSpec);
        let id = list.reserve(Arc::downgrade(&spec), Duration::from_secs(60)).unwrap();
        assert!(list.take_for_execution(id).is_none());
    }

    #[test]
    fn pause_then_take_for_execution_round_trips() {
        let list: CursorList<FakeSpec, &'static str> = CursorList::new(CursorListKind::User);
        let spec = Arc::new(FakeSpec);
        let id = list.reserve(Arc::downgrade(&spec), Duration::from_secs(60)).unwrap();

        list.pause(id, "paused-state");
        let resumed = list.take_for_execution(id);
        assert_eq!(resumed, Some("paused-state"));
        assert!(list.take_for_execution(id).is_none(), "cursor is Active again, not Idle");
    }

    #[test]
    fn purge_on_idle_frees_immediately() {
        let list: CursorList<FakeSpec, u32> = CursorList::new(CursorListKind::User);
        let spec = Arc::new(FakeSpec);
        let id = list.reserve(Arc::downgrade(&spec), Duration::from_secs(60)).unwrap();
        list.pause(id, 7);
        assert!(list.purge(id));
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn purge_on_active_marks_delete_and_pause_frees_it() {
        let list: CursorList<FakeSpec, u32> = CursorList::new(CursorListKind::User);
        let spec = Arc::new(FakeSpec);
        let id = list.reserve(Arc::downgrade(&spec), Duration::from_secs(60)).unwrap();
        assert!(list.purge(id));
        assert_eq!(list.len(), 1, "marked-delete, not yet freed");
        list.pause(id, 42);
        assert_eq!(list.len(), 0, "pause on a marked-delete cursor frees it");
    }

    #[test]
    fn promote_spec_fails_once_spec_is_dropped() {
        let list: CursorList<FakeSpec, u32> = CursorList::new(CursorListKind::User);
        let spec = Arc::new(FakeSpec);
        let id = list.reserve(Arc::downgrade(&spec), Duration::from_secs(60)).unwrap();
        assert!(list.promote_spec(id).is_ok());
        drop(spec);
        assert!(matches!(list.promote_spec(id), Err(AggError::DroppedBackground)));
    }

    #[test]
    fn collect_idle_removes_expired_entries() {
        let list: CursorList<FakeSpec, u32> = CursorList::new(CursorListKind::User);
        let spec = Arc::new(FakeSpec);
        let id = list.reserve(Arc::downgrade(&spec), Duration::from_millis(0)).unwrap();
        list.pause(id, 1);
        std::thread::sleep(Duration::from_millis(5));
        list.collect_idle(true);
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn empty_marks_active_delete_and_frees_idle() {
        let list: CursorList<FakeSpec, u32> = CursorList::new(CursorListKind::User);
        let spec = Arc::new(FakeSpec);
        let active_id = list.reserve(Arc::downgrade(&spec), Duration::from_secs(60)).unwrap();
        let idle_id = list.reserve(Arc::downgrade(&spec), Duration::from_secs(60)).unwrap();
        list.pause(idle_id, 1);

        list.empty();
        assert_eq!(list.len(), 1, "only the active cursor's placeholder remains");
        assert!(list.take_for_execution(active_id).is_none());
        list.pause(active_id, 2);
        assert_eq!(list.len(), 0, "marked-delete cursor frees on pause");
    }
}
