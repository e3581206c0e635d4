//! `RLookupRow`: sparse column store addressed by slot index. Values are written with `write_key` (clone into the row) or
//! `write_key_owned` (transfer ownership without an extra clone).

use super::RSValue;
use super::lookup::RLookupKey;

/// A single row of a result set, indexed by the slots a shared `RLookup`
/// assigns to field names. Most rows only populate a handful of the
/// lookup's slots, so storage grows lazily as writes touch higher slots.
#[derive(Debug, Clone, Default)]
pub struct RLookupRow {
    values: Vec<Option<RSValue>>,
}

impl RLookupRow {
    pub fn new() -> Self {
        RLookupRow::default()
    }

    fn ensure_capacity(&mut self, slot: usize) {
        if self.values.len() <= slot {
            self.values.resize(slot + 1, None);
        }
    }

    /// Writes a value into the slot a key occupies, cloning it into the row.
    pub fn write_key(&mut self, key: &RLookupKey, value: RSValue) {
        self.ensure_capacity(key.slot);
        self.values[key.slot] = Some(value);
    }

    /// Writes a value by transferring ownership; identical to `write_key` but
    /// named separately to mirror the borrow/own distinction processors rely
    /// on when deciding whether a value may be mutated in place.
    pub fn write_key_owned(&mut self, key: &RLookupKey, value: RSValue) {
        self.write_key(key, value);
    }

    pub fn read(&self, key: &RLookupKey) -> Option<&RSValue> {
        self.values.get(key.slot).and_then(|v| v.as_ref())
    }

    pub fn read_by_slot(&self, slot: usize) -> Option<&RSValue> {
        self.values.get(slot).and_then(|v| v.as_ref())
    }

    pub fn remove(&mut self, key: &RLookupKey) -> Option<RSValue> {
        self.values.get_mut(key.slot).and_then(Option::take)
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Number of populated slots, not the highest slot index touched.
    pub fn populated_len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RLookup;

    #[test]
    fn write_and_read_round_trip() {
        let mut lookup = RLookup::new();
        let key = lookup.get_for_write("score", true).unwrap();
        let mut row = RLookupRow::new();
        row.write_key(&key, RSValue::from(9.5));
        assert_eq!(row.read(&key), Some(&RSValue::Number(9.5)));
    }

    #[test]
    fn sparse_rows_skip_unwritten_slots() {
        let mut lookup = RLookup::new();
        lookup.get_for_write("a", true);
        let b = lookup.get_for_write("b", true).unwrap();
        let mut row = RLookupRow::new();
        row.write_key(&b, RSValue::from(1.0));
        assert_eq!(row.populated_len(), 1);
        assert!(row.read_by_slot(0).is_none());
    }

    #[test]
    fn remove_clears_slot() {
        let mut lookup = RLookup::new();
        let key = lookup.get_for_write("x", true).unwrap();
        let mut row = RLookupRow::new();
        row.write_key(&key, RSValue::from(1.0));
        assert!(row.remove(&key).is_some());
        assert!(row.read(&key).is_none());
    }
}
