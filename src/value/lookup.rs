//! `RLookup`: an append-mostly, insertion-ordered registry mapping field name
//! to a slot index, shared by every processor in a pipeline.

use std::collections::HashMap;
use std::ops::BitOr;

/// Per-key behavioral flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct RLookupKeyFlags(u8);

impl RLookupKeyFlags {
    pub const HIDDEN: RLookupKeyFlags = RLookupKeyFlags(1 << 0);
    pub const EXPLICIT_RETURN: RLookupKeyFlags = RLookupKeyFlags(1 << 1);
    pub const OVERRIDE_ALLOWED: RLookupKeyFlags = RLookupKeyFlags(1 << 2);
    pub const UNRESOLVED: RLookupKeyFlags = RLookupKeyFlags(1 << 3);
    pub const SORT_VECTOR_SOURCE: RLookupKeyFlags = RLookupKeyFlags(1 << 4);
    pub const NUMERIC_TYPED: RLookupKeyFlags = RLookupKeyFlags(1 << 5);

    pub const fn empty() -> Self {
        RLookupKeyFlags(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for RLookupKeyFlags {
    type Output = RLookupKeyFlags;
    fn bitor(self, rhs: Self) -> Self {
        RLookupKeyFlags(self.0 | rhs.0)
    }
}

/// How `RLookup::get_for_write` should behave when the name is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RLookupMode {
    /// Fail if the name has not already been registered.
    ReadOnly,
    /// Register a new key if one does not already exist.
    CreateIfMissing,
}

/// A single registered field: its name, optional nested-document path, flags,
/// and the row-slot index it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RLookupKey {
    pub name: String,
    pub path: Option<String>,
    pub flags: RLookupKeyFlags,
    pub slot: usize,
}

impl RLookupKey {
    pub fn name_len(&self) -> usize {
        self.name.len()
    }
}

/// Named, slot-indexed field registry.
///
/// Keys are appended, never removed, so earlier slot indices remain stable
/// across the lifetime of a lookup — this is what lets `clone_into` preserve
/// slot indices into a fresh row.
#[derive(Debug, Clone, Default)]
pub struct RLookup {
    keys: Vec<RLookupKey>,
    by_name: HashMap<String, usize>,
}

impl RLookup {
    pub fn new() -> Self {
        RLookup::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Resolves a name to an existing key, without creating one.
    pub fn get_for_read(&self, name: &str) -> Option<&RLookupKey> {
        self.by_name.get(name).map(|&idx| &self.keys[idx])
    }

    /// Resolves a name to a key, creating a new slot for it when `create` is
    /// true and it does not already exist. Returns `None` when `create` is
    /// false and the name is unknown.
    pub fn get_for_write(&mut self, name: &str, create: bool) -> Option<RLookupKey> {
        if let Some(&idx) = self.by_name.get(name) {
            return Some(self.keys[idx].clone());
        }
        if !create {
            return None;
        }
        let slot = self.keys.len();
        let key = RLookupKey {
            name: name.to_string(),
            path: None,
            flags: RLookupKeyFlags::empty(),
            slot,
        };
        self.keys.push(key.clone());
        self.by_name.insert(name.to_string(), slot);
        Some(key)
    }

    /// Like `get_for_write` but records a nested-document path alongside the
    /// field name.
    pub fn get_for_write_with_path(&mut self, name: &str, path: &str) -> RLookupKey {
        if let Some(existing) = self.get_for_write(name, true) {
            if existing.path.as_deref() == Some(path) {
                return existing;
            }
        }
        let slot = self.keys.len();
        let key = RLookupKey {
            name: name.to_string(),
            path: Some(path.to_string()),
            flags: RLookupKeyFlags::empty(),
            slot,
        };
        self.keys.push(key.clone());
        self.by_name.insert(name.to_string(), slot);
        key
    }

    pub fn has(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RLookupKey> {
        self.keys.iter()
    }

    /// Deep-copies this lookup's key set into a fresh, independent lookup
    /// while preserving every slot index — downstream rows built against the
    /// clone remain addressable by the same keys as rows built against self.
    pub fn clone_into_new(&self) -> RLookup {
        RLookup {
            keys: self.keys.clone(),
            by_name: self.by_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_for_write_assigns_stable_slots() {
        let mut lookup = RLookup::new();
        let a = lookup.get_for_write("a", true).unwrap();
        let b = lookup.get_for_write("b", true).unwrap();
        assert_eq!(a.slot, 0);
        assert_eq!(b.slot, 1);
        // re-fetching the same name must return the same slot, not a new one
        let a_again = lookup.get_for_write("a", true).unwrap();
        assert_eq!(a_again.slot, 0);
        assert_eq!(lookup.len(), 2);
    }

    #[test]
    fn read_only_lookup_does_not_create() {
        let mut lookup = RLookup::new();
        assert!(lookup.get_for_write("missing", false).is_none());
        assert!(!lookup.has("missing"));
    }

    #[test]
    fn clone_into_new_preserves_slots() {
        let mut lookup = RLookup::new();
        lookup.get_for_write("score", true);
        lookup.get_for_write("title", true);
        let cloned = lookup.clone_into_new();
        assert_eq!(
            cloned.get_for_read("score").unwrap().slot,
            lookup.get_for_read("score").unwrap().slot
        );
    }

    #[test]
    fn flags_union_and_contains() {
        let flags = RLookupKeyFlags::HIDDEN | RLookupKeyFlags::NUMERIC_TYPED;
        assert!(flags.contains(RLookupKeyFlags::HIDDEN));
        assert!(!flags.contains(RLookupKeyFlags::EXPLICIT_RETURN));
    }
}
