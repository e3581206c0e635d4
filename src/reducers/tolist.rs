//! TOLIST: deduplicated collection reducer.
//!
//! The original dedups via a trie keyed on the value's hash; a `HashSet` of
//! hashable `RSValue`s gives the same semantics without a custom trie.

use super::Reducer;
use crate::error::AggResult;
use crate::value::RSValue;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct ToListReducer {
    seen: HashSet<RSValue>,
    /// Preserves first-seen order, matching how the original trie yields the
    /// final array in insertion order.
    order: Vec<RSValue>,
}

impl Reducer for ToListReducer {
    fn add(&mut self, input: Option<&RSValue>) -> AggResult<()> {
        let Some(value) = input else { return Ok(()) };
        if self.seen.insert(value.clone()) {
            self.order.push(value.clone());
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> AggResult<RSValue> {
        Ok(RSValue::array(self.order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicates_preserving_first_seen_order() {
        let mut r = ToListReducer::default();
        for v in ["b", "a", "b", "c", "a"] {
            r.add(Some(&RSValue::string(v))).unwrap();
        }
        let RSValue::Array(values) = Box::new(r).finalize().unwrap() else {
            panic!("expected array");
        };
        let strs: Vec<_> = values.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(strs, vec!["b", "a", "c"]);
    }
}
