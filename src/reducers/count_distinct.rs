//! COUNT_DISTINCT: exact distinct count via hash set.

use super::Reducer;
use crate::error::AggResult;
use crate::value::RSValue;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct CountDistinct {
    seen: HashSet<RSValue>,
}

impl Reducer for CountDistinct {
    fn add(&mut self, input: Option<&RSValue>) -> AggResult<()> {
        if let Some(value) = input {
            self.seen.insert(value.clone());
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> AggResult<RSValue> {
        Ok(RSValue::Number(self.seen.len() as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_unique_values_only() {
        let mut r = CountDistinct::default();
        for v in ["a", "b", "a", "c"] {
            r.add(Some(&RSValue::string(v))).unwrap();
        }
        assert_eq!(Box::new(r).finalize().unwrap(), RSValue::Number(3.0));
    }
}
