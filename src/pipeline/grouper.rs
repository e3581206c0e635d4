//! GROUPER processor: accumulates upstream
//! rows into per-group-key reducer state, then yields one finalized row per
//! group. Array-valued group keys expand into a Cartesian product.

use super::{PipelineContext, RpStatus, SearchResult};
use crate::reducers::{Reducer, ReducerCall};
use crate::value::{RLookup, RLookupKey, RSValue};
use std::collections::HashMap;

/// A group-by key's source field plus the slot it was read from.
pub struct GroupByField {
    pub field: String,
    pub source_key: RLookupKey,
}

pub struct GrouperProcessor {
    group_by: Vec<GroupByField>,
    reducer_calls: Vec<ReducerCall>,
    source_keys: HashMap<String, RLookupKey>,
    output: RLookup,
    build_reducer: fn(&ReducerCall) -> Box<dyn Reducer>,
    groups: HashMap<Vec<RSValue>, (Vec<RSValue>, Vec<Box<dyn Reducer>>)>,
    order: Vec<Vec<RSValue>>,
    phase: GrouperPhase,
}

enum GrouperPhase {
    Accumulating,
    Yielding(usize),
}

impl GrouperProcessor {
    pub fn new(
        group_by: Vec<GroupByField>,
        reducer_calls: Vec<ReducerCall>,
        source_keys: HashMap<String, RLookupKey>,
        output: RLookup,
        build_reducer: fn(&ReducerCall) -> Box<dyn Reducer>,
    ) -> Self {
        GrouperProcessor {
            group_by,
            reducer_calls,
            source_keys,
            output,
            build_reducer,
            groups: HashMap::new(),
            order: Vec::new(),
            phase: GrouperPhase::Accumulating,
        }
    }

    /// Expands array-valued group keys into every combination.
    fn key_combinations(&self, result: &SearchResult) -> Vec<Vec<RSValue>> {
        let mut combos: Vec<Vec<RSValue>> = vec![Vec::new()];
        for gb in &self.group_by {
            let value = result.row.read(&gb.source_key).cloned().unwrap_or(RSValue::Null);
            let options: Vec<RSValue> = match value.dereferenced() {
                RSValue::Array(items) if !items.is_empty() => items.as_ref().clone(),
                RSValue::Array(_) => vec![RSValue::Null],
                other => vec![other.clone()],
            };
            let mut next = Vec::with_capacity(combos.len() * options.len());
            for combo in &combos {
                for opt in &options {
                    let mut c = combo.clone();
                    c.push(opt.clone());
                    next.push(c);
                }
            }
            combos = next;
        }
        combos
    }

    fn accumulate(&mut self, result: &SearchResult, ctx: &mut PipelineContext) {
        for key_tuple in self.key_combinations(result) {
            let entry = self.groups.entry(key_tuple.clone()).or_insert_with(|| {
                self.order.push(key_tuple.clone());
                let reducers = self.reducer_calls.iter().map(self.build_reducer).collect();
                (key_tuple.clone(), reducers)
            });
            for (call, reducer) in self.reducer_calls.iter().zip(entry.1.iter_mut()) {
                let source = call.args.first().and_then(|field| self.source_keys.get(field));
                let input = source.and_then(|key| result.row.read(key));
                if let Err(e) = reducer.add(input) {
                    ctx.error = Some(e);
                }
            }
        }
    }

    pub fn next(
        &mut self,
        upstream: Option<(RpStatus, Option<SearchResult>)>,
        ctx: &mut PipelineContext,
    ) -> (RpStatus, Option<SearchResult>) {
        if ctx.error.is_some() {
            return (RpStatus::Error, None);
        }
        loop {
            match self.phase {
                GrouperPhase::Accumulating => match &upstream {
                    Some((RpStatus::Ok, Some(result))) => {
                        self.accumulate(result, ctx);
                        return (RpStatus::Ok, None);
                    }
                    Some((RpStatus::Eof, _)) | None => {
                        self.phase = GrouperPhase::Yielding(0);
                        continue;
                    }
                    Some((other, _)) => return (*other, None),
                },
                GrouperPhase::Yielding(pos) => {
                    if pos >= self.order.len() {
                        return (RpStatus::Eof, None);
                    }
                    let key_tuple = self.order[pos].clone();
                    self.phase = GrouperPhase::Yielding(pos + 1);
                    let Some((key_values, reducers)) = self.groups.remove(&key_tuple) else {
                        continue;
                    };
                    let mut row = crate::value::RLookupRow::new();
                    for (gb, value) in self.group_by.iter().zip(key_values.into_iter()) {
                        if let Some(out_key) = self.output.get_for_read(&gb.field) {
                            row.write_key(out_key, value);
                        }
                    }
                    for (call, reducer) in self.reducer_calls.iter().zip(reducers.into_iter()) {
                        if let Some(out_key) = self.output.get_for_read(&call.alias) {
                            if let Ok(value) = reducer.finalize() {
                                row.write_key(out_key, value);
                            }
                        }
                    }
                    return (
                        RpStatus::Ok,
                        Some(SearchResult { doc_id: 0, score: 0.0, row }),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AggError;
    use crate::value::RLookupRow;

    #[derive(Default)]
    struct FailingReducer;

    impl Reducer for FailingReducer {
        fn add(&mut self, _input: Option<&RSValue>) -> crate::error::AggResult<()> {
            Err(AggError::NotNumeric)
        }

        fn finalize(self: Box<Self>) -> crate::error::AggResult<RSValue> {
            Ok(RSValue::Number(0.0))
        }
    }

    fn build_failing_reducer(_call: &ReducerCall) -> Box<dyn Reducer> {
        Box::new(FailingReducer)
    }

    #[test]
    fn reducer_add_error_is_routed_to_pipeline_context() {
        let mut source_keys = HashMap::new();
        let mut lookup = RLookup::new();
        let val_key = lookup.get_for_write("val", true).unwrap();
        source_keys.insert("val".to_string(), val_key.clone());

        let mut grouper = GrouperProcessor::new(
            vec![],
            vec![ReducerCall::new(crate::reducers::ReducerKind::Sum, vec!["val".into()], "s")],
            source_keys,
            RLookup::new(),
            build_failing_reducer,
        );

        let mut ctx = PipelineContext::new();
        let mut row = RLookupRow::new();
        row.write_key(&val_key, RSValue::Number(1.0));
        let result = SearchResult { doc_id: 1, score: 0.0, row };

        let (status, _) = grouper.next(Some((RpStatus::Ok, Some(result))), &mut ctx);
        assert_eq!(status, RpStatus::Ok);
        assert!(ctx.error.is_some());

        let (status, _) = grouper.next(Some((RpStatus::Eof, None)), &mut ctx);
        assert_eq!(status, RpStatus::Error);
    }
}
