//! Compiles an [`AggPlan`] into a runnable [`Pipeline`].
//!
//! Walks the plan's steps in order, turning each into the matching
//! processor and threading the working [`RLookup`] through so later steps
//! resolve field names to the slots earlier steps registered. A `DISTRIBUTE`
//! step marks where shard fan-out takes over (see [`crate::network`]); this
//! compiler only builds the steps that run in one process.
//!
//! APPLY/FILTER expressions are out of scope for this crate; [`FieldRef`]
//! supplies just enough of [`Expr`] — bare `@field` references and number/
//! string literals — to exercise those steps without a real expression
//! evaluator.

use std::collections::HashMap;

use super::{AggPlan, PlanStep};
use crate::error::{AggError, AggResult};
use crate::iterators::QueryIterator;
use crate::pipeline::grouper::GroupByField;
use crate::pipeline::loader::DocStore;
use crate::pipeline::projector::Expr;
use crate::pipeline::scorer::ScoreFn;
use crate::pipeline::sorter::SortKeys;
use crate::pipeline::{
    FilterProcessor, GrouperProcessor, LoaderProcessor, PagerProcessor, Pipeline, Processor,
    ProjectorProcessor, ScorerProcessor, SorterProcessor,
};
use crate::reducers;
use crate::value::{RLookup, RSValue};

/// A bare `@field` reference, or a fallback literal when the expression
/// isn't one (a quoted string or a number). Stands in for the real
/// expression evaluator the query parser owns.
pub struct FieldRef {
    source: Option<crate::value::RLookupKey>,
    literal: RSValue,
}

impl Expr for FieldRef {
    fn eval(&self, result: &crate::pipeline::SearchResult) -> RSValue {
        match &self.source {
            Some(key) => result.row.read(key).cloned().unwrap_or(RSValue::Null),
            None => self.literal.clone(),
        }
    }
}

fn field_ref(expr: &str, lookup: &RLookup) -> FieldRef {
    if let Some(name) = expr.strip_prefix('@') {
        FieldRef { source: lookup.get_for_read(name).cloned(), literal: RSValue::Null }
    } else if let Ok(n) = expr.parse::<f64>() {
        FieldRef { source: None, literal: RSValue::Number(n) }
    } else {
        FieldRef { source: None, literal: RSValue::string(expr.trim_matches('"').to_string()) }
    }
}

/// The external collaborators a compiled plan needs at its root: the index
/// iterator driving the scan, the scoring function applied to it, and the
/// document store LOAD/GROUP steps read fields from.
pub struct CompileInputs {
    pub index: QueryIterator,
    pub scorer: Box<dyn ScoreFn>,
    pub doc_store: Box<dyn DocStore>,
}

/// Builds a [`Pipeline`] implementing every local step of `plan`, in order.
/// Encountering a `DISTRIBUTE` step ends local compilation there — its
/// `remote_plan` is the network layer's responsibility, not this
/// function's; steps after it are still compiled against the distribute
/// step's lookup, matching how a shard's own coordinator continues the
/// local tail after gathering remote results.
pub fn compile(plan: &AggPlan, inputs: CompileInputs) -> AggResult<Pipeline> {
    let mut steps = plan.steps().iter();
    let mut lookup = match steps.next() {
        Some(PlanStep::Root(l)) => l.clone(),
        _ => return Err(AggError::BuildPlan("plan does not start with ROOT".into())),
    };

    let mut pipeline = Pipeline::new();
    pipeline.push_rp(Processor::Index(Box::new(inputs.index)));
    pipeline.push_rp(Processor::Scorer(ScorerProcessor::new(inputs.scorer)));

    let mut doc_store = Some(inputs.doc_store);

    for step in steps {
        match step {
            PlanStep::Root(_) => {
                return Err(AggError::BuildPlan("ROOT step may only appear once".into()));
            }
            PlanStep::Apply(apply) => {
                let alias = apply.alias.as_deref().unwrap_or(&apply.expr);
                let output_key = lookup
                    .get_for_write(alias, true)
                    .expect("get_for_write(create=true) always returns Some");
                let expr = field_ref(&apply.expr, &lookup);
                pipeline.push_rp(Processor::Projector(ProjectorProcessor::new(
                    Box::new(expr),
                    output_key,
                )));
            }
            PlanStep::Filter(filter) => {
                let expr = field_ref(&filter.expr, &lookup);
                pipeline.push_rp(Processor::Filter(FilterProcessor::new(Box::new(expr))));
            }
            PlanStep::Arrange(arrange) => {
                let keys = if arrange.sort_keys.is_empty() {
                    SortKeys::ByScore
                } else {
                    SortKeys::ByFields {
                        keys: arrange.sort_keys.clone(),
                        ascending: arrange.ascending.clone(),
                    }
                };
                let heap_cap = match arrange.limit {
                    Some(limit) => arrange.offset.saturating_add(limit),
                    None => usize::MAX,
                };
                pipeline.push_rp(Processor::Sorter(SorterProcessor::new(keys, heap_cap)));
                if let Some(limit) = arrange.limit {
                    pipeline.push_rp(Processor::Pager(PagerProcessor::new(arrange.offset, limit)));
                }
            }
            PlanStep::Load(load) => {
                let fields = load
                    .fields
                    .clone()
                    .unwrap_or_else(|| lookup.iter().map(|k| k.name.clone()).collect());
                for field in &fields {
                    lookup.get_for_write(field, true);
                }
                let store = doc_store
                    .take()
                    .ok_or_else(|| AggError::BuildPlan("plan has more than one LOAD step".into()))?;
                pipeline.push_rp(Processor::Loader(LoaderProcessor::new(store, fields, lookup.clone())));
            }
            PlanStep::Group(group) => {
                let group_by = group
                    .group_by
                    .iter()
                    .map(|field| {
                        let source_key = lookup
                            .get_for_read(field)
                            .cloned()
                            .unwrap_or_else(|| lookup.get_for_write(field, true).unwrap());
                        GroupByField { field: field.clone(), source_key }
                    })
                    .collect();
                let mut source_keys = HashMap::new();
                for call in &group.reducers {
                    if let Some(arg) = call.args.first() {
                        if let Some(key) = lookup.get_for_read(arg) {
                            source_keys.insert(arg.clone(), key.clone());
                        }
                    }
                }
                pipeline.push_rp(Processor::Grouper(GrouperProcessor::new(
                    group_by,
                    group.reducers.clone(),
                    source_keys,
                    group.output.clone(),
                    reducers::build,
                )));
                lookup = group.output.clone();
            }
            PlanStep::VectorNormalizer { .. } => {
                // Distance normalization lives in vector_index's iterator math
                //; there is no separate processor to compile.
            }
            PlanStep::Distribute(distribute) => {
                lookup = distribute.lookup.clone();
            }
        }
    }

    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::step::{ApplyStep, ArrangeStep, FilterStep, GroupStep, LoadStep};
    use crate::pipeline::scorer::PassThroughScore;
    use crate::pipeline::RpStatus;
    use crate::reducers::{ReducerCall, ReducerKind};

    struct FixedStore;
    impl DocStore for FixedStore {
        fn load(&self, doc_id: u64, field: &str) -> Option<RSValue> {
            match field {
                "category" => Some(RSValue::string(if doc_id % 2 == 0 { "even" } else { "odd" })),
                "price" => Some(RSValue::Number(doc_id as f64 * 10.0)),
                _ => None,
            }
        }
    }

    fn inputs(ids: Vec<u64>) -> CompileInputs {
        CompileInputs {
            index: QueryIterator::IdList { ids, pos: 0 },
            scorer: Box::new(PassThroughScore),
            doc_store: Box::new(FixedStore),
        }
    }

    fn drain(pipeline: &mut Pipeline) -> Vec<crate::pipeline::SearchResult> {
        let mut out = Vec::new();
        loop {
            match pipeline.next().unwrap() {
                (RpStatus::Ok, Some(r)) => out.push(r),
                (RpStatus::Ok, None) => continue,
                _ => break,
            }
        }
        out
    }

    #[test]
    fn compiles_load_then_limits_via_arrange() {
        let mut plan = AggPlan::new(RLookup::new());
        plan.add_step(PlanStep::Load(LoadStep { fields: Some(vec!["price".into()]) }));
        plan.add_step(PlanStep::Arrange(ArrangeStep {
            sort_keys: Vec::new(),
            ascending: Vec::new(),
            offset: 0,
            limit: Some(2),
            is_limited: true,
            run_local: true,
        }));
        let mut pipeline = compile(&plan, inputs(vec![1, 2, 3, 4])).unwrap();
        let results = drain(&mut pipeline);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn compiles_filter_dropping_rows_that_evaluate_falsy() {
        let mut plan = AggPlan::new(RLookup::new());
        plan.add_step(PlanStep::Load(LoadStep { fields: Some(vec!["price".into()]) }));
        plan.add_step(PlanStep::Filter(FilterStep { expr: "0".into() }));
        let mut pipeline = compile(&plan, inputs(vec![1, 2])).unwrap();
        assert!(drain(&mut pipeline).is_empty());
    }

    #[test]
    fn compiles_apply_writing_a_literal_into_an_alias() {
        let mut plan = AggPlan::new(RLookup::new());
        plan.add_step(PlanStep::Apply(ApplyStep {
            expr: "1".into(),
            alias: Some("flag".into()),
            owns_result: true,
        }));
        let mut pipeline = compile(&plan, inputs(vec![1])).unwrap();
        let results = drain(&mut pipeline);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn compiles_group_by_category_with_count_reducer() {
        let mut plan = AggPlan::new(RLookup::new());
        plan.add_step(PlanStep::Load(LoadStep { fields: Some(vec!["category".into()]) }));
        let mut output = RLookup::new();
        output.get_for_write("category", true);
        output.get_for_write("n", true);
        plan.add_step(PlanStep::Group(GroupStep {
            group_by: vec!["category".into()],
            reducers: vec![ReducerCall::new(ReducerKind::Count, Vec::new(), "n")],
            output,
        }));
        let mut pipeline = compile(&plan, inputs(vec![1, 2, 3, 4])).unwrap();
        let results = drain(&mut pipeline);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn rejects_a_plan_not_starting_with_root() {
        let plan = AggPlan {
            steps: vec![PlanStep::Filter(FilterStep { expr: "1".into() })],
        };
        let err = compile(&plan, inputs(vec![1])).unwrap_err();
        assert!(matches!(err, AggError::BuildPlan(_)));
    }
}
