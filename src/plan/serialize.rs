//! `Serialize(plan) -> array of command tokens`. Walks the steps in order and emits the equivalent textual
//! command so a remote sub-plan can be shipped over the wire.

use super::{AggPlan, PlanStep};
use crate::error::{AggError, AggResult};

pub fn serialize(plan: &AggPlan) -> AggResult<Vec<String>> {
    let mut tokens = Vec::new();
    for step in plan.steps() {
        match step {
            PlanStep::Root(_) => {}
            PlanStep::Apply(apply) => {
                tokens.push("APPLY".to_string());
                tokens.push(apply.expr.clone());
                if let Some(alias) = &apply.alias {
                    tokens.push("AS".to_string());
                    tokens.push(alias.clone());
                }
            }
            PlanStep::Filter(filter) => {
                tokens.push("FILTER".to_string());
                tokens.push(filter.expr.clone());
            }
            PlanStep::Arrange(arrange) => {
                if !arrange.sort_keys.is_empty() {
                    tokens.push("SORTBY".to_string());
                    tokens.push((arrange.sort_keys.len() * 2).to_string());
                    for (key, &asc) in arrange.sort_keys.iter().zip(arrange.ascending.iter()) {
                        tokens.push(key.clone());
                        tokens.push(if asc { "ASC" } else { "DESC" }.to_string());
                    }
                }
                if arrange.is_limited || arrange.limit.is_some() {
                    let limit = arrange.limit.unwrap_or(0);
                    tokens.push("LIMIT".to_string());
                    tokens.push(arrange.offset.to_string());
                    tokens.push((arrange.offset + limit).to_string());
                }
            }
            PlanStep::Load(load) => {
                tokens.push("LOAD".to_string());
                match &load.fields {
                    None => tokens.push("*".to_string()),
                    Some(fields) => {
                        tokens.push(fields.len().to_string());
                        tokens.extend(fields.iter().cloned());
                    }
                }
            }
            PlanStep::Group(group) => {
                tokens.push("GROUPBY".to_string());
                tokens.push(group.group_by.len().to_string());
                tokens.extend(group.group_by.iter().cloned());
                for reducer in &group.reducers {
                    tokens.push("REDUCE".to_string());
                    tokens.push(reducer.kind.name().to_string());
                    let mut argc = reducer.args.len();
                    if reducer.numeric_arg.is_some() {
                        argc += 1;
                    }
                    tokens.push(argc.to_string());
                    tokens.extend(reducer.args.iter().cloned());
                    if let Some(n) = reducer.numeric_arg {
                        tokens.push(n.to_string());
                    }
                    tokens.push("AS".to_string());
                    tokens.push(reducer.alias.clone());
                }
            }
            PlanStep::VectorNormalizer { .. } => {}
            PlanStep::Distribute(_) => {
                return Err(AggError::AggPlan(
                    "cannot serialize a plan containing a DISTRIBUTE step".into(),
                ));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::step::{ArrangeStep, GroupStep};
    use crate::reducers::{ReducerCall, ReducerKind};
    use crate::value::RLookup;

    #[test]
    fn serializes_groupby_with_reduce_and_sortby() {
        let mut plan = AggPlan::new(RLookup::new());
        plan.add_step(PlanStep::Group(GroupStep {
            group_by: vec!["@cat".into()],
            reducers: vec![ReducerCall::new(ReducerKind::Sum, vec!["@val".into()], "s")],
            output: RLookup::new(),
        }));
        plan.add_step(PlanStep::Arrange(ArrangeStep {
            sort_keys: vec!["@s".into()],
            ascending: vec![false],
            offset: 0,
            limit: None,
            is_limited: false,
            run_local: false,
        }));
        let tokens = serialize(&plan).unwrap();
        assert_eq!(
            tokens,
            vec![
                "GROUPBY", "1", "@cat", "REDUCE", "SUM", "1", "@val", "AS", "s", "SORTBY", "2",
                "@s", "DESC",
            ]
        );
    }
}
