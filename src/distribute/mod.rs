//! Distribution rewriter: splits an `AggPlan` into a remote
//! sub-plan (shipped to shards) and a DISTRIBUTE step prepended to the
//! remaining local plan.
//!
//! Grounded on [`crate::plan`]'s `Vec`-backed step chain and
//! [`crate::reducers::ReducerKind::split`] for the per-reducer rewrite
//! table.

use crate::error::AggResult;
use crate::plan::{
    AggPlan, ApplyStep, ArrangeStep, DistributeStep, FilterStep, GroupStep, LoadStep, PlanStep,
    PlanStepKind,
};
use crate::reducers::ReducerKind;
use crate::value::RLookup;

/// Either the rewritten plan, or the untouched original when no rule
/// exists for some reducer.
#[derive(Debug, Clone)]
pub enum DistributionOutcome {
    Distributed(AggPlan),
    NotDistributable(AggPlan),
}

/// Pulls the bareword field references (`@field`) out of an expression
/// string, for synthesizing the remote LOAD a pre-ARRANGE FILTER needs.
fn extract_fields(expr: &str) -> Vec<String> {
    let mut fields = Vec::new();
    for token in expr.split(|c: char| !c.is_alphanumeric() && c != '@' && c != '_') {
        if let Some(name) = token.strip_prefix('@') {
            if !name.is_empty() && !fields.iter().any(|f: &String| f == name) {
                fields.push(name.to_string());
            }
        }
    }
    fields
}

/// Scans the remote plan, registering every name it produces into a fresh
/// lookup.
fn collect_produced_names(remote_plan: &AggPlan) -> RLookup {
    let mut lookup = RLookup::new();
    for step in remote_plan.steps() {
        match step {
            PlanStep::Load(load) => {
                if let Some(fields) = &load.fields {
                    for field in fields {
                        lookup.get_for_write(field, true);
                    }
                }
            }
            PlanStep::Group(group) => {
                for field in &group.group_by {
                    lookup.get_for_write(field, true);
                }
                for reducer in &group.reducers {
                    lookup.get_for_write(&reducer.alias, true);
                }
            }
            PlanStep::Apply(apply) => {
                if let Some(alias) = &apply.alias {
                    lookup.get_for_write(alias, true);
                }
            }
            PlanStep::VectorNormalizer { dist_alias, .. } => {
                lookup.get_for_write(dist_alias, true);
            }
            _ => {}
        }
    }
    lookup
}

/// Runs the distribution rewrite (`Distribute(plan)`).
pub fn distribute(plan: &AggPlan) -> AggResult<DistributionOutcome> {
    let steps = plan.steps();
    let root_lookup = match &steps[0] {
        PlanStep::Root(lookup) => lookup.clone(),
        _ => RLookup::new(),
    };

    let mut remote_steps: Vec<PlanStep> = Vec::new();
    let mut local_steps: Vec<PlanStep> = Vec::new();
    let mut had_arrange = false;
    let mut replaced_group_steps: Vec<GroupStep> = Vec::new();
    let mut i = 1;

    while i < steps.len() {
        match &steps[i] {
            PlanStep::Load(_) | PlanStep::Apply(_) | PlanStep::VectorNormalizer { .. }
                if !had_arrange =>
            {
                remote_steps.push(steps[i].clone());
                i += 1;
            }
            PlanStep::Filter(filter) if !had_arrange => {
                let fields = extract_fields(&filter.expr);
                if !fields.is_empty() {
                    remote_steps.push(PlanStep::Load(LoadStep { fields: Some(fields) }));
                }
                remote_steps.push(steps[i].clone());
                i += 1;
            }
            PlanStep::Arrange(arrange) => {
                if !had_arrange {
                    had_arrange = true;
                    if !arrange.run_local {
                        remote_steps.push(PlanStep::Arrange(ArrangeStep {
                            sort_keys: arrange.sort_keys.clone(),
                            ascending: arrange.ascending.clone(),
                            offset: arrange.offset,
                            limit: arrange.limit,
                            is_limited: arrange.is_limited,
                            run_local: arrange.run_local,
                        }));
                    }
                }
                local_steps.push(steps[i].clone());
                i += 1;
            }
            PlanStep::Group(group) if !had_arrange => {
                let mut remote_reducers = Vec::new();
                let mut local_reducers = Vec::new();
                let mut local_applies = Vec::new();
                let mut abandoned = false;
                for call in &group.reducers {
                    match ReducerKind::split(call) {
                        Some(split) => {
                            remote_reducers.extend(split.remote);
                            local_reducers.extend(split.local);
                            if let Some(apply) = split.local_apply {
                                local_applies.push(apply);
                            }
                        }
                        None => {
                            abandoned = true;
                            break;
                        }
                    }
                }
                if abandoned {
                    return Ok(DistributionOutcome::NotDistributable(plan.clone()));
                }
                replaced_group_steps.push(group.clone());
                remote_steps.push(PlanStep::Group(GroupStep {
                    group_by: group.group_by.clone(),
                    reducers: remote_reducers,
                    output: RLookup::new(),
                }));
                local_steps.push(PlanStep::Group(GroupStep {
                    group_by: group.group_by.clone(),
                    reducers: local_reducers,
                    output: RLookup::new(),
                }));
                for (expr, alias) in local_applies {
                    local_steps.push(PlanStep::Apply(ApplyStep {
                        expr,
                        alias: Some(alias),
                        owns_result: true,
                    }));
                }
                i += 1;
                local_steps.extend(steps[i..].iter().cloned());
                i = steps.len();
            }
            _ => {
                local_steps.extend(steps[i..].iter().cloned());
                i = steps.len();
            }
        }
    }

    let mut remote_plan = AggPlan::new(RLookup::new());
    for step in remote_steps {
        remote_plan.add_step(step);
    }
    let lookup = collect_produced_names(&remote_plan);
    let remote_args = remote_plan.serialize()?;

    let mut new_plan = AggPlan::new(root_lookup);
    new_plan.add_step(PlanStep::Distribute(DistributeStep {
        remote_plan: Some(Box::new(remote_plan)),
        remote_args,
        replaced_group_steps,
        lookup,
    }));
    for step in local_steps {
        new_plan.add_step(step);
    }

    debug_assert_eq!(new_plan.steps()[0].kind(), PlanStepKind::Root);
    Ok(DistributionOutcome::Distributed(new_plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducers::ReducerCall;

    fn plan_with_group(reducers: Vec<ReducerCall>) -> AggPlan {
        let mut plan = AggPlan::new(RLookup::new());
        plan.add_step(PlanStep::Apply(ApplyStep {
            expr: "@a + 1".into(),
            alias: Some("b".into()),
            owns_result: true,
        }));
        plan.add_step(PlanStep::Group(GroupStep {
            group_by: vec!["@cat".into()],
            reducers,
            output: RLookup::new(),
        }));
        plan
    }

    #[test]
    fn distributes_sum_and_count_group() {
        let plan = plan_with_group(vec![
            ReducerCall::new(ReducerKind::Sum, vec!["@val".into()], "s"),
            ReducerCall::new(ReducerKind::Count, vec![], "c"),
        ]);
        match distribute(&plan).unwrap() {
            DistributionOutcome::Distributed(new_plan) => {
                assert!(new_plan.has_step(PlanStepKind::Distribute));
                let distribute_idx = new_plan.find_step(0, new_plan.len(), PlanStepKind::Distribute).unwrap();
                if let PlanStep::Distribute(d) = &new_plan.steps()[distribute_idx] {
                    let remote = d.remote_plan.as_ref().unwrap();
                    assert!(remote.has_step(PlanStepKind::Apply));
                    assert!(remote.has_step(PlanStepKind::Group));
                } else {
                    panic!("expected Distribute step");
                }
                let local_group_idx = new_plan
                    .find_step(distribute_idx, new_plan.len(), PlanStepKind::Group)
                    .unwrap();
                if let PlanStep::Group(g) = &new_plan.steps()[local_group_idx] {
                    assert!(g.reducers.iter().any(|r| r.kind == ReducerKind::Sum && r.alias == "s"));
                } else {
                    panic!("expected Group step");
                }
            }
            DistributionOutcome::NotDistributable(_) => panic!("expected a successful rewrite"),
        }
    }

    #[test]
    fn avg_split_produces_local_apply_step() {
        let plan = plan_with_group(vec![ReducerCall::new(ReducerKind::Avg, vec!["@val".into()], "a")]);
        match distribute(&plan).unwrap() {
            DistributionOutcome::Distributed(new_plan) => {
                assert!(new_plan
                    .steps()
                    .iter()
                    .any(|s| matches!(s, PlanStep::Apply(a) if a.alias.as_deref() == Some("a"))));
            }
            DistributionOutcome::NotDistributable(_) => panic!("expected a successful rewrite"),
        }
    }

    #[test]
    fn abandons_rewrite_when_a_reducer_has_no_split_rule() {
        let plan = plan_with_group(vec![ReducerCall::new(ReducerKind::CountDistinct, vec!["@val".into()], "cd")]);
        match distribute(&plan).unwrap() {
            DistributionOutcome::NotDistributable(original) => {
                assert!(!original.has_step(PlanStepKind::Distribute));
            }
            DistributionOutcome::Distributed(_) => panic!("expected the rewrite to be abandoned"),
        }
    }

    #[test]
    fn filter_before_arrange_moves_to_remote_with_synthesized_load() {
        let mut plan = AggPlan::new(RLookup::new());
        plan.add_step(PlanStep::Filter(FilterStep { expr: "@score > 1".into() }));
        plan.add_step(PlanStep::Arrange(ArrangeStep::default()));
        match distribute(&plan).unwrap() {
            DistributionOutcome::Distributed(new_plan) => {
                let distribute_idx = new_plan.find_step(0, new_plan.len(), PlanStepKind::Distribute).unwrap();
                if let PlanStep::Distribute(d) = &new_plan.steps()[distribute_idx] {
                    let remote = d.remote_plan.as_ref().unwrap();
                    assert!(remote.has_step(PlanStepKind::Load));
                    assert!(remote.has_step(PlanStepKind::Filter));
                } else {
                    panic!("expected Distribute step");
                }
                // ARRANGE stays local too.
                assert!(new_plan.has_step(PlanStepKind::Arrange));
            }
            DistributionOutcome::NotDistributable(_) => panic!("expected a successful rewrite"),
        }
    }
}
