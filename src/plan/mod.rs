//! `AGGPlan`: the typed aggregation plan tree.
//!
//! A plan is a chain of steps, always starting at a `Root` sentinel carrying
//! the initial lookup. Steps are held in insertion order in a `Vec` rather
//! than an intrusive doubly-linked list — the list operations
//! (`AddBefore`, `AddAfter`, `PopStep`, ...) are expressed as `Vec` splices,
//! which gives the same semantics without unsafe pointer-chasing.

mod compile;
mod serialize;
mod step;

pub use compile::{compile, CompileInputs, FieldRef};
pub use serialize::serialize;
pub use step::{
    ApplyStep, ArrangeStep, DistributeStep, FilterStep, GroupStep, LoadStep, PlanStep,
    PlanStepKind,
};

use crate::error::{AggError, AggResult};
use crate::value::RLookup;

/// Direction used by `get_lookup` when walking the chain from a given step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupWalk {
    First,
    Prev,
    Last,
    Next,
}

/// Doubly-linked-list-equivalent plan: an ordered sequence of steps with a
/// permanent ROOT sentinel at index 0.
#[derive(Debug, Clone)]
pub struct AggPlan {
    steps: Vec<PlanStep>,
}

impl AggPlan {
    /// Creates a new plan with only the ROOT sentinel, carrying `lookup`.
    pub fn new(lookup: RLookup) -> Self {
        AggPlan {
            steps: vec![PlanStep::root(lookup)],
        }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn steps_mut(&mut self) -> &mut [PlanStep] {
        &mut self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Appends a step at the end of the chain.
    pub fn add_step(&mut self, step: PlanStep) {
        self.steps.push(step);
    }

    /// Inserts `step` immediately before index `at`.
    pub fn add_before(&mut self, at: usize, step: PlanStep) {
        self.steps.insert(at, step);
    }

    /// Inserts `step` immediately after index `at`.
    pub fn add_after(&mut self, at: usize, step: PlanStep) {
        self.steps.insert(at + 1, step);
    }

    /// Inserts `step` immediately after the ROOT sentinel (index 0).
    pub fn prepend(&mut self, step: PlanStep) {
        self.add_after(0, step);
    }

    /// Removes and returns the step at `at`. The ROOT sentinel (index 0)
    /// must never be popped.
    pub fn pop_step(&mut self, at: usize) -> Option<PlanStep> {
        if at == 0 || at >= self.steps.len() {
            return None;
        }
        Some(self.steps.remove(at))
    }

    pub fn has_step(&self, kind: PlanStepKind) -> bool {
        self.steps.iter().any(|s| s.kind() == kind)
    }

    /// Finds the first step of `kind` within `[begin, end)`.
    pub fn find_step(&self, begin: usize, end: usize, kind: PlanStepKind) -> Option<usize> {
        let end = end.min(self.steps.len());
        (begin..end).find(|&i| self.steps[i].kind() == kind)
    }

    /// The rightmost ARRANGE step that precedes any reducer-bearing GROUP
    /// step.
    pub fn get_arrange_step(&self) -> Option<usize> {
        let first_group = self
            .steps
            .iter()
            .position(|s| s.kind() == PlanStepKind::Group);
        let search_end = first_group.unwrap_or(self.steps.len());
        self.steps[..search_end]
            .iter()
            .rposition(|s| s.kind() == PlanStepKind::Arrange)
    }

    /// Returns the index of an existing qualifying ARRANGE step, or appends
    /// a fresh unlimited one right before the first GROUP (or at the end)
    /// and returns its index.
    pub fn get_or_create_arrange_step(&mut self) -> usize {
        if let Some(idx) = self.get_arrange_step() {
            return idx;
        }
        let insert_at = self
            .steps
            .iter()
            .position(|s| s.kind() == PlanStepKind::Group)
            .unwrap_or(self.steps.len());
        self.steps
            .insert(insert_at, PlanStep::Arrange(ArrangeStep::default()));
        insert_at
    }

    /// Walks the chain from `start` in `dir`, returning the index of the
    /// first step whose kind carries a lookup (ROOT, GROUP, DISTRIBUTE).
    pub fn get_lookup(&self, start: usize, dir: LookupWalk) -> Option<usize> {
        let carries_lookup = |s: &PlanStep| {
            matches!(
                s.kind(),
                PlanStepKind::Root | PlanStepKind::Group | PlanStepKind::Distribute
            )
        };
        match dir {
            LookupWalk::First => self.steps.iter().position(carries_lookup),
            LookupWalk::Last => self.steps.iter().rposition(carries_lookup),
            LookupWalk::Prev => (0..start).rev().find(|&i| carries_lookup(&self.steps[i])),
            LookupWalk::Next => {
                (start + 1..self.steps.len()).find(|&i| carries_lookup(&self.steps[i]))
            }
        }
    }

    /// Inserts an ARRANGE immediately after ROOT configured for a KNN
    /// top-k cutoff: limited to `k`, sorted ascending by `dist_field`,
    /// executed locally.
    pub fn add_knn_arrange_step(&mut self, k: usize, dist_field: &str) {
        let step = PlanStep::Arrange(ArrangeStep {
            sort_keys: vec![dist_field.to_string()],
            ascending: vec![true],
            offset: 0,
            limit: Some(k),
            is_limited: true,
            run_local: true,
        });
        self.prepend(step);
    }

    /// Serializes the plan into the wire token sequence used to ship the
    /// remote sub-plan to a shard.
    pub fn serialize(&self) -> AggResult<Vec<String>> {
        serialize::serialize(self)
    }

    pub fn validate(&self) -> AggResult<()> {
        if self.steps.first().map(PlanStep::kind) != Some(PlanStepKind::Root) {
            return Err(AggError::AggPlan("plan does not start with ROOT".into()));
        }
        if let Some(idx) = self
            .steps
            .iter()
            .position(|s| s.kind() == PlanStepKind::Distribute)
        {
            let only_local_after = self.steps[idx + 1..].iter().all(|s| {
                matches!(
                    s.kind(),
                    PlanStepKind::Group
                        | PlanStepKind::Arrange
                        | PlanStepKind::Apply
                        | PlanStepKind::Filter
                        | PlanStepKind::Load
                )
            });
            if !only_local_after {
                return Err(AggError::AggPlan(
                    "steps after DISTRIBUTE must be local-only".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::step::ApplyStep;

    #[test]
    fn new_plan_starts_with_root() {
        let plan = AggPlan::new(RLookup::new());
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.steps()[0].kind(), PlanStepKind::Root);
    }

    #[test]
    fn add_knn_arrange_step_inserts_right_after_root() {
        let mut plan = AggPlan::new(RLookup::new());
        plan.add_knn_arrange_step(10, "__dist");
        assert_eq!(plan.steps()[1].kind(), PlanStepKind::Arrange);
        if let PlanStep::Arrange(arrange) = &plan.steps()[1] {
            assert_eq!(arrange.limit, Some(10));
            assert!(arrange.run_local);
            assert_eq!(arrange.sort_keys, vec!["__dist".to_string()]);
        } else {
            panic!("expected Arrange step");
        }
    }

    #[test]
    fn get_arrange_step_finds_rightmost_before_group() {
        let mut plan = AggPlan::new(RLookup::new());
        plan.add_step(PlanStep::Apply(ApplyStep {
            expr: "@a".into(),
            alias: Some("b".into()),
            owns_result: true,
        }));
        plan.add_step(PlanStep::Arrange(ArrangeStep::default()));
        plan.add_step(PlanStep::Group(GroupStep::default()));
        assert_eq!(plan.get_arrange_step(), Some(2));
    }

    #[test]
    fn pop_step_refuses_to_remove_root() {
        let mut plan = AggPlan::new(RLookup::new());
        assert!(plan.pop_step(0).is_none());
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn validate_rejects_non_local_steps_after_distribute() {
        let mut plan = AggPlan::new(RLookup::new());
        plan.add_step(PlanStep::Distribute(DistributeStep::default()));
        plan.add_step(PlanStep::Arrange(ArrangeStep::default()));
        assert!(plan.validate().is_ok());
        plan.add_step(PlanStep::VectorNormalizer {
            field: "v".into(),
            dist_alias: "d".into(),
        });
        assert!(plan.validate().is_err());
    }
}
