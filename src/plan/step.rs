//! The step payload structs that make up an aggregation plan.

use crate::reducers::ReducerCall;
use crate::value::RLookup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanStepKind {
    Root,
    Apply,
    Filter,
    Arrange,
    Load,
    Group,
    VectorNormalizer,
    Distribute,
}

#[derive(Debug, Clone)]
pub struct ApplyStep {
    pub expr: String,
    pub alias: Option<String>,
    /// Whether this step owns (may mutate in place) the computed value,
    /// vs. sharing a borrowed reference with the source row.
    pub owns_result: bool,
}

#[derive(Debug, Clone)]
pub struct FilterStep {
    pub expr: String,
}

#[derive(Debug, Clone, Default)]
pub struct ArrangeStep {
    pub sort_keys: Vec<String>,
    /// One entry per `sort_keys` element; `true` = ascending.
    pub ascending: Vec<bool>,
    pub offset: usize,
    pub limit: Option<usize>,
    pub is_limited: bool,
    /// Must execute on the coordinator even when distribution is possible
    /// (e.g. the KNN cutoff arrange inserted by `add_knn_arrange_step`).
    pub run_local: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LoadStep {
    /// `None` means "load all fields" (`LOAD *`).
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct GroupStep {
    pub group_by: Vec<String>,
    pub reducers: Vec<ReducerCall>,
    pub output: RLookup,
}

#[derive(Debug, Clone, Default)]
pub struct DistributeStep {
    pub remote_plan: Option<Box<super::AggPlan>>,
    pub remote_args: Vec<String>,
    /// Group steps replaced by this rewrite, kept so a failed rewrite can
    /// restore the original local plan.
    pub replaced_group_steps: Vec<GroupStep>,
    pub lookup: RLookup,
}

/// One node of the aggregation plan chain.
#[derive(Debug, Clone)]
pub enum PlanStep {
    Root(RLookup),
    Apply(ApplyStep),
    Filter(FilterStep),
    Arrange(ArrangeStep),
    Load(LoadStep),
    Group(GroupStep),
    VectorNormalizer { field: String, dist_alias: String },
    Distribute(DistributeStep),
}

impl PlanStep {
    pub fn root(lookup: RLookup) -> Self {
        PlanStep::Root(lookup)
    }

    pub fn kind(&self) -> PlanStepKind {
        match self {
            PlanStep::Root(_) => PlanStepKind::Root,
            PlanStep::Apply(_) => PlanStepKind::Apply,
            PlanStep::Filter(_) => PlanStepKind::Filter,
            PlanStep::Arrange(_) => PlanStepKind::Arrange,
            PlanStep::Load(_) => PlanStepKind::Load,
            PlanStep::Group(_) => PlanStepKind::Group,
            PlanStep::VectorNormalizer { .. } => PlanStepKind::VectorNormalizer,
            PlanStep::Distribute(_) => PlanStepKind::Distribute,
        }
    }

    /// The lookup this step carries, if any (ROOT, GROUP, DISTRIBUTE).
    pub fn lookup(&self) -> Option<&RLookup> {
        match self {
            PlanStep::Root(l) => Some(l),
            PlanStep::Group(g) => Some(&g.output),
            PlanStep::Distribute(d) => Some(&d.lookup),
            _ => None,
        }
    }
}
