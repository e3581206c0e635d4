//! Reducers: the per-group accumulators driven
//! by the GROUPER result processor.
//!
//! Each reducer kind is *distributive* or not; [`crate::distribute`] consults
//! [`ReducerKind::split`] to decide whether a GROUP step can be rewritten
//! into a remote + local pair.

mod count_distinct;
mod hyperloglog;
mod numeric;
mod quantile;
mod sample;
mod tolist;

pub use count_distinct::CountDistinct;
pub use hyperloglog::{HllReducer, HllSumReducer};
pub use numeric::{AvgReducer, CountReducer, MinMaxReducer, SumReducer};
pub use quantile::QuantileReducer;
pub use sample::{FirstValueReducer, RandomSampleReducer, StdDevReducer};
pub use tolist::ToListReducer;

use crate::error::AggResult;
use crate::value::RSValue;

/// Fixed compile-time sample size used when distributing STDDEV/QUANTILE.
pub const DISTRIBUTED_SAMPLE_SIZE: usize = 500;

/// Identifies which reducer a [`ReducerCall`] invokes, independent of its
/// runtime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReducerKind {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    ToList,
    StdDev,
    Quantile,
    CountDistinct,
    CountDistinctish,
    Hll,
    HllSum,
    FirstValue,
    RandomSample,
}

impl ReducerKind {
    pub fn name(self) -> &'static str {
        match self {
            ReducerKind::Count => "COUNT",
            ReducerKind::Sum => "SUM",
            ReducerKind::Min => "MIN",
            ReducerKind::Max => "MAX",
            ReducerKind::Avg => "AVG",
            ReducerKind::ToList => "TOLIST",
            ReducerKind::StdDev => "STDDEV",
            ReducerKind::Quantile => "QUANTILE",
            ReducerKind::CountDistinct => "COUNT_DISTINCT",
            ReducerKind::CountDistinctish => "COUNT_DISTINCTISH",
            ReducerKind::Hll => "HLL",
            ReducerKind::HllSum => "HLL_SUM",
            ReducerKind::FirstValue => "FIRST_VALUE",
            ReducerKind::RandomSample => "RANDOM_SAMPLE",
        }
    }

    /// Parses a `REDUCE <name>` token (case-insensitive) back into a kind.
    pub fn parse(name: &str) -> Option<ReducerKind> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(ReducerKind::Count),
            "SUM" => Some(ReducerKind::Sum),
            "MIN" => Some(ReducerKind::Min),
            "MAX" => Some(ReducerKind::Max),
            "AVG" => Some(ReducerKind::Avg),
            "TOLIST" | "TO_LIST" => Some(ReducerKind::ToList),
            "STDDEV" => Some(ReducerKind::StdDev),
            "QUANTILE" => Some(ReducerKind::Quantile),
            "COUNT_DISTINCT" => Some(ReducerKind::CountDistinct),
            "COUNT_DISTINCTISH" => Some(ReducerKind::CountDistinctish),
            "HLL" => Some(ReducerKind::Hll),
            "HLL_SUM" => Some(ReducerKind::HllSum),
            "FIRST_VALUE" => Some(ReducerKind::FirstValue),
            "RANDOM_SAMPLE" => Some(ReducerKind::RandomSample),
            _ => None,
        }
    }
}

/// A reducer invocation as it appears in a GROUP step: the reducer kind,
/// its source field args, and the alias it writes its finalized value to.
#[derive(Debug, Clone)]
pub struct ReducerCall {
    pub kind: ReducerKind,
    pub args: Vec<String>,
    pub alias: String,
    /// Extra numeric args a reducer needs beyond its source field, e.g.
    /// QUANTILE's `q` or RANDOM_SAMPLE's sample size.
    pub numeric_arg: Option<f64>,
    /// Set by the distribution rewriter on reducers it introduces
    /// (SUM(remote_count), APPLY-derived combiners) so they can be hidden
    /// from the final output lookup.
    pub hidden: bool,
}

impl ReducerCall {
    pub fn new(kind: ReducerKind, args: Vec<String>, alias: impl Into<String>) -> Self {
        ReducerCall {
            kind,
            args,
            alias: alias.into(),
            numeric_arg: None,
            hidden: false,
        }
    }

    fn hidden_with(kind: ReducerKind, args: Vec<String>, alias: impl Into<String>) -> Self {
        let mut call = ReducerCall::new(kind, args, alias);
        call.hidden = true;
        call
    }
}

/// The remote reducer(s) and local combiner(s) a single GROUP reducer
/// rewrites into. `local_apply`, when
/// present, is an extra APPLY step the local plan needs after its
/// reducers run (AVG's `S/C` division).
#[derive(Debug, Clone)]
pub struct ReducerSplit {
    pub remote: Vec<ReducerCall>,
    pub local: Vec<ReducerCall>,
    pub local_apply: Option<(String, String)>,
}

impl ReducerKind {
    /// Looks up this reducer's distribution rule. `None`
    /// means no rule exists, and the caller must abandon the whole rewrite.
    pub fn split(call: &ReducerCall) -> Option<ReducerSplit> {
        let src = call.args.first().cloned().unwrap_or_default();
        let remote_alias = format!("__remote_{}", call.alias);
        match call.kind {
            ReducerKind::Count => Some(ReducerSplit {
                remote: vec![ReducerCall::hidden_with(ReducerKind::Count, vec![], &remote_alias)],
                local: vec![ReducerCall::new(ReducerKind::Sum, vec![remote_alias], &call.alias)],
                local_apply: None,
            }),
            ReducerKind::Sum => Some(ReducerSplit {
                remote: vec![ReducerCall::hidden_with(ReducerKind::Sum, vec![src], &remote_alias)],
                local: vec![ReducerCall::new(ReducerKind::Sum, vec![remote_alias], &call.alias)],
                local_apply: None,
            }),
            ReducerKind::Min => Some(ReducerSplit {
                remote: vec![ReducerCall::hidden_with(ReducerKind::Min, vec![src], &remote_alias)],
                local: vec![ReducerCall::new(ReducerKind::Min, vec![remote_alias], &call.alias)],
                local_apply: None,
            }),
            ReducerKind::Max => Some(ReducerSplit {
                remote: vec![ReducerCall::hidden_with(ReducerKind::Max, vec![src], &remote_alias)],
                local: vec![ReducerCall::new(ReducerKind::Max, vec![remote_alias], &call.alias)],
                local_apply: None,
            }),
            ReducerKind::ToList => Some(ReducerSplit {
                remote: vec![ReducerCall::hidden_with(ReducerKind::ToList, vec![src], &remote_alias)],
                local: vec![ReducerCall::new(ReducerKind::ToList, vec![remote_alias], &call.alias)],
                local_apply: None,
            }),
            ReducerKind::Avg => {
                let count_alias = format!("__remote_{}_count", call.alias);
                let sum_alias = format!("__remote_{}_sum", call.alias);
                Some(ReducerSplit {
                    remote: vec![
                        ReducerCall::hidden_with(ReducerKind::Count, vec![], &count_alias),
                        ReducerCall::hidden_with(ReducerKind::Sum, vec![src], &sum_alias),
                    ],
                    local: vec![
                        ReducerCall::hidden_with(ReducerKind::Sum, vec![count_alias.clone()], "__c"),
                        ReducerCall::hidden_with(ReducerKind::Sum, vec![sum_alias.clone()], "__s"),
                    ],
                    local_apply: Some(("__s/__c".to_string(), call.alias.clone())),
                })
            }
            ReducerKind::StdDev => Some(ReducerSplit {
                remote: vec![ReducerCall::hidden_with(
                    ReducerKind::RandomSample,
                    vec![src],
                    &remote_alias,
                )],
                local: vec![ReducerCall::new(ReducerKind::StdDev, vec![remote_alias], &call.alias)],
                local_apply: None,
            }),
            ReducerKind::Quantile => {
                let mut local_call = ReducerCall::new(ReducerKind::Quantile, vec![remote_alias.clone()], &call.alias);
                local_call.numeric_arg = call.numeric_arg;
                Some(ReducerSplit {
                    remote: vec![ReducerCall::hidden_with(
                        ReducerKind::RandomSample,
                        vec![src],
                        &remote_alias,
                    )],
                    local: vec![local_call],
                    local_apply: None,
                })
            }
            ReducerKind::CountDistinctish => Some(ReducerSplit {
                remote: vec![ReducerCall::hidden_with(ReducerKind::Hll, vec![src], &remote_alias)],
                local: vec![ReducerCall::new(ReducerKind::HllSum, vec![remote_alias], &call.alias)],
                local_apply: None,
            }),
            // No distribution rule: exact COUNT_DISTINCT can't be combined
            // from partial HLLs, FIRST_VALUE/RANDOM_SAMPLE need the whole
            // stream, HLL/HLL_SUM are themselves the remote/local half of
            // another reducer's split.
            ReducerKind::CountDistinct
            | ReducerKind::FirstValue
            | ReducerKind::RandomSample
            | ReducerKind::Hll
            | ReducerKind::HllSum => None,
        }
    }
}

/// Builds the live [`Reducer`] a [`ReducerCall`] names. The GROUPER
/// processor takes this as a bare `fn` pointer (not a closure) so its own
/// struct stays `'static` without borrowing the call site.
pub fn build(call: &ReducerCall) -> Box<dyn Reducer> {
    match call.kind {
        ReducerKind::Count => Box::new(numeric::CountReducer::default()),
        ReducerKind::Sum => Box::new(numeric::SumReducer::default()),
        ReducerKind::Min => Box::new(numeric::MinMaxReducer::new(numeric::MinMaxKind::Min)),
        ReducerKind::Max => Box::new(numeric::MinMaxReducer::new(numeric::MinMaxKind::Max)),
        ReducerKind::Avg => Box::new(numeric::AvgReducer::default()),
        ReducerKind::ToList => Box::new(tolist::ToListReducer::default()),
        ReducerKind::StdDev => Box::new(sample::StdDevReducer::default()),
        ReducerKind::Quantile => {
            let q = call.numeric_arg.unwrap_or(0.5);
            Box::new(quantile::QuantileReducer::new(q, DISTRIBUTED_SAMPLE_SIZE))
        }
        ReducerKind::CountDistinct => Box::new(count_distinct::CountDistinct::default()),
        ReducerKind::CountDistinctish | ReducerKind::Hll => Box::new(hyperloglog::HllReducer::default()),
        ReducerKind::HllSum => Box::new(hyperloglog::HllSumReducer::default()),
        ReducerKind::FirstValue => Box::new(sample::FirstValueReducer::default()),
        ReducerKind::RandomSample => {
            let capacity = call.numeric_arg.map_or(DISTRIBUTED_SAMPLE_SIZE, |n| n as usize);
            Box::new(sample::RandomSampleReducer::new(capacity))
        }
    }
}

/// Uniform reducer contract.
///
/// The GROUPER processor resolves a reducer's source field(s) from the row
/// before calling `add`; `COUNT` ignores its input and may be fed `None`.
pub trait Reducer {
    /// Accumulates one row's contribution.
    fn add(&mut self, input: Option<&RSValue>) -> AggResult<()>;
    /// Produces the finalized output value, consuming accumulator state.
    fn finalize(self: Box<Self>) -> AggResult<RSValue>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_splits_into_remote_and_local_sum() {
        let call = ReducerCall::new(ReducerKind::Sum, vec!["val".into()], "s");
        let split = ReducerKind::split(&call).unwrap();
        assert_eq!(split.remote.len(), 1);
        assert_eq!(split.remote[0].kind, ReducerKind::Sum);
        assert_eq!(split.local[0].kind, ReducerKind::Sum);
        assert_eq!(split.local[0].alias, "s");
    }

    #[test]
    fn avg_splits_into_count_and_sum_with_local_apply() {
        let call = ReducerCall::new(ReducerKind::Avg, vec!["val".into()], "a");
        let split = ReducerKind::split(&call).unwrap();
        assert_eq!(split.remote.len(), 2);
        assert_eq!(split.local.len(), 2);
        let (expr, alias) = split.local_apply.unwrap();
        assert_eq!(expr, "__s/__c");
        assert_eq!(alias, "a");
    }

    #[test]
    fn count_distinct_has_no_distribution_rule() {
        let call = ReducerCall::new(ReducerKind::CountDistinct, vec!["val".into()], "cd");
        assert!(ReducerKind::split(&call).is_none());
    }

    #[test]
    fn parse_round_trips_through_name() {
        for kind in [
            ReducerKind::Count,
            ReducerKind::Sum,
            ReducerKind::Min,
            ReducerKind::Max,
            ReducerKind::Avg,
            ReducerKind::ToList,
            ReducerKind::StdDev,
            ReducerKind::Quantile,
            ReducerKind::CountDistinct,
            ReducerKind::CountDistinctish,
            ReducerKind::Hll,
            ReducerKind::HllSum,
            ReducerKind::FirstValue,
            ReducerKind::RandomSample,
        ] {
            assert_eq!(ReducerKind::parse(kind.name()), Some(kind));
        }
        assert_eq!(ReducerKind::parse("not_a_reducer"), None);
    }

    #[test]
    fn build_produces_a_working_sum_reducer() {
        let call = ReducerCall::new(ReducerKind::Sum, vec!["val".into()], "s");
        let mut reducer = build(&call);
        reducer.add(Some(&RSValue::Number(2.0))).unwrap();
        reducer.add(Some(&RSValue::Number(3.0))).unwrap();
        assert_eq!(reducer.finalize().unwrap(), RSValue::Number(5.0));
    }
}
