//! Command surface: turns already tokenized `FT.AGGREGATE`/`FT.SEARCH`/
//! `FT.HYBRID`/`FT.CURSOR`/`FT.PROFILE`/`_FT.DEBUG` argument vectors into
//! the typed request structs the rest of the crate works with, and shapes
//! [`AggError`]/[`Warning`] into the reply's wire error name.
//!
//! Tokens arrive pre-split (one `String` per argument), matching how a
//! Redis-module-style command dispatcher hands off `argv`; this module owns
//! no network I/O of its own. Query-language parsing (the `<query>` string
//! itself, `<blob-param>` resolution, attribute/weight syntax) is left to
//! external collaborators, so those pieces are captured as opaque strings.

mod args;
mod reply;

pub use args::ArgCursor;
pub use reply::{error_name, error_reply, Reply};

use std::collections::HashMap;

use crate::error::{AggError, AggResult};
use crate::plan::{AggPlan, ApplyStep, ArrangeStep, FilterStep, GroupStep, LoadStep, PlanStep};
use crate::reducers::{ReducerCall, ReducerKind};
use crate::value::RLookup;

/// `FORMAT STRING|EXPAND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyFormat {
    #[default]
    String,
    Expand,
}

/// `WITHCURSOR [COUNT n] [MAXIDLE ms]`.
#[derive(Debug, Clone, Default)]
pub struct CursorOptions {
    pub count: Option<u32>,
    pub max_idle_ms: Option<u64>,
}

/// A fully parsed `FT.AGGREGATE` request.
#[derive(Debug, Clone)]
pub struct AggregateRequest {
    pub index: String,
    pub query: String,
    pub plan: AggPlan,
    pub with_cursor: Option<CursorOptions>,
    pub params: HashMap<String, String>,
    pub timeout_ms: Option<u64>,
    pub dialect: Option<u32>,
    pub format: ReplyFormat,
    pub verbatim: bool,
    pub add_scores: bool,
}

/// `FT.SEARCH <idx> <query> [options...]`. The query language and its
/// option grammar (`WITHSCORES`, `RETURN`, paging, ...) live outside this
/// crate; the raw option tokens are kept for a collaborator to interpret.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub index: String,
    pub query: String,
    pub options: Vec<String>,
}

/// `RRF`/`LINEAR` score combination for `FT.HYBRID ... COMBINE`.
#[derive(Debug, Clone, PartialEq)]
pub enum CombineSpec {
    Rrf { constant: Option<u32>, window: Option<u32> },
    Linear { alpha: f64, beta: f64, window: Option<u32> },
}

/// `KNN k` or `RANGE radius` on the VSIM branch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KnnOrRange {
    Knn(usize),
    Range(f64),
}

/// A fully parsed `FT.HYBRID` request. Builds two independent plan tails
/// (one per branch) sharing the trailing clauses (`LOAD`/`SORTBY`/`APPLY`/
/// `LIMIT`/`PARAMS`), matching 's "both branches feed one
/// merged tail" shape; [`crate::hybrid::build`] is what actually wires the
/// branches into pipelines once the caller resolves `search_query` and
/// `blob_param` into real iterators.
#[derive(Debug, Clone)]
pub struct HybridRequest {
    pub index: String,
    pub search_query: String,
    pub scorer: Option<String>,
    pub vector_field: String,
    pub blob_param: String,
    pub knn_or_range: Option<KnnOrRange>,
    pub ef_runtime: Option<u32>,
    pub epsilon: Option<f64>,
    pub yield_distance_as: Option<String>,
    pub filter: Option<String>,
    pub combine: Option<CombineSpec>,
    pub tail: AggPlan,
    pub params: HashMap<String, String>,
}

/// `FT.CURSOR READ|DEL|GC <idx> <cursor_id> [COUNT n]`.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorCommand {
    Read { index: String, cursor_id: u64, count: Option<u32> },
    Del { index: String, cursor_id: u64 },
    Gc { index: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileMode {
    Search,
    Aggregate,
}

/// `FT.PROFILE <idx> {SEARCH|AGGREGATE} [LIMITED] QUERY <inner...>`.
#[derive(Debug, Clone)]
pub struct ProfileRequest {
    pub index: String,
    pub mode: ProfileMode,
    pub limited: bool,
    pub inner: Vec<String>,
}

/// `_FT.DEBUG <normal command...> [TIMEOUT_AFTER_N n] DEBUG_PARAMS_COUNT k`
/// (original source: `aggregate_debug.c`'s `AREQ_Debug_New`). The debug
/// params are the trailing `k` tokens of the command, so `inner` is
/// whatever remains once they (and the `DEBUG_PARAMS_COUNT k` marker) are
/// stripped off the back.
#[derive(Debug, Clone)]
pub struct DebugRequest {
    pub inner: Vec<String>,
    pub timeout_after_n: Option<u32>,
}

#[derive(Debug, Clone)]
pub enum Command {
    Search(SearchRequest),
    Aggregate(AggregateRequest),
    Hybrid(HybridRequest),
    Cursor(CursorCommand),
    Profile(ProfileRequest),
    Debug(DebugRequest),
}

/// Parses the tail clauses shared by `FT.AGGREGATE` and the tail of
/// `FT.HYBRID`: `LOAD`, `APPLY ... AS alias`, `FILTER`, `SORTBY`, `LIMIT`,
/// `PARAMS`. Returns whether `token` (already peeked) was one of them.
fn try_parse_tail_clause(
    cursor: &mut ArgCursor,
    plan: &mut AggPlan,
    current_arrange: &mut Option<usize>,
    params: &mut HashMap<String, String>,
) -> AggResult<bool> {
    let Some(keyword) = cursor.peek() else { return Ok(false) };
    match keyword.to_ascii_uppercase().as_str() {
        "LOAD" => {
            cursor.next()?;
            let spec = cursor.next()?.to_string();
            let fields = if spec == "*" {
                None
            } else {
                let n: usize = spec
                    .parse()
                    .map_err(|_| AggError::ParseArgs(format!("LOAD count: {spec}")))?;
                Some(cursor.next_n(n)?)
            };
            plan.add_step(PlanStep::Load(LoadStep { fields }));
            *current_arrange = None;
            Ok(true)
        }
        "APPLY" => {
            cursor.next()?;
            let expr = cursor.next()?.to_string();
            let alias = if cursor.eat_keyword("AS") { Some(cursor.next()?.to_string()) } else { None };
            plan.add_step(PlanStep::Apply(ApplyStep { expr, alias, owns_result: true }));
            *current_arrange = None;
            Ok(true)
        }
        "FILTER" => {
            cursor.next()?;
            let expr = cursor.next()?.to_string();
            plan.add_step(PlanStep::Filter(FilterStep { expr }));
            *current_arrange = None;
            Ok(true)
        }
        "GROUPBY" => {
            cursor.next()?;
            let n: usize = cursor.next_usize()?;
            let group_by = cursor.next_n(n)?;
            let mut reducers = Vec::new();
            while cursor.eat_keyword("REDUCE") {
                reducers.push(parse_reducer_call(cursor)?);
            }
            plan.add_step(PlanStep::Group(GroupStep { group_by, reducers, output: RLookup::new() }));
            *current_arrange = None;
            Ok(true)
        }
        "SORTBY" => {
            cursor.next()?;
            let n: usize = cursor.next_usize()?;
            if n % 2 != 0 {
                return Err(AggError::Syntax("SORTBY count must be even".into()));
            }
            let mut sort_keys = Vec::with_capacity(n / 2);
            let mut ascending = Vec::with_capacity(n / 2);
            for _ in 0..n / 2 {
                sort_keys.push(cursor.next()?.to_string());
                let dir = cursor.next()?.to_ascii_uppercase();
                ascending.push(match dir.as_str() {
                    "ASC" => true,
                    "DESC" => false,
                    other => return Err(AggError::Syntax(format!("expected ASC/DESC, got {other}"))),
                });
            }
            let idx = arrange_index(plan, current_arrange);
            if let PlanStep::Arrange(arrange) = &mut plan.steps_mut()[idx] {
                arrange.sort_keys = sort_keys;
                arrange.ascending = ascending;
            }
            Ok(true)
        }
        "LIMIT" => {
            cursor.next()?;
            let offset = cursor.next_usize()?;
            let end = cursor.next_usize()?;
            let idx = arrange_index(plan, current_arrange);
            if let PlanStep::Arrange(arrange) = &mut plan.steps_mut()[idx] {
                arrange.offset = offset;
                arrange.limit = Some(end.saturating_sub(offset));
                arrange.is_limited = true;
            }
            Ok(true)
        }
        "PARAMS" => {
            cursor.next()?;
            let n: usize = cursor.next_usize()?;
            if n % 2 != 0 {
                return Err(AggError::Syntax("PARAMS count must be even".into()));
            }
            for _ in 0..n / 2 {
                let key = cursor.next()?.to_string();
                let value = cursor.next()?.to_string();
                if params.insert(key.clone(), value).is_some() {
                    return Err(AggError::DupParam(key));
                }
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Returns the open ARRANGE step's index, appending one if none is open.
fn arrange_index(plan: &mut AggPlan, current_arrange: &mut Option<usize>) -> usize {
    if let Some(idx) = *current_arrange {
        return idx;
    }
    plan.add_step(PlanStep::Arrange(ArrangeStep::default()));
    let idx = plan.len() - 1;
    *current_arrange = Some(idx);
    idx
}

fn parse_reducer_call(cursor: &mut ArgCursor) -> AggResult<ReducerCall> {
    let name = cursor.next()?.to_string();
    let kind = ReducerKind::parse(&name).ok_or_else(|| AggError::NoReducer(name.clone()))?;
    let argc = cursor.next_usize()?;
    let mut raw = cursor.next_n(argc)?;
    cursor.expect_keyword("AS")?;
    let alias = cursor.next()?.to_string();

    let numeric_arg = matches!(kind, ReducerKind::Quantile | ReducerKind::RandomSample)
        .then(|| raw.pop())
        .flatten()
        .map(|tok| {
            tok.parse::<f64>()
                .map_err(|_| AggError::ParseArgs(format!("numeric reducer argument: {tok}")))
        })
        .transpose()?;

    let mut call = ReducerCall::new(kind, raw, alias);
    call.numeric_arg = numeric_arg;
    Ok(call)
}

/// Parses `FT.AGGREGATE <idx> <query> [clauses...] [WITHCURSOR...]
/// [TIMEOUT n] [DIALECT n] [FORMAT STRING|EXPAND] [VERBATIM] [ADDSCORES]`.
pub fn parse_aggregate(tokens: &[String]) -> AggResult<AggregateRequest> {
    let mut cursor = ArgCursor::new(tokens);
    let index = cursor.next()?.to_string();
    let query = cursor.next()?.to_string();

    let mut plan = AggPlan::new(RLookup::new());
    let mut current_arrange = None;
    let mut params = HashMap::new();
    let mut with_cursor = None;
    let mut timeout_ms = None;
    let mut dialect = None;
    let mut format = ReplyFormat::default();
    let mut verbatim = false;
    let mut add_scores = false;

    while let Some(token) = cursor.peek() {
        let upper = token.to_ascii_uppercase();
        match upper.as_str() {
            "WITHCURSOR" => {
                cursor.next()?;
                let mut opts = CursorOptions::default();
                while let Some(t) = cursor.peek() {
                    match t.to_ascii_uppercase().as_str() {
                        "COUNT" => {
                            cursor.next()?;
                            opts.count = Some(cursor.next_usize()? as u32);
                        }
                        "MAXIDLE" => {
                            cursor.next()?;
                            opts.max_idle_ms = Some(cursor.next_usize()? as u64);
                        }
                        _ => break,
                    }
                }
                with_cursor = Some(opts);
            }
            "TIMEOUT" => {
                cursor.next()?;
                timeout_ms = Some(cursor.next_usize()? as u64);
            }
            "DIALECT" => {
                cursor.next()?;
                dialect = Some(cursor.next_usize()? as u32);
            }
            "FORMAT" => {
                cursor.next()?;
                format = match cursor.next()?.to_ascii_uppercase().as_str() {
                    "STRING" => ReplyFormat::String,
                    "EXPAND" => ReplyFormat::Expand,
                    other => return Err(AggError::BadOption(other.to_string())),
                };
            }
            "VERBATIM" => {
                cursor.next()?;
                verbatim = true;
            }
            "ADDSCORES" => {
                cursor.next()?;
                add_scores = true;
            }
            _ => {
                if !try_parse_tail_clause(&mut cursor, &mut plan, &mut current_arrange, &mut params)? {
                    return Err(AggError::BadOption(token.clone()));
                }
            }
        }
    }

    Ok(AggregateRequest {
        index,
        query,
        plan,
        with_cursor,
        params,
        timeout_ms,
        dialect,
        format,
        verbatim,
        add_scores,
    })
}

/// Parses `FT.SEARCH <idx> <query> [options...]`, leaving option tokens
/// unparsed (query-language concern, out of scope here).
pub fn parse_search(tokens: &[String]) -> AggResult<SearchRequest> {
    let mut cursor = ArgCursor::new(tokens);
    let index = cursor.next()?.to_string();
    let query = cursor.next()?.to_string();
    Ok(SearchRequest { index, query, options: cursor.rest() })
}

/// Parses `FT.HYBRID <idx> SEARCH <q> [SCORER s] VSIM <field> <blob-param>
/// [KNN k | RANGE r] [EF_RUNTIME n] [EPSILON f] [YIELD_DISTANCE_AS alias]
/// [FILTER expr] [COMBINE RRF [CONSTANT k] [WINDOW w] | LINEAR a b [WINDOW w]]
/// [tail clauses...]`.
pub fn parse_hybrid(tokens: &[String]) -> AggResult<HybridRequest> {
    let mut cursor = ArgCursor::new(tokens);
    let index = cursor.next()?.to_string();
    cursor.expect_keyword("SEARCH")?;
    let search_query = cursor.next()?.to_string();

    let scorer = if cursor.eat_keyword("SCORER") { Some(cursor.next()?.to_string()) } else { None };

    cursor.expect_keyword("VSIM")?;
    let vector_field = cursor.next()?.to_string();
    let blob_param = cursor.next()?.to_string();

    let mut knn_or_range = None;
    let mut ef_runtime = None;
    let mut epsilon = None;
    let mut yield_distance_as = None;
    let mut filter = None;
    let mut combine = None;
    let mut plan = AggPlan::new(RLookup::new());
    let mut current_arrange = None;
    let mut params = HashMap::new();

    while let Some(token) = cursor.peek() {
        let upper = token.to_ascii_uppercase();
        match upper.as_str() {
            "KNN" => {
                cursor.next()?;
                knn_or_range = Some(KnnOrRange::Knn(cursor.next_usize()?));
            }
            "RANGE" => {
                cursor.next()?;
                let radius = cursor.next()?.parse::<f64>()
                    .map_err(|_| AggError::ParseArgs("RANGE radius".into()))?;
                knn_or_range = Some(KnnOrRange::Range(radius));
            }
            "EF_RUNTIME" => {
                cursor.next()?;
                ef_runtime = Some(cursor.next_usize()? as u32);
            }
            "EPSILON" => {
                cursor.next()?;
                epsilon = Some(
                    cursor.next()?.parse::<f64>().map_err(|_| AggError::ParseArgs("EPSILON".into()))?,
                );
            }
            "YIELD_DISTANCE_AS" => {
                cursor.next()?;
                yield_distance_as = Some(cursor.next()?.to_string());
            }
            "FILTER" => {
                cursor.next()?;
                filter = Some(cursor.next()?.to_string());
            }
            "COMBINE" => {
                cursor.next()?;
                combine = Some(parse_combine(&mut cursor)?);
            }
            _ => {
                if !try_parse_tail_clause(&mut cursor, &mut plan, &mut current_arrange, &mut params)? {
                    return Err(AggError::BadOption(token.clone()));
                }
            }
        }
    }

    if ef_runtime.is_some() {
        if matches!(knn_or_range, Some(KnnOrRange::Range(_))) {
            return Err(AggError::AdhocWithEfRuntime);
        }
    }

    Ok(HybridRequest {
        index,
        search_query,
        scorer,
        vector_field,
        blob_param,
        knn_or_range,
        ef_runtime,
        epsilon,
        yield_distance_as,
        filter,
        combine,
        tail: plan,
        params,
    })
}

fn parse_combine(cursor: &mut ArgCursor) -> AggResult<CombineSpec> {
    match cursor.next()?.to_ascii_uppercase().as_str() {
        "RRF" => {
            let mut constant = None;
            let mut window = None;
            loop {
                match cursor.peek().map(|s| s.to_ascii_uppercase()) {
                    Some(ref k) if k == "CONSTANT" => {
                        cursor.next()?;
                        constant = Some(cursor.next_usize()? as u32);
                    }
                    Some(ref k) if k == "WINDOW" => {
                        cursor.next()?;
                        window = Some(cursor.next_usize()? as u32);
                    }
                    _ => break,
                }
            }
            Ok(CombineSpec::Rrf { constant, window })
        }
        "LINEAR" => {
            let alpha = cursor.next()?.parse::<f64>().map_err(|_| AggError::ParseArgs("LINEAR alpha".into()))?;
            let beta = cursor.next()?.parse::<f64>().map_err(|_| AggError::ParseArgs("LINEAR beta".into()))?;
            let window = if cursor.eat_keyword("WINDOW") { Some(cursor.next_usize()? as u32) } else { None };
            Ok(CombineSpec::Linear { alpha, beta, window })
        }
        other => Err(AggError::BadOption(other.to_string())),
    }
}

/// Parses `FT.CURSOR READ|DEL|GC <idx> [cursor_id] [COUNT n]`.
pub fn parse_cursor(tokens: &[String]) -> AggResult<CursorCommand> {
    let mut cursor = ArgCursor::new(tokens);
    let verb = cursor.next()?.to_ascii_uppercase();
    let index = cursor.next()?.to_string();
    match verb.as_str() {
        "READ" => {
            let cursor_id = cursor.next()?.parse::<u64>().map_err(|_| AggError::ParseArgs("cursor id".into()))?;
            let count = if cursor.eat_keyword("COUNT") { Some(cursor.next_usize()? as u32) } else { None };
            Ok(CursorCommand::Read { index, cursor_id, count })
        }
        "DEL" => {
            let cursor_id = cursor.next()?.parse::<u64>().map_err(|_| AggError::ParseArgs("cursor id".into()))?;
            Ok(CursorCommand::Del { index, cursor_id })
        }
        "GC" => Ok(CursorCommand::Gc { index }),
        other => Err(AggError::BadOption(other.to_string())),
    }
}

/// Parses `FT.PROFILE <idx> {SEARCH|AGGREGATE} [LIMITED] QUERY <inner...>`.
pub fn parse_profile(tokens: &[String]) -> AggResult<ProfileRequest> {
    let mut cursor = ArgCursor::new(tokens);
    let index = cursor.next()?.to_string();
    let mode = match cursor.next()?.to_ascii_uppercase().as_str() {
        "SEARCH" => ProfileMode::Search,
        "AGGREGATE" => ProfileMode::Aggregate,
        other => return Err(AggError::BadOption(other.to_string())),
    };
    let limited = cursor.eat_keyword("LIMITED");
    cursor.expect_keyword("QUERY")?;
    Ok(ProfileRequest { index, mode, limited, inner: cursor.rest() })
}

/// Parses `_FT.DEBUG <normal command...> [TIMEOUT_AFTER_N n] DEBUG_PARAMS_COUNT k`
/// (original source: `aggregate_debug.c`). The last token is `k`, the one
/// before it must be the literal `DEBUG_PARAMS_COUNT`, and the `k` tokens
/// before that are the debug params themselves (which may include a
/// `TIMEOUT_AFTER_N n` pair).
pub fn parse_debug(tokens: &[String]) -> AggResult<DebugRequest> {
    if tokens.len() < 2 {
        return Err(AggError::Syntax("_FT.DEBUG requires DEBUG_PARAMS_COUNT".into()));
    }
    let k: usize = tokens[tokens.len() - 1]
        .parse()
        .map_err(|_| AggError::ParseArgs("DEBUG_PARAMS_COUNT value".into()))?;
    if !tokens[tokens.len() - 2].eq_ignore_ascii_case("DEBUG_PARAMS_COUNT") {
        return Err(AggError::Syntax("expected DEBUG_PARAMS_COUNT before its value".into()));
    }
    let debug_section_len = k + 2;
    if tokens.len() < debug_section_len {
        return Err(AggError::Syntax("DEBUG_PARAMS_COUNT exceeds argument count".into()));
    }
    let split_at = tokens.len() - debug_section_len;
    let inner = tokens[..split_at].to_vec();
    let debug_params = &tokens[split_at..tokens.len() - 2];

    let mut timeout_after_n = None;
    let mut i = 0;
    while i < debug_params.len() {
        if debug_params[i].eq_ignore_ascii_case("TIMEOUT_AFTER_N") && i + 1 < debug_params.len() {
            timeout_after_n = debug_params[i + 1].parse().ok();
            i += 2;
        } else {
            i += 1;
        }
    }

    Ok(DebugRequest { inner, timeout_after_n })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanStepKind;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn parses_s1_groupby_reduce_sortby() {
        let req = parse_aggregate(&toks(
            "idx * GROUPBY 1 @cat REDUCE SUM 1 @val AS s REDUCE AVG 1 @val AS a SORTBY 2 @s DESC",
        ))
        .unwrap();
        assert_eq!(req.index, "idx");
        assert_eq!(req.query, "*");
        let steps = req.plan.steps();
        assert_eq!(steps[1].kind(), PlanStepKind::Group);
        let PlanStep::Group(group) = &steps[1] else { panic!("expected group") };
        assert_eq!(group.group_by, vec!["@cat".to_string()]);
        assert_eq!(group.reducers.len(), 2);
        assert_eq!(group.reducers[0].kind, ReducerKind::Sum);
        assert_eq!(group.reducers[0].alias, "s");
        assert_eq!(group.reducers[1].kind, ReducerKind::Avg);
        assert_eq!(steps[2].kind(), PlanStepKind::Arrange);
        let PlanStep::Arrange(arrange) = &steps[2] else { panic!("expected arrange") };
        assert_eq!(arrange.sort_keys, vec!["@s".to_string()]);
        assert_eq!(arrange.ascending, vec![false]);
    }

    #[test]
    fn sortby_then_limit_share_one_arrange_step() {
        let req = parse_aggregate(&toks("idx * SORTBY 2 @s DESC LIMIT 0 10")).unwrap();
        let arrange_steps: Vec<_> = req
            .plan
            .steps()
            .iter()
            .filter(|s| s.kind() == PlanStepKind::Arrange)
            .collect();
        assert_eq!(arrange_steps.len(), 1);
        let PlanStep::Arrange(arrange) = arrange_steps[0] else { panic!() };
        assert_eq!(arrange.limit, Some(10));
        assert_eq!(arrange.offset, 0);
        assert_eq!(arrange.sort_keys, vec!["@s".to_string()]);
    }

    #[test]
    fn parses_withcursor_and_timeout() {
        let req = parse_aggregate(&toks("idx * WITHCURSOR COUNT 10 MAXIDLE 5000 TIMEOUT 500")).unwrap();
        let opts = req.with_cursor.unwrap();
        assert_eq!(opts.count, Some(10));
        assert_eq!(opts.max_idle_ms, Some(5000));
        assert_eq!(req.timeout_ms, Some(500));
    }

    #[test]
    fn rejects_unknown_option() {
        let err = parse_aggregate(&toks("idx * BOGUS")).unwrap_err();
        assert!(matches!(err, AggError::BadOption(_)));
    }

    #[test]
    fn parses_hybrid_with_rrf_combine() {
        let req = parse_hybrid(&toks(
            "idx SEARCH @title:foo VSIM vec $BLOB KNN 10 COMBINE RRF CONSTANT 60 WINDOW 20 LIMIT 0 5",
        ))
        .unwrap();
        assert_eq!(req.vector_field, "vec");
        assert_eq!(req.blob_param, "$BLOB");
        assert_eq!(req.knn_or_range, Some(KnnOrRange::Knn(10)));
        assert_eq!(req.combine, Some(CombineSpec::Rrf { constant: Some(60), window: Some(20) }));
        let arrange = req.tail.steps().iter().find(|s| s.kind() == PlanStepKind::Arrange).unwrap();
        let PlanStep::Arrange(a) = arrange else { panic!() };
        assert_eq!(a.limit, Some(5));
    }

    #[test]
    fn parses_cursor_read() {
        let cmd = parse_cursor(&toks("READ idx 42 COUNT 5")).unwrap();
        assert_eq!(cmd, CursorCommand::Read { index: "idx".into(), cursor_id: 42, count: Some(5) });
    }

    #[test]
    fn parses_debug_with_timeout_after_n() {
        let tokens = toks("idx * TIMEOUT_AFTER_N 3 DEBUG_PARAMS_COUNT 2");
        let req = parse_debug(&tokens).unwrap();
        assert_eq!(req.inner, vec!["idx".to_string(), "*".to_string()]);
        assert_eq!(req.timeout_after_n, Some(3));
    }

    #[test]
    fn parses_debug_with_no_debug_params() {
        let tokens = toks("idx * DEBUG_PARAMS_COUNT 0");
        let req = parse_debug(&tokens).unwrap();
        assert_eq!(req.inner, vec!["idx".to_string(), "*".to_string()]);
        assert_eq!(req.timeout_after_n, None);
    }
}
