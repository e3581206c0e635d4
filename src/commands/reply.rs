//! Reply shaping: RESP2/RESP3 aggregate and
//! hybrid reply bodies, and the `-<ERROR_NAME> <message>` error shape every
//! other reply kind degrades to on failure.

use std::collections::HashMap;

use crate::error::{AggError, Warning};
use crate::value::RSValue;

/// A reply ready to hand to the protocol layer, already split along the
/// RESP2/RESP3 line draws (RESP2 gets a flat array-of-rows plus an
/// optional trailing cursor id; RESP3 gets a map per row plus a top-level
/// `attributes`/`warnings` map).
#[derive(Debug, Clone)]
pub enum Reply {
    Resp2Aggregate {
        total_results: usize,
        rows: Vec<Vec<(String, RSValue)>>,
        cursor_id: Option<u64>,
    },
    Resp3Aggregate {
        attributes: HashMap<String, RSValue>,
        total_results: usize,
        format: super::ReplyFormat,
        results: Vec<HashMap<String, RSValue>>,
        warnings: Vec<Warning>,
        cursor_id: Option<u64>,
    },
    Resp3Hybrid {
        total_results: usize,
        results: Vec<HashMap<String, RSValue>>,
        warnings: Vec<Warning>,
        execution_time_ms: f64,
    },
    Error {
        name: &'static str,
        message: String,
    },
}

/// An empty, well-formed reply for the "no results" / precondition-failure
/// paths.
pub fn empty_reply(resp3: bool, warning: Option<Warning>) -> Reply {
    if resp3 {
        Reply::Resp3Aggregate {
            attributes: HashMap::new(),
            total_results: 0,
            format: super::ReplyFormat::default(),
            results: Vec::new(),
            warnings: warning.into_iter().collect(),
            cursor_id: None,
        }
    } else {
        Reply::Resp2Aggregate { total_results: 0, rows: Vec::new(), cursor_id: None }
    }
}

pub fn error_reply(err: &AggError) -> Reply {
    Reply::Error { name: error_name(err), message: err.to_string() }
}

/// Maps an [`AggError`] variant to its wire error name.
pub fn error_name(err: &AggError) -> &'static str {
    match err {
        AggError::Generic(_) => "GENERIC",
        AggError::Syntax(_) => "SYNTAX",
        AggError::ParseArgs(_) => "PARSE_ARGS",
        AggError::AddArgs(_) => "ADD_ARGS",
        AggError::Expr(_) => "EXPR",
        AggError::Keyword(_) => "KEYWORD",
        AggError::NoResults => "NO_RESULTS",
        AggError::BadAttr(_) => "BAD_ATTR",
        AggError::Inval(_) => "INVAL",
        AggError::BuildPlan(_) => "BUILD_PLAN",
        AggError::ConstructPipeline(_) => "CONSTRUCT_PIPELINE",
        AggError::NoReducer(_) => "NO_REDUCER",
        AggError::ReducerGeneric(_) => "REDUCER_GENERIC",
        AggError::AggPlan(_) => "AGG_PLAN",
        AggError::CursorAlloc => "CURSOR_ALLOC",
        AggError::ReducerInit(_) => "REDUCER_INIT",
        AggError::QString(_) => "Q_STRING",
        AggError::NoPropKey(_) => "NO_PROP_KEY",
        AggError::NoPropVal(_) => "NO_PROP_VAL",
        AggError::NoDoc => "NO_DOC",
        AggError::NoOption(_) => "NO_OPTION",
        AggError::RedisKeyType => "REDIS_KEY_TYPE",
        AggError::InvalPath(_) => "INVAL_PATH",
        AggError::IndexExists(_) => "INDEX_EXISTS",
        AggError::BadOption(_) => "BAD_OPTION",
        AggError::BadOrderOption => "BAD_ORDER_OPTION",
        AggError::Limit => "LIMIT",
        AggError::NoIndex(_) => "NO_INDEX",
        AggError::DocExists => "DOC_EXISTS",
        AggError::DocNotAdded => "DOC_NOT_ADDED",
        AggError::DupField(_) => "DUP_FIELD",
        AggError::GeoFormat => "GEO_FORMAT",
        AggError::NoDistribute => "NO_DISTRIBUTE",
        AggError::UnsuppType(_) => "UNSUPP_TYPE",
        AggError::NotNumeric => "NOT_NUMERIC",
        AggError::TimedOut => "TIMED_OUT",
        AggError::NoParam(_) => "NO_PARAM",
        AggError::DupParam(_) => "DUP_PARAM",
        AggError::BadVal(_) => "BAD_VAL",
        AggError::NonHybrid => "NON_HYBRID",
        AggError::HybridNonExist(_) => "HYBRID_NON_EXIST",
        AggError::AdhocWithBatchSize => "ADHOC_WITH_BATCH_SIZE",
        AggError::AdhocWithEfRuntime => "ADHOC_WITH_EF_RUNTIME",
        AggError::NonRange => "NON_RANGE",
        AggError::Missing(_) => "MISSING",
        AggError::Mismatch(_) => "MISMATCH",
        AggError::UnknownIndex => "UNKNOWN_INDEX",
        AggError::DroppedBackground => "DROPPED_BACKGROUND",
        AggError::AliasConflict(_) => "ALIAS_CONFLICT",
        AggError::IndexBgOomFail => "INDEX_BG_OOM_FAIL",
        AggError::WeightNotAllowed => "WEIGHT_NOT_ALLOWED",
        AggError::VectorNotAllowed => "VECTOR_NOT_ALLOWED",
        AggError::OutOfMemory => "OUT_OF_MEMORY",
        AggError::CursorNotFound => "CURSOR_NOT_FOUND",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_reply_carries_wire_name_and_message() {
        let reply = error_reply(&AggError::NoIndex("idx".into()));
        match reply {
            Reply::Error { name, message } => {
                assert_eq!(name, "NO_INDEX");
                assert_eq!(message, "Unknown index name: idx");
            }
            _ => panic!("expected Error reply"),
        }
    }

    #[test]
    fn empty_reply_resp2_has_no_rows() {
        match empty_reply(false, None) {
            Reply::Resp2Aggregate { total_results, rows, cursor_id } => {
                assert_eq!(total_results, 0);
                assert!(rows.is_empty());
                assert_eq!(cursor_id, None);
            }
            _ => panic!("expected Resp2Aggregate"),
        }
    }

    #[test]
    fn empty_reply_resp3_carries_warning() {
        match empty_reply(true, Some(Warning::OomCluster)) {
            Reply::Resp3Aggregate { warnings, .. } => {
                assert_eq!(warnings, vec![Warning::OomCluster]);
            }
            _ => panic!("expected Resp3Aggregate"),
        }
    }
}
