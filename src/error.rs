//! Crate-wide error and warning types.
//!
//! Mirrors the error taxonomy of the embedding host's command surface: every
//! kind that can be surfaced to a client is a variant here, each carrying an
//! optional user-safe message. Internal detail (backtraces, source chains)
//! stays out of the `Display` impl so replies never leak implementation
//! details to callers.

use thiserror::Error;

/// Crate-wide result alias.
pub type AggResult<T> = Result<T, AggError>;

/// All error kinds a request can fail with.
#[derive(Debug, Clone, Error)]
pub enum AggError {
    #[error("{0}")]
    Generic(String),

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Could not parse argument: {0}")]
    ParseArgs(String),

    #[error("Could not add step to plan: {0}")]
    AddArgs(String),

    #[error("Could not evaluate expression: {0}")]
    Expr(String),

    #[error("Unknown keyword: {0}")]
    Keyword(String),

    #[error("No results")]
    NoResults,

    #[error("Unknown attribute: {0}")]
    BadAttr(String),

    #[error("Invalid value: {0}")]
    Inval(String),

    #[error("Could not build plan: {0}")]
    BuildPlan(String),

    #[error("Could not construct pipeline: {0}")]
    ConstructPipeline(String),

    #[error("Unknown reducer: {0}")]
    NoReducer(String),

    #[error("Reducer error: {0}")]
    ReducerGeneric(String),

    #[error("Aggregate plan error: {0}")]
    AggPlan(String),

    #[error("Could not allocate cursor")]
    CursorAlloc,

    #[error("Could not initialize reducer: {0}")]
    ReducerInit(String),

    #[error("Query string error: {0}")]
    QString(String),

    #[error("Property '{0}' not in result")]
    NoPropKey(String),

    #[error("Could not get value of property '{0}'")]
    NoPropVal(String),

    #[error("Document not found")]
    NoDoc,

    #[error("Unknown option: {0}")]
    NoOption(String),

    #[error("Wrong Redis key type")]
    RedisKeyType,

    #[error("Invalid path: {0}")]
    InvalPath(String),

    #[error("Index already exists: {0}")]
    IndexExists(String),

    #[error("Unknown argument: {0}")]
    BadOption(String),

    #[error("Bad ORDER option")]
    BadOrderOption,

    #[error("Limit exceeded")]
    Limit,

    #[error("Unknown index name: {0}")]
    NoIndex(String),

    #[error("Document already exists")]
    DocExists,

    #[error("Document not added")]
    DocNotAdded,

    #[error("Duplicate field: {0}")]
    DupField(String),

    #[error("Invalid GEO format")]
    GeoFormat,

    #[error("Could not distribute aggregation")]
    NoDistribute,

    #[error("Unsupported type: {0}")]
    UnsuppType(String),

    #[error("Value is not numeric")]
    NotNumeric,

    #[error("Timeout limit was reached")]
    TimedOut,

    #[error("No such parameter: {0}")]
    NoParam(String),

    #[error("Duplicate parameter: {0}")]
    DupParam(String),

    #[error("Invalid value: {0}")]
    BadVal(String),

    #[error("Non-hybrid request")]
    NonHybrid,

    #[error("Hybrid subquery does not exist: {0}")]
    HybridNonExist(String),

    #[error("EF_RUNTIME is not allowed with adhoc-bf / explicit batch size")]
    AdhocWithBatchSize,

    #[error("EF_RUNTIME is not allowed in ADHOC_BF mode")]
    AdhocWithEfRuntime,

    #[error("Not a range query")]
    NonRange,

    #[error("Missing required argument: {0}")]
    Missing(String),

    #[error("Type mismatch: {0}")]
    Mismatch(String),

    #[error("Unknown index name")]
    UnknownIndex,

    #[error("The index was dropped while the query was running in the background")]
    DroppedBackground,

    #[error("Alias conflict: {0}")]
    AliasConflict(String),

    #[error("Index is building in background and ran out of memory")]
    IndexBgOomFail,

    #[error("Weight is not allowed here")]
    WeightNotAllowed,

    #[error("Vector similarity is not allowed here")]
    VectorNotAllowed,

    #[error("Not enough memory available to execute the query")]
    OutOfMemory,

    #[error("Cursor not found")]
    CursorNotFound,
}

/// Non-fatal conditions carried alongside a (possibly partial) result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Warning {
    /// Coordinator or shard timed out; results are partial under the
    /// `Return` timeout policy.
    TimedOut,
    /// A shard ran out of memory while executing the query.
    OomCluster,
    /// The query prefix expansion hit `MAXEXPANSIONS` and was truncated.
    MaxPrefixExpansions,
    /// Background indexing for this spec has failed.
    IndexingFailure,
}

impl Warning {
    pub fn as_str(self) -> &'static str {
        match self {
            Warning::TimedOut => "TIMEDOUT",
            Warning::OomCluster => {
                "One or more shards failed to execute the query due to insufficient memory"
            }
            Warning::MaxPrefixExpansions => "MAX_PREFIX_EXPANSIONS",
            Warning::IndexingFailure => "INDEXING_FAILURE",
        }
    }
}

impl From<String> for AggError {
    fn from(message: String) -> Self {
        AggError::Generic(message)
    }
}

impl From<&str> for AggError {
    fn from(message: &str) -> Self {
        AggError::Generic(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_message() {
        assert_eq!(AggError::TimedOut.to_string(), "Timeout limit was reached");
        assert_eq!(AggError::OutOfMemory.to_string(), "Not enough memory available to execute the query");
    }

    #[test]
    fn warning_wire_strings() {
        assert_eq!(Warning::TimedOut.as_str(), "TIMEDOUT");
        assert_eq!(Warning::MaxPrefixExpansions.as_str(), "MAX_PREFIX_EXPANSIONS");
    }
}
