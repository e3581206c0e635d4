//! # aggflow
//!
//! A distributed aggregation planner and execution pipeline for a full-text
//! + vector search coordinator: parsed query pieces feed an [`AggPlan`],
//! the [`distribute`] rewriter splits it into a shard-bound remote plan and
//! a local tail, and the [`pipeline`] result-processor chain — fed by
//! [`iterators`], backed by [`cursors`] for paused multi-round execution,
//! and fanned out over [`network`] — drives it to completion. [`hybrid`]
//! wires a SEARCH branch and a VSIM (vector similarity) branch into one
//! merged result stream.
//!
//! ## Data flow
//!
//! ```text
//! parsed query  →  AggPlan (plan)
//!                     │
//!                     ▼
//!               distribute(plan)  →  DISTRIBUTE step { remote_plan, local tail }
//!                     │
//!                     ▼
//!               Pipeline (pipeline)  ←  QueryIterator (iterators)
//!                     │                  │
//!                     │                  └─ vector_index (KNN/range)
//!                     ▼
//!               cursors (paused multi-round execution)
//!                     │
//!                     ▼
//!               network (per-shard fan-in, reply conversion)
//! ```
//!
//! ## Module organization
//!
//! | Module | Role |
//! |--------|------|
//! | `value` | `RSValue`, `RLookup`/`RLookupRow` — the dynamic value and row-schema types |
//! | `plan` | `AggPlan`, `PlanStep` variants, wire serialization |
//! | `distribute` | the distribution rewriter (plan → remote + local plan) |
//! | `reducers` | COUNT/SUM/MIN/MAX/AVG/... and their remote/local split rules |
//! | `iterators` | the query iterator sum type (INDEX, UNION, HYBRID_VECTOR, ...) |
//! | `vector_index` | KNN/range vector iterator (STANDARD/ADHOC_BF/BATCHES) |
//! | `pipeline` | the result-processor chain (scorer/sorter/loader/grouper/...) |
//! | `cursors` | the cursor registry and idle GC |
//! | `hybrid` | hybrid (SEARCH + VSIM) request builder and merger |
//! | `network` | shard fan-in iterator, per-shard cursor command, reply conversion |
//! | `commands` | FT.SEARCH/FT.AGGREGATE/FT.HYBRID/FT.CURSOR/FT.PROFILE/_FT.DEBUG token parsing and reply shaping |
//! | `profiling` | FT.PROFILE pipeline wrapping and stat collection |
//! | `error` | crate-wide error and warning enums |
//! | `config` | hierarchical configuration (TOML + env) |

pub mod error;
pub mod value;

pub use error::{AggError, AggResult, Warning};
pub use value::{RLookup, RLookupKey, RLookupKeyFlags, RLookupMode, RLookupRow, RSValue};

pub mod config;

pub use config::{Config, ConfigHandle};

// --- Aggregation planner / execution pipeline -----------------------------
//
// Plan construction and the distribution rewriter, the reducer table, query
// iterators (including the vector KNN/range iterator and its `hnsw_rs`-backed
// adapter), the processor chain (scorer/sorter/grouper/loader/highlighter/
// network/depleter/hybrid-merger/profile), the cursor registry, and the
// hybrid (SEARCH + VSIM) request builder.
pub mod cursors;
pub mod distribute;
pub mod hybrid;
pub mod iterators;
pub mod network;
pub mod pipeline;
pub mod plan;
pub mod reducers;
pub mod vector_index;

pub use cursors::{CursorId, CursorList, CursorListKind};
pub use distribute::{distribute as distribute_plan, DistributionOutcome};
pub use pipeline::{Pipeline, Processor, RpStatus, SearchResult};
pub use plan::AggPlan;

// The FT.* command surface (token parsing, reply shaping) and FT.PROFILE's
// per-processor duration/count accumulation.
pub mod commands;
pub mod profiling;
