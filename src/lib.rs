//! Graph path exploration and batched periodic execution.
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod cache;
pub mod config;
pub mod errors;
pub mod evaluators;
pub mod expander;
pub mod explorer;
pub mod neighbors;
pub mod periodic;
pub mod rel_filter;
pub mod schema;
pub mod store;

pub use crate::config::{ExploreConfig, IterateConfig, PeriodicConfig};
pub use crate::errors::GraphProcError;
pub use crate::evaluators::{Evaluation, Evaluator, EvaluatorChain};
pub use crate::expander::RelationshipSequenceExpander;
pub use crate::explorer::{PathExplorer, PathRows, PathTraversal, Subgraph, Uniqueness};
pub use crate::neighbors::{
    HopLayers, neighbors_at_hop, neighbors_at_hop_count, neighbors_by_hop, neighbors_by_hop_count,
    neighbors_to_hop, neighbors_to_hop_count,
};
pub use crate::periodic::{
    BatchMode, CancellationToken, CommitSummary, ExecutionSummary, IterateSummary, JobInfo,
    Params, PeriodicContext, QueryExecutor, QueryStatistics, Row, RowCursor,
};
pub use crate::rel_filter::{TypeDirection, parse_relationship_filter};
pub use crate::store::{Direction, GraphStore, NodeId, Path, Relationship, SqliteGraph};
