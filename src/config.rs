//! Caller-facing configuration for traversals and periodic execution.
//!
//! Option names follow the camelCase keys callers pass in configuration maps,
//! so every struct here can be built straight from a JSON object:
//!
//! ```rust
//! use graphproc::ExploreConfig;
//! use serde_json::json;
//!
//! let cfg = ExploreConfig::from_value(&json!({
//!     "relationshipFilter": "KNOWS>",
//!     "maxLevel": 3,
//!     "uniqueness": "NODE_GLOBAL"
//! }))?;
//! assert_eq!(cfg.max_level(), Some(3));
//! # Ok::<(), graphproc::GraphProcError>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{errors::GraphProcError, explorer::Uniqueness, periodic::BatchMode, store::NodeId};

/// Sentinel for "unset" integer options.
pub const UNSET: i64 = -1;

/// Full configuration of one traversal request.
///
/// # Defaults
///
/// ```rust
/// use graphproc::{ExploreConfig, Uniqueness};
/// let cfg = ExploreConfig::default();
/// assert_eq!(cfg.min_level, 0);
/// assert_eq!(cfg.max_level, -1);
/// assert!(cfg.bfs);
/// assert_eq!(cfg.uniqueness, Uniqueness::RelationshipPath);
/// assert!(cfg.begin_sequence_at_start);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExploreConfig {
    /// Relationship filter applied at every depth, e.g. `"KNOWS>|<LIKES"`.
    pub relationship_filter: Option<String>,

    /// Label filter applied at every depth, e.g. `"+Person|-Banned|/Company"`.
    pub label_filter: Option<String>,

    /// Alternating label and relationship filters, e.g. `"Person,KNOWS>,Company,<WORKS_AT"`.
    ///
    /// When set, `relationship_filter` and `label_filter` are ignored.
    pub sequence: Option<String>,

    /// Shortest path length included in the output. **Default:** `0`
    pub min_level: i64,

    /// Longest path length explored, `-1` for unbounded. **Default:** `-1`
    pub max_level: i64,

    /// Breadth-first when `true`, depth-first otherwise. **Default:** `true`
    pub bfs: bool,

    /// Which nodes or relationships may repeat. **Default:** `RELATIONSHIP_PATH`
    pub uniqueness: Uniqueness,

    /// Apply label and node-list filters to the start node too. **Default:** `false`
    pub filter_start_node: bool,

    /// Maximum number of paths returned, `-1` for unbounded. **Default:** `-1`
    pub limit: i64,

    /// Yield a single `None` row instead of nothing. **Default:** `false`
    pub optional: bool,

    pub end_nodes: Vec<NodeId>,
    pub terminator_nodes: Vec<NodeId>,
    #[serde(alias = "whitelistNodes")]
    pub allowlist_nodes: Vec<NodeId>,
    #[serde(alias = "blacklistNodes")]
    pub denylist_nodes: Vec<NodeId>,

    /// Whether the first sequence entry applies to the start node. **Default:** `true`
    pub begin_sequence_at_start: bool,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            relationship_filter: None,
            label_filter: None,
            sequence: None,
            min_level: 0,
            max_level: UNSET,
            bfs: true,
            uniqueness: Uniqueness::RelationshipPath,
            filter_start_node: false,
            limit: UNSET,
            optional: false,
            end_nodes: Vec::new(),
            terminator_nodes: Vec::new(),
            allowlist_nodes: Vec::new(),
            denylist_nodes: Vec::new(),
            begin_sequence_at_start: true,
        }
    }
}

impl ExploreConfig {
    pub fn from_value(value: &Value) -> Result<Self, GraphProcError> {
        from_config_value(value)
    }

    pub fn validate(&self) -> Result<(), GraphProcError> {
        if self.min_level < UNSET {
            return Err(GraphProcError::invalid_config(format!(
                "minLevel must be -1 or greater, got {}",
                self.min_level
            )));
        }
        if self.max_level < UNSET {
            return Err(GraphProcError::invalid_config(format!(
                "maxLevel must be -1 or greater, got {}",
                self.max_level
            )));
        }
        if self.limit < UNSET {
            return Err(GraphProcError::invalid_config(format!(
                "limit must be -1 or greater, got {}",
                self.limit
            )));
        }
        Ok(())
    }

    pub fn min_level(&self) -> usize {
        self.min_level.max(0) as usize
    }

    pub fn max_level(&self) -> Option<usize> {
        usize::try_from(self.max_level).ok()
    }

    pub fn limit(&self) -> Option<usize> {
        usize::try_from(self.limit).ok()
    }
}

/// Per-call options of [`crate::periodic::PeriodicContext::iterate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IterateConfig {
    /// Outer rows per batch; must be positive. **Default:** `10000`
    pub batch_size: i64,

    /// In-flight batch bound; must be positive. **Default:** the context pool size
    pub concurrency: Option<i64>,

    /// Run batches concurrently. **Default:** `false`
    pub parallel: bool,

    /// Extra attempts for a failed batch. **Default:** `0`
    pub retries: i64,

    /// How outer rows reach the action statement. **Default:** `BATCH`
    pub batch_mode: BatchMode,

    /// Parameters passed to both the outer and the action statement.
    pub params: Map<String, Value>,

    /// Failed batches kept per error message, `-1` to keep none. **Default:** `-1`
    pub failed_params: i64,

    /// Drain the outer cursor before dispatching the first batch. **Default:** `false`
    pub eager: bool,
}

impl Default for IterateConfig {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            concurrency: None,
            parallel: false,
            retries: 0,
            batch_mode: BatchMode::Batch,
            params: Map::new(),
            failed_params: UNSET,
            eager: false,
        }
    }
}

impl IterateConfig {
    pub fn from_value(value: &Value) -> Result<Self, GraphProcError> {
        from_config_value(value)
    }

    pub fn validate(&self) -> Result<(), GraphProcError> {
        if self.batch_size <= 0 {
            return Err(GraphProcError::invalid_config(format!(
                "batchSize must be greater than zero, got {}",
                self.batch_size
            )));
        }
        if let Some(concurrency) = self.concurrency {
            if concurrency <= 0 {
                return Err(GraphProcError::invalid_config(format!(
                    "concurrency must be greater than zero, got {concurrency}"
                )));
            }
        }
        if self.retries < 0 {
            return Err(GraphProcError::invalid_config(format!(
                "retries must not be negative, got {}",
                self.retries
            )));
        }
        Ok(())
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.max(1) as usize
    }

    pub fn concurrency_or(&self, default: usize) -> usize {
        self.concurrency.map_or(default, |c| c.max(1) as usize)
    }

    pub fn retries(&self) -> u64 {
        self.retries.max(0) as u64
    }

    pub fn failed_params_limit(&self) -> Option<usize> {
        usize::try_from(self.failed_params).ok()
    }
}

/// Options fixed for the lifetime of a [`crate::periodic::PeriodicContext`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeriodicConfig {
    /// Worker threads shared by every parallel run. **Default:** number of CPUs
    pub pool_size: usize,

    /// Granularity of cancellable sleeps in milliseconds. **Default:** `10`
    pub sleep_slice_ms: u64,
}

impl Default for PeriodicConfig {
    fn default() -> Self {
        Self {
            pool_size: num_cpus::get().max(1),
            sleep_slice_ms: 10,
        }
    }
}

impl PeriodicConfig {
    pub fn sleep_slice(&self) -> Duration {
        Duration::from_millis(self.sleep_slice_ms.max(1))
    }
}

fn from_config_value<T: DeserializeOwned>(value: &Value) -> Result<T, GraphProcError> {
    if value.is_null() {
        return serde_json::from_value(Value::Object(Map::new()))
            .map_err(|e| GraphProcError::invalid_config(e.to_string()));
    }
    T::deserialize(value).map_err(|e| GraphProcError::invalid_config(e.to_string()))
}
