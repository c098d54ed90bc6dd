//! Contract with the host query executor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::GraphProcError;

pub type Row = Map<String, Value>;
pub type Params = Map<String, Value>;

/// Rows of the outer statement, consumed on the driving thread only.
pub struct RowCursor<'a> {
    columns: Vec<String>,
    rows: Box<dyn Iterator<Item = Result<Row, GraphProcError>> + 'a>,
}

impl<'a> RowCursor<'a> {
    pub fn new<I>(columns: Vec<String>, rows: I) -> Self
    where
        I: Iterator<Item = Result<Row, GraphProcError>> + 'a,
    {
        Self {
            columns,
            rows: Box::new(rows),
        }
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self::new(columns, rows.into_iter().map(Ok))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Iterator for RowCursor<'_> {
    type Item = Result<Row, GraphProcError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

/// Entity counters reported by the host after a statement ran.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryStatistics {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub properties_set: u64,
    pub labels_added: u64,
    pub labels_removed: u64,
}

impl QueryStatistics {
    pub fn merge(&mut self, other: &QueryStatistics) {
        self.nodes_created += other.nodes_created;
        self.nodes_deleted += other.nodes_deleted;
        self.relationships_created += other.relationships_created;
        self.relationships_deleted += other.relationships_deleted;
        self.properties_set += other.properties_set;
        self.labels_added += other.labels_added;
        self.labels_removed += other.labels_removed;
    }

    pub fn total_updates(&self) -> u64 {
        self.nodes_created
            + self.nodes_deleted
            + self.relationships_created
            + self.relationships_deleted
            + self.properties_set
            + self.labels_added
            + self.labels_removed
    }

    pub fn contains_updates(&self) -> bool {
        self.total_updates() > 0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecutionSummary {
    pub rows: Vec<Row>,
    pub stats: QueryStatistics,
}

impl ExecutionSummary {
    /// Sum of a single-column integer result, as returned by `RETURN count(*)`.
    pub fn single_column_sum(&self) -> Result<i64, GraphProcError> {
        let mut sum = 0_i64;
        for row in &self.rows {
            let mut values = row.values();
            let value = match (values.next(), values.next()) {
                (Some(value), None) => value,
                _ => {
                    return Err(GraphProcError::invalid_input(format!(
                        "expected exactly one result column, got {}",
                        row.len()
                    )));
                }
            };
            let number = value.as_i64().ok_or_else(|| {
                GraphProcError::invalid_input(format!("expected an integer result, got {value}"))
            })?;
            sum = sum.checked_add(number).ok_or_else(|| {
                GraphProcError::invalid_input(format!("result sum overflows at {number}"))
            })?;
        }
        Ok(sum)
    }
}

/// Host query execution.
///
/// `execute_batch` runs the statement once per parameter set, all inside one
/// transaction: it commits when every execution succeeds and rolls back
/// otherwise, so a failed batch leaves nothing behind. Statement failures are
/// reported as [`GraphProcError::QueryError`], commit failures as
/// [`GraphProcError::TransactionError`].
pub trait QueryExecutor: Send + Sync {
    fn stream(&self, statement: &str, params: &Params) -> Result<RowCursor<'_>, GraphProcError>;

    fn execute_batch(
        &self,
        statement: &str,
        param_sets: &[Params],
    ) -> Result<ExecutionSummary, GraphProcError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn single_column_sum_adds_counts() {
        let summary = ExecutionSummary {
            rows: vec![row(json!({"count": 3})), row(json!({"count": 4}))],
            stats: QueryStatistics::default(),
        };
        assert_eq!(summary.single_column_sum().unwrap(), 7);
        assert_eq!(ExecutionSummary::default().single_column_sum().unwrap(), 0);
    }

    #[test]
    fn single_column_sum_rejects_wide_or_textual_rows() {
        let wide = ExecutionSummary {
            rows: vec![row(json!({"a": 1, "b": 2}))],
            ..ExecutionSummary::default()
        };
        assert!(wide.single_column_sum().is_err());
        let text = ExecutionSummary {
            rows: vec![row(json!({"a": "x"}))],
            ..ExecutionSummary::default()
        };
        assert!(text.single_column_sum().is_err());
    }

    #[test]
    fn single_column_sum_reports_overflow() {
        let summary = ExecutionSummary {
            rows: vec![row(json!({"count": i64::MAX})), row(json!({"count": 1}))],
            ..ExecutionSummary::default()
        };
        assert!(matches!(
            summary.single_column_sum(),
            Err(GraphProcError::InvalidInput(_))
        ));
    }

    #[test]
    fn statistics_merge_and_total() {
        let mut stats = QueryStatistics {
            nodes_created: 2,
            ..QueryStatistics::default()
        };
        stats.merge(&QueryStatistics {
            properties_set: 5,
            ..QueryStatistics::default()
        });
        assert_eq!(stats.total_updates(), 7);
        assert!(stats.contains_updates());
    }
}
