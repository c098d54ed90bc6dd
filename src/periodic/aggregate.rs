use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::errors::GraphProcError;

use super::executor::{QueryStatistics, Row};

/// Running totals of one periodic execution, shared by every worker.
#[derive(Debug)]
pub struct BatchAndTotalResult {
    started: Instant,
    batches: AtomicU64,
    failed_batches: AtomicU64,
    failed_commits: AtomicU64,
    total: AtomicU64,
    committed: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    batch_errors: DashMap<String, u64>,
    commit_errors: DashMap<String, u64>,
    failed_params: Mutex<AHashMap<String, Vec<Vec<Row>>>>,
    failed_params_limit: Option<usize>,
    update_statistics: Mutex<QueryStatistics>,
    terminated: AtomicBool,
}

impl BatchAndTotalResult {
    pub fn new(failed_params_limit: Option<usize>) -> Self {
        Self {
            started: Instant::now(),
            batches: AtomicU64::new(0),
            failed_batches: AtomicU64::new(0),
            failed_commits: AtomicU64::new(0),
            total: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            batch_errors: DashMap::new(),
            commit_errors: DashMap::new(),
            failed_params: Mutex::new(AHashMap::new()),
            failed_params_limit,
            update_statistics: Mutex::new(QueryStatistics::default()),
            terminated: AtomicBool::new(false),
        }
    }

    /// Counts a dispatched batch of `rows` outer rows.
    pub fn record_dispatch(&self, rows: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_success(&self, operations: u64, stats: &QueryStatistics) {
        self.committed.fetch_add(operations, Ordering::Relaxed);
        self.update_statistics.lock().merge(stats);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a batch that failed for good.
    pub fn record_failure(&self, rows: &[Row], error: &GraphProcError) {
        self.failed.fetch_add(rows.len() as u64, Ordering::Relaxed);
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
        let message = error.message().to_owned();
        if error.is_commit_failure() {
            self.failed_commits.fetch_add(1, Ordering::Relaxed);
            *self.commit_errors.entry(message.clone()).or_insert(0) += 1;
        } else {
            *self.batch_errors.entry(message.clone()).or_insert(0) += 1;
        }
        if let Some(limit) = self.failed_params_limit {
            let mut failed_params = self.failed_params.lock();
            let kept = failed_params.entry(message).or_default();
            if kept.len() < limit {
                kept.push(rows.to_vec());
            }
        }
    }

    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }

    pub fn was_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn failed_batches(&self) -> u64 {
        self.failed_batches.load(Ordering::Relaxed)
    }

    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn into_iterate_summary(self) -> IterateSummary {
        let batch_errors = histogram(&self.batch_errors);
        let commit_errors = histogram(&self.commit_errors);
        let mut error_messages = batch_errors.clone();
        for (message, count) in &commit_errors {
            *error_messages.entry(message.clone()).or_insert(0) += count;
        }
        IterateSummary {
            batches: self.batches(),
            total: self.total.load(Ordering::Relaxed),
            time_taken_ms: millis(self.elapsed()),
            committed_operations: self.committed(),
            failed_operations: self.failed.load(Ordering::Relaxed),
            failed_batches: self.failed_batches(),
            failed_commits: self.failed_commits.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            batch_errors,
            commit_errors,
            error_messages,
            was_terminated: self.was_terminated(),
            failed_params: self.failed_params.into_inner().into_iter().collect(),
            update_statistics: self.update_statistics.into_inner(),
        }
    }

    pub fn into_commit_summary(self, executions: u64) -> CommitSummary {
        CommitSummary {
            updates: self.committed(),
            executions,
            runtime_ms: millis(self.elapsed()),
            batches: self.batches(),
            failed_batches: self.failed_batches(),
            batch_errors: histogram(&self.batch_errors),
            failed_commits: self.failed_commits.load(Ordering::Relaxed),
            commit_errors: histogram(&self.commit_errors),
            was_terminated: self.was_terminated(),
        }
    }
}

/// Final result of [`super::PeriodicContext::iterate`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterateSummary {
    pub batches: u64,
    /// Outer rows dispatched; always `committed_operations + failed_operations`.
    pub total: u64,
    pub time_taken_ms: u64,
    pub committed_operations: u64,
    pub failed_operations: u64,
    pub failed_batches: u64,
    pub failed_commits: u64,
    pub retries: u64,
    pub batch_errors: BTreeMap<String, u64>,
    pub commit_errors: BTreeMap<String, u64>,
    pub error_messages: BTreeMap<String, u64>,
    pub was_terminated: bool,
    pub failed_params: BTreeMap<String, Vec<Vec<Row>>>,
    pub update_statistics: QueryStatistics,
}

/// Final result of [`super::PeriodicContext::commit`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSummary {
    pub updates: u64,
    pub executions: u64,
    pub runtime_ms: u64,
    pub batches: u64,
    pub failed_batches: u64,
    pub batch_errors: BTreeMap<String, u64>,
    pub failed_commits: u64,
    pub commit_errors: BTreeMap<String, u64>,
    pub was_terminated: bool,
}

fn histogram(map: &DashMap<String, u64>) -> BTreeMap<String, u64> {
    map.iter()
        .map(|entry| (entry.key().clone(), *entry.value()))
        .collect()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| json!({ "i": i }).as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn failures_split_into_batch_and_commit_histograms() {
        let aggregate = BatchAndTotalResult::new(None);
        aggregate.record_dispatch(2);
        aggregate.record_dispatch(2);
        aggregate.record_dispatch(2);
        aggregate.record_failure(&rows(2), &GraphProcError::query("boom"));
        aggregate.record_failure(&rows(2), &GraphProcError::transaction("lock timeout"));
        aggregate.record_success(2, &QueryStatistics::default());

        let summary = aggregate.into_iterate_summary();
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.total, 6);
        assert_eq!(summary.committed_operations, 2);
        assert_eq!(summary.failed_operations, 4);
        assert_eq!(summary.failed_batches, 2);
        assert_eq!(summary.failed_commits, 1);
        assert_eq!(summary.batch_errors.get("boom"), Some(&1));
        assert_eq!(summary.commit_errors.get("lock timeout"), Some(&1));
        assert_eq!(summary.error_messages.len(), 2);
        assert!(summary.failed_params.is_empty());
    }

    #[test]
    fn failed_params_are_capped_per_message() {
        let aggregate = BatchAndTotalResult::new(Some(1));
        let error = GraphProcError::query("bad row");
        aggregate.record_failure(&rows(3), &error);
        aggregate.record_failure(&rows(1), &error);
        let summary = aggregate.into_iterate_summary();
        assert_eq!(summary.failed_params["bad row"], vec![rows(3)]);
    }

    #[test]
    fn summary_serializes_camel_case() {
        let aggregate = BatchAndTotalResult::new(None);
        aggregate.terminate();
        let value = serde_json::to_value(aggregate.into_iterate_summary()).unwrap();
        assert_eq!(value["wasTerminated"], json!(true));
        assert_eq!(value["committedOperations"], json!(0));
        assert!(value["updateStatistics"].is_object());
    }
}
