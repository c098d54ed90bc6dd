use std::slice;

use log::{info, warn};
use serde_json::Value;

use crate::errors::GraphProcError;

use super::{
    aggregate::{BatchAndTotalResult, CommitSummary},
    cancel::CancellationToken,
    executor::{Params, QueryExecutor},
    prepare::COUNT_PARAM,
};

pub const LIMIT_PARAM: &str = "limit";
pub const TOTAL_PARAM: &str = "_total";
pub const DEFAULT_COMMIT_LIMIT: i64 = 10_000;

/// Reruns `statement` until it reports zero updates, fails, or is cancelled.
///
/// The statement must reference `$limit` and return one integer column, the
/// number of entities it changed in that run. `$_count` holds the previous
/// run's count and `$_total` the running sum.
pub(super) fn commit(
    executor: &dyn QueryExecutor,
    statement: &str,
    params: &Params,
    token: &CancellationToken,
) -> Result<CommitSummary, GraphProcError> {
    if !statement.contains("$limit") {
        return Err(GraphProcError::invalid_config(
            "the committed statement must reference $limit",
        ));
    }
    let mut params = params.clone();
    params
        .entry(LIMIT_PARAM)
        .or_insert_with(|| Value::from(DEFAULT_COMMIT_LIMIT));

    let aggregate = BatchAndTotalResult::new(None);
    let mut executions = 0_u64;
    let mut last = 0_u64;
    let mut total = 0_u64;
    loop {
        if token.is_cancelled() {
            aggregate.terminate();
            break;
        }
        params.insert(COUNT_PARAM.to_owned(), Value::from(last));
        params.insert(TOTAL_PARAM.to_owned(), Value::from(total));
        aggregate.record_dispatch(0);

        let outcome = executor
            .execute_batch(statement, slice::from_ref(&params))
            .and_then(|summary| Ok((summary.single_column_sum()?, summary.stats)));
        match outcome {
            Ok((updates, stats)) => {
                let updates = u64::try_from(updates).unwrap_or(0);
                aggregate.record_success(updates, &stats);
                if updates == 0 {
                    break;
                }
                executions += 1;
                last = updates;
                total += updates;
            }
            Err(err) => {
                warn!("commit run {} failed: {err}", executions + 1);
                aggregate.record_failure(&[], &err);
                break;
            }
        }
    }

    let summary = aggregate.into_commit_summary(executions);
    info!(
        "commit finished: {} updates in {} executions, terminated={}",
        summary.updates, summary.executions, summary.was_terminated
    );
    Ok(summary)
}
