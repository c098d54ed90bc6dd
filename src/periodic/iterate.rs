//! The batch driver: the calling thread pulls outer rows, cuts them into
//! batches and dispatches each batch to the worker pool (or runs it inline
//! when sequential).

use log::{debug, info, warn};
use serde_json::Value;

use crate::{config::IterateConfig, errors::GraphProcError};

use super::{
    aggregate::{BatchAndTotalResult, IterateSummary},
    cancel::CancellationToken,
    executor::{Params, QueryExecutor, Row},
    pool::{Permits, WorkerPool},
    prepare::{BATCH_PARAM, COUNT_PARAM, PreparedStatement, prepare},
};

type RowStream<'a> = Box<dyn Iterator<Item = Result<Row, GraphProcError>> + 'a>;

/// Upper bound on rows reserved up front; larger batches grow as they fill.
const PREALLOCATED_ROWS: usize = 1024;

#[derive(Debug)]
struct Batch {
    /// Outer rows preceding this batch.
    offset: u64,
    rows: Vec<Row>,
}

struct Batches<'a> {
    rows: RowStream<'a>,
    size: usize,
    offset: u64,
}

impl Batches<'_> {
    fn next_batch(&mut self) -> Result<Option<Batch>, GraphProcError> {
        let mut rows = Vec::with_capacity(self.size.min(PREALLOCATED_ROWS));
        while rows.len() < self.size {
            match self.rows.next() {
                Some(row) => rows.push(row?),
                None => break,
            }
        }
        if rows.is_empty() {
            return Ok(None);
        }
        let batch = Batch {
            offset: self.offset,
            rows,
        };
        self.offset += batch.rows.len() as u64;
        Ok(Some(batch))
    }
}

struct BatchRunner<'a> {
    executor: &'a dyn QueryExecutor,
    prepared: &'a PreparedStatement,
    params: &'a Params,
    retries: u64,
    aggregate: &'a BatchAndTotalResult,
}

impl BatchRunner<'_> {
    fn param_sets(&self, batch: &Batch) -> Vec<Params> {
        if self.prepared.iterate_list {
            let mut params = self.params.clone();
            let rows = batch.rows.iter().cloned().map(Value::Object).collect();
            params.insert(BATCH_PARAM.to_owned(), Value::Array(rows));
            params.insert(COUNT_PARAM.to_owned(), Value::from(batch.offset));
            return vec![params];
        }
        batch
            .rows
            .iter()
            .zip(batch.offset..)
            .map(|(row, count)| {
                let mut params = self.params.clone();
                params.insert(COUNT_PARAM.to_owned(), Value::from(count));
                params.extend(row.clone());
                params
            })
            .collect()
    }

    /// Executes the batch, re-running all of it on failure until the retry
    /// budget is spent.
    fn run(&self, batch: Batch) {
        let param_sets = self.param_sets(&batch);
        let mut attempt = 0;
        loop {
            match self
                .executor
                .execute_batch(&self.prepared.statement, &param_sets)
            {
                Ok(summary) => {
                    self.aggregate
                        .record_success(batch.rows.len() as u64, &summary.stats);
                    return;
                }
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    self.aggregate.record_retry();
                    warn!(
                        "batch at row {} failed, retry {attempt}/{}: {err}",
                        batch.offset, self.retries
                    );
                }
                Err(err) => {
                    warn!("batch at row {} failed: {err}", batch.offset);
                    self.aggregate.record_failure(&batch.rows, &err);
                    return;
                }
            }
        }
    }
}

pub(super) fn iterate(
    executor: &dyn QueryExecutor,
    pool: &WorkerPool,
    outer: &str,
    action: &str,
    config: &IterateConfig,
    token: &CancellationToken,
) -> Result<IterateSummary, GraphProcError> {
    config.validate()?;
    let concurrency = config.concurrency_or(pool.size());

    let cursor = executor.stream(outer, &config.params)?;
    let prepared = prepare(action, config.batch_mode, cursor.columns());
    let rows: RowStream<'_> = if config.eager {
        let drained = cursor.collect::<Result<Vec<_>, _>>()?;
        Box::new(drained.into_iter().map(Ok))
    } else {
        Box::new(cursor)
    };
    let mut batches = Batches {
        rows,
        size: config.batch_size(),
        offset: 0,
    };

    let aggregate = BatchAndTotalResult::new(config.failed_params_limit());
    let runner = BatchRunner {
        executor,
        prepared: &prepared,
        params: &config.params,
        retries: config.retries(),
        aggregate: &aggregate,
    };

    if config.parallel {
        let permits = Permits::new(concurrency);
        pool.scope(|scope| -> Result<(), GraphProcError> {
            loop {
                let permit = permits.acquire();
                if token.is_cancelled() {
                    aggregate.terminate();
                    return Ok(());
                }
                let Some(batch) = batches.next_batch()? else {
                    return Ok(());
                };
                aggregate.record_dispatch(batch.rows.len() as u64);
                debug!(
                    "dispatching batch at row {} ({} rows)",
                    batch.offset,
                    batch.rows.len()
                );
                let runner = &runner;
                scope.spawn(move |_| {
                    let _permit = permit;
                    runner.run(batch);
                });
            }
        })?;
    } else {
        loop {
            if token.is_cancelled() {
                aggregate.terminate();
                break;
            }
            let Some(batch) = batches.next_batch()? else {
                break;
            };
            aggregate.record_dispatch(batch.rows.len() as u64);
            debug!(
                "running batch at row {} ({} rows)",
                batch.offset,
                batch.rows.len()
            );
            runner.run(batch);
        }
    }

    let summary = aggregate.into_iterate_summary();
    info!(
        "iterate finished: {} batches, {} committed, {} failed, {} retries, terminated={}",
        summary.batches,
        summary.committed_operations,
        summary.failed_operations,
        summary.retries,
        summary.was_terminated
    );
    Ok(summary)
}
