//! Batched, concurrent execution of a statement over the rows of another.
//!
//! A [`PeriodicContext`] owns the host [`QueryExecutor`], a worker pool and
//! the registry of named background jobs. [`PeriodicContext::iterate`] drives
//! an outer cursor on the calling thread, cuts it into batches and runs the
//! action statement once per batch, each in its own transaction. Failures are
//! counted, never thrown: the returned [`IterateSummary`] carries totals and
//! per-message error histograms.
//!
//! ```no_run
//! use std::sync::Arc;
//! use graphproc::{CancellationToken, IterateConfig, PeriodicConfig, PeriodicContext, QueryExecutor};
//!
//! fn run(executor: Arc<dyn QueryExecutor>) -> Result<(), graphproc::GraphProcError> {
//!     let context = PeriodicContext::new(executor, PeriodicConfig::default())?;
//!     let config = IterateConfig {
//!         batch_size: 1000,
//!         parallel: true,
//!         ..IterateConfig::default()
//!     };
//!     let summary = context.iterate(
//!         "MATCH (p:Person) RETURN p",
//!         "UNWIND $_batch AS row SET row.p.seen = true",
//!         &config,
//!         &CancellationToken::new(),
//!     )?;
//!     println!("{} committed", summary.committed_operations);
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod cancel;
pub mod commit;
pub mod executor;
pub mod iterate;
pub mod jobs;
pub mod pool;
pub mod prepare;

use std::slice;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::{
    config::{IterateConfig, PeriodicConfig},
    errors::GraphProcError,
};

pub use aggregate::{BatchAndTotalResult, CommitSummary, IterateSummary};
pub use cancel::CancellationToken;
pub use commit::{DEFAULT_COMMIT_LIMIT, LIMIT_PARAM, TOTAL_PARAM};
pub use executor::{ExecutionSummary, Params, QueryExecutor, QueryStatistics, Row, RowCursor};
pub use jobs::{JobHandle, JobInfo, JobKind, JobRegistry};
pub use pool::{Permit, Permits, WorkerPool};
pub use prepare::{
    BATCH_PARAM, BatchMode, COUNT_PARAM, PreparedStatement, prepare, starts_with_batch_unwind,
};

struct ContextInner {
    executor: Arc<dyn QueryExecutor>,
    pool: WorkerPool,
    jobs: JobRegistry,
    config: PeriodicConfig,
}

/// Entry point of the batch engine. Cloning shares the pool and job registry.
#[derive(Clone)]
pub struct PeriodicContext {
    inner: Arc<ContextInner>,
}

impl PeriodicContext {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        config: PeriodicConfig,
    ) -> Result<Self, GraphProcError> {
        let pool = WorkerPool::new(config.pool_size)?;
        Ok(Self {
            inner: Arc::new(ContextInner {
                executor,
                pool,
                jobs: JobRegistry::new(),
                config,
            }),
        })
    }

    pub fn config(&self) -> &PeriodicConfig {
        &self.inner.config
    }

    pub fn pool_size(&self) -> usize {
        self.inner.pool.size()
    }

    /// Runs `action` over the rows of `outer` in batches.
    ///
    /// Invalid options and outer cursor failures return `Err`. Failing
    /// batches do not: they are retried up to `retries` times and then
    /// counted in the summary. Cancelling `token` stops dispatch at the next
    /// batch boundary and sets `wasTerminated`; batches already handed to
    /// the pool run to completion.
    pub fn iterate(
        &self,
        outer: &str,
        action: &str,
        config: &IterateConfig,
        token: &CancellationToken,
    ) -> Result<IterateSummary, GraphProcError> {
        iterate::iterate(
            self.inner.executor.as_ref(),
            &self.inner.pool,
            outer,
            action,
            config,
            token,
        )
    }

    /// Reruns `statement` until it reports zero updates; see [`commit::commit`].
    pub fn commit(
        &self,
        statement: &str,
        params: &Params,
        token: &CancellationToken,
    ) -> Result<CommitSummary, GraphProcError> {
        commit::commit(self.inner.executor.as_ref(), statement, params, token)
    }

    /// Runs `statement` once in the background.
    pub fn submit(
        &self,
        name: &str,
        statement: &str,
        params: Params,
    ) -> Result<JobHandle<Result<ExecutionSummary, GraphProcError>>, GraphProcError> {
        let statement = statement.to_owned();
        self.spawn_job(
            name,
            JobKind::Submit,
            Duration::ZERO,
            Duration::ZERO,
            move |inner, token| {
                if token.is_cancelled() {
                    return Err(GraphProcError::query("job cancelled before it started"));
                }
                inner
                    .executor
                    .execute_batch(&statement, slice::from_ref(&params))
            },
        )
    }

    /// Runs `statement` every `rate` until cancelled. The first run happens
    /// one interval after submission. The job yields its number of runs.
    pub fn repeat(
        &self,
        name: &str,
        statement: &str,
        params: Params,
        rate: Duration,
    ) -> Result<JobHandle<u64>, GraphProcError> {
        let statement = statement.to_owned();
        let job_name = name.to_owned();
        self.spawn_job(name, JobKind::Repeat, Duration::ZERO, rate, move |inner, token| {
            let sleep_slice = inner.config.sleep_slice();
            let started = Instant::now();
            let mut runs = 0_u32;
            loop {
                let due = started + rate.saturating_mul(runs.saturating_add(1));
                let wait = due.saturating_duration_since(Instant::now());
                if !token.sleep(wait, sleep_slice) {
                    return u64::from(runs);
                }
                if let Err(err) = inner
                    .executor
                    .execute_batch(&statement, slice::from_ref(&params))
                {
                    warn!("repeated job {job_name} failed: {err}");
                }
                runs = runs.saturating_add(1);
            }
        })
    }

    /// Runs `statement` until it returns zero, pausing `delay` between runs.
    /// The statement must return one integer column. The job yields its
    /// number of runs.
    pub fn countdown(
        &self,
        name: &str,
        statement: &str,
        params: Params,
        delay: Duration,
    ) -> Result<JobHandle<Result<u64, GraphProcError>>, GraphProcError> {
        let statement = statement.to_owned();
        self.spawn_job(
            name,
            JobKind::Countdown,
            delay,
            Duration::ZERO,
            move |inner, token| -> Result<u64, GraphProcError> {
                let sleep_slice = inner.config.sleep_slice();
                let mut runs = 0_u64;
                while !token.is_cancelled() {
                    let summary = inner
                        .executor
                        .execute_batch(&statement, slice::from_ref(&params))?;
                    runs += 1;
                    if summary.single_column_sum()? <= 0 {
                        break;
                    }
                    if !token.sleep(delay, sleep_slice) {
                        break;
                    }
                }
                Ok(runs)
            },
        )
    }

    /// Runs [`Self::iterate`] in the background; cancelling the job
    /// terminates the iteration at its next batch boundary.
    pub fn submit_iterate(
        &self,
        name: &str,
        outer: &str,
        action: &str,
        config: IterateConfig,
    ) -> Result<JobHandle<Result<IterateSummary, GraphProcError>>, GraphProcError> {
        config.validate()?;
        let outer = outer.to_owned();
        let action = action.to_owned();
        self.spawn_job(
            name,
            JobKind::Iterate,
            Duration::ZERO,
            Duration::ZERO,
            move |inner, token| {
                iterate::iterate(
                    inner.executor.as_ref(),
                    &inner.pool,
                    &outer,
                    &action,
                    &config,
                    token,
                )
            },
        )
    }

    /// Registered jobs ordered by name.
    pub fn list(&self) -> Vec<JobInfo> {
        self.inner.jobs.list()
    }

    pub fn cancel(&self, name: &str) -> Option<JobInfo> {
        self.inner.jobs.cancel(name)
    }

    /// Cancels every registered job.
    pub fn shutdown(&self) {
        self.inner.jobs.cancel_all();
    }

    fn spawn_job<T, F>(
        &self,
        name: &str,
        kind: JobKind,
        delay: Duration,
        rate: Duration,
        body: F,
    ) -> Result<JobHandle<T>, GraphProcError>
    where
        T: Send + 'static,
        F: FnOnce(&ContextInner, &CancellationToken) -> T + Send + 'static,
    {
        if name.trim().is_empty() {
            return Err(GraphProcError::invalid_input("job name must not be empty"));
        }
        let token = CancellationToken::new();
        let info = JobInfo::new(name, kind, delay, rate);
        let generation = self.inner.jobs.register(info.clone(), token.clone());

        let inner = Arc::clone(&self.inner);
        let job_token = token.clone();
        let job_name = name.to_owned();
        let spawned = thread::Builder::new()
            .name(format!("graphproc-job-{name}"))
            .spawn(move || {
                let output = body(&inner, &job_token);
                if kind.removes_itself() {
                    inner.jobs.complete(&job_name, generation);
                }
                output
            });
        match spawned {
            Ok(thread) => {
                info!("job {name} started ({kind:?})");
                Ok(JobHandle::new(info, token, thread))
            }
            Err(err) => {
                self.inner.jobs.complete(name, generation);
                Err(GraphProcError::query(format!(
                    "could not start job {name}: {err}"
                )))
            }
        }
    }
}
