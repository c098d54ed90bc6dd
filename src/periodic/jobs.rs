use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use log::{info, warn};
use serde::Serialize;

use crate::errors::GraphProcError;

use super::cancel::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    /// Runs once, then leaves the registry.
    Submit,
    /// Runs at a fixed rate until cancelled.
    Repeat,
    /// Runs with a fixed delay until the statement reports zero.
    Countdown,
    /// A full batch iteration in the background.
    Iterate,
}

impl JobKind {
    pub fn removes_itself(self) -> bool {
        !matches!(self, JobKind::Repeat)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub name: String,
    pub kind: JobKind,
    pub delay_ms: u64,
    pub rate_ms: u64,
    /// Milliseconds since the Unix epoch.
    pub submitted_at: u64,
}

impl JobInfo {
    pub fn new(name: &str, kind: JobKind, delay: Duration, rate: Duration) -> Self {
        let submitted_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self {
            name: name.to_owned(),
            kind,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            rate_ms: u64::try_from(rate.as_millis()).unwrap_or(u64::MAX),
            submitted_at,
        }
    }
}

#[derive(Debug)]
struct RegisteredJob {
    generation: u64,
    info: JobInfo,
    token: CancellationToken,
}

/// Background jobs of one context, keyed by name.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<String, RegisteredJob>,
    generation: AtomicU64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a job, cancelling any job already registered under the same
    /// name. Returns the generation the job must present to [`Self::complete`].
    pub fn register(&self, info: JobInfo, token: CancellationToken) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let name = info.name.clone();
        let previous = self.jobs.insert(
            name.clone(),
            RegisteredJob {
                generation,
                info,
                token,
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
            warn!("job {name} replaced; previous run cancelled");
        }
        info!("job {name} registered");
        generation
    }

    /// Removes `name` only if it still belongs to `generation`.
    pub fn complete(&self, name: &str, generation: u64) -> bool {
        let removed = self
            .jobs
            .remove_if(name, |_, job| job.generation == generation)
            .is_some();
        if removed {
            info!("job {name} completed");
        }
        removed
    }

    pub fn cancel(&self, name: &str) -> Option<JobInfo> {
        let (_, job) = self.jobs.remove(name)?;
        job.token.cancel();
        info!("job {name} cancelled");
        Some(job.info)
    }

    pub fn cancel_all(&self) {
        let names: Vec<String> = self.jobs.iter().map(|job| job.key().clone()).collect();
        for name in names {
            self.cancel(&name);
        }
    }

    /// Registered jobs ordered by name.
    pub fn list(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self.jobs.iter().map(|job| job.info.clone()).collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        jobs
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Caller side of a background job.
#[derive(Debug)]
pub struct JobHandle<T> {
    info: JobInfo,
    token: CancellationToken,
    thread: JoinHandle<T>,
}

impl<T> JobHandle<T> {
    pub(super) fn new(info: JobInfo, token: CancellationToken, thread: JoinHandle<T>) -> Self {
        Self {
            info,
            token,
            thread,
        }
    }

    pub fn info(&self) -> &JobInfo {
        &self.info
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the job thread and returns what the job produced.
    pub fn join(self) -> Result<T, GraphProcError> {
        let name = self.info.name;
        self.thread
            .join()
            .map_err(|_| GraphProcError::query(format!("job {name} panicked")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str) -> JobInfo {
        JobInfo::new(name, JobKind::Submit, Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn registering_a_name_cancels_the_previous_job() {
        let registry = JobRegistry::new();
        let first = CancellationToken::new();
        let second = CancellationToken::new();
        registry.register(info("cleanup"), first.clone());
        registry.register(info("cleanup"), second.clone());
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn stale_generation_does_not_remove_replacement() {
        let registry = JobRegistry::new();
        let old = registry.register(info("job"), CancellationToken::new());
        let new = registry.register(info("job"), CancellationToken::new());
        assert!(!registry.complete("job", old));
        assert!(registry.contains("job"));
        assert!(registry.complete("job", new));
        assert!(registry.is_empty());
    }

    #[test]
    fn cancel_removes_and_signals() {
        let registry = JobRegistry::new();
        let token = CancellationToken::new();
        registry.register(info("b"), token.clone());
        registry.register(info("a"), CancellationToken::new());
        let names: Vec<_> = registry.list().into_iter().map(|job| job.name).collect();
        assert_eq!(names, vec!["a", "b"]);

        let cancelled = registry.cancel("b").unwrap();
        assert_eq!(cancelled.name, "b");
        assert!(token.is_cancelled());
        assert!(registry.cancel("b").is_none());
        registry.cancel_all();
        assert!(registry.is_empty());
    }
}
