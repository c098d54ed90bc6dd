use parking_lot::{Condvar, Mutex};
use rayon::{Scope, ThreadPool, ThreadPoolBuilder};

use crate::errors::GraphProcError;

/// Worker threads shared by every parallel run of one context.
#[derive(Debug)]
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self, GraphProcError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(size.max(1))
            .thread_name(|idx| format!("graphproc-batch-{idx}"))
            .build()
            .map_err(|e| GraphProcError::invalid_config(format!("worker pool: {e}")))?;
        Ok(Self { pool })
    }

    pub fn size(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `op` on the calling thread; returns once every task it spawned has finished.
    pub fn scope<'scope, OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce(&Scope<'scope>) -> R,
    {
        self.pool.in_place_scope(op)
    }
}

/// Counting semaphore bounding in-flight batches.
#[derive(Debug)]
pub struct Permits {
    available: Mutex<usize>,
    released: Condvar,
}

impl Permits {
    pub fn new(count: usize) -> Self {
        Self {
            available: Mutex::new(count.max(1)),
            released: Condvar::new(),
        }
    }

    /// Blocks until a permit is free.
    pub fn acquire(&self) -> Permit<'_> {
        let mut available = self.available.lock();
        while *available == 0 {
            self.released.wait(&mut available);
        }
        *available -= 1;
        Permit { permits: self }
    }

    pub fn available(&self) -> usize {
        *self.available.lock()
    }

    fn release(&self) {
        *self.available.lock() += 1;
        self.released.notify_one();
    }
}

/// Returns its permit on drop, also when the batch panics.
#[derive(Debug)]
pub struct Permit<'a> {
    permits: &'a Permits,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.permits.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn permits_bound_concurrency() {
        let pool = WorkerPool::new(8).unwrap();
        let permits = Permits::new(2);
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        pool.scope(|scope| {
            for _ in 0..12 {
                let permit = permits.acquire();
                let running = &running;
                let peak = &peak;
                scope.spawn(move |_| {
                    let _permit = permit;
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    running.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(permits.available(), 2);
    }

    #[test]
    fn pool_reports_its_size() {
        assert_eq!(WorkerPool::new(3).unwrap().size(), 3);
    }
}
