//! # Background Task Pool
//!
//! Bounded executor for heavy message handlers.
//!
//! The pool is constructed explicitly and injected into whichever component
//! wires the system together; there is no process-wide shared executor. The
//! concurrency bound is a semaphore: a task submitted while the pool is full
//! waits for a permit instead of being rejected, so submission never fails
//! and never blocks the submitting task.
//!
//! ## Usage
//! ```rust,no_run
//! use framelink::utils::task_pool::TaskPool;
//!
//! # async fn demo() {
//! let pool = TaskPool::bounded(16);
//! pool.spawn(async {
//!     // runs once a permit is available
//! });
//! # }
//! ```

use std::sync::Arc;
use tokio::sync::Semaphore;

/// Default concurrency bound for heavy-handler execution.
pub const DEFAULT_TASK_LIMIT: usize = 64;

/// Semaphore-bounded spawner for short-lived background tasks.
#[derive(Debug, Clone)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl TaskPool {
    /// Pool allowing at most `limit` tasks to run concurrently.
    /// A limit of zero is clamped to one.
    pub fn bounded(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Submit a task. Returns immediately; the task itself waits for a
    /// permit before running and releases it when done.
    pub fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            // The semaphore is never closed, so acquire only fails if it
            // were; run the task regardless rather than dropping it.
            let _permit = permits.acquire_owned().await.ok();
            task.await;
        });
    }

    /// The configured concurrency bound.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits currently available (tasks that could start immediately).
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::bounded(DEFAULT_TASK_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawn_runs_task() {
        let pool = TaskPool::bounded(4);
        let (tx, rx) = tokio::sync::oneshot::channel();
        pool.spawn(async move {
            let _ = tx.send(42);
        });
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_bound_limits_concurrency() {
        let pool = TaskPool::bounded(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut waiters = Vec::new();
        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let (tx, rx) = tokio::sync::oneshot::channel();
            waiters.push(rx);
            pool.spawn(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                let _ = tx.send(());
            });
        }
        for rx in waiters {
            rx.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_zero_limit_clamped() {
        let pool = TaskPool::bounded(0);
        assert_eq!(pool.limit(), 1);
    }
}
