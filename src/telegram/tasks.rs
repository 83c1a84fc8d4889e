//! Accounting for in-flight per-message jobs.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

/// Tracks spawned jobs and bounds how many run at once.
///
/// Jobs queue on a semaphore permit inside their own task, so spawning
/// never blocks the caller. `drain` waits for every job, including the
/// queued ones.
pub struct TaskSet {
    tracker: TaskTracker,
    permits: Arc<Semaphore>,
}

impl TaskSet {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            tracker: TaskTracker::new(),
            permits: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Spawn a job onto the set.
    pub fn spawn<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tracker.spawn(async move {
            // The semaphore is never closed, but a close would mean shutdown
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            job.await;
        });
    }

    /// Number of jobs not yet finished.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Stop accepting jobs and wait for everything in flight.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_drain_waits_for_every_job() {
        let tasks = TaskSet::new(8);
        let finished = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let finished = Arc::clone(&finished);
            tasks.spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }

        tasks.drain().await;
        assert_eq!(finished.load(Ordering::SeqCst), 5);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_cap() {
        let cap = 2;
        let tasks = TaskSet::new(cap);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..6 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            tasks.spawn(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }

        tasks.drain().await;
        assert!(peak.load(Ordering::SeqCst) <= cap);
    }

    #[tokio::test]
    async fn test_drain_blocks_while_a_job_runs() {
        let tasks = TaskSet::new(1);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tasks.spawn(async move {
            let _ = rx.await;
        });

        let mut drain = tokio_test::task::spawn(tasks.drain());
        assert!(drain.poll().is_pending());

        tx.send(()).unwrap();
        drain.await;
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_job_still_leaves_the_set() {
        let tasks = TaskSet::new(2);
        tasks.spawn(async {
            panic!("job blew up");
        });
        tasks.spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
        });

        tasks.drain().await;
        assert!(tasks.is_empty());
    }
}
