use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Bounded goroutine-style concurrent task execution (§5). A fixed
/// number of permits caps how many submitted tasks run at once; [`submit`]
/// blocks the caller until a permit frees up, which is what gives the bus
/// reader its backpressure once the event-processing pool saturates.
///
/// [`submit`]: WorkerPool::submit
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(capacity.max(1))) }
    }

    /// Acquire a slot — waiting if the pool is saturated — then run `fut`
    /// concurrently with whatever else is already running. Returns a handle
    /// the caller can await to observe completion; admission itself already
    /// blocked on a free slot, which is what gives a bus reader (or any
    /// other bounded producer) its backpressure.
    pub async fn submit<F>(&self, fut: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = self.semaphore.clone().acquire_owned().await.expect("worker pool semaphore is never closed");
        tokio::spawn(async move {
            fut.await;
            drop(permit);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn bounds_concurrent_execution() {
        let pool = WorkerPool::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        for _ in 0..6 {
            let active = active.clone();
            let max_seen = max_seen.clone();
            pool.submit(async move {
                let n = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(n, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            })
            .await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn all_submitted_tasks_eventually_run() {
        let pool = WorkerPool::new(3);
        let completed = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let completed = completed.clone();
            pool.submit(async move {
                completed.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 10);
    }
}
