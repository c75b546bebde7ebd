use std::{
    future::Future,
    sync::Arc,
};

use tokio::sync::Semaphore;

/// Bounds concurrent engine operations to a fixed number in flight at once.
/// A submission past that limit waits for a permit rather than failing —
/// backpressure for inserts, queries, updates, and removes routed through
/// the engine.
///
/// Every operation here is already a plain `tokio` future with no need for
/// a dedicated worker-thread scheduler, so a `Semaphore` gives the bounded
/// concurrency guarantee with minimal machinery.
pub struct WorkerPool {
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(size.max(1))) }
    }

    /// Runs `f` once a slot is free, returning its result. Does not spawn:
    /// the caller's own task blocks on `acquire` (or on `f` itself), which
    /// is what gives callers real backpressure instead of an unbounded
    /// queue of pending work.
    pub async fn run<'a, F, Fut, T>(&'a self, f: F) -> T
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future<Output = T> + 'a,
    {
        let _permit = self.permits.acquire().await.expect("worker pool semaphore is never closed");
        f().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{
        AtomicUsize,
        Ordering,
    };

    use super::*;

    #[tokio::test]
    async fn bounds_concurrency_to_pool_size() {
        let pool = Arc::new(WorkerPool::new(2));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let in_flight = in_flight.clone();
                let max_seen = max_seen.clone();
                tokio::spawn(async move {
                    pool.run(|| async {
                        let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(current, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
