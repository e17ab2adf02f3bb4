use log::error;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::errors::{RecorderError, Result};

/// 有并发上限的任务组
///
/// `spawn` waits for a free slot before the task starts, and the slot is held
/// until the task finishes. `join` is the barrier for every spawned task.
pub struct TaskGroup<T> {
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<T>,
}

impl<T: Send + 'static> TaskGroup<T> {
    pub fn new(limit: usize) -> Self {
        Self::with_semaphore(Arc::new(Semaphore::new(limit.max(1))))
    }

    /// 与其他任务组共享同一组许可，上限对所有共享者合计生效
    pub fn with_semaphore(semaphore: Arc<Semaphore>) -> Self {
        Self {
            semaphore,
            tasks: JoinSet::new(),
        }
    }

    pub async fn spawn<F>(&mut self, task: F) -> Result<()>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| RecorderError::Unknown(format!("task group closed: {}", e)))?;

        self.tasks.spawn(async move {
            let _permit = permit;
            task.await
        });

        Ok(())
    }

    /// 等待全部任务结束，返回正常结束的任务结果
    pub async fn join(&mut self) -> Vec<T> {
        let mut results = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(value) => results.push(value),
                Err(e) => error!("Worker task failed: {}", e),
            }
        }
        results
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut group = TaskGroup::new(3);

        for i in 0..20usize {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            group
                .spawn(async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    i
                })
                .await
                .unwrap();
        }

        let mut results = group.join().await;
        results.sort();
        assert_eq!(results, (0..20).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_limit_still_makes_progress() {
        let mut group = TaskGroup::new(0);
        group.spawn(async { 1 }).await.unwrap();
        group.spawn(async { 2 }).await.unwrap();
        assert_eq!(group.join().await.len(), 2);
        assert!(group.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shared_semaphore_bounds_groups_together() {
        let semaphore = Arc::new(Semaphore::new(2));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let run_group = |semaphore: Arc<Semaphore>| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let mut group = TaskGroup::with_semaphore(semaphore);
                for _ in 0..10 {
                    let in_flight = in_flight.clone();
                    let peak = peak.clone();
                    group
                        .spawn(async move {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await
                        .unwrap();
                }
                group.join().await.len()
            }
        };

        let (a, b) = tokio::join!(run_group(semaphore.clone()), run_group(semaphore.clone()));
        assert_eq!(a + b, 20);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(semaphore.available_permits(), 2);
    }

    async fn explode() -> i32 {
        panic!("boom")
    }

    #[tokio::test]
    async fn panicking_worker_does_not_break_join() {
        let mut group = TaskGroup::new(2);
        group.spawn(explode()).await.unwrap();
        group.spawn(async { 7 }).await.unwrap();
        assert_eq!(group.join().await, vec![7]);
    }
}
