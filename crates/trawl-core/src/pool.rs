//! Bounded-concurrency task pool with a FIFO backlog.
//!
//! At most `max_concurrency` tasks run at once. Excess work waits in
//! submission order and is admitted the moment a running task finishes,
//! whether it succeeded, failed, or panicked.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures::FutureExt;
use tokio::sync::{Notify, oneshot};

use crate::error::AppError;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Default)]
struct PoolState {
    running: usize,
    queue: VecDeque<Job>,
}

struct PoolInner {
    max_concurrency: usize,
    state: Mutex<PoolState>,
    /// Signalled whenever the pool becomes idle.
    idle: Notify,
}

impl PoolInner {
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned worker pool mutex");
            poisoned.into_inner()
        })
    }

    /// Hand the finishing runner its next job, or retire it.
    fn next_or_release(&self) -> Option<Job> {
        let mut state = self.lock_state();
        if let Some(job) = state.queue.pop_front() {
            return Some(job);
        }
        state.running -= 1;
        let idle = state.running == 0;
        drop(state);
        if idle {
            self.idle.notify_waiters();
        }
        None
    }
}

/// Decrements the running count if a runner is torn down mid-job
/// (runtime shutdown), so `drain` cannot hang on a phantom task.
struct RunnerGuard {
    inner: Arc<PoolInner>,
    released: bool,
}

impl Drop for RunnerGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let mut state = self.inner.lock_state();
        state.running = state.running.saturating_sub(1);
        let idle = state.running == 0 && state.queue.is_empty();
        drop(state);
        if idle {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Future for the result of a task submitted with [`WorkerPool::add`].
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T, AppError>>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, AppError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(AppError::TaskFailed(
                    "task dropped before completion".into(),
                ))
            })
        })
    }
}

/// Bounded worker pool. Clones share the same slots and backlog.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// A pool admitting up to `max_concurrency` tasks (at least one).
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                max_concurrency: max_concurrency.max(1),
                state: Mutex::new(PoolState::default()),
                idle: Notify::new(),
            }),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.inner.max_concurrency
    }

    /// Tasks currently executing.
    pub fn running(&self) -> usize {
        self.inner.lock_state().running
    }

    /// Tasks waiting for a slot.
    pub fn queued(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    pub fn is_idle(&self) -> bool {
        let state = self.inner.lock_state();
        state.running == 0 && state.queue.is_empty()
    }

    /// Submit a task. It starts now if a slot is free, otherwise it is
    /// queued behind earlier submissions.
    ///
    /// A failing or panicking task only fails its own handle. Must be
    /// called from within a Tokio runtime.
    pub fn add<F, T>(&self, task: F) -> TaskHandle<T>
    where
        F: Future<Output = Result<T, AppError>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let result = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(AppError::TaskFailed("task panicked".into())),
            };
            // The caller may have dropped the handle; the work still counts.
            let _ = tx.send(result);
        });

        let mut state = self.inner.lock_state();
        if state.running < self.inner.max_concurrency {
            state.running += 1;
            drop(state);
            self.spawn_runner(job);
        } else {
            state.queue.push_back(job);
            tracing::debug!(queued = state.queue.len(), "Worker pool saturated, task queued");
        }

        TaskHandle { rx }
    }

    /// Suspend until nothing is running and nothing is queued.
    pub async fn drain(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    fn spawn_runner(&self, first: Job) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut guard = RunnerGuard {
                inner,
                released: false,
            };
            let mut next = Some(first);
            while let Some(job) = next {
                job.await;
                next = guard.inner.next_or_release();
            }
            guard.released = true;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Semaphore;

    use super::*;

    #[tokio::test]
    async fn never_exceeds_max_concurrency() {
        let pool = WorkerPool::new(2);
        let gate = Arc::new(Semaphore::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let gate = Arc::clone(&gate);
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                pool.add(async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    let permit = gate.acquire().await.expect("gate closed");
                    permit.forget();
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, AppError>(i)
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(pool.running(), 2);
        assert_eq!(pool.queued(), 4);
        assert_eq!(active.load(Ordering::SeqCst), 2);

        gate.add_permits(6);
        pool.drain().await;

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        assert_eq!(results, vec![0, 1, 2, 3, 4, 5]);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(pool.is_idle());
    }

    #[tokio::test]
    async fn queued_tasks_start_in_submission_order() {
        let pool = WorkerPool::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = Arc::clone(&order);
            let _ = pool.add(async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                order.lock().unwrap().push(i);
                Ok::<_, AppError>(())
            });
        }

        pool.drain().await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn failing_task_does_not_halt_others() {
        let pool = WorkerPool::new(1);

        let failed = pool.add(async { Err::<u32, _>(AppError::Generic("boom".into())) });
        let ok = pool.add(async { Ok::<_, AppError>(7u32) });

        assert!(matches!(failed.await, Err(AppError::Generic(_))));
        assert_eq!(ok.await.unwrap(), 7);
        pool.drain().await;
        assert_eq!(pool.running(), 0);
    }

    #[tokio::test]
    async fn panicking_task_releases_its_slot() {
        let pool = WorkerPool::new(1);

        let panicked = pool.add(async {
            if true {
                panic!("task blew up");
            }
            Ok::<u32, AppError>(0)
        });
        let after = pool.add(async { Ok::<_, AppError>(1u32) });

        assert!(matches!(panicked.await, Err(AppError::TaskFailed(_))));
        assert_eq!(after.await.unwrap(), 1);
        pool.drain().await;
        assert!(pool.is_idle());
    }

    #[tokio::test]
    async fn drain_waits_for_every_task() {
        let pool = WorkerPool::new(3);
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..10u64 {
            let done = Arc::clone(&done);
            let _ = pool.add(async move {
                tokio::time::sleep(Duration::from_millis(5 + i)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<_, AppError>(())
            });
        }

        pool.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn drain_on_idle_pool_returns_immediately() {
        let pool = WorkerPool::new(4);
        tokio::time::timeout(Duration::from_millis(50), pool.drain())
            .await
            .expect("drain should not block on an idle pool");
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        assert_eq!(WorkerPool::new(0).max_concurrency(), 1);
    }
}
