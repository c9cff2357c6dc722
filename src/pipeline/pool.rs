//! Bounded worker pool with slot-ordered results.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::control::CancelToken;

/// Runs one async task per item with at most `workers` in flight.
///
/// Results land in the slot matching the item's input index, so callers
/// aggregate in input order regardless of completion order. Once the cancel
/// token is set no further tasks are spawned; tasks already running finish
/// and their results are kept. Unprocessed or panicked slots stay `None`.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            semaphore: Arc::new(Semaphore::new(workers)),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, cancel: &CancelToken, task: F) -> Vec<Option<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let mut slots: Vec<Option<R>> = (0..items.len()).map(|_| None).collect();
        let task = Arc::new(task);
        let mut set = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
                break;
            };
            if cancel.is_cancelled() {
                debug!("Cancellation requested, not submitting task {}", index);
                break;
            }

            let task = task.clone();
            set.spawn(async move {
                let _permit = permit;
                (index, task(item).await)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!("Worker task failed: {}", e),
            }
        }

        slots
    }
}
