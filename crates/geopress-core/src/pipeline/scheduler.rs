//! Fixed-size concurrent batch execution with failure isolation.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::PipelineError;

/// Cooperative cancellation flag shared between a run and its caller.
///
/// Cancellation is observed at batch boundaries only; items already in
/// flight run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Result of one scheduled item, tagged with its input position.
#[derive(Debug)]
pub struct ItemOutcome<T> {
    /// Position of the item in the input list
    pub index: usize,
    pub result: Result<T, PipelineError>,
}

/// Runs a worker over a list of items in fixed-size concurrent batches.
///
/// All items of a batch run concurrently; the next batch starts only after
/// every item of the current one has settled. A short pause between batches
/// keeps a shared runtime responsive during long runs.
pub struct BatchScheduler {
    batch_size: usize,
    batch_pause: Duration,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, batch_pause: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batch_pause,
        }
    }

    /// Execute `worker` over `items`, returning outcomes in input order.
    ///
    /// A failed item never aborts its batch or the run; its error travels
    /// in the outcome. When the token is cancelled, batches that have not
    /// started are skipped and their items are simply absent from the
    /// result.
    pub async fn run_batches<T, U, F, Fut>(
        &self,
        items: Vec<T>,
        cancel: &CancelToken,
        worker: F,
    ) -> Vec<ItemOutcome<U>>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: Fn(usize, T) -> Fut,
        Fut: Future<Output = Result<U, PipelineError>> + Send + 'static,
    {
        let total = items.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut iter = items.into_iter().enumerate();
        let mut first = true;

        loop {
            let batch: Vec<(usize, T)> = iter.by_ref().take(self.batch_size).collect();
            if batch.is_empty() {
                break;
            }
            if cancel.is_cancelled() {
                tracing::info!(
                    settled = outcomes.len(),
                    total,
                    "run cancelled before next batch"
                );
                break;
            }
            if !first && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }
            first = false;

            // Spawn the whole batch, then await handles in spawn order so
            // outcomes land in input order regardless of completion order.
            let handles: Vec<_> = batch
                .into_iter()
                .map(|(index, item)| (index, tokio::spawn(worker(index, item))))
                .collect();

            for (index, handle) in handles {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(PipelineError::Task {
                        message: e.to_string(),
                    }),
                };
                outcomes.push(ItemOutcome { index, result });
            }
        }

        outcomes
    }
}
