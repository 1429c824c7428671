use crate::{IngestError, IngestResult};
use futures::{stream, StreamExt};
use std::future::Future;
use std::pin::pin;

/// Runs an async transform over fixed-size batches of a sequence.
///
/// Results come back in input order. There are no retries: the first failed
/// batch ends the run and its error is returned.
#[derive(Debug, Clone, Copy)]
pub struct BatchProcessor {
    batch_size: usize,
}

impl BatchProcessor {
    pub fn new(batch_size: usize) -> IngestResult<Self> {
        if batch_size == 0 {
            return Err(IngestError::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(Self { batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// One batch at a time, yielding to the scheduler between batches.
    pub async fn process<T, U, E, F, Fut>(
        &self,
        items: impl IntoIterator<Item = T>,
        mut transform: F,
    ) -> Result<Vec<U>, E>
    where
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = Result<Vec<U>, E>>,
    {
        let mut items = items.into_iter().peekable();
        let mut results = Vec::new();
        let mut batches = 0usize;

        while items.peek().is_some() {
            if batches > 0 {
                tokio::task::yield_now().await;
            }
            let batch: Vec<T> = items.by_ref().take(self.batch_size).collect();
            results.extend(transform(batch).await?);
            batches += 1;
        }

        tracing::trace!(batches, items = results.len(), "batch run finished");
        Ok(results)
    }

    /// Up to `max_in_flight` batches at once. Completion order may vary, but
    /// results are still concatenated in batch order.
    pub async fn process_concurrent<T, U, E, F, Fut>(
        &self,
        items: impl IntoIterator<Item = T>,
        max_in_flight: usize,
        transform: F,
    ) -> Result<Vec<U>, E>
    where
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = Result<Vec<U>, E>>,
    {
        let mut items = items.into_iter().peekable();
        let mut batches = Vec::new();
        while items.peek().is_some() {
            batches.push(items.by_ref().take(self.batch_size).collect::<Vec<T>>());
        }

        let mut pending = pin!(stream::iter(batches)
            .map(transform)
            .buffered(max_in_flight.max(1)));

        let mut results = Vec::new();
        while let Some(batch) = pending.next().await {
            results.extend(batch?);
        }
        Ok(results)
    }
}
