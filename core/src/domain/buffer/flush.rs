//! Flush worker
//!
//! Single consumer that drains the span buffer in batches and persists the
//! decoded spans through the repository. Corrupt payloads are dropped with
//! an error log; persistence failures are logged and the batch is dropped,
//! matching the at-most-once delivery of the buffer itself.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::data::types::Span;
use crate::data::SpanRepository;

use super::{codec, BufferedItem, DequeueParams, SpanBuffer};

pub struct FlushWorker {
    buffer: Arc<SpanBuffer>,
    repository: Arc<dyn SpanRepository>,
    params: DequeueParams,
}

impl FlushWorker {
    pub fn new(
        buffer: Arc<SpanBuffer>,
        repository: Arc<dyn SpanRepository>,
        params: DequeueParams,
    ) -> Self {
        Self {
            buffer,
            repository,
            params,
        }
    }

    /// Spawn the consumer loop. On shutdown the worker keeps draining until
    /// the buffer is empty, then exits.
    pub fn start(self, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::debug!("Flush worker started");
            loop {
                // No select around the drain: an in-progress dequeue has
                // already removed items from the buffer counters and must
                // not be cancelled.
                let shutdown = *shutdown_rx.borrow();
                let batch = self.buffer.dequeue_batch(&self.params).await;
                if batch.is_empty() {
                    if shutdown {
                        break;
                    }
                    continue;
                }
                self.flush(batch).await;
                if shutdown && self.buffer.is_empty() {
                    break;
                }
            }
            tracing::debug!("Flush worker stopped");
        })
    }

    /// Decode and persist one batch, grouped by project
    async fn flush(&self, batch: Vec<BufferedItem>) {
        let batch_len = batch.len();
        let mut by_project: HashMap<String, Vec<Span>> = HashMap::new();
        for item in batch {
            match codec::decode(&item.payload) {
                Ok((_organization_id, project_id, span)) => {
                    by_project.entry(project_id).or_default().push(span);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Dropping corrupt buffered payload");
                }
            }
        }

        for (project_id, spans) in by_project {
            let count = spans.len();
            match self.repository.create_many(&project_id, spans).await {
                Ok(_) => {
                    tracing::debug!(project_id = %project_id, count, "Flushed spans");
                }
                Err(e) => {
                    tracing::error!(
                        project_id = %project_id,
                        count,
                        error = %e,
                        "Failed to persist batch, dropping"
                    );
                }
            }
        }
        tracing::trace!(batch_len, "Batch flush complete");
    }
}
