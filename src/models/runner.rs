//! Adaptive batching runner
//!
//! Requests arriving close together are concatenated along the row
//! dimension, scored in one call on a blocking thread, and split back so
//! every caller receives exactly the labels for its own rows.

use crate::config::RunnerConfig;
use crate::metrics::ServingMetrics;
use crate::models::inference::InferenceEngine;
use crate::types::transaction::TransactionRecord;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Error)]
pub enum RunnerError {
    #[error("Runner is not accepting requests")]
    Unavailable,

    #[error("Prediction failed: {0}")]
    Prediction(String),
}

struct PendingRequest {
    records: Vec<TransactionRecord>,
    respond_to: oneshot::Sender<Result<Vec<u8>, RunnerError>>,
}

/// Handle to the batching worker. Cheap to clone.
#[derive(Clone)]
pub struct Runner {
    sender: mpsc::Sender<PendingRequest>,
    engine: Arc<InferenceEngine>,
}

impl Runner {
    /// Start the batching worker on the current tokio runtime.
    pub fn spawn(
        engine: Arc<InferenceEngine>,
        config: &RunnerConfig,
        metrics: Arc<ServingMetrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let worker = BatchWorker {
            engine: engine.clone(),
            receiver,
            max_batch_size: config.max_batch_size.max(1),
            max_latency: Duration::from_millis(config.max_latency_ms),
            metrics,
            carried: None,
        };

        info!(
            model = %engine.info().tag,
            max_batch_size = worker.max_batch_size,
            max_latency_ms = config.max_latency_ms,
            "Starting runner"
        );
        tokio::spawn(worker.run());

        Self { sender, engine }
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    /// Submit rows and wait for their labels.
    pub async fn predict(&self, records: Vec<TransactionRecord>) -> Result<Vec<u8>, RunnerError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(PendingRequest {
                records,
                respond_to,
            })
            .await
            .map_err(|_| RunnerError::Unavailable)?;

        response.await.map_err(|_| RunnerError::Unavailable)?
    }
}

struct BatchWorker {
    engine: Arc<InferenceEngine>,
    receiver: mpsc::Receiver<PendingRequest>,
    max_batch_size: usize,
    max_latency: Duration,
    metrics: Arc<ServingMetrics>,
    /// Request that did not fit the previous batch; it opens the next one
    carried: Option<PendingRequest>,
}

impl BatchWorker {
    async fn run(mut self) {
        loop {
            let first = match self.carried.take() {
                Some(request) => request,
                None => match self.receiver.recv().await {
                    Some(request) => request,
                    None => break,
                },
            };
            let batch = self.collect(first).await;
            self.dispatch(batch).await;
        }
        debug!("Runner queue closed, worker exiting");
    }

    /// Gather requests until the batch is full or the oldest request has waited long enough.
    ///
    /// A request that would push the batch past `max_batch_size` rows is held
    /// back for the next batch. A single request larger than the limit is
    /// still scored, alone.
    async fn collect(&mut self, first: PendingRequest) -> Vec<PendingRequest> {
        let deadline = Instant::now() + self.max_latency;
        let mut rows = first.records.len();
        let mut batch = vec![first];

        while rows < self.max_batch_size {
            match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                Ok(Some(request)) if rows + request.records.len() > self.max_batch_size => {
                    self.carried = Some(request);
                    break;
                }
                Ok(Some(request)) => {
                    rows += request.records.len();
                    batch.push(request);
                }
                Ok(None) | Err(_) => break,
            }
        }
        batch
    }

    async fn dispatch(&self, batch: Vec<PendingRequest>) {
        let mut lengths = Vec::with_capacity(batch.len());
        let mut senders = Vec::with_capacity(batch.len());
        let mut records = Vec::new();
        for request in batch {
            lengths.push(request.records.len());
            senders.push(request.respond_to);
            records.extend(request.records);
        }

        let total = records.len();
        self.metrics.record_batch(total);
        debug!(requests = lengths.len(), rows = total, "Dispatching batch");

        let engine = self.engine.clone();
        let result = tokio::task::spawn_blocking(move || engine.predict(&records))
            .await
            .map_err(|e| RunnerError::Prediction(format!("inference task panicked: {e}")))
            .and_then(|r| r.map_err(|e| RunnerError::Prediction(e.to_string())));

        match result {
            Ok(labels) if labels.len() == total => {
                let mut rest = labels.as_slice();
                for (len, sender) in lengths.into_iter().zip(senders) {
                    let (mine, tail) = rest.split_at(len);
                    rest = tail;
                    // The caller may have gone away; nothing to do then
                    let _ = sender.send(Ok(mine.to_vec()));
                }
            }
            Ok(labels) => {
                error!(expected = total, got = labels.len(), "Model returned wrong number of labels");
                let err = RunnerError::Prediction(format!(
                    "model returned {} labels for {} rows",
                    labels.len(),
                    total
                ));
                for sender in senders {
                    let _ = sender.send(Err(err.clone()));
                }
            }
            Err(err) => {
                error!(error = %err, rows = total, "Batch prediction failed");
                for sender in senders {
                    let _ = sender.send(Err(err.clone()));
                }
            }
        }
    }
}
