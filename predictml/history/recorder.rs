use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use shared_telemetry::{LogLevel, Telemetry};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{error::HistoryError, records::NewPrediction, store::PredictionStore};

/// Receives finished predictions. `submit` must return without waiting on storage.
pub trait PredictionSink: Send + Sync {
    /// Queues a prediction for persistence.
    fn submit(&self, prediction: NewPrediction);
}

enum Command {
    Record(NewPrediction),
    Flush(oneshot::Sender<()>),
}

/// Counters reported when the recorder shuts down.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RecorderSummary {
    /// Records appended to the store.
    pub recorded: u64,
    /// Records the store refused.
    pub failed: u64,
}

/// Cloneable submission handle.
#[derive(Clone)]
pub struct RecorderHandle {
    sender: mpsc::UnboundedSender<Command>,
    telemetry: Telemetry,
}

impl PredictionSink for RecorderHandle {
    fn submit(&self, prediction: NewPrediction) {
        let model = prediction.model_name.clone();
        if self.sender.send(Command::Record(prediction)).is_err() {
            let _ = self.telemetry.log(
                LogLevel::Error,
                "prediction.record_dropped",
                json!({ "model": model, "error": HistoryError::RecorderClosed.to_string() }),
            );
        }
    }
}

/// Background writer draining submitted predictions into a store.
///
/// Storage runs on a blocking worker so a slow or failing store never delays the caller.
/// Failures are logged and counted, never returned to the submitter.
pub struct PredictionRecorder {
    handle: RecorderHandle,
    worker: JoinHandle<RecorderSummary>,
}

impl PredictionRecorder {
    /// Starts the worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn spawn(store: Arc<dyn PredictionStore>, telemetry: Telemetry) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker_telemetry = telemetry.clone();
        let worker =
            tokio::task::spawn_blocking(move || drain(receiver, store.as_ref(), &worker_telemetry));
        Self {
            handle: RecorderHandle { sender, telemetry },
            worker,
        }
    }

    /// Handle for submitting predictions.
    #[must_use]
    pub fn handle(&self) -> RecorderHandle {
        self.handle.clone()
    }

    /// Waits until everything submitted before this call has been processed.
    pub async fn flush(&self) -> Result<(), HistoryError> {
        let (ack, done) = oneshot::channel();
        self.handle
            .sender
            .send(Command::Flush(ack))
            .map_err(|_| HistoryError::RecorderClosed)?;
        done.await.map_err(|_| HistoryError::RecorderClosed)
    }

    /// Processes pending work and stops the worker.
    ///
    /// Outstanding [`RecorderHandle`] clones keep the channel open. When any are still
    /// alive after the flush, the worker is left to finish on its own and `RecorderClosed`
    /// is returned instead of a summary.
    pub async fn close(self) -> Result<RecorderSummary, HistoryError> {
        self.flush().await?;
        let Self { handle, worker } = self;
        drop(handle);
        match tokio::time::timeout(std::time::Duration::from_millis(200), worker).await {
            Ok(joined) => joined.map_err(|_| HistoryError::RecorderClosed),
            Err(_) => Err(HistoryError::RecorderClosed),
        }
    }
}

impl PredictionSink for PredictionRecorder {
    fn submit(&self, prediction: NewPrediction) {
        self.handle.submit(prediction);
    }
}

fn drain(
    mut receiver: mpsc::UnboundedReceiver<Command>,
    store: &dyn PredictionStore,
    telemetry: &Telemetry,
) -> RecorderSummary {
    let mut summary = RecorderSummary::default();
    while let Some(command) = receiver.blocking_recv() {
        match command {
            Command::Record(prediction) => {
                let record = prediction.into_record();
                match store.append(&record) {
                    Ok(()) => {
                        summary.recorded += 1;
                        let payload = json!({
                            "id": record.id,
                            "model": record.model_name,
                            "version": record.model_version,
                        });
                        let _ = telemetry.log(LogLevel::Debug, "prediction.recorded", payload.clone());
                        let _ = telemetry.event("prediction.recorded", payload);
                    }
                    Err(err) => {
                        summary.failed += 1;
                        let _ = telemetry.log(
                            LogLevel::Error,
                            "prediction.record_failed",
                            json!({ "model": record.model_name, "error": err.to_string() }),
                        );
                    }
                }
            }
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    summary
}
