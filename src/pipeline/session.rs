//! A live orchestrator wired to its inference worker.

use tokio::sync::mpsc::UnboundedReceiver;

use super::{Orchestrator, PipelinePhase};
use crate::config::InputsConfig;
use crate::embedding::ModelSource;
use crate::error::PipelineError;
use crate::worker::{InferenceWorker, WorkerMessage};

/// One interactive session: a worker thread, its message stream, and the
/// orchestrator reacting to it. Created once, torn down with [`Session::shutdown`].
pub struct Session {
    orchestrator: Orchestrator,
    messages: UnboundedReceiver<WorkerMessage>,
    worker: InferenceWorker,
}

impl Session {
    /// Spawn the worker and issue the initial `load`.
    pub fn start<S>(source: S, inputs: &InputsConfig) -> Result<Self, PipelineError>
    where
        S: ModelSource + Send + 'static,
    {
        let spawned = InferenceWorker::spawn(source)?;
        let orchestrator = Orchestrator::new(spawned.requests, inputs);
        Ok(Self {
            orchestrator,
            messages: spawned.messages,
            worker: spawned.worker,
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    pub fn phase(&self) -> PipelinePhase {
        self.orchestrator.phase()
    }

    /// Wait for the next worker message. `None` once the worker has exited.
    pub async fn next_message(&mut self) -> Option<WorkerMessage> {
        self.messages.recv().await
    }

    /// Feed a received message (or the end of the stream) to the orchestrator.
    pub fn apply(&mut self, message: Option<WorkerMessage>) -> Result<(), PipelineError> {
        match message {
            Some(message) => {
                tracing::trace!(status = message.status(), "worker message");
                self.orchestrator.handle_message(message)
            }
            None => {
                self.orchestrator.worker_disconnected();
                Err(PipelineError::WorkerDisconnected)
            }
        }
    }

    /// Process messages until nothing is in flight.
    pub async fn settle(&mut self) -> Result<PipelinePhase, PipelineError> {
        self.settle_with(|_| {}).await
    }

    /// Like [`Self::settle`], calling `on_update` after every message.
    pub async fn settle_with(
        &mut self,
        mut on_update: impl FnMut(&Orchestrator),
    ) -> Result<PipelinePhase, PipelineError> {
        while self.phase().is_busy() {
            let message = self.next_message().await;
            self.apply(message)?;
            on_update(&self.orchestrator);
        }
        Ok(self.phase())
    }

    /// Close the channels and wait for the worker thread to finish its current request.
    pub async fn shutdown(self) {
        let Session {
            orchestrator,
            messages,
            worker,
        } = self;
        drop(orchestrator);
        drop(messages);
        if tokio::task::spawn_blocking(move || worker.join()).await.is_err() {
            tracing::error!("failed to join inference worker");
        }
        tracing::debug!("session shut down");
    }
}
