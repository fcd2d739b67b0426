//! The inference worker: an isolated thread that owns the encoder.
//!
//! The worker runs a single-threaded `tokio` runtime on its own OS thread and
//! processes [`WorkerRequest`]s strictly one at a time. Every outcome, including
//! failures, goes back as a [`WorkerMessage`]; nothing is thrown across the
//! channel boundary.

pub mod protocol;

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use futures::FutureExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub use protocol::{WorkerMessage, WorkerRequest};

use crate::embedding::{Encoder, FileProgress, ModelSource};
use crate::error::PipelineError;

/// Handle to the worker thread. Dropping every request sender stops it.
#[derive(Debug)]
pub struct InferenceWorker {
    thread: JoinHandle<()>,
}

/// A freshly spawned worker plus both ends of its channels.
#[derive(Debug)]
pub struct SpawnedWorker {
    pub worker: InferenceWorker,
    pub requests: UnboundedSender<WorkerRequest>,
    pub messages: UnboundedReceiver<WorkerMessage>,
}

impl InferenceWorker {
    /// Start the worker thread. The encoder is not built until the first `load`.
    pub fn spawn<S>(source: S) -> Result<SpawnedWorker, PipelineError>
    where
        S: ModelSource + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();

        // The runtime is built on the worker thread; startup reports back once.
        let (init_tx, init_rx) = std::sync::mpsc::sync_channel::<Result<(), String>>(1);

        let thread = std::thread::Builder::new()
            .name("inference-worker".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => {
                        let _ = init_tx.send(Ok(()));
                        runtime
                    }
                    Err(e) => {
                        let _ = init_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let actor = WorkerActor {
                    source,
                    encoder: None,
                    messages: message_tx,
                };
                runtime.block_on(actor.run(request_rx));
            })
            .map_err(|e| PipelineError::WorkerInitFailure(e.to_string()))?;

        match init_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(PipelineError::WorkerInitFailure(e)),
            Err(_) => {
                return Err(PipelineError::WorkerInitFailure(
                    "worker thread exited during startup".into(),
                ))
            }
        }

        tracing::debug!("inference worker spawned");

        Ok(SpawnedWorker {
            worker: InferenceWorker { thread },
            requests: request_tx,
            messages: message_rx,
        })
    }

    /// Wait for the thread to exit. Only returns once all request senders are gone
    /// and the current request has finished.
    pub fn join(self) {
        if self.thread.join().is_err() {
            tracing::error!("inference worker thread panicked");
        }
    }
}

struct WorkerActor<S: ModelSource> {
    source: S,
    encoder: Option<S::Encoder>,
    messages: UnboundedSender<WorkerMessage>,
}

impl<S: ModelSource> WorkerActor<S> {
    async fn run(mut self, mut requests: UnboundedReceiver<WorkerRequest>) {
        while let Some(request) = requests.recv().await {
            match request {
                WorkerRequest::Load => self.load().await,
                WorkerRequest::Embed { texts } => self.embed(texts).await,
            }
        }
        tracing::debug!("request channel closed, inference worker exiting");
    }

    fn send(&self, message: WorkerMessage) {
        if self.messages.send(message).is_err() {
            tracing::debug!("orchestrator gone, dropping worker message");
        }
    }

    async fn load(&mut self) {
        if self.encoder.is_none() {
            tracing::info!("acquiring model assets");
            let messages = self.messages.clone();
            let mut reported: HashMap<String, f64> = HashMap::new();
            let mut on_progress = |p: FileProgress| {
                let percent = p.percent();
                let last = reported.entry(p.file.clone()).or_insert(percent);
                // Never report less than before for the same file.
                *last = last.max(percent);
                let _ = messages.send(WorkerMessage::Loading {
                    file: p.file,
                    progress: *last,
                });
            };

            match acquire(&self.source, &mut on_progress).await {
                Ok(encoder) => {
                    tracing::info!("encoder ready");
                    self.encoder = Some(encoder);
                }
                Err(e) => {
                    let error = format!("{e:#}");
                    tracing::warn!(%error, "model acquisition failed");
                    self.send(WorkerMessage::Error { error });
                    return;
                }
            }
        }
        self.send(WorkerMessage::Ready);
    }

    async fn embed(&mut self, texts: Vec<String>) {
        let message = match self.try_embed(&texts).await {
            Ok(output) => {
                tracing::debug!(count = output.len(), "batch embedded");
                WorkerMessage::Complete { output, texts }
            }
            Err(e) => {
                let error = format!("{e:#}");
                tracing::warn!(%error, "embedding failed");
                WorkerMessage::Error { error }
            }
        };
        self.send(message);
    }

    async fn try_embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        anyhow::ensure!(!texts.is_empty(), "no texts to embed");

        if self.encoder.is_none() {
            tracing::info!("embed requested before load, acquiring model");
            let encoder = acquire(&self.source, &mut |_: FileProgress| {})
                .await
                .context("failed to load model")?;
            self.encoder = Some(encoder);
        }
        let encoder = self
            .encoder
            .as_mut()
            .context("encoder missing after load")?;

        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let output = match catch_unwind(AssertUnwindSafe(|| encoder.encode(&refs))) {
            Ok(result) => result?,
            Err(panic) => {
                // The session may be half-mutated; rebuild it on the next request.
                self.encoder = None;
                anyhow::bail!("encoder panicked: {}", panic_message(panic.as_ref()));
            }
        };

        anyhow::ensure!(
            output.len() == texts.len(),
            "encoder returned {} vectors for {} texts",
            output.len(),
            texts.len()
        );
        if let Some(first) = output.first() {
            anyhow::ensure!(
                output.iter().all(|v| v.len() == first.len()),
                "encoder returned vectors of differing lengths"
            );
        }
        Ok(output)
    }
}

/// Run `source.acquire`, turning a panic into an error so the thread survives it.
async fn acquire<S: ModelSource>(
    source: &S,
    progress: &mut dyn FnMut(FileProgress),
) -> Result<S::Encoder> {
    match AssertUnwindSafe(source.acquire(progress)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => anyhow::bail!("model loading panicked: {}", panic_message(panic.as_ref())),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
