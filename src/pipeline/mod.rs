//! Pipeline orchestration: the single explicit state machine behind the plot.
//!
//! [`Orchestrator`] owns the text inputs, the derived embeddings and projected
//! points, and the [`PipelinePhase`]. It never blocks: requests go to the
//! inference worker over a channel and results come back through
//! [`Orchestrator::handle_message`]. [`Session`] wires it to a live worker.

pub mod session;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

pub use session::Session;

use crate::config::InputsConfig;
use crate::error::PipelineError;
use crate::projection::{self, ProjectedPoint};
use crate::worker::{WorkerMessage, WorkerRequest};

/// One encoder output vector, unit length.
pub type EmbeddingVector = Vec<f32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    /// `load` issued, waiting for `ready`. Inputs are locked.
    ModelLoading,
    /// Model ready and nothing in flight.
    Idle,
    /// An `embed` is in flight. Inputs are locked.
    Generating,
    /// The last operation failed. Inputs stay editable.
    Failed,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModelLoading => "loading the model",
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Failed => "failed",
        }
    }

    /// Whether a worker reply is pending.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::ModelLoading | Self::Generating)
    }

    /// Whether the text inputs may be changed.
    pub fn inputs_editable(&self) -> bool {
        !self.is_busy()
    }
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Download progress for one model asset, in percent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadProgress {
    pub file: String,
    pub progress: f64,
}

/// Everything the presentation layer needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderState {
    pub phase: PipelinePhase,
    pub labels: Vec<String>,
    /// Aligned with `labels` when present.
    pub points: Option<Vec<ProjectedPoint>>,
    pub dimensions: Option<usize>,
    pub load_progress: Vec<LoadProgress>,
    pub error: Option<String>,
    pub can_generate: bool,
}

pub struct Orchestrator {
    phase: PipelinePhase,
    inputs: Vec<String>,
    embeddings: Option<Vec<EmbeddingVector>>,
    points: Option<Vec<ProjectedPoint>>,
    progress: Vec<LoadProgress>,
    error: Option<PipelineError>,
    /// Texts of the in-flight `embed`, for matching the echoed reply.
    requested: Option<Vec<String>>,
    model_ready: bool,
    min_inputs: usize,
    requests: UnboundedSender<WorkerRequest>,
}

impl Orchestrator {
    /// Create the orchestrator and immediately ask the worker to load the model.
    pub fn new(requests: UnboundedSender<WorkerRequest>, config: &InputsConfig) -> Self {
        let min_inputs = config.effective_min_inputs();
        let mut orchestrator = Self {
            phase: PipelinePhase::ModelLoading,
            inputs: vec![String::new(); min_inputs],
            embeddings: None,
            points: None,
            progress: Vec::new(),
            error: None,
            requested: None,
            model_ready: false,
            min_inputs,
            requests,
        };
        if let Err(e) = orchestrator.send(WorkerRequest::Load) {
            orchestrator.fail(e);
        }
        orchestrator
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Projected points for the current inputs, if a batch completed since the last edit.
    pub fn points(&self) -> Option<&[ProjectedPoint]> {
        self.points.as_deref()
    }

    /// Raw embeddings behind [`Self::points`].
    pub fn embeddings(&self) -> Option<&[EmbeddingVector]> {
        self.embeddings.as_deref()
    }

    pub fn load_progress(&self) -> &[LoadProgress] {
        &self.progress
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn model_ready(&self) -> bool {
        self.model_ready
    }

    pub fn min_inputs(&self) -> usize {
        self.min_inputs
    }

    /// Generation needs a ready model, no request in flight, and enough non-blank inputs.
    pub fn can_generate(&self) -> bool {
        self.model_ready
            && matches!(self.phase, PipelinePhase::Idle | PipelinePhase::Failed)
            && self.inputs.len() >= self.min_inputs
            && self.inputs.iter().all(|s| !s.trim().is_empty())
    }

    /// New inputs may only be appended once every existing one has text.
    pub fn can_add_input(&self) -> bool {
        self.phase.inputs_editable() && self.inputs.iter().all(|s| !s.trim().is_empty())
    }

    pub fn can_remove_input(&self) -> bool {
        self.phase.inputs_editable() && self.inputs.len() > self.min_inputs
    }

    pub fn set_input(&mut self, index: usize, value: impl Into<String>) -> Result<(), PipelineError> {
        self.ensure_editable("edit inputs")?;
        if index >= self.inputs.len() {
            return Err(self.unavailable("edit a missing input"));
        }
        self.inputs[index] = value.into();
        self.invalidate();
        Ok(())
    }

    /// Replace every input at once, padding with blanks up to the minimum count.
    pub fn set_inputs<I, S>(&mut self, values: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_editable("edit inputs")?;
        self.inputs = values.into_iter().map(Into::into).collect();
        if self.inputs.len() < self.min_inputs {
            self.inputs.resize(self.min_inputs, String::new());
        }
        self.invalidate();
        Ok(())
    }

    pub fn add_input(&mut self) -> Result<(), PipelineError> {
        if !self.can_add_input() {
            return Err(self.unavailable("add an input"));
        }
        self.inputs.push(String::new());
        self.invalidate();
        Ok(())
    }

    pub fn remove_input(&mut self, index: usize) -> Result<(), PipelineError> {
        if !self.can_remove_input() || index >= self.inputs.len() {
            return Err(self.unavailable("remove an input"));
        }
        self.inputs.remove(index);
        self.invalidate();
        Ok(())
    }

    /// Send the current inputs to the worker. Rejected while anything is in flight.
    pub fn request_generation(&mut self) -> Result<(), PipelineError> {
        if !self.can_generate() {
            return Err(self.unavailable("generate embeddings"));
        }

        let texts = self.inputs.clone();
        self.embeddings = None;
        self.points = None;
        self.error = None;
        if let Err(e) = self.send(WorkerRequest::Embed {
            texts: texts.clone(),
        }) {
            self.fail(e.clone());
            return Err(e);
        }
        tracing::info!(count = texts.len(), "generation requested");
        self.requested = Some(texts);
        self.transition(PipelinePhase::Generating);
        Ok(())
    }

    /// From `Failed`: reload the model if it never became ready, otherwise regenerate.
    pub fn retry(&mut self) -> Result<(), PipelineError> {
        if self.phase != PipelinePhase::Failed {
            return Err(self.unavailable("retry"));
        }
        if self.model_ready {
            return self.request_generation();
        }

        self.error = None;
        self.progress.clear();
        if let Err(e) = self.send(WorkerRequest::Load) {
            self.fail(e.clone());
            return Err(e);
        }
        tracing::info!("model load retried");
        self.transition(PipelinePhase::ModelLoading);
        Ok(())
    }

    /// React to one worker message.
    ///
    /// Returns `Err` only for projection contract violations; worker failures
    /// become the `Failed` phase and are read back through [`Self::error`].
    pub fn handle_message(&mut self, message: WorkerMessage) -> Result<(), PipelineError> {
        match message {
            WorkerMessage::Loading { file, progress } => {
                if self.phase != PipelinePhase::ModelLoading {
                    tracing::debug!(%file, "ignoring load progress outside model loading");
                    return Ok(());
                }
                match self.progress.iter_mut().find(|p| p.file == file) {
                    Some(entry) => entry.progress = progress,
                    None => self.progress.push(LoadProgress { file, progress }),
                }
            }
            WorkerMessage::Ready => {
                self.model_ready = true;
                self.progress.clear();
                if self.phase == PipelinePhase::ModelLoading {
                    self.transition(PipelinePhase::Idle);
                }
            }
            WorkerMessage::Complete { output, texts } => return self.complete(output, texts),
            WorkerMessage::Error { error } => {
                let error = match self.phase {
                    PipelinePhase::ModelLoading => PipelineError::AcquisitionFailure(error),
                    _ => PipelineError::InferenceFailure(error),
                };
                self.fail(error);
            }
        }
        Ok(())
    }

    /// The worker's channel closed. Nothing can be in flight any more.
    pub fn worker_disconnected(&mut self) {
        self.fail(PipelineError::WorkerDisconnected);
    }

    pub fn render_state(&self) -> RenderState {
        RenderState {
            phase: self.phase,
            labels: self.inputs.clone(),
            points: self.points.clone(),
            dimensions: self.points.as_ref().and_then(|p| p.first()).map(Vec::len),
            load_progress: self.progress.clone(),
            error: self.error_message(),
            can_generate: self.can_generate(),
        }
    }

    fn complete(&mut self, output: Vec<EmbeddingVector>, texts: Vec<String>) -> Result<(), PipelineError> {
        if self.phase != PipelinePhase::Generating {
            tracing::warn!("ignoring embeddings that arrived while {}", self.phase);
            return Ok(());
        }
        let requested = self.requested.take();
        self.transition(PipelinePhase::Idle);

        if requested.as_ref() != Some(&texts) || texts != self.inputs {
            tracing::warn!("embeddings do not match the current inputs, discarding");
            return Ok(());
        }
        if output.len() != texts.len() {
            self.fail(PipelineError::InferenceFailure(format!(
                "received {} embeddings for {} inputs",
                output.len(),
                texts.len()
            )));
            return Ok(());
        }

        match projection::project(&output) {
            Ok(points) => {
                tracing::info!(
                    count = points.len(),
                    dimensions = projection::target_dimensions(points.len()),
                    "embeddings projected"
                );
                self.embeddings = Some(output);
                self.points = Some(points);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "projection contract violated");
                Err(e)
            }
        }
    }

    fn fail(&mut self, error: PipelineError) {
        tracing::warn!(error = %error, phase = %self.phase, "pipeline failed");
        self.progress.clear();
        self.requested = None;
        self.error = Some(error);
        self.transition(PipelinePhase::Failed);
    }

    /// Drop derived output so it is never shown against edited labels.
    fn invalidate(&mut self) {
        if self.points.is_some() {
            tracing::debug!("inputs changed, clearing projected points");
        }
        self.points = None;
        self.embeddings = None;
    }

    fn transition(&mut self, next: PipelinePhase) {
        if self.phase != next {
            tracing::debug!(from = %self.phase, to = %next, "phase transition");
            self.phase = next;
        }
    }

    fn send(&self, request: WorkerRequest) -> Result<(), PipelineError> {
        self.requests
            .send(request)
            .map_err(|_| PipelineError::WorkerDisconnected)
    }

    fn ensure_editable(&self, action: &'static str) -> Result<(), PipelineError> {
        if self.phase.inputs_editable() {
            Ok(())
        } else {
            Err(self.unavailable(action))
        }
    }

    fn unavailable(&self, action: &'static str) -> PipelineError {
        PipelineError::ActionUnavailable {
            action,
            phase: self.phase,
        }
    }
}
