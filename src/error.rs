//! Error taxonomy for the inference-and-projection pipeline.
//!
//! Worker-side failures never cross the thread boundary as panics or `Err`
//! values; they travel as `error` messages and are classified here by the
//! orchestrator depending on which operation was in flight.

use thiserror::Error;

use crate::pipeline::PipelinePhase;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// Model asset download or parsing failed. The worker can be asked to load again.
    #[error("{0}")]
    AcquisitionFailure(String),

    /// The encoder failed while embedding a batch. Worker state is unaffected.
    #[error("{0}")]
    InferenceFailure(String),

    /// Projection preconditions violated: too few vectors, ragged lengths,
    /// or vectors shorter than the target dimensionality.
    #[error("invalid input shape: {0}")]
    InvalidInputShape(String),

    /// The worker thread or its runtime could not be started.
    #[error("failed to initialize inference worker: {0}")]
    WorkerInitFailure(String),

    /// The worker's message channel closed while the session was still running.
    #[error("inference worker is no longer running")]
    WorkerDisconnected,

    /// The state machine does not allow this action in the current phase.
    #[error("cannot {action} while {phase}")]
    ActionUnavailable {
        action: &'static str,
        phase: PipelinePhase,
    },
}

impl PipelineError {
    /// Whether the error should be shown to the user rather than treated as a bug.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::InvalidInputShape(_))
    }
}
