//! Embedding explorer: embed a handful of text snippets with a local sentence
//! encoder and project them to 2D or 3D so that spatial proximity reflects
//! semantic similarity.
//!
//! # Architecture
//!
//! - **Inference worker**: an isolated thread owning the encoder. It loads the
//!   model (reporting per-file download progress) and embeds batches, talking
//!   to the rest of the program only through [`worker::WorkerRequest`] and
//!   [`worker::WorkerMessage`].
//! - **Projection**: a pure function reducing a batch of embeddings to 2 or 3
//!   principal components, mapped to `[0, 1]`.
//! - **Orchestrator**: the [`pipeline::PipelinePhase`] state machine that owns
//!   the inputs, dispatches work, and exposes render-ready points.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`embedding`]: Encoder trait, ONNX Runtime encoder, and model asset download
//! - [`worker`]: The inference worker thread and its message protocol
//! - [`projection`]: PCA projection and coordinate normalization
//! - [`pipeline`]: Orchestrator state machine and session wiring
//! - [`error`]: The pipeline error taxonomy

pub mod config;
pub mod embedding;
pub mod error;
pub mod pipeline;
pub mod projection;
pub mod worker;
