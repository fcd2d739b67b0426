//! Local ONNX Runtime encoder.
//!
//! Implements [`Encoder`] for sentence-transformer exports such as
//! all-MiniLM-L6-v2 via `ort`. Handles tokenization, inference, mean pooling,
//! and L2 normalization.

use std::path::Path;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{l2_normalize, mean_pool, Encoder};

/// ONNX-based encoder. Owned by the inference worker, so the session needs no lock.
pub struct LocalEncoder {
    session: Session,
    tokenizer: Tokenizer,
}

impl LocalEncoder {
    pub fn new(
        model_path: &Path,
        tokenizer_path: &Path,
        max_seq_len: usize,
        intra_threads: usize,
    ) -> Result<Self> {
        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}",
            tokenizer_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)
            .context("failed to load ONNX model")?;

        tracing::info!(model = %model_path.display(), "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: max_seq_len,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(tokenizer = %tokenizer_path.display(), "tokenizer loaded");

        Ok(Self { session, tokenizer })
    }
}

impl Encoder for LocalEncoder {
    fn encode(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();

        let mut input_ids_flat = Vec::with_capacity(batch_size * seq_len);
        let mut attention_mask_flat = Vec::with_capacity(batch_size * seq_len);

        for encoding in &encodings {
            input_ids_flat.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask_flat.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }

        let shape = vec![batch_size as i64, seq_len as i64];
        let input_ids_tensor =
            Tensor::from_array((shape.clone(), input_ids_flat.into_boxed_slice()))?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask_flat.clone().into_boxed_slice()))?;
        // single-segment input
        let token_type_ids = vec![0i64; batch_size * seq_len];
        let token_type_ids_tensor =
            Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;

        let outputs = self.session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
            "token_type_ids" => token_type_ids_tensor,
        })?;

        // Output name varies by export; fall back to the first output.
        let token_emb_value = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (shape, data) = token_emb_value
            .try_extract_tensor::<f32>()
            .context("failed to extract token embeddings tensor")?;

        let dims: &[i64] = &shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == batch_size && dims[1] as usize == seq_len,
            "unexpected token embeddings shape: {dims:?}, expected [{batch_size}, {seq_len}, hidden]"
        );
        let hidden = dims[2] as usize;
        let stride = seq_len * hidden;

        let results = (0..batch_size)
            .map(|b| {
                let tokens = &data[b * stride..(b + 1) * stride];
                let mask = &attention_mask_flat[b * seq_len..(b + 1) * seq_len];
                l2_normalize(&mean_pool(tokens, mask, hidden))
            })
            .collect();

        tracing::debug!(batch = batch_size, hidden, "batch encoded");
        Ok(results)
    }
}
