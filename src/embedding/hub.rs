//! Model asset acquisition from a Hugging Face compatible file host.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use super::local::LocalEncoder;
use super::{FileProgress, ModelSource};
use crate::config::ModelConfig;

/// Local file name of the cached ONNX export.
pub const MODEL_FILE: &str = "model.onnx";
/// Local file name of the cached tokenizer.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Paths of a complete, cached asset set.
#[derive(Debug, Clone)]
pub struct ModelAssets {
    pub model: PathBuf,
    pub tokenizer: PathBuf,
}

/// Downloads the ONNX model and tokenizer on first use, then builds a [`LocalEncoder`].
#[derive(Debug, Clone)]
pub struct HubModelSource {
    config: ModelConfig,
}

impl HubModelSource {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }
}

impl ModelSource for HubModelSource {
    type Encoder = LocalEncoder;

    async fn acquire(&self, progress: &mut dyn FnMut(FileProgress)) -> Result<LocalEncoder> {
        let assets = fetch_assets(&self.config, progress).await?;
        LocalEncoder::new(
            &assets.model,
            &assets.tokenizer,
            self.config.max_seq_len,
            self.config.intra_threads,
        )
    }
}

/// Make sure both assets exist in the cache, downloading whichever is missing.
///
/// Cached files report 100% immediately so every asset shows up in progress.
pub async fn fetch_assets(
    config: &ModelConfig,
    progress: &mut dyn FnMut(FileProgress),
) -> Result<ModelAssets> {
    let dir = config.model_dir();
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("failed to create cache dir: {}", dir.display()))?;

    let assets = ModelAssets {
        model: dir.join(MODEL_FILE),
        tokenizer: dir.join(TOKENIZER_FILE),
    };

    for (remote, local) in [
        (&config.onnx_file, &assets.model),
        (&config.tokenizer_file, &assets.tokenizer),
    ] {
        let name = file_name(local);
        if local.exists() {
            let size = tokio::fs::metadata(local).await.map(|m| m.len()).unwrap_or(0);
            tracing::debug!(file = %name, "asset already cached");
            progress(FileProgress {
                file: name,
                loaded: size,
                total: Some(size),
            });
        } else {
            download_file(&config.file_url(remote), local, &name, progress).await?;
            tracing::info!(file = %name, path = %local.display(), "asset downloaded");
        }
    }

    Ok(assets)
}

/// Stream a file to disk, reporting cumulative bytes. Uses atomic write (tmp + rename).
async fn download_file(
    url: &str,
    dest: &Path,
    name: &str,
    progress: &mut dyn FnMut(FileProgress),
) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download of {name} failed with HTTP {}",
        response.status()
    );

    let total = response.content_length();
    progress(FileProgress {
        file: name.to_string(),
        loaded: 0,
        total,
    });

    let tmp_path = dest.with_extension("tmp");
    let written = write_body(&mut response, &tmp_path, name, total, progress).await;
    let loaded = match written {
        Ok(loaded) => loaded,
        Err(e) => {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }
    };

    if total.is_none() {
        // Length was unknown; announce completion explicitly.
        progress(FileProgress {
            file: name.to_string(),
            loaded,
            total: Some(loaded),
        });
    }

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    Ok(())
}

/// Stream the response body into `tmp_path`, returning the byte count.
/// Fails if the body is shorter or longer than the announced length.
async fn write_body(
    response: &mut reqwest::Response,
    tmp_path: &Path,
    name: &str,
    total: Option<u64>,
    progress: &mut dyn FnMut(FileProgress),
) -> Result<u64> {
    let mut file = tokio::fs::File::create(tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    let mut loaded = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .with_context(|| format!("error reading response for {name}"))?
    {
        file.write_all(&chunk)
            .await
            .context("error writing to file")?;
        loaded += chunk.len() as u64;
        progress(FileProgress {
            file: name.to_string(),
            loaded,
            total,
        });
    }
    file.flush().await?;

    if let Some(expected) = total {
        anyhow::ensure!(
            loaded == expected,
            "download of {name} truncated: got {loaded} of {expected} bytes"
        );
    }
    Ok(loaded)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
