use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ExplorerConfig {
    pub logging: LoggingConfig,
    pub model: ModelConfig,
    pub inputs: InputsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of a Hugging Face compatible file host.
    pub endpoint: String,
    pub repo: String,
    pub revision: String,
    /// Path of the ONNX export inside the repo.
    pub onnx_file: String,
    pub tokenizer_file: String,
    pub cache_dir: String,
    pub max_seq_len: usize,
    pub intra_threads: usize,
}

/// Fewest inputs a projection is defined for.
pub const MIN_INPUTS_FLOOR: usize = 3;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputsConfig {
    /// Fewest inputs a generation may be requested for; also the floor for removal.
    pub min_inputs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let cache_dir = default_explorer_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            endpoint: "https://huggingface.co".into(),
            repo: "sentence-transformers/all-MiniLM-L6-v2".into(),
            revision: "main".into(),
            onnx_file: "onnx/model.onnx".into(),
            tokenizer_file: "tokenizer.json".into(),
            cache_dir,
            max_seq_len: 256,
            intra_threads: 4,
        }
    }
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            min_inputs: MIN_INPUTS_FLOOR,
        }
    }
}

impl InputsConfig {
    /// `min_inputs`, raised to the floor below which generation is never allowed.
    pub fn effective_min_inputs(&self) -> usize {
        self.min_inputs.max(MIN_INPUTS_FLOOR)
    }
}

/// Returns `~/.embedding-explorer/`
pub fn default_explorer_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".embedding-explorer")
}

/// Returns the default config file path: `~/.embedding-explorer/config.toml`
pub fn default_config_path() -> PathBuf {
    default_explorer_dir().join("config.toml")
}

impl ExplorerConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            ExplorerConfig::default()
        };

        config.apply_env_overrides();
        if config.inputs.min_inputs < MIN_INPUTS_FLOOR {
            warn!(
                configured = config.inputs.min_inputs,
                floor = MIN_INPUTS_FLOOR,
                "inputs.min_inputs below the floor, raising it"
            );
            config.inputs.min_inputs = MIN_INPUTS_FLOOR;
        }
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (EXPLORER_LOG_LEVEL, EXPLORER_CACHE_DIR, EXPLORER_MODEL_REPO).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("EXPLORER_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("EXPLORER_CACHE_DIR") {
            self.model.cache_dir = val;
        }
        if let Ok(val) = std::env::var("EXPLORER_MODEL_REPO") {
            self.model.repo = val;
        }
    }
}

impl ModelConfig {
    /// Directory holding this repo's cached assets, e.g.
    /// `~/.embedding-explorer/models/sentence-transformers--all-MiniLM-L6-v2`.
    pub fn model_dir(&self) -> PathBuf {
        expand_tilde(&self.cache_dir).join(self.repo.replace('/', "--"))
    }

    /// Download URL for a file inside the configured repo and revision.
    pub fn file_url(&self, file: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.repo,
            self.revision,
            file
        )
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
