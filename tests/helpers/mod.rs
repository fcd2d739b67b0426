#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use embedding_explorer::embedding::{l2_normalize, Encoder, FileProgress, ModelSource};
use embedding_explorer::worker::WorkerMessage;
use tokio::sync::mpsc::UnboundedReceiver;

/// Width of the fake embeddings.
pub const FAKE_DIM: usize = 32;

/// One scripted asset: the cumulative byte counts reported, in order.
#[derive(Debug, Clone)]
pub struct FakeFile {
    pub name: String,
    pub size: u64,
    pub steps: Vec<u64>,
}

impl FakeFile {
    pub fn new(name: &str, size: u64) -> Self {
        Self {
            name: name.to_string(),
            size,
            steps: vec![0, size / 2, size],
        }
    }
}

/// Deterministic in-process model source. Never touches the network.
#[derive(Debug, Clone)]
pub struct FakeSource {
    pub files: Vec<FakeFile>,
    /// How many upcoming acquisitions fail halfway through the first file.
    pub failing_loads: Arc<AtomicUsize>,
    /// How many upcoming acquisitions panic before reporting any progress.
    pub panicking_loads: Arc<AtomicUsize>,
    /// Total acquisitions attempted.
    pub loads: Arc<AtomicUsize>,
    /// Any batch containing this text fails inside the encoder.
    pub poison: Option<String>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            files: vec![
                FakeFile::new("model.onnx", 1000),
                FakeFile::new("tokenizer.json", 200),
            ],
            failing_loads: Arc::new(AtomicUsize::new(0)),
            panicking_loads: Arc::new(AtomicUsize::new(0)),
            loads: Arc::new(AtomicUsize::new(0)),
            poison: None,
        }
    }

    pub fn failing_first(n: usize) -> Self {
        let source = Self::new();
        source.failing_loads.store(n, Ordering::SeqCst);
        source
    }

    pub fn panicking_first(n: usize) -> Self {
        let source = Self::new();
        source.panicking_loads.store(n, Ordering::SeqCst);
        source
    }

    pub fn poisoned(text: &str) -> Self {
        Self {
            poison: Some(text.to_string()),
            ..Self::new()
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelSource for FakeSource {
    type Encoder = FakeEncoder;

    async fn acquire(&self, progress: &mut dyn FnMut(FileProgress)) -> Result<FakeEncoder> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self
            .panicking_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            panic!("model file is corrupt");
        }
        let fail = self
            .failing_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        for file in &self.files {
            for &loaded in &file.steps {
                if fail && loaded > file.size / 2 {
                    anyhow::bail!("network error while downloading {}", file.name);
                }
                progress(FileProgress {
                    file: file.name.clone(),
                    loaded,
                    total: Some(file.size),
                });
            }
        }

        Ok(FakeEncoder {
            poison: self.poison.clone(),
        })
    }
}

pub struct FakeEncoder {
    poison: Option<String>,
}

impl Encoder for FakeEncoder {
    fn encode(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| {
                if self.poison.as_deref() == Some(*text) {
                    anyhow::bail!("encoder failed on {text:?}");
                }
                Ok(fake_embedding(text))
            })
            .collect()
    }
}

/// Bag-of-bytes vector, L2-normalized. Texts sharing letters point in similar directions.
pub fn fake_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; FAKE_DIM];
    for (i, b) in text.bytes().enumerate() {
        v[(b as usize * 31 + i * 7) % FAKE_DIM] += 1.0 + i as f32 * 0.1;
    }
    l2_normalize(&v)
}

/// Receive the next worker message, failing the test instead of hanging.
pub async fn next_message(rx: &mut UnboundedReceiver<WorkerMessage>) -> WorkerMessage {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for worker message")
        .expect("worker channel closed")
}

/// Unit basis vector `e_i` of width `dim`.
pub fn basis(i: usize, dim: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dim];
    v[i] = 1.0;
    v
}

pub fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
