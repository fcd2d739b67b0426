pub mod explore;
pub mod plot;

use std::collections::HashMap;

use anyhow::Result;
use embedding_explorer::config::ModelConfig;
use embedding_explorer::embedding::{hub, FileProgress};
use embedding_explorer::pipeline::{LoadProgress, RenderState};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Download the ONNX embedding model and tokenizer to the cache directory.
pub async fn model_download(config: &ModelConfig) -> Result<()> {
    println!("Fetching {} into {}", config.repo, config.model_dir().display());

    let mut view = ProgressView::new();
    let assets = hub::fetch_assets(config, &mut |p: FileProgress| {
        view.set(&p.file, p.percent());
    })
    .await?;
    view.finish();

    println!("Model saved to {}", assets.model.display());
    println!("Tokenizer saved to {}", assets.tokenizer.display());
    println!("Model download complete. Ready for use.");
    Ok(())
}

/// One progress bar per model asset, in percent.
pub struct ProgressView {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
    style: ProgressStyle,
}

impl ProgressView {
    pub fn new() -> Self {
        let style = ProgressStyle::default_bar()
            .template("  {msg:<16} {bar:40.cyan/blue} {pos:>3}%")
            .expect("valid template")
            .progress_chars("##-");
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
            style,
        }
    }

    pub fn set(&mut self, file: &str, percent: f64) {
        let bar = self.bars.entry(file.to_string()).or_insert_with(|| {
            let pb = self.multi.add(ProgressBar::new(100));
            pb.set_style(self.style.clone());
            pb.set_message(file.to_string());
            pb
        });
        bar.set_position(percent.clamp(0.0, 100.0).round() as u64);
    }

    pub fn update(&mut self, items: &[LoadProgress]) {
        for item in items {
            self.set(&item.file, item.progress);
        }
    }

    pub fn finish(&mut self) {
        for (_, bar) in self.bars.drain() {
            bar.finish_and_clear();
        }
    }
}

impl Default for ProgressView {
    fn default() -> Self {
        Self::new()
    }
}

/// Print points as `label  d1  d2 [d3]`, one row per input.
pub fn print_points(state: &RenderState) {
    let Some(points) = &state.points else {
        println!("No points. Generate embeddings first.");
        return;
    };

    let width = state
        .labels
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .max(5);
    let dims = state.dimensions.unwrap_or(0);

    print!("{:<width$}", "Input");
    for d in 1..=dims {
        print!("  {:>11}", format!("Dimension {d}"));
    }
    println!();

    for (label, point) in state.labels.iter().zip(points) {
        print!("{label:<width$}");
        for value in point {
            print!("  {value:>11.4}");
        }
        println!();
    }
}
