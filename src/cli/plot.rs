//! CLI `plot` command: one full pipeline run for the given texts.

use anyhow::Result;

use embedding_explorer::config::ExplorerConfig;
use embedding_explorer::embedding::hub::HubModelSource;
use embedding_explorer::error::PipelineError;
use embedding_explorer::pipeline::Session;

use super::{print_points, ProgressView};

/// Load the model, embed `texts`, project them, and print the coordinates.
pub async fn plot(config: &ExplorerConfig, texts: Vec<String>, json: bool) -> Result<()> {
    let min_inputs = config.inputs.effective_min_inputs();
    anyhow::ensure!(
        texts.len() >= min_inputs,
        "need at least {min_inputs} texts, got {}",
        texts.len()
    );
    anyhow::ensure!(
        texts.iter().all(|t| !t.trim().is_empty()),
        "texts must not be blank"
    );

    let mut session = Session::start(HubModelSource::new(config.model.clone()), &config.inputs)?;
    let outcome = generate_once(&mut session, texts).await;
    let state = session.orchestrator().render_state();
    session.shutdown().await;

    if let Err(e) = outcome {
        if !e.is_user_facing() {
            tracing::error!(error = %e, "pipeline contract violated");
        }
        return Err(e.into());
    }
    if let Some(error) = &state.error {
        anyhow::bail!("{error}");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_points(&state);
    }
    Ok(())
}

/// Wait for the model, then generate once for `texts`.
async fn generate_once(session: &mut Session, texts: Vec<String>) -> Result<(), PipelineError> {
    let mut view = ProgressView::new();
    session
        .settle_with(|o| view.update(o.load_progress()))
        .await?;
    view.finish();

    if session.orchestrator().model_ready() {
        let orchestrator = session.orchestrator_mut();
        orchestrator.set_inputs(texts)?;
        orchestrator.request_generation()?;
        session.settle().await?;
    }
    Ok(())
}
