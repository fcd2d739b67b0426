mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use embedding_explorer::config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "embedding-explorer",
    version,
    about = "Embed text snippets locally and project them to 2D/3D"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Embed the given texts and print their projected coordinates
    Plot {
        /// Texts to embed (at least three)
        #[arg(required = true, num_args = 1..)]
        texts: Vec<String>,
        /// Print the full render state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive session: edit inputs and regenerate without reloading the model
    Explore,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.embedding-explorer/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::ExplorerConfig::load()?;

    // Log to stderr so stdout only carries plot data.
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Plot { texts, json } => {
            cli::plot::plot(&config, texts, json).await?;
        }
        Command::Explore => {
            cli::explore::explore(&config).await?;
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.model).await?;
            }
        },
    }

    Ok(())
}
