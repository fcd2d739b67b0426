//! CLI `explore` command: a line-oriented interactive session.
//!
//! Worker messages are handled while waiting for input, so the prompt stays
//! responsive during model download and inference.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use embedding_explorer::config::ExplorerConfig;
use embedding_explorer::embedding::hub::HubModelSource;
use embedding_explorer::error::PipelineError;
use embedding_explorer::pipeline::{Orchestrator, PipelinePhase, Session};

use super::{print_points, ProgressView};

#[derive(Debug, PartialEq)]
enum Command {
    List,
    Set(usize, String),
    Add(Option<String>),
    Remove(usize),
    Generate,
    Retry,
    Show,
    Json,
    Help,
    Quit,
}

/// Parse one input line. Input numbers are 1-based on screen.
fn parse_command(line: &str) -> Result<Command, String> {
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let index = |arg: &str| -> Result<usize, String> {
        match arg.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n - 1),
            _ => Err(format!("expected an input number, got '{arg}'")),
        }
    };

    match word {
        "list" | "ls" => Ok(Command::List),
        "set" => {
            let (n, text) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: set N TEXT".to_string())?;
            Ok(Command::Set(index(n)?, text.trim().to_string()))
        }
        "add" if rest.is_empty() => Ok(Command::Add(None)),
        "add" => Ok(Command::Add(Some(rest.to_string()))),
        "remove" | "rm" => Ok(Command::Remove(index(rest)?)),
        "generate" | "gen" => Ok(Command::Generate),
        "retry" => Ok(Command::Retry),
        "show" => Ok(Command::Show),
        "json" => Ok(Command::Json),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("unknown command '{other}', try 'help'")),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  list                 show the current inputs");
    println!("  set N TEXT           replace input N");
    println!("  add [TEXT]           append an input");
    println!("  remove N             remove input N");
    println!("  generate             embed and project the inputs");
    println!("  retry                retry after a failure");
    println!("  show | json          print the current points");
    println!("  quit");
}

fn print_inputs(orchestrator: &Orchestrator) {
    for (i, input) in orchestrator.inputs().iter().enumerate() {
        let shown = if input.is_empty() { "(empty)" } else { input };
        println!("  {}. {shown}", i + 1);
    }
}

/// Apply one command. Returns `false` when the session should end.
fn execute(orchestrator: &mut Orchestrator, command: Command) -> Result<bool, PipelineError> {
    match command {
        Command::List => print_inputs(orchestrator),
        Command::Set(i, text) => {
            orchestrator.set_input(i, text)?;
            print_inputs(orchestrator);
        }
        Command::Add(text) => {
            orchestrator.add_input()?;
            if let Some(text) = text {
                let last = orchestrator.inputs().len() - 1;
                orchestrator.set_input(last, text)?;
            }
            print_inputs(orchestrator);
        }
        Command::Remove(i) => {
            orchestrator.remove_input(i)?;
            print_inputs(orchestrator);
        }
        Command::Generate => orchestrator.request_generation()?,
        Command::Retry => orchestrator.retry()?,
        Command::Show => print_points(&orchestrator.render_state()),
        Command::Json => match serde_json::to_string_pretty(&orchestrator.render_state()) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!(error = %e, "failed to serialize render state"),
        },
        Command::Help => print_help(),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

/// Describe a phase change to the user.
fn report(orchestrator: &Orchestrator) {
    match orchestrator.phase() {
        PipelinePhase::Idle if orchestrator.points().is_some() => {
            print_points(&orchestrator.render_state());
        }
        PipelinePhase::Idle => println!(
            "Model ready. Fill in at least {} inputs, then 'generate'.",
            orchestrator.min_inputs()
        ),
        PipelinePhase::Failed => {
            if let Some(error) = orchestrator.error_message() {
                println!("Error: {error}");
            }
            println!("Edit the inputs or 'retry'.");
        }
        PipelinePhase::ModelLoading => println!("Loading model..."),
        PipelinePhase::Generating => println!("Generating..."),
    }
}

pub async fn explore(config: &ExplorerConfig) -> Result<()> {
    let mut session = Session::start(HubModelSource::new(config.model.clone()), &config.inputs)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut view = ProgressView::new();

    print_help();
    report(session.orchestrator());

    loop {
        tokio::select! {
            message = session.next_message() => {
                let before = session.phase();
                match session.apply(message) {
                    Ok(()) => {}
                    Err(PipelineError::WorkerDisconnected) => {
                        println!("Inference worker stopped.");
                        break;
                    }
                    Err(e) if e.is_user_facing() => println!("Error: {e}"),
                    Err(e) => {
                        tracing::error!(error = %e, "pipeline contract violated");
                        println!("Something went wrong; edit the inputs and generate again.");
                    }
                }
                view.update(session.orchestrator().load_progress());
                if session.phase() != before {
                    view.finish();
                    report(session.orchestrator());
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let command = match parse_command(line) {
                    Ok(command) => command,
                    Err(message) => {
                        println!("{message}");
                        continue;
                    }
                };
                let before = session.phase();
                match execute(session.orchestrator_mut(), command) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("{e}"),
                }
                if session.phase() != before {
                    report(session.orchestrator());
                }
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_editing_commands() {
        assert_eq!(parse_command("set 2 hot dog"), Ok(Command::Set(1, "hot dog".into())));
        assert_eq!(parse_command("add"), Ok(Command::Add(None)));
        assert_eq!(parse_command("add airplane"), Ok(Command::Add(Some("airplane".into()))));
        assert_eq!(parse_command("rm 4"), Ok(Command::Remove(3)));
    }

    #[test]
    fn parses_pipeline_commands() {
        assert_eq!(parse_command("gen"), Ok(Command::Generate));
        assert_eq!(parse_command("retry"), Ok(Command::Retry));
        assert_eq!(parse_command("q"), Ok(Command::Quit));
    }

    #[test]
    fn rejects_bad_input_numbers() {
        assert!(parse_command("set 0 cat").is_err());
        assert!(parse_command("remove x").is_err());
        assert!(parse_command("set 1").is_err());
        assert!(parse_command("fly").is_err());
    }
}
