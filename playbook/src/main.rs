//! Playbook - run a declarative step pipeline from the command line.

use anyhow::Result;
use clap::Parser;
use playbook::actions::{ActionRegistry, ExternalClients};
use playbook::config::EngineConfig;
use playbook::events::LoggingEventSink;
use playbook::runner::PipelineRunner;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Run a YAML or JSON playbook.
#[derive(Parser, Debug)]
#[command(name = "playbook")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Playbook document to run
    path: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Where to write progress snapshots
    #[arg(long, env = "PLAYBOOK_PROGRESS_FILE")]
    progress_file: Option<PathBuf>,

    /// Write a progress snapshot every N steps (0 disables)
    #[arg(long, env = "PLAYBOOK_CHECKPOINT_EVERY")]
    checkpoint_every: Option<usize>,

    /// Do not load a .env file from the working directory
    #[arg(long)]
    no_dotenv: bool,

    /// Emit JSON log lines
    #[arg(long)]
    json: bool,
}

fn init_tracing(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let dotenv = if cli.no_dotenv {
        None
    } else {
        Some(dotenvy::dotenv())
    };
    init_tracing(cli.verbose, cli.json);
    match dotenv {
        Some(Ok(path)) => debug!(path = %path.display(), "Loaded .env"),
        Some(Err(e)) if !e.not_found() => warn!(error = %e, "Could not load .env"),
        _ => {}
    }

    let environment: HashMap<String, String> = std::env::vars().collect();
    let mut config = EngineConfig::from_vars(&environment);
    if let Some(path) = cli.progress_file {
        config = config.with_progress_file(path);
    }
    if let Some(every) = cli.checkpoint_every {
        config = config.with_checkpoint_every(every);
    }

    let registry = ActionRegistry::with_clients(ExternalClients::from_env(&environment));
    let mut runner = PipelineRunner::new(registry)
        .with_config(config)
        .with_event_sink(Arc::new(LoggingEventSink::debug()));

    let token = runner.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            token.cancel("interrupted");
        }
    });

    match runner.run_file(&cli.path, environment).await {
        Ok(summary) => {
            println!("{summary}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
