use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use selfup_completion::HttpCompletionClient;
use selfup_engine::{CancellationFlag, CycleReport, Orchestrator};
use selfup_store::{default_project_root, ManifestLoadPolicy, ProjectLayout};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod render;

use config::{layered_env, read_config_file, read_dotenv_file, resolve_completion_settings};
use render::{format_error_lines, format_report_lines, ProgressClient, TerminalRenderer};

const LOG_ENV: &str = "SELFUP_LOG";

#[derive(Parser, Debug)]
#[command(name = "selfup")]
#[command(
    about = "Upgrade the next file listed in the project's upgrade plan",
    long_about = None
)]
struct Cli {
    /// Project root holding src/plan/manifest.json. Defaults to the current directory.
    #[arg(long)]
    project_root: Option<PathBuf>,
    /// Fail instead of treating an unparseable manifest as empty.
    #[arg(long)]
    strict_manifest: bool,
}

impl Cli {
    fn load_policy(&self) -> ManifestLoadPolicy {
        if self.strict_manifest {
            ManifestLoadPolicy::Strict
        } else {
            ManifestLoadPolicy::Lenient
        }
    }
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let renderer = TerminalRenderer::current();
    match run(&cli, renderer) {
        Ok(report) => {
            renderer.print_lines(&format_report_lines(&report, renderer.style()));
            ExitCode::SUCCESS
        }
        Err(err) => {
            renderer.eprint_lines(&format_error_lines(&err, renderer.style()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, renderer: TerminalRenderer) -> Result<CycleReport> {
    let root = match cli.project_root.clone() {
        Some(root) => root,
        None => default_project_root().context("failed resolving current directory")?,
    };
    let layout = ProjectLayout::new(root);

    let file = read_config_file(&layout.config_path())?;
    let dotenv = read_dotenv_file(&layout.dotenv_path())?;
    let settings =
        resolve_completion_settings(&file, layered_env(|key| std::env::var(key).ok(), &dotenv))?;
    let client = HttpCompletionClient::new(settings)?;

    let orchestrator = Orchestrator::new(
        layout,
        cli.load_policy(),
        ProgressClient::new(client, renderer),
    );

    renderer.print_section("selfup");
    let report = orchestrator.run_cycle(&CancellationFlag::new())?;
    Ok(report)
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests;
