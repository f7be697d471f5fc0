mod compose;
mod config;
mod env;
mod error;

use anyhow::{Context, Result};
use clap::Parser;
use compose::{CommandRunner, ComposeCommand, ProcessRunner};
use config::ProjectPaths;
use env::Environment;
use error::StackError;
use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Start the docker compose stack described by backend/application.yaml
#[derive(Parser, Debug)]
#[command(name = "stack-up")]
#[command(version)]
#[command(about = "Start docker compose based on backend/application.yaml", long_about = None)]
struct Cli {
    /// Print the docker compose commands without running them
    #[arg(long)]
    dry_run: bool,

    /// Use the debug backend build and enable debug logging
    #[arg(long)]
    debug: bool,

    /// Build images before starting containers
    #[arg(long)]
    build: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.debug);

    match start(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<StackError>()
                .map(StackError::exit_code)
                .unwrap_or(1);
            eprintln!("error: {e}");
            ExitCode::from(u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1))
        }
    }
}

// Logs go to stderr; stdout is reserved for --dry-run output.
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}

async fn start(cli: &Cli) -> Result<()> {
    let start_dir = std::env::current_dir().context("cannot determine current directory")?;
    let root = config::find_project_root(&start_dir);
    let runner = ProcessRunner { cwd: root.clone() };
    run(cli, &root, &config::resolve_docker_binary(), &runner).await
}

async fn run<R: CommandRunner>(cli: &Cli, root: &Path, docker_bin: &str, runner: &R) -> Result<()> {
    let paths = ProjectPaths::new(root);
    tracing::debug!("project root: {}", paths.root.display());

    // Nothing is derived until the config has loaded.
    let cfg = config::load_config(&paths.app_config)?;

    let mut environment = Environment::inherit();
    env::inject_from_config(&mut environment, &cfg);
    env::set_build_profile(&mut environment, cli.debug);
    env::log_environment(&environment);

    let profiles = config::select_language_profiles(&cfg);
    if profiles.is_empty() {
        tracing::info!("no language profiles enabled");
    } else {
        tracing::info!("enabled profiles: {}", profiles.join(", "));
    }

    let compose = ComposeCommand::new(docker_bin, &profiles, &paths.compose_file);

    if cli.dry_run {
        for line in compose::dry_run_lines(&compose, cli.build) {
            println!("{line}");
        }
        return Ok(());
    }

    compose::bring_up(runner, &compose, &environment, cli.build).await?;
    Ok(())
}
