//! coins-setup - prepare the Python environment and generate coin configs
//!
//! Running `coins-setup` with no arguments:
//!
//! 1. creates `venv` if it does not exist yet
//! 2. checks `utils/requirements.txt` exists, then upgrades pip inside
//!    the environment
//! 3. installs `utils/requirements.txt`
//! 4. runs `utils/generate_app_configs.py` with the environment's Python
//!
//! Exits 0 when the generator succeeds and 1 on any failure.

use anyhow::Result;
use clap::Parser;
use coins_setup::{
    init_tracing, Orchestrator, RunReport, SetupConfig, SetupError, TokioCommandRunner,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{warn, Level};
use venv_manager::{is_python_available, IsolatedEnvironment, DEFAULT_HOST_PYTHON};

#[derive(Parser)]
#[command(name = "coins-setup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Set up the Python environment and run the coin config generator",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Project root containing `utils/`
    #[arg(long, env = "COINS_SETUP_ROOT", default_value = ".")]
    root: PathBuf,

    /// Host Python used to create the environment
    #[arg(long, env = "COINS_SETUP_PYTHON", default_value = DEFAULT_HOST_PYTHON)]
    python: String,

    /// Per-step timeout in seconds (0 disables)
    #[arg(long, env = "COINS_SETUP_STEP_TIMEOUT", default_value_t = 0)]
    step_timeout: u64,

    /// Write a JSON run report to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> SetupConfig {
        SetupConfig::new(&self.root)
            .with_host_python(&self.python)
            .with_step_timeout(self.step_timeout)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.config();

    let env = IsolatedEnvironment::new(config.venv_under(&config.root));
    if !env.root().exists() && !host_python_responds(&config.host_python).await {
        warn!(
            python = %config.host_python,
            "Host interpreter does not respond to --version; environment creation will likely fail"
        );
    }

    let orchestrator = Orchestrator::new(config, TokioCommandRunner::new());
    let mut report = RunReport::new(&cli.root);
    let outcome = orchestrator.run_with_report(&mut report).await;

    // The run's own error decides the exit, not a failed report write.
    if let Some(path) = &cli.report {
        if let Err(e) = report.write_json(path) {
            warn!(path = %path.display(), error = %e, "Failed to write run report");
        }
    }

    outcome?;
    Ok(())
}

/// Probe the host interpreter off the async runtime.
async fn host_python_responds(program: &str) -> bool {
    let program = program.to_string();
    tokio::task::spawn_blocking(move || is_python_available(&program))
        .await
        .unwrap_or(false)
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    let code = err
        .downcast_ref::<SetupError>()
        .map(SetupError::exit_code)
        .unwrap_or(1);
    u8::try_from(code).unwrap_or(1)
}
