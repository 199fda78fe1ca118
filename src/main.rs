use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::Path;
use std::process::ExitCode;

use salesforce_field_report::cli::{Cli, commands};
use salesforce_field_report::config::{DEFAULT_CONFIG_FILE, PipelineConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let logs_to_file = cli.log_file.is_some();

    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }
    info!("Starting sf-field-report");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            // The log is not on the terminal, so tell the operator directly
            if logs_to_file {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    commands::handle_command(cli.command, &config).await
}

/// Log to stderr, or to a file truncated on each run when `--log-file` is given
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_FILE) {
        warn!("{} not found, using default directory layout", DEFAULT_CONFIG_FILE);
        return Ok(PipelineConfig::with_root(Path::new(".")));
    }

    PipelineConfig::load(path).with_context(|| format!("Failed to load config: {}", path.display()))
}
