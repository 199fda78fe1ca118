pub mod compile;
pub mod extract;
pub mod report;
pub mod run;

use anyhow::Result;
use colored::*;

use super::app::Commands;
use crate::config::PipelineConfig;
use crate::pipeline::BatchReport;

pub use compile::compile_command;
pub use extract::extract_command;
pub use report::report_command;
pub use run::run_command;

/// Dispatch a parsed command
pub async fn handle_command(command: Commands, config: &PipelineConfig) -> Result<()> {
    match command {
        Commands::Extract(args) => extract_command(args, config).await,
        Commands::Report => report_command(config).await,
        Commands::Compile(args) => compile_command(args, config).await,
        Commands::Run(args) => run_command(args, config).await,
    }
}

/// Print one line per item and fail when any item failed
pub(crate) fn print_batch<T>(
    batch: &BatchReport<T>,
    describe: impl Fn(&T) -> String,
    noun: &str,
) -> Result<()> {
    for outcome in &batch.outcomes {
        match &outcome.result {
            Ok(value) => println!("  ✅ {} {}", outcome.item.cyan(), describe(value).dimmed()),
            Err(e) => println!("  ❌ {} {}", outcome.item.cyan(), e.to_string().red()),
        }
    }

    let failed = batch.failure_count();
    if failed > 0 {
        anyhow::bail!("{} of {} {} failed", failed, batch.len(), noun);
    }
    Ok(())
}

/// Human readable byte count
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
