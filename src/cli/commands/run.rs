//! Full pipeline: extract, report, compile

use anyhow::Result;
use colored::*;
use log::warn;

use super::compile::run_compile;
use super::extract::{run_extract, summarize_extract};
use super::report::report_command;
use crate::cli::app::RunCommands;
use crate::config::PipelineConfig;

/// Run all stages in order.
///
/// A failed login aborts the run. Per-object and per-file failures are
/// collected and reported at the end, after every stage had its turn.
pub async fn run_command(args: RunCommands, config: &PipelineConfig) -> Result<()> {
    let mut failures = Vec::new();

    let batch = run_extract(&args.credentials, config).await?;
    if let Err(e) = summarize_extract(&batch) {
        warn!("Extract stage finished with failures: {}", e);
        failures.push(format!("extract: {}", e));
    }

    println!();
    if let Err(e) = report_command(config).await {
        warn!("Report stage finished with failures: {}", e);
        failures.push(format!("report: {}", e));
    }

    println!();
    if let Err(e) = run_compile(args.no_descriptions, config).await {
        warn!("Compile stage finished with failures: {}", e);
        failures.push(format!("compile: {}", e));
    }

    if failures.is_empty() {
        println!("\n🎉 {}", "Pipeline complete".green().bold());
        Ok(())
    } else {
        anyhow::bail!("Pipeline finished with failures ({})", failures.join("; "))
    }
}
