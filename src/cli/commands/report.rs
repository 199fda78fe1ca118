//! Report command handler

use anyhow::{Context, Result};
use colored::*;
use std::time::Instant;

use super::print_batch;
use crate::config::PipelineConfig;
use crate::pipeline::{StageOutcome, generate_reports};

pub async fn report_command(config: &PipelineConfig) -> Result<()> {
    println!("📊 Generating reports from {}", config.records_path.display().to_string().cyan());
    let started = Instant::now();

    let outcome = generate_reports(config)
        .await
        .context("Failed to generate reports")?;

    match outcome {
        StageOutcome::Skipped(reason) => {
            println!("⚠️  {}", reason.to_string().yellow());
            Ok(())
        }
        StageOutcome::Completed(batch) => {
            println!("⏱️  Reports finished in {:.1}s", started.elapsed().as_secs_f64());
            print_batch(
                &batch,
                |report| format!("{} fields over {} records", report.stats.len(), report.rows),
                "reports",
            )
        }
    }
}
