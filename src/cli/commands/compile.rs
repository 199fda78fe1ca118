//! Compile command handler

use anyhow::{Context, Result};
use colored::*;

use super::print_batch;
use crate::cli::app::CompileCommands;
use crate::config::PipelineConfig;
use crate::pipeline::{StageOutcome, compile_spreadsheet};

pub async fn compile_command(args: CompileCommands, config: &PipelineConfig) -> Result<()> {
    run_compile(args.no_descriptions, config).await
}

pub(crate) async fn run_compile(no_descriptions: bool, config: &PipelineConfig) -> Result<()> {
    println!("📒 Compiling reports from {}", config.reports_path.display().to_string().cyan());

    let descriptions = (!no_descriptions).then_some(config.field_descriptions_path.as_path());
    let outcome = compile_spreadsheet(config, descriptions)
        .await
        .context("Failed to compile spreadsheet")?;

    match outcome {
        StageOutcome::Skipped(reason) => {
            println!("⚠️  {}", reason.to_string().yellow());
            Ok(())
        }
        StageOutcome::Completed(workbook) => {
            let printed = print_batch(
                &workbook.sheets,
                |sheet| format!("sheet '{}' with {} fields", sheet.sheet_name, sheet.rows.len()),
                "reports",
            );
            match &workbook.path {
                Some(path) => println!("📄 Spreadsheet generated: {}", path.display().to_string().green()),
                None => println!("⚠️  {}", "No spreadsheet written".yellow()),
            }
            printed
        }
    }
}
