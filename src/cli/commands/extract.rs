//! Extract command handler

use anyhow::{Context, Result};
use colored::*;
use std::time::Instant;

use super::{format_bytes, print_batch};
use crate::api::{self, LoginSettings};
use crate::cli::app::{CredentialArgs, ExtractCommands};
use crate::config::PipelineConfig;
use crate::pipeline::BatchReport;
use crate::pipeline::extract::{ExtractedObject, extract, normalize_object_names};

pub async fn extract_command(args: ExtractCommands, config: &PipelineConfig) -> Result<()> {
    let batch = run_extract(&args.credentials, config).await?;
    summarize_extract(&batch)
}

/// Log in and extract every object. Only login and setup problems are errors here;
/// per-object failures are in the returned batch.
pub(crate) async fn run_extract(
    credentials: &CredentialArgs,
    config: &PipelineConfig,
) -> Result<BatchReport<ExtractedObject>> {
    let objects = normalize_object_names(&credentials.objects);
    if objects.is_empty() {
        anyhow::bail!("No objects given, pass a comma-separated list with --objects");
    }

    println!("🔐 Logging in to {}...", credentials.url.cyan());
    let connection = api::login(
        &credentials.username,
        &credentials.login_password(),
        &credentials.url,
        LoginSettings::from(config),
    )
    .await
    .context("Login failed")?;

    println!("📥 Dumping data for {} objects: {}", objects.len(), objects.join(", ").dimmed());
    let started = Instant::now();

    let batch = extract(&connection, config, &objects)
        .await
        .context("Failed to prepare extract output directories")?;

    println!("⏱️  Extract finished in {:.1}s", started.elapsed().as_secs_f64());
    Ok(batch)
}

pub(crate) fn summarize_extract(batch: &BatchReport<ExtractedObject>) -> Result<()> {
    print_batch(
        batch,
        |object| match &object.record_file {
            Some(_) => format!(
                "{} fields, {} queried, {} written",
                object.fields,
                object.queried_fields,
                format_bytes(object.bytes_written)
            ),
            None => format!("{} fields, no records queried", object.fields),
        },
        "objects",
    )
}
