//! Reporter stage: count populated values per field in every record file
//! and write one `Field,Total Records,Populated Records` CSV per object.

use csv::{ReaderBuilder, StringRecord, Writer};
use futures::future::join_all;
use log::{error, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::fs::{list_files, prepare_output_directory};
use super::{BatchReport, StageOutcome, object_name};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

pub const REPORT_HEADER: [&str; 3] = ["Field", "Total Records", "Populated Records"];

/// Population counts for one field. `populated <= total` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldStat {
    pub field: String,
    pub total: u64,
    pub populated: u64,
}

/// Streaming per-field tally, ordered by first sighting of each field
#[derive(Debug, Default)]
pub struct FieldCounter {
    stats: Vec<FieldStat>,
    index: HashMap<String, usize>,
}

impl FieldCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one cell. Missing and empty values are not populated.
    pub fn observe(&mut self, field: &str, value: Option<&str>) {
        let slot = match self.index.get(field) {
            Some(&slot) => slot,
            None => {
                self.stats.push(FieldStat {
                    field: field.to_string(),
                    total: 0,
                    populated: 0,
                });
                self.index.insert(field.to_string(), self.stats.len() - 1);
                self.stats.len() - 1
            }
        };

        let stat = &mut self.stats[slot];
        stat.total += 1;
        if value.is_some_and(|v| !v.is_empty()) {
            stat.populated += 1;
        }
    }

    /// Count every column present in a parsed row.
    ///
    /// Cells past the end of the header are counted under `_<index>`.
    /// Returns how many such cells the row had.
    pub fn observe_record(&mut self, headers: &StringRecord, record: &StringRecord) -> usize {
        let mut extra = 0;
        for (i, value) in record.iter().enumerate() {
            match headers.get(i) {
                Some(field) => self.observe(field, Some(value)),
                None => {
                    self.observe(&format!("_{}", i), Some(value));
                    extra += 1;
                }
            }
        }
        extra
    }

    pub fn stats(&self) -> &[FieldStat] {
        &self.stats
    }

    pub fn into_stats(self) -> Vec<FieldStat> {
        self.stats
    }
}

/// Report written for one record file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReport {
    pub object: String,
    pub path: PathBuf,
    pub rows: u64,
    pub stats: Vec<FieldStat>,
}

/// Stream a record file through a [`FieldCounter`]. Returns the stats and the row count.
pub fn count_record_file(path: &Path) -> Result<(Vec<FieldStat>, u64)> {
    let file = std::fs::File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::parse(path, e))?
        .clone();

    let mut counter = FieldCounter::new();
    let mut record = StringRecord::new();
    let mut rows = 0u64;
    let mut wide_rows = 0u64;

    while reader
        .read_record(&mut record)
        .map_err(|e| PipelineError::parse(path, e))?
    {
        if counter.observe_record(&headers, &record) > 0 {
            wide_rows += 1;
        }
        rows += 1;
    }

    if wide_rows > 0 {
        warn!(
            "{}: {} rows have more cells than the header, extra cells counted as _<index> columns",
            path.display(),
            wide_rows
        );
    }

    Ok((counter.into_stats(), rows))
}

/// Write stats as a report CSV
pub fn write_report(path: &Path, stats: &[FieldStat]) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(REPORT_HEADER)?;
    for stat in stats {
        let total = stat.total.to_string();
        let populated = stat.populated.to_string();
        writer.write_record([stat.field.as_str(), total.as_str(), populated.as_str()])?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

fn build_report(record_file: &Path, reports_dir: &Path) -> Result<ObjectReport> {
    let object = object_name(record_file);
    let (stats, rows) = count_record_file(record_file)?;

    let path = reports_dir.join(format!("{}.csv", object));
    write_report(&path, &stats)?;

    Ok(ObjectReport {
        object,
        path,
        rows,
        stats,
    })
}

/// Generate a report for every file in the records directory.
///
/// Files are processed concurrently. A file that fails to parse or write is
/// recorded as failed without affecting the others.
pub async fn generate_reports(config: &PipelineConfig) -> Result<StageOutcome<BatchReport<ObjectReport>>> {
    prepare_output_directory(&config.reports_path).await?;

    let files = list_files(&config.records_path, None).await?;
    if files.is_empty() {
        warn!("No records found in {}", config.records_path.display());
        return Ok(StageOutcome::Skipped(PipelineError::EmptyDirectory(
            config.records_path.clone(),
        )));
    }

    let tasks = files.into_iter().map(|file| {
        let reports_dir = config.reports_path.clone();
        async move {
            let item = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let result = tokio::task::spawn_blocking(move || build_report(&file, &reports_dir))
                .await
                .unwrap_or_else(|e| Err(PipelineError::Task(e.to_string())));

            match &result {
                Ok(report) => info!(
                    "CSV report generated for {}: {}",
                    item,
                    report.path.display()
                ),
                Err(e) => error!("Error generating CSV report for {}: {}", item, e),
            }
            (item, result)
        }
    });

    let mut batch = BatchReport::default();
    for (item, result) in join_all(tasks).await {
        batch.push(item, result);
    }

    if batch.has_failures() {
        warn!(
            "{} of {} reports failed",
            batch.failure_count(),
            batch.len()
        );
    } else {
        info!("All reports generated.");
    }

    Ok(StageOutcome::Completed(batch))
}
