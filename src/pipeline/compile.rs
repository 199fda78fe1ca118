//! Compiler stage: fold the per-object reports into one workbook with a
//! worksheet per object.

use csv::ReaderBuilder;
use log::{error, info, warn};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::fs::{list_files, prepare_output_directory};
use super::report::FieldStat;
use super::{BatchReport, StageOutcome, object_name};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

pub const WORKSHEET_HEADER: [&str; 5] = [
    "Field",
    "Total Records",
    "Populated Records",
    "Utilization Percentage",
    "Description",
];

const WIDE_COLUMN_WIDTH: f64 = 50.0;
const NARROW_COLUMN_WIDTH: f64 = 35.0;
const MAX_SHEET_NAME_LEN: usize = 31;
const INVALID_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// One line of an object worksheet
#[derive(Debug, Clone, PartialEq)]
pub struct WorksheetRow {
    pub field: String,
    pub total: u64,
    pub populated: u64,
    pub utilization_percentage: f64,
    pub description: String,
}

/// Worksheet added for one report
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSheet {
    pub object: String,
    pub sheet_name: String,
    pub rows: Vec<WorksheetRow>,
}

#[derive(Debug)]
pub struct CompiledWorkbook {
    /// `None` when no report could be turned into a worksheet
    pub path: Option<PathBuf>,
    pub sheets: BatchReport<CompiledSheet>,
}

/// `populated / total * 100` rounded to two decimals, `0` when there are no records
pub fn utilization_percentage(total: u64, populated: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let percentage = populated as f64 / total as f64 * 100.0;
    (percentage * 100.0).round() / 100.0
}

/// Parse a report CSV back into stats
pub fn read_report(path: &Path, content: &str) -> Result<Vec<FieldStat>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut stats = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| PipelineError::parse(path, e))?;
        // +2 for header + 0-index
        let number = |column: usize, name: &str| -> Result<u64> {
            let raw = record.get(column).unwrap_or("").trim();
            raw.parse().map_err(|_| {
                PipelineError::parse(path, format!("line {}: invalid {} '{}'", line + 2, name, raw))
            })
        };

        stats.push(FieldStat {
            field: record.get(0).unwrap_or("").to_string(),
            total: number(1, "total")?,
            populated: number(2, "populated")?,
        });
    }
    Ok(stats)
}

/// Load `fieldName -> helpText` for an object.
///
/// Missing or unreadable files give an empty map; fields without help text are left out.
pub async fn load_field_descriptions(path: &Path) -> HashMap<String, String> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!("Failed to read field descriptions {}: {}", path.display(), e);
            return HashMap::new();
        }
    };

    match serde_json::from_str::<HashMap<String, Option<String>>>(&content) {
        Ok(map) => map
            .into_iter()
            .filter_map(|(field, text)| text.map(|t| (field, t)))
            .collect(),
        Err(e) => {
            warn!("Ignoring malformed field descriptions {}: {}", path.display(), e);
            HashMap::new()
        }
    }
}

/// Join stats with descriptions and compute utilization
pub fn worksheet_rows(stats: &[FieldStat], descriptions: &HashMap<String, String>) -> Vec<WorksheetRow> {
    stats
        .iter()
        .map(|stat| WorksheetRow {
            field: stat.field.clone(),
            total: stat.total,
            populated: stat.populated,
            utilization_percentage: utilization_percentage(stat.total, stat.populated),
            description: descriptions.get(&stat.field).cloned().unwrap_or_default(),
        })
        .collect()
}

/// Hands out valid, unique worksheet names
#[derive(Debug, Default)]
pub struct SheetNamer {
    used: HashSet<String>,
}

impl SheetNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, object: &str) -> String {
        let base = sanitize_sheet_name(object);
        let mut candidate = base.clone();
        let mut n = 1;

        while self.used.contains(&candidate.to_lowercase()) {
            n += 1;
            let suffix = format!("~{}", n);
            candidate = format!("{}{}", truncate_chars(&base, MAX_SHEET_NAME_LEN - suffix.len()), suffix);
        }

        self.used.insert(candidate.to_lowercase());
        candidate
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Excel sheet names: at most 31 chars, none of `[]:*?/\`, no surrounding apostrophes
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if INVALID_SHEET_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let cleaned = truncate_chars(cleaned.trim_matches('\''), MAX_SHEET_NAME_LEN);

    if cleaned.is_empty() {
        "Sheet".to_string()
    } else if cleaned.eq_ignore_ascii_case("history") {
        // Reserved by Excel
        format!("{}_", cleaned)
    } else {
        cleaned
    }
}

fn build_worksheet(sheet_name: &str, rows: &[WorksheetRow]) -> Result<Worksheet> {
    let header_format = Format::new().set_bold();
    let percentage_format = Format::new().set_num_format("0.00");

    let mut worksheet = Worksheet::new();
    worksheet.set_name(sheet_name)?;

    for (col, header) in WORKSHEET_HEADER.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        worksheet.write_string(r, 0, &row.field)?;
        worksheet.write_number(r, 1, row.total as f64)?;
        worksheet.write_number(r, 2, row.populated as f64)?;
        worksheet.write_number_with_format(r, 3, row.utilization_percentage, &percentage_format)?;
        if !row.description.is_empty() {
            worksheet.write_string(r, 4, &row.description)?;
        }
    }

    for col in 0..WORKSHEET_HEADER.len() as u16 {
        let width = if col == 0 || col == 4 { WIDE_COLUMN_WIDTH } else { NARROW_COLUMN_WIDTH };
        worksheet.set_column_width(col, width)?;
    }

    Ok(worksheet)
}

async fn compile_sheet(
    report: &Path,
    descriptions_dir: Option<&Path>,
    namer: &mut SheetNamer,
) -> Result<(CompiledSheet, Worksheet)> {
    let object = object_name(report);
    let content = tokio::fs::read_to_string(report)
        .await
        .map_err(|e| PipelineError::io(report, e))?;
    let stats = read_report(report, &content)?;

    let descriptions = match descriptions_dir {
        Some(dir) => load_field_descriptions(&dir.join(format!("{}.json", object))).await,
        None => HashMap::new(),
    };

    let rows = worksheet_rows(&stats, &descriptions);
    let sheet_name = namer.assign(&object);
    let worksheet = build_worksheet(&sheet_name, &rows)?;

    Ok((
        CompiledSheet {
            object,
            sheet_name,
            rows,
        },
        worksheet,
    ))
}

/// Build the workbook from every `*.csv` in the reports directory.
///
/// `field_descriptions` is the extractor's metadata directory; pass `None`
/// to leave the description column empty.
pub async fn compile_spreadsheet(
    config: &PipelineConfig,
    field_descriptions: Option<&Path>,
) -> Result<StageOutcome<CompiledWorkbook>> {
    prepare_output_directory(&config.spreadsheet_path).await?;

    let reports = list_files(&config.reports_path, Some("csv")).await?;
    if reports.is_empty() {
        warn!("No reports found in {}", config.reports_path.display());
        return Ok(StageOutcome::Skipped(PipelineError::EmptyDirectory(
            config.reports_path.clone(),
        )));
    }

    let mut workbook = Workbook::new();
    let mut namer = SheetNamer::new();
    let mut sheets = BatchReport::default();

    for report in &reports {
        let item = object_name(report);
        match compile_sheet(report, field_descriptions, &mut namer).await {
            Ok((sheet, worksheet)) => {
                info!("Added worksheet '{}' ({} fields)", sheet.sheet_name, sheet.rows.len());
                workbook.push_worksheet(worksheet);
                sheets.push(item, Ok(sheet));
            }
            Err(e) => {
                error!("Skipping report {}: {}", report.display(), e);
                sheets.push(item, Err(e));
            }
        }
    }

    if sheets.succeeded().next().is_none() {
        warn!("No worksheet could be built, not writing a workbook");
        return Ok(StageOutcome::Completed(CompiledWorkbook { path: None, sheets }));
    }

    let path = config.spreadsheet_file();
    workbook.save(&path)?;
    info!("Spreadsheet generated: {}", path.display());

    Ok(StageOutcome::Completed(CompiledWorkbook {
        path: Some(path),
        sheets,
    }))
}
