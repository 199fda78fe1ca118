//! The three pipeline stages and the file layout they share.
//!
//! Stages never hand data to each other in memory: the extractor writes
//! `<recordsPath>/<Object>.csv` and `<fieldDescriptionsPath>/<Object>.json`,
//! the reporter turns record files into `<reportsPath>/<Object>.csv`, and the
//! compiler folds the reports into one workbook.

pub mod compile;
pub mod extract;
pub mod fs;
pub mod report;
pub mod soql;

use crate::error::PipelineError;

pub use compile::{CompiledSheet, CompiledWorkbook, WorksheetRow, compile_spreadsheet, utilization_percentage};
pub use extract::{ExtractedObject, extract};
pub use report::{FieldCounter, FieldStat, ObjectReport, generate_reports};

/// Result for one object or file of a stage run
#[derive(Debug)]
pub struct ItemOutcome<T> {
    pub item: String,
    pub result: Result<T, PipelineError>,
}

/// Per-item results of a stage run, in processing order
#[derive(Debug)]
pub struct BatchReport<T> {
    pub outcomes: Vec<ItemOutcome<T>>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self { outcomes: Vec::new() }
    }
}

impl<T> BatchReport<T> {
    pub fn push(&mut self, item: impl Into<String>, result: Result<T, PipelineError>) {
        self.outcomes.push(ItemOutcome {
            item: item.into(),
            result,
        });
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &T)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|v| (o.item.as_str(), v)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &PipelineError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.item.as_str(), e)))
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    pub fn get(&self, item: &str) -> Option<&Result<T, PipelineError>> {
        self.outcomes.iter().find(|o| o.item == item).map(|o| &o.result)
    }
}

/// How a stage run ended
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// Nothing to do, e.g. the input directory was empty
    Skipped(PipelineError),
    Completed(T),
}

impl<T> StageOutcome<T> {
    pub fn completed(&self) -> Option<&T> {
        match self {
            StageOutcome::Completed(value) => Some(value),
            StageOutcome::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageOutcome::Skipped(_))
    }
}

/// Object name derived from a stage file, i.e. the file stem
pub(crate) fn object_name(path: &std::path::Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
