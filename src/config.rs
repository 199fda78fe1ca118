use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::error::{PipelineError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_SPREADSHEET_FILE: &str = "Salesforce_Report.xlsx";

/// Raw shape of `config.json`. Keys are camelCase so existing config files keep working.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default = "default_records_path")]
    records_path: PathBuf,
    #[serde(default = "default_reports_path")]
    reports_path: PathBuf,
    #[serde(default = "default_spreadsheet_path")]
    spreadsheet_path: PathBuf,
    #[serde(default = "default_field_descriptions_path")]
    field_descriptions_path: PathBuf,
    #[serde(default = "default_poll_timeout")]
    poll_timeout: u64,
    #[serde(default = "default_poll_interval")]
    poll_interval: u64,
    #[serde(default = "default_api_version")]
    api_version: String,
    #[serde(default = "default_created_within_years")]
    created_within_years: u32,
    #[serde(default = "default_spreadsheet_file_name")]
    spreadsheet_file_name: String,
    #[serde(default)]
    result_page_size: Option<u32>,
}

fn default_records_path() -> PathBuf {
    PathBuf::from("records")
}

fn default_reports_path() -> PathBuf {
    PathBuf::from("reports")
}

fn default_spreadsheet_path() -> PathBuf {
    PathBuf::from("spreadsheet")
}

fn default_field_descriptions_path() -> PathBuf {
    PathBuf::from("fieldDescriptions")
}

fn default_poll_timeout() -> u64 {
    60_000
}

fn default_poll_interval() -> u64 {
    1_000
}

fn default_api_version() -> String {
    "59.0".to_string()
}

fn default_created_within_years() -> u32 {
    2
}

fn default_spreadsheet_file_name() -> String {
    DEFAULT_SPREADSHEET_FILE.to_string()
}

/// Bulk query polling settings handed to the Salesforce client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(default_poll_interval()),
            timeout: Duration::from_millis(default_poll_timeout()),
        }
    }
}

/// Process-wide pipeline configuration.
///
/// Loaded once at startup and passed by reference to every stage. All paths
/// are absolute (or relative to the working directory when the config came
/// from [`PipelineConfig::with_root`]).
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub records_path: PathBuf,
    pub reports_path: PathBuf,
    pub spreadsheet_path: PathBuf,
    pub field_descriptions_path: PathBuf,
    pub poll: PollSettings,
    pub api_version: String,
    pub created_within_years: u32,
    pub spreadsheet_file_name: String,
    pub result_page_size: Option<u32>,
}

impl PipelineConfig {
    /// Load the config file, resolving relative paths against its directory
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", path);

        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let config = Self::from_json(&content, root)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse config JSON, resolving relative paths against `root`
    pub fn from_json(content: &str, root: &Path) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))?;

        let config = Self {
            records_path: root.join(file.records_path),
            reports_path: root.join(file.reports_path),
            spreadsheet_path: root.join(file.spreadsheet_path),
            field_descriptions_path: root.join(file.field_descriptions_path),
            poll: PollSettings {
                interval: Duration::from_millis(file.poll_interval),
                timeout: Duration::from_millis(file.poll_timeout),
            },
            api_version: file.api_version,
            created_within_years: file.created_within_years,
            spreadsheet_file_name: file.spreadsheet_file_name,
            result_page_size: file.result_page_size,
        };

        config.validate(root)?;
        Ok(config)
    }

    /// Default layout rooted at `root`, used when no config file is present
    pub fn with_root(root: &Path) -> Self {
        Self {
            records_path: root.join(default_records_path()),
            reports_path: root.join(default_reports_path()),
            spreadsheet_path: root.join(default_spreadsheet_path()),
            field_descriptions_path: root.join(default_field_descriptions_path()),
            poll: PollSettings::default(),
            api_version: default_api_version(),
            created_within_years: default_created_within_years(),
            spreadsheet_file_name: default_spreadsheet_file_name(),
            result_page_size: None,
        }
    }

    fn validate(&self, root: &Path) -> Result<()> {
        if self.poll.interval.is_zero() {
            return Err(PipelineError::Config("pollInterval must be greater than zero".into()));
        }
        if self.poll.timeout < self.poll.interval {
            return Err(PipelineError::Config(
                "pollTimeout must not be shorter than pollInterval".into(),
            ));
        }
        if self.created_within_years == 0 {
            return Err(PipelineError::Config("createdWithinYears must be at least 1".into()));
        }
        if !self.spreadsheet_file_name.ends_with(".xlsx") {
            return Err(PipelineError::Config("spreadsheetFileName must end with .xlsx".into()));
        }
        if self.result_page_size == Some(0) {
            return Err(PipelineError::Config("resultPageSize must be greater than zero".into()));
        }
        self.check_output_directories(root)
    }

    /// Each stage clears its output directory before writing, so no output
    /// directory may contain another one or the config directory.
    fn check_output_directories(&self, root: &Path) -> Result<()> {
        let root = normalize(root);
        let outputs = [
            ("recordsPath", normalize(&self.records_path)),
            ("reportsPath", normalize(&self.reports_path)),
            ("spreadsheetPath", normalize(&self.spreadsheet_path)),
            ("fieldDescriptionsPath", normalize(&self.field_descriptions_path)),
        ];

        for (i, (name, path)) in outputs.iter().enumerate() {
            if root.starts_with(path) {
                return Err(PipelineError::Config(format!(
                    "{} ({}) would contain the config directory {}",
                    name,
                    path.display(),
                    root.display()
                )));
            }

            for (other_name, other) in &outputs[i + 1..] {
                if path.starts_with(other) || other.starts_with(path) {
                    return Err(PipelineError::Config(format!(
                        "{} ({}) and {} ({}) must be separate directories",
                        name,
                        path.display(),
                        other_name,
                        other.display()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Full path of the compiled workbook
    pub fn spreadsheet_file(&self) -> PathBuf {
        self.spreadsheet_path.join(&self.spreadsheet_file_name)
    }

    /// `<recordsPath>/<object>.csv`
    pub fn record_file(&self, object: &str) -> PathBuf {
        self.records_path.join(format!("{}.csv", object))
    }

    /// `<fieldDescriptionsPath>/<object>.json`
    pub fn field_description_file(&self, object: &str) -> PathBuf {
        self.field_descriptions_path.join(format!("{}.json", object))
    }
}

/// Absolute form of `path` with `.` and `..` resolved lexically
fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
