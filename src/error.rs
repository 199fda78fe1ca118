use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while talking to Salesforce or moving files between stages.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Failed to describe {object}: {message}")]
    Describe { object: String, message: String },

    #[error("Error fetching records for {object}: {message}")]
    QueryStream { object: String, message: String },

    #[error("Error writing records to {}: {source}", .path.display())]
    WriteStream {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No files found in {}", .0.display())]
    EmptyDirectory(PathBuf),

    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Task failed: {0}")]
    Task(String),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn query_stream(object: &str, message: impl ToString) -> Self {
        Self::QueryStream {
            object: object.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
