use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::constants::BULK_UNSUPPORTED_TYPES;

/// One field from an object's describe result
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(default)]
    pub inline_help_text: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, inline_help_text: Option<&str>) -> Self {
        Self {
            name: name.into(),
            inline_help_text: inline_help_text.map(|s| s.to_string()),
            field_type: None,
        }
    }

    pub fn with_type(mut self, field_type: &str) -> Self {
        self.field_type = Some(field_type.to_string());
        self
    }

    /// Whether the bulk query endpoint accepts this field in a SELECT list
    pub fn is_bulk_queryable(&self) -> bool {
        match &self.field_type {
            Some(t) => !BULK_UNSUPPORTED_TYPES.contains(&t.as_str()),
            None => true,
        }
    }
}

/// Subset of the sObject describe response we need
#[derive(Debug, Deserialize)]
pub struct DescribeResponse {
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

/// `fieldName -> helpText` mapping persisted per object.
///
/// Serializes as a JSON object in describe order.
#[derive(Debug, Clone, Copy)]
pub struct FieldHelpMap<'a>(pub &'a [FieldDescriptor]);

impl Serialize for FieldHelpMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in self.0 {
            map.serialize_entry(&field.name, &field.inline_help_text)?;
        }
        map.end()
    }
}

/// Bulk API 2.0 query job states
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum JobState {
    Open,
    UploadComplete,
    InProgress,
    JobComplete,
    Failed,
    Aborted,
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::JobComplete | JobState::Failed | JobState::Aborted)
    }
}

/// Bulk API 2.0 query job info
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub id: String,
    pub state: JobState,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub number_records_processed: Option<u64>,
}

/// Request body for creating a query job
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueryJob<'a> {
    pub operation: &'static str,
    pub query: &'a str,
    pub content_type: &'static str,
    pub column_delimiter: &'static str,
    pub line_ending: &'static str,
}

impl<'a> CreateQueryJob<'a> {
    pub fn csv(query: &'a str) -> Self {
        Self {
            operation: "query",
            query,
            content_type: "CSV",
            column_delimiter: "COMMA",
            line_ending: "LF",
        }
    }
}

/// Authenticated session returned by the SOAP login call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub instance_url: String,
    pub user_id: Option<String>,
}
