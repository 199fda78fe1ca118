//! Extractor stage: describe each object, persist its field help texts and
//! stream its recent records to disk.

use log::{error, info, warn};
use std::path::{Path, PathBuf};

use super::fs::{prepare_output_directory, write_stream_to_file};
use super::soql;
use super::BatchReport;
use crate::api::{Connection, FieldDescriptor, FieldHelpMap};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// What was extracted for one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedObject {
    /// Fields returned by describe
    pub fields: usize,
    /// Fields selected in the bulk query
    pub queried_fields: usize,
    pub metadata_file: PathBuf,
    /// `None` when there was nothing to query
    pub record_file: Option<PathBuf>,
    pub bytes_written: u64,
}

/// Split, trim and de-duplicate a comma separated object list
pub fn normalize_object_names<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.iter().flat_map(|s| s.as_ref().split(',')) {
        let name = name.trim();
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Run the extractor over `objects`, one object at a time.
///
/// Both output directories are reset first. A failure on one object is
/// logged and recorded, and the next object is processed regardless.
pub async fn extract<C>(
    connection: &C,
    config: &PipelineConfig,
    objects: &[String],
) -> Result<BatchReport<ExtractedObject>>
where
    C: Connection + ?Sized,
{
    prepare_output_directory(&config.field_descriptions_path).await?;
    prepare_output_directory(&config.records_path).await?;

    let mut batch = BatchReport::default();

    for object in objects {
        info!("Dumping data for {}...", object);

        let result = extract_object(connection, config, object).await;
        match &result {
            Ok(extracted) => info!(
                "Finished {}: {} fields, {} bytes of records",
                object, extracted.fields, extracted.bytes_written
            ),
            Err(e) => error!("{}", e),
        }
        batch.push(object.as_str(), result);
    }

    info!(
        "Data dump complete: {} of {} objects succeeded",
        batch.len() - batch.failure_count(),
        batch.len()
    );
    Ok(batch)
}

async fn extract_object<C>(connection: &C, config: &PipelineConfig, object: &str) -> Result<ExtractedObject>
where
    C: Connection + ?Sized,
{
    if !soql::is_valid_object_name(object) {
        return Err(PipelineError::Config(format!("'{}' is not a valid object name", object)));
    }

    // A failed describe still leaves an empty mapping behind
    let (fields, describe_error) = match connection.describe(object).await {
        Ok(fields) => (fields, None),
        Err(e) => {
            warn!("Error fetching fields for {}: {}", object, e);
            (Vec::new(), Some(e))
        }
    };

    let metadata_file = config.field_description_file(object);
    write_field_descriptions(&metadata_file, &fields).await?;

    if let Some(e) = describe_error {
        return Err(e);
    }

    let mut extracted = ExtractedObject {
        fields: fields.len(),
        queried_fields: 0,
        metadata_file,
        record_file: None,
        bytes_written: 0,
    };

    let queryable = soql::queryable_fields(&fields);
    if queryable.is_empty() {
        info!("No queryable fields for {}, skipping records", object);
        return Ok(extracted);
    }
    if queryable.len() < fields.len() {
        info!(
            "Leaving {} compound or binary fields of {} out of the bulk query",
            fields.len() - queryable.len(),
            object
        );
    }

    let query = soql::records_created_within(object, &queryable, config.created_within_years);
    let records = connection.bulk_query(object, &query).await?;

    let record_file = config.record_file(object);
    extracted.bytes_written = write_stream_to_file(records, &record_file).await?;
    extracted.queried_fields = queryable.len();
    extracted.record_file = Some(record_file);

    Ok(extracted)
}

async fn write_field_descriptions(path: &Path, fields: &[FieldDescriptor]) -> Result<()> {
    let json = serde_json::to_vec(&FieldHelpMap(fields))?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| PipelineError::io(path, e))
}
