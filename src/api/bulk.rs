//! Bulk API 2.0 query jobs
//!
//! A query runs as a server-side job: create it, poll until it completes,
//! then download the CSV result in pages chained by the `Sforce-Locator`
//! header. Pages are exposed as one continuous byte stream with the repeated
//! header rows of later pages removed.

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, future, stream};
use log::{debug, info, warn};
use std::time::Instant;

use super::client::{SalesforceClient, error_text};
use super::constants::{self, LAST_PAGE_LOCATOR, LOCATOR_HEADER, headers};
use super::models::{CreateQueryJob, JobInfo, JobState};
use super::RecordStream;
use crate::error::{PipelineError, Result};

enum PageCursor {
    First,
    Next(String),
    Done,
}

impl SalesforceClient {
    pub(crate) async fn create_query_job(&self, object: &str, soql: &str) -> Result<JobInfo> {
        let url = constants::query_jobs_endpoint(self.instance_url(), &self.api_version);
        debug!("Creating bulk query job for {}: {}", object, soql);

        let response = self
            .authorized(self.http.post(&url))
            .json(&CreateQueryJob::csv(soql))
            .send()
            .await
            .map_err(|e| PipelineError::query_stream(object, e))?;

        if !response.status().is_success() {
            let message = error_text(response).await;
            return Err(PipelineError::query_stream(object, message));
        }

        let job: JobInfo = response
            .json()
            .await
            .map_err(|e| PipelineError::query_stream(object, format!("Invalid job response: {}", e)))?;

        info!("Created bulk query job {} for {}", job.id, object);
        Ok(job)
    }

    pub(crate) async fn job_info(&self, object: &str, job_id: &str) -> Result<JobInfo> {
        let url = constants::query_job_endpoint(self.instance_url(), &self.api_version, job_id);

        let response = self
            .authorized(self.http.get(&url))
            .send()
            .await
            .map_err(|e| PipelineError::query_stream(object, e))?;

        if !response.status().is_success() {
            let message = error_text(response).await;
            return Err(PipelineError::query_stream(object, message));
        }

        response
            .json()
            .await
            .map_err(|e| PipelineError::query_stream(object, format!("Invalid job response: {}", e)))
    }

    /// Poll a job every `poll.interval` until it completes, fails or `poll.timeout` passes
    pub(crate) async fn wait_for_job(&self, object: &str, mut job: JobInfo) -> Result<JobInfo> {
        let started = Instant::now();

        loop {
            debug!("Bulk job {} for {} is {:?}", job.id, object, job.state);

            if job.state.is_terminal() {
                if job.state != JobState::JobComplete {
                    let reason = job.error_message.clone().unwrap_or_else(|| "no error message".into());
                    return Err(PipelineError::query_stream(
                        object,
                        format!("Bulk job {} ended as {:?}: {}", job.id, job.state, reason),
                    ));
                }

                info!(
                    "Bulk job {} for {} completed ({} records)",
                    job.id,
                    object,
                    job.number_records_processed.unwrap_or_default()
                );
                return Ok(job);
            }

            if started.elapsed() >= self.poll.timeout {
                warn!("Bulk job {} for {} did not finish in time", job.id, object);
                return Err(PipelineError::query_stream(
                    object,
                    format!(
                        "Polling timed out after {}ms waiting for job {}",
                        self.poll.timeout.as_millis(),
                        job.id
                    ),
                ));
            }

            tokio::time::sleep(self.poll.interval).await;
            job = self.job_info(object, &job.id).await?;
        }
    }

    /// Stream all result pages of a completed job as one CSV document
    pub(crate) fn result_pages(&self, object: &str, job_id: &str) -> RecordStream {
        let page = ResultPage {
            http: self.http.clone(),
            url: constants::query_results_endpoint(self.instance_url(), &self.api_version, job_id),
            token: self.session.session_id.clone(),
            page_size: self.result_page_size,
            object: object.to_string(),
        };

        stream::try_unfold(PageCursor::First, move |cursor| {
            let page = page.clone();
            async move { page.fetch(cursor).await }
        })
        .try_flatten()
        .boxed()
    }
}

/// Everything needed to request one result page, owned so the stream is `'static`
#[derive(Clone)]
struct ResultPage {
    http: reqwest::Client,
    url: String,
    token: String,
    page_size: Option<u32>,
    object: String,
}

impl ResultPage {
    async fn fetch(self, cursor: PageCursor) -> Result<Option<(RecordStream, PageCursor)>> {
        let locator = match cursor {
            PageCursor::Done => return Ok(None),
            PageCursor::First => None,
            PageCursor::Next(locator) => Some(locator),
        };

        let mut request = self
            .http
            .get(&self.url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, headers::ACCEPT_CSV);
        if let Some(locator) = &locator {
            request = request.query(&[("locator", locator)]);
        }
        if let Some(size) = self.page_size {
            request = request.query(&[("maxRecords", size)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::query_stream(&self.object, e))?;

        if !response.status().is_success() {
            let message = error_text(response).await;
            return Err(PipelineError::query_stream(&self.object, message));
        }

        let next = next_cursor(
            response
                .headers()
                .get(LOCATOR_HEADER)
                .and_then(|v| v.to_str().ok()),
        );
        debug!(
            "Fetched result page for {} (more pages: {})",
            self.object,
            matches!(next, PageCursor::Next(_))
        );

        let object = self.object;
        let body: RecordStream = response
            .bytes_stream()
            .map_err(move |e| PipelineError::query_stream(&object, e))
            .boxed();

        // Every page repeats the CSV header
        let body = if locator.is_some() { skip_header_line(body) } else { body };
        Ok(Some((body, next)))
    }
}

fn next_cursor(locator: Option<&str>) -> PageCursor {
    match locator {
        Some(l) if !l.is_empty() && l != LAST_PAGE_LOCATOR => PageCursor::Next(l.to_string()),
        _ => PageCursor::Done,
    }
}

/// Drop everything up to and including the first line feed
pub(crate) fn skip_header_line(body: RecordStream) -> RecordStream {
    body.scan(false, |header_done, chunk| {
        let item = match chunk {
            Ok(bytes) if !*header_done => match bytes.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    *header_done = true;
                    Ok(bytes.slice(pos + 1..))
                }
                None => Ok(Bytes::new()),
            },
            other => other,
        };
        future::ready(Some(item))
    })
    .try_filter(|bytes| future::ready(!bytes.is_empty()))
    .boxed()
}
