use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;

use super::auth::LoginSettings;
use super::constants::{self, USER_AGENT};
use super::models::{DescribeResponse, FieldDescriptor, Session};
use super::{Connection, RecordStream};
use crate::config::PollSettings;
use crate::error::{PipelineError, Result};

/// Authenticated Salesforce REST/Bulk client
pub struct SalesforceClient {
    pub(crate) http: Client,
    pub(crate) session: Session,
    pub(crate) api_version: String,
    pub(crate) poll: PollSettings,
    pub(crate) result_page_size: Option<u32>,
}

impl SalesforceClient {
    pub fn new(http: Client, session: Session, settings: LoginSettings) -> Self {
        Self {
            http,
            session,
            api_version: settings.api_version,
            poll: settings.poll,
            result_page_size: settings.result_page_size,
        }
    }

    /// HTTP client shared by login and the data calls.
    ///
    /// No overall request timeout: result pages can take minutes to download.
    pub(crate) fn build_http_client() -> Result<Client> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(client)
    }

    pub(crate) fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.session.session_id)
    }

    pub(crate) fn instance_url(&self) -> &str {
        &self.session.instance_url
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Turn a REST error body into a readable message
pub(crate) fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<Vec<ApiError>>(body) {
        Ok(errors) if !errors.is_empty() => errors
            .iter()
            .map(|e| match (&e.error_code, &e.message) {
                (Some(code), Some(message)) => format!("{}: {}", code, message),
                (Some(code), None) => code.clone(),
                (None, Some(message)) => message.clone(),
                (None, None) => "unknown error".to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        _ => body.trim().to_string(),
    }
}

/// Read the error body of a failed response
pub(crate) async fn error_text(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if body.trim().is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, api_error_message(&body))
    }
}

#[async_trait]
impl Connection for SalesforceClient {
    async fn describe(&self, object: &str) -> Result<Vec<FieldDescriptor>> {
        let url = constants::describe_endpoint(self.instance_url(), &self.api_version, object);
        debug!("Describing {} via {}", object, url);

        let describe_error = |message: String| PipelineError::Describe {
            object: object.to_string(),
            message,
        };

        let response = self
            .authorized(self.http.get(&url))
            .header(reqwest::header::ACCEPT, constants::headers::CONTENT_TYPE_JSON)
            .send()
            .await
            .map_err(|e| describe_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(describe_error(error_text(response).await));
        }

        let describe: DescribeResponse = response
            .json()
            .await
            .map_err(|e| describe_error(format!("Invalid describe response: {}", e)))?;

        info!("Described {}: {} fields", object, describe.fields.len());
        Ok(describe.fields)
    }

    async fn bulk_query(&self, object: &str, soql: &str) -> Result<RecordStream> {
        let job = self.create_query_job(object, soql).await?;
        let job = self.wait_for_job(object, job).await?;
        Ok(self.result_pages(object, &job.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_message() {
        let body = r#"[{"message":"The requested resource does not exist","errorCode":"NOT_FOUND"}]"#;
        assert_eq!(
            api_error_message(body),
            "NOT_FOUND: The requested resource does not exist"
        );

        assert_eq!(api_error_message("  Service Unavailable \n"), "Service Unavailable");
        assert_eq!(api_error_message("[]"), "[]");
    }
}
