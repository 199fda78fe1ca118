use log::{debug, info};
use reqwest::Url;
use roxmltree::Document;

use super::client::SalesforceClient;
use super::constants::{self, headers};
use super::models::Session;
use crate::config::{PipelineConfig, PollSettings};
use crate::error::{PipelineError, Result};

/// Settings the client needs beyond the credentials
#[derive(Debug, Clone)]
pub struct LoginSettings {
    pub api_version: String,
    pub poll: PollSettings,
    pub result_page_size: Option<u32>,
}

impl From<&PipelineConfig> for LoginSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            api_version: config.api_version.clone(),
            poll: config.poll,
            result_page_size: config.result_page_size,
        }
    }
}

/// Log in with the SOAP partner API and return a ready client.
///
/// `password` must already carry the security token when the org requires one.
pub async fn login(
    username: &str,
    password: &str,
    login_url: &str,
    settings: LoginSettings,
) -> Result<SalesforceClient> {
    let http = SalesforceClient::build_http_client()?;
    let endpoint = constants::login_endpoint(login_url, &settings.api_version);

    info!("Authenticating to {} as {}", login_url, username);

    let response = http
        .post(&endpoint)
        .header(reqwest::header::CONTENT_TYPE, headers::CONTENT_TYPE_XML)
        .header(headers::SOAP_ACTION, "login")
        .body(login_envelope(username, password))
        .send()
        .await
        .map_err(|e| PipelineError::Authentication(format!("Login request failed: {}", e)))?;

    let status = response.status();
    debug!("Login response status: {}", status);

    let body = response
        .text()
        .await
        .map_err(|e| PipelineError::Authentication(format!("Failed to read login response: {}", e)))?;

    // Faults come back as HTTP 500 with a SOAP body, so parse before checking the status
    let session = parse_login_response(&body)?;
    if !status.is_success() {
        return Err(PipelineError::Authentication(format!("Login returned HTTP {}", status)));
    }

    match &session.user_id {
        Some(user_id) => info!("Successfully authenticated as {} against {}", user_id, session.instance_url),
        None => info!("Successfully authenticated against {}", session.instance_url),
    }
    Ok(SalesforceClient::new(http, session, settings))
}

fn login_envelope(username: &str, password: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
            r#"xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">"#,
            r#"<env:Body><n1:login xmlns:n1="urn:partner.soap.sforce.com">"#,
            r#"<n1:username>{}</n1:username><n1:password>{}</n1:password>"#,
            r#"</n1:login></env:Body></env:Envelope>"#
        ),
        escape_xml(username),
        escape_xml(password)
    )
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Extract the session from a SOAP login response, or the fault message
fn parse_login_response(body: &str) -> Result<Session> {
    let doc = Document::parse(body)
        .map_err(|e| PipelineError::Authentication(format!("Failed to parse login response: {}", e)))?;

    let text_of = |tag: &str| {
        doc.descendants()
            .find(|n| n.tag_name().name() == tag)
            .and_then(|n| n.text())
            .map(|t| t.trim().to_string())
    };

    if let Some(fault) = text_of("faultstring") {
        return Err(PipelineError::Authentication(fault));
    }

    let session_id = text_of("sessionId")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PipelineError::Authentication("No sessionId in login response".into()))?;

    let server_url = text_of("serverUrl")
        .ok_or_else(|| PipelineError::Authentication("No serverUrl in login response".into()))?;

    let url = Url::parse(&server_url)
        .map_err(|e| PipelineError::Authentication(format!("Invalid serverUrl '{}': {}", server_url, e)))?;

    Ok(Session {
        session_id,
        instance_url: url.origin().ascii_serialization(),
        user_id: text_of("userId"),
    })
}
