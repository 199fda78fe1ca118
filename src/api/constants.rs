//! API constants for the Salesforce SOAP login and REST/Bulk 2.0 endpoints

/// SOAP partner login path, followed by the API version
pub const SOAP_LOGIN_PATH: &str = "/services/Soap/u";

/// REST data path, followed by `v<version>`
pub const DATA_PATH: &str = "/services/data";

/// Bulk API 2.0 result pagination header
pub const LOCATOR_HEADER: &str = "Sforce-Locator";

/// Value of [`LOCATOR_HEADER`] on the last result page
pub const LAST_PAGE_LOCATOR: &str = "null";

pub const USER_AGENT: &str = concat!("sf-field-report/", env!("CARGO_PKG_VERSION"));

pub mod headers {
    pub const CONTENT_TYPE_JSON: &str = "application/json";
    pub const CONTENT_TYPE_XML: &str = "text/xml; charset=UTF-8";
    pub const ACCEPT_CSV: &str = "text/csv";
    pub const SOAP_ACTION: &str = "SOAPAction";
}

/// Describe types the bulk query endpoint refuses to select
pub const BULK_UNSUPPORTED_TYPES: &[&str] = &["address", "location", "base64"];

/// Build the SOAP login endpoint URL
pub fn login_endpoint(login_url: &str, api_version: &str) -> String {
    format!("{}{}/{}", login_url.trim_end_matches('/'), SOAP_LOGIN_PATH, api_version)
}

/// Build the REST data base URL for an instance
pub fn data_base(instance_url: &str, api_version: &str) -> String {
    format!("{}{}/v{}", instance_url.trim_end_matches('/'), DATA_PATH, api_version)
}

/// Build the describe endpoint URL for an object
pub fn describe_endpoint(instance_url: &str, api_version: &str, object: &str) -> String {
    format!("{}/sobjects/{}/describe", data_base(instance_url, api_version), object)
}

/// Build the Bulk API 2.0 query job collection URL
pub fn query_jobs_endpoint(instance_url: &str, api_version: &str) -> String {
    format!("{}/jobs/query", data_base(instance_url, api_version))
}

/// Build the Bulk API 2.0 URL for a single query job
pub fn query_job_endpoint(instance_url: &str, api_version: &str, job_id: &str) -> String {
    format!("{}/{}", query_jobs_endpoint(instance_url, api_version), job_id)
}

/// Build the Bulk API 2.0 results URL for a query job
pub fn query_results_endpoint(instance_url: &str, api_version: &str, job_id: &str) -> String {
    format!("{}/results", query_job_endpoint(instance_url, api_version, job_id))
}
