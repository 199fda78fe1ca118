mod common;

use bytes::Bytes;
use common::{StubResponse, StubServer};
use futures::TryStreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use salesforce_field_report::PipelineError;
use salesforce_field_report::api::{Connection, LoginSettings, SalesforceClient, Session};
use salesforce_field_report::config::PollSettings;

const SOQL: &str = "SELECT Id,Name FROM Account WHERE CreatedDate = LAST_N_YEARS:2";
const JOBS: &str = "/services/data/v59.0/jobs/query";
const JOB: &str = "/services/data/v59.0/jobs/query/750R000000A";

fn client(server: &StubServer, poll_timeout: Duration, result_page_size: Option<u32>) -> SalesforceClient {
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    let session = Session {
        session_id: "00D000000000001!AQ0AQH".into(),
        instance_url: server.url.clone(),
        user_id: None,
    };
    let settings = LoginSettings {
        api_version: "59.0".into(),
        poll: PollSettings {
            interval: Duration::from_millis(10),
            timeout: poll_timeout,
        },
        result_page_size,
    };
    SalesforceClient::new(http, session, settings)
}

fn job(state: &str) -> StubResponse {
    StubResponse::json(&format!(r#"{{"id":"750R000000A","state":"{}"}}"#, state))
}

fn not_found() -> StubResponse {
    StubResponse::json(r#"[{"errorCode":"NOT_FOUND","message":"The requested resource does not exist"}]"#)
        .with_status(404)
}

async fn collect(client: &SalesforceClient) -> String {
    let stream = client.bulk_query("Account", SOQL).await.unwrap();
    let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
    chunks.iter().map(|c| String::from_utf8_lossy(c).into_owned()).collect()
}

#[tokio::test]
async fn test_polls_until_complete_then_chains_result_pages() {
    let polls = Arc::new(AtomicUsize::new(0));
    let counter = polls.clone();
    let server = StubServer::start(move |method, target| match (method, target) {
        ("POST", JOBS) => job("UploadComplete"),
        ("GET", JOB) => {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                job("InProgress")
            } else {
                job("JobComplete")
            }
        }
        ("GET", t) if t == format!("{}/results", JOB) => {
            StubResponse::csv("\"Id\",\"Name\"\n\"001\",\"Acme\"\n").with_header("Sforce-Locator", "MTAwMDA")
        }
        ("GET", t) if t == format!("{}/results?locator=MTAwMDA", JOB) => {
            StubResponse::csv("\"Id\",\"Name\"\n\"002\",\"Globex\"\n").with_header("Sforce-Locator", "null")
        }
        _ => not_found(),
    })
    .await;

    let body = collect(&client(&server, Duration::from_secs(5), None)).await;

    assert_eq!(body, "\"Id\",\"Name\"\n\"001\",\"Acme\"\n\"002\",\"Globex\"\n");
    assert_eq!(polls.load(Ordering::SeqCst), 2);
    assert_eq!(
        server.requests(),
        vec![
            format!("POST {}", JOBS),
            format!("GET {}", JOB),
            format!("GET {}", JOB),
            format!("GET {}/results", JOB),
            format!("GET {}/results?locator=MTAwMDA", JOB),
        ]
    );
}

#[tokio::test]
async fn test_page_size_is_sent_with_every_page() {
    let server = StubServer::start(|method, target| match (method, target) {
        ("POST", JOBS) => job("JobComplete"),
        ("GET", t) if t == format!("{}/results?maxRecords=1", JOB) => {
            StubResponse::csv("\"Id\"\n\"001\"\n").with_header("Sforce-Locator", "Mg")
        }
        ("GET", t) if t == format!("{}/results?locator=Mg&maxRecords=1", JOB) => {
            StubResponse::csv("\"Id\"\n\"002\"\n")
        }
        _ => not_found(),
    })
    .await;

    let body = collect(&client(&server, Duration::from_secs(5), Some(1))).await;

    // No locator header on the last page ends the chain
    assert_eq!(body, "\"Id\"\n\"001\"\n\"002\"\n");
}

#[tokio::test]
async fn test_failed_and_aborted_jobs_carry_the_job_message() {
    for state in ["Failed", "Aborted"] {
        let server = StubServer::start(move |method, target| match (method, target) {
            ("POST", JOBS) => job("UploadComplete"),
            ("GET", JOB) => StubResponse::json(&format!(
                r#"{{"id":"750R000000A","state":"{}","errorMessage":"INVALID_FIELD: No such column 'Foo__c'"}}"#,
                state
            )),
            _ => not_found(),
        })
        .await;

        let Err(err) = client(&server, Duration::from_secs(5), None).bulk_query("Account", SOQL).await else {
            panic!("{} job was accepted", state);
        };

        match err {
            PipelineError::QueryStream { object, message } => {
                assert_eq!(object, "Account");
                assert!(message.contains(state), "{}", message);
                assert!(message.contains("INVALID_FIELD: No such column 'Foo__c'"), "{}", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(server.requests().iter().all(|r| !r.contains("/results")));
    }
}

#[tokio::test]
async fn test_poll_timeout_is_query_stream_error() {
    let server = StubServer::start(|method, target| match (method, target) {
        ("POST", JOBS) => job("UploadComplete"),
        ("GET", JOB) => job("InProgress"),
        _ => not_found(),
    })
    .await;

    let Err(err) = client(&server, Duration::from_millis(60), None)
        .bulk_query("Account", SOQL)
        .await
    else {
        panic!("job that never finishes was accepted");
    };

    match err {
        PipelineError::QueryStream { message, .. } => assert!(message.contains("timed out"), "{}", message),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_query_reports_api_error() {
    let server = StubServer::start(|_, _| {
        StubResponse::json(r#"[{"errorCode":"INVALID_QUERY","message":"unexpected token: FROM"}]"#).with_status(400)
    })
    .await;

    let Err(err) = client(&server, Duration::from_secs(5), None)
        .bulk_query("Account", SOQL)
        .await
    else {
        panic!("rejected query was accepted");
    };

    assert!(matches!(err, PipelineError::QueryStream { .. }));
    assert!(err.to_string().contains("INVALID_QUERY: unexpected token: FROM"));
}

#[tokio::test]
async fn test_describe_reads_fields_and_maps_errors() {
    let server = StubServer::start(|method, target| match (method, target) {
        ("GET", "/services/data/v59.0/sobjects/Account/describe") => StubResponse::json(
            r#"{"name":"Account","fields":[
                {"name":"Id","inlineHelpText":null,"type":"id"},
                {"name":"Rating__c","inlineHelpText":"Customer rating","type":"picklist"}
            ]}"#,
        ),
        _ => not_found(),
    })
    .await;
    let client = client(&server, Duration::from_secs(5), None);

    let fields = client.describe("Account").await.unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[1].inline_help_text.as_deref(), Some("Customer rating"));

    match client.describe("Nope__c").await {
        Err(PipelineError::Describe { object, message }) => {
            assert_eq!(object, "Nope__c");
            assert!(message.contains("NOT_FOUND"), "{}", message);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}
