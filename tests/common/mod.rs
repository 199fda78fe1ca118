//! Shared fixtures: an in-memory Salesforce connection, a local HTTP stub
//! and workbook helpers

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use calamine::{Data, Reader, Xlsx, open_workbook};
use futures::StreamExt;
use futures::stream;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use salesforce_field_report::PipelineConfig;
use salesforce_field_report::PipelineError;
use salesforce_field_report::api::{Connection, FieldDescriptor, RecordStream};

/// Connection serving canned describe results and CSV bodies
#[derive(Default)]
pub struct FakeConnection {
    fields: HashMap<String, Vec<FieldDescriptor>>,
    records: HashMap<String, Vec<String>>,
    broken_streams: HashSet<String>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object; `chunks` are streamed in order as the query result
    pub fn with_object(mut self, object: &str, fields: Vec<FieldDescriptor>, chunks: &[&str]) -> Self {
        self.fields.insert(object.to_string(), fields);
        self.records
            .insert(object.to_string(), chunks.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Make the record stream of `object` fail after its first chunk
    pub fn with_broken_stream(mut self, object: &str) -> Self {
        self.broken_streams.insert(object.to_string());
        self
    }

    pub fn recorded_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn describe(&self, object: &str) -> Result<Vec<FieldDescriptor>, PipelineError> {
        self.fields.get(object).cloned().ok_or_else(|| PipelineError::Describe {
            object: object.to_string(),
            message: "NOT_FOUND: The requested resource does not exist".to_string(),
        })
    }

    async fn bulk_query(&self, object: &str, soql: &str) -> Result<RecordStream, PipelineError> {
        self.queries.lock().unwrap().push(soql.to_string());

        let mut items: Vec<Result<Bytes, PipelineError>> = self
            .records
            .get(object)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|chunk| Ok(Bytes::from(chunk)))
            .collect();

        if self.broken_streams.contains(object) {
            items.truncate(1);
            items.push(Err(PipelineError::query_stream(object, "connection reset by peer")));
        }

        Ok(stream::iter(items).boxed())
    }
}

pub fn test_config(root: &Path) -> PipelineConfig {
    PipelineConfig::with_root(root)
}

/// Record file body with `rows` rows where `Name` is always set and `Phone` is set in the first `phones` rows
pub fn record_csv(rows: usize, phones: usize) -> String {
    let mut csv = String::from("\"Id\",\"Name\",\"Phone\"\n");
    for i in 0..rows {
        let phone = if i < phones { format!("555-{:04}", i) } else { String::new() };
        csv.push_str(&format!("\"{:03}\",\"Company {}\",\"{}\"\n", i, i, phone));
    }
    csv
}

pub fn sheet_names(path: &Path) -> Vec<String> {
    let workbook: Xlsx<_> = open_workbook(path).unwrap();
    workbook.sheet_names()
}

pub fn read_sheet(path: &Path, sheet: &str) -> Vec<Vec<Data>> {
    let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
    let range = workbook.worksheet_range(sheet).unwrap();
    range.rows().map(|row| row.to_vec()).collect()
}

pub fn text(value: &str) -> Data {
    Data::String(value.to_string())
}

/// Canned HTTP response served by [`StubServer`]
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StubResponse {
    pub fn json(body: &str) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: body.to_string(),
        }
    }

    pub fn csv(body: &str) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".into(), "text/csv".into())],
            body: body.to_string(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Minimal HTTP/1.1 server on a random local port.
///
/// `handler` gets the method and request target (path plus query) and
/// answers every connection with one response before closing it.
pub struct StubServer {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &str) -> StubResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler = Arc::new(handler);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = requests.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = handler.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(stream, handler, log).await;
                });
            }
        });

        Self {
            url: format!("http://{}", addr),
            requests,
        }
    }

    /// `METHOD target` of every request received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve_connection<F>(
    mut stream: TcpStream,
    handler: Arc<F>,
    log: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()>
where
    F: Fn(&str, &str) -> StubResponse,
{
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buffer.len() < head_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    log.lock().unwrap().push(format!("{} {}", method, target));

    let response = handler(&method, &target);
    let mut raw = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        if response.status < 400 { "OK" } else { "Error" },
        response.body.len()
    );
    for (name, value) in &response.headers {
        raw.push_str(&format!("{}: {}\r\n", name, value));
    }
    raw.push_str("\r\n");
    raw.push_str(&response.body);

    stream.write_all(raw.as_bytes()).await?;
    stream.shutdown().await
}
