//! Salesforce API access
//!
//! SOAP partner login, sObject describe and Bulk API 2.0 queries. Stages only
//! see the [`Connection`] trait, so they can run against a fake in tests.

pub mod auth;
pub mod bulk;
pub mod client;
pub mod constants;
pub mod models;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;

pub use auth::{LoginSettings, login};
pub use client::SalesforceClient;
pub use models::{FieldDescriptor, FieldHelpMap, JobInfo, JobState, Session};

/// CSV bytes of a bulk query result, as they arrive from the wire
pub type RecordStream = BoxStream<'static, Result<Bytes>>;

/// What the extractor needs from an authenticated org connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Fetch the field list of an object
    async fn describe(&self, object: &str) -> Result<Vec<FieldDescriptor>>;

    /// Run a bulk query and return its CSV result stream.
    ///
    /// `object` is only used for error context.
    async fn bulk_query(&self, object: &str, soql: &str) -> Result<RecordStream>;
}
