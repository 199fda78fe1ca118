use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;

#[derive(Parser)]
#[command(name = "sf-field-report")]
#[command(about = "Extract Salesforce records and report how well each field is populated")]
pub struct Cli {
    /// Path to the pipeline configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
    /// Write logs to this file instead of standard error
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download field metadata and records for each object
    Extract(ExtractCommands),
    /// Count populated values per field in every record file
    Report,
    /// Compile all reports into a single spreadsheet
    Compile(CompileCommands),
    /// Run extract, report and compile in sequence
    Run(RunCommands),
}

/// Salesforce credentials and the objects to extract
#[derive(Args, Clone)]
pub struct CredentialArgs {
    /// Salesforce username
    #[arg(short, long)]
    pub username: String,
    /// Salesforce password
    #[arg(short, long)]
    pub password: String,
    /// Comma-separated list of Salesforce objects to analyze
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub objects: Vec<String>,
    /// Salesforce environment url (e.g. https://login.salesforce.com)
    #[arg(short = 'l', long)]
    pub url: String,
    /// Salesforce security token that will be added to the end of the password
    #[arg(short, long)]
    pub security_token: String,
}

impl CredentialArgs {
    /// Password with the security token appended, as the SOAP login expects
    pub fn login_password(&self) -> String {
        format!("{}{}", self.password, self.security_token)
    }
}

impl std::fmt::Debug for CredentialArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialArgs")
            .field("username", &self.username)
            .field("password", &"***")
            .field("objects", &self.objects)
            .field("url", &self.url)
            .field("security_token", &"***")
            .finish()
    }
}

#[derive(Args, Debug)]
pub struct ExtractCommands {
    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Args, Debug)]
pub struct CompileCommands {
    /// Leave the Description column empty instead of reading field help texts
    #[arg(long)]
    pub no_descriptions: bool,
}

#[derive(Args, Debug)]
pub struct RunCommands {
    #[command(flatten)]
    pub credentials: CredentialArgs,
    /// Leave the Description column empty instead of reading field help texts
    #[arg(long)]
    pub no_descriptions: bool,
}
