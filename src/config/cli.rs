//! CLI argument parsing using clap.
//!
//! Defines the command-line interface with all options and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// webhook-call: send a signed webhook with retries
///
/// Builds one webhook call from the configuration file and the flags
/// below, then delivers it either in-process or through the queue
/// runtime.
#[derive(Debug, Parser)]
#[command(name = "webhook-call")]
#[command(version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)] // CLI flags are naturally boolean
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Webhook URL (required)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// JSON payload
    #[arg(long, conflicts_with = "payload_file")]
    pub payload: Option<String>,

    /// File containing the JSON payload
    #[arg(long = "payload-file", value_name = "PATH")]
    pub payload_file: Option<PathBuf>,

    /// Signing secret (required unless --no-sign)
    #[arg(long)]
    pub secret: Option<String>,

    /// Send without a signature header
    #[arg(long = "no-sign")]
    pub no_sign: bool,

    /// HTTP verb for the call
    #[arg(long)]
    pub method: Option<String>,

    /// HTTP headers in 'Key=Value' or 'Key: Value' format (can be specified multiple times)
    #[arg(long = "header", value_name = "K=V")]
    pub headers: Vec<String>,

    /// Maximum number of attempts, including the first
    #[arg(long)]
    pub tries: Option<u32>,

    /// Per-attempt timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Backoff strategy name (exponential, constant)
    #[arg(long)]
    pub backoff: Option<String>,

    /// Signer name (default, payload)
    #[arg(long)]
    pub signer: Option<String>,

    /// Verify TLS certificates
    #[arg(long = "verify-ssl")]
    pub verify_ssl: bool,

    /// Proxy URL for the call
    #[arg(long)]
    pub proxy: Option<String>,

    /// Queue to push the call to
    #[arg(long)]
    pub queue: Option<String>,

    /// Tag attached to the call (can be specified multiple times)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Exit with an error when every attempt failed
    #[arg(long = "throw-on-failure")]
    pub throw_on_failure: bool,

    /// Run every attempt in the foreground instead of through the queue
    #[arg(long)]
    pub sync: bool,

    /// Path to configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,
}

/// Subcommands for webhook-call
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = "webhook-call.toml")]
        output: PathBuf,
    },
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }

    /// Returns true if this is the init command.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Some(Command::Init { .. }))
    }
}
