//! TOML configuration file parsing.
//!
//! Defines the structure of the configuration file with serde.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::webhook::ProxyConfig;

use super::ConfigError;

/// Root configuration structure from TOML file.
///
/// All fields are optional to allow partial configuration
/// that can be merged with CLI arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Defaults for every webhook call
    #[serde(default)]
    pub webhook: WebhookSection,

    /// Parameters of the built-in backoff strategies
    #[serde(default)]
    pub backoff: BackoffSection,

    /// The call made by the command-line tool
    #[serde(default)]
    pub target: TargetSection,

    /// In-process queue runtime
    #[serde(default)]
    pub queue: QueueSection,
}

/// Webhook defaults section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookSection {
    /// Delivery job name (default: `call_webhook`)
    pub webhook_job: Option<String>,

    /// Queue name (default: `default`)
    pub queue: Option<String>,

    /// Queue connection hint
    pub connection: Option<String>,

    /// HTTP verb (default: POST)
    pub http_verb: Option<String>,

    /// Maximum attempts, including the first (default: 3)
    pub tries: Option<u32>,

    /// Backoff strategy name (default: `exponential`)
    pub backoff_strategy: Option<String>,

    /// Per-attempt timeout in seconds
    pub timeout_in_seconds: Option<u64>,

    /// Signer name (default: `default`)
    pub signer: Option<String>,

    /// HTTP headers as key-value pairs
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Opaque tags attached to every call
    #[serde(default)]
    pub tags: Vec<String>,

    /// Verify TLS certificates (default: false)
    pub verify_ssl: Option<bool>,

    /// Treat an exhausted call as a hard failure (default: false)
    pub throw_exception_on_failure: Option<bool>,

    /// Proxy URL, or a table with `http`, `https` and `no` keys
    pub proxy: Option<ProxyConfig>,
}

/// Backoff parameters section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackoffSection {
    /// Delay after the first failed attempt, in seconds
    pub base_delay: Option<u64>,

    /// Upper bound for any delay, in seconds
    pub max_delay: Option<u64>,

    /// Growth factor per attempt
    pub multiplier: Option<f64>,
}

/// Target section for the command-line tool.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSection {
    /// Webhook URL
    pub url: Option<String>,

    /// Signing secret
    pub secret: Option<String>,

    /// Send without a signature header
    #[serde(default)]
    pub no_sign: bool,

    /// Payload to send
    pub payload: Option<serde_json::Value>,
}

/// Queue runtime section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueSection {
    /// Workers serving the configured queue (default: 4)
    pub workers: Option<usize>,
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }
}

/// Generates a default configuration file with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# webhook-call configuration file

[webhook]
# Delivery job (default: "call_webhook")
# webhook_job = "call_webhook"

# Queue the job is pushed to (default: "default")
# queue = "default"

# Queue connection hint
# connection = "redis"

# HTTP verb: GET, POST, PUT, PATCH or DELETE (default: POST)
# For GET the payload is sent as query parameters.
# http_verb = "POST"

# Maximum attempts, including the first (default: 3)
# tries = 3

# Backoff strategy: "exponential" or "constant" (default: "exponential")
# backoff_strategy = "exponential"

# Per-attempt timeout in seconds (default: none)
# timeout_in_seconds = 3

# Signer: "default" (HMAC-SHA256 over url and payload) or "payload"
# signer = "default"

# Verify TLS certificates (default: false)
# verify_ssl = true

# Fail hard when every attempt failed (default: false)
# throw_exception_on_failure = false

# Opaque tags reported with delivery events
# tags = ["billing"]

# Proxy for every call, or a [webhook.proxy] table with http/https/no keys
# proxy = "http://proxy.internal:3128"

# HTTP headers sent with every call
[webhook.headers]
Content-Type = "application/json"

[backoff]
# Delay after the first failed attempt in seconds (default: 10)
# base_delay = 10

# Upper bound for any delay in seconds (default: 3600)
# max_delay = 3600

# Growth factor per attempt (default: 2.0)
# multiplier = 2.0

[target]
# Webhook URL (required)
# url = "https://other-app.example.com/webhooks"

# Signing secret (required unless no_sign = true)
# secret = "sign-using-this-secret"

# no_sign = false

# Payload to send
# payload = { event = "ping" }

[queue]
# Workers serving the queue when not running with --sync (default: 4)
# workers = 4
"#
    .to_string()
}
