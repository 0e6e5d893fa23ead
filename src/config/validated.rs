//! Validated configuration after merging CLI and TOML sources.
//!
//! This module contains the final, validated configuration that is used
//! by the application. All validation is performed during construction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use url::Url;

use crate::webhook::{
    ExponentialBackoff, JobKind, ProxyConfig, backoff_by_name, parse_http_verb, signer_by_name,
};

use super::cli::Cli;
use super::defaults;
use super::error::{ConfigError, field};
use super::toml::TomlConfig;
use super::webhook::WebhookConfig;

/// Fully validated configuration ready for use by the application.
///
/// # Construction
///
/// Use [`ValidatedConfig::from_raw`] to create from CLI args and optional TOML config.
/// The function validates all inputs and returns errors for invalid configurations.
pub struct ValidatedConfig {
    /// Defaults every call is created from
    pub webhook: WebhookConfig,

    /// Target URL (required)
    pub url: Url,

    /// Payload to send
    pub payload: serde_json::Value,

    /// Signing secret; present whenever `sign` is true
    pub secret: Option<String>,

    /// Whether the call carries a signature header
    pub sign: bool,

    /// Run every attempt in the foreground instead of through the queue
    pub sync: bool,

    /// Workers serving the queue runtime
    pub workers: usize,

    /// Verbose logging enabled
    pub verbose: bool,
}

impl fmt::Debug for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedConfig")
            .field("webhook", &self.webhook)
            .field("url", &self.url)
            .field("payload", &self.payload)
            .field("secret", &self.secret.as_ref().map(|_| "[redacted]"))
            .field("sign", &self.sign)
            .field("sync", &self.sync)
            .field("workers", &self.workers)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timeout = self
            .webhook
            .timeout
            .map_or_else(|| "none".to_string(), |t| format!("{}s", t.as_secs()));

        write!(
            f,
            "Config {{ url: {}, method: {}, tries: {}, timeout: {}, queue: {}, signed: {}, \
             verify_ssl: {}, proxy: {}, sync: {}, workers: {} }}",
            self.url,
            self.webhook.http_verb,
            self.webhook.tries,
            timeout,
            self.webhook.queue,
            self.sign,
            self.webhook.verify_ssl,
            self.webhook.proxy.is_some(),
            self.sync,
            self.workers,
        )
    }
}

impl ValidatedConfig {
    /// Creates a validated configuration from CLI arguments and optional TOML config.
    ///
    /// CLI arguments take precedence over TOML config values, which take
    /// precedence over built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required fields are missing (`url`, `secret` when signing)
    /// - URL or payload is invalid
    /// - A job, verb, signer or backoff name is unknown
    /// - Counts or durations are zero
    /// - Header format is invalid
    pub fn from_raw(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Self, ConfigError> {
        let url = Self::resolve_url(cli, toml)?;
        let payload = Self::resolve_payload(cli, toml)?;

        let sign = !(cli.no_sign || toml.is_some_and(|t| t.target.no_sign));
        let secret = cli
            .secret
            .clone()
            .or_else(|| toml.and_then(|t| t.target.secret.clone()))
            .filter(|s| !s.is_empty());
        if sign && secret.is_none() {
            return Err(ConfigError::missing(
                field::SECRET,
                "Use --secret, set target.secret in config file, or pass --no-sign",
            ));
        }

        let webhook = Self::build_webhook_config(cli, toml)?;

        let workers = toml
            .and_then(|t| t.queue.workers)
            .unwrap_or(defaults::WORKERS);
        if workers == 0 {
            return Err(ConfigError::InvalidCount { field: "workers" });
        }

        Ok(Self {
            webhook,
            url,
            payload,
            secret,
            sign,
            sync: cli.sync,
            workers,
            verbose: cli.verbose,
        })
    }

    /// Loads and merges configuration from CLI and optional config file.
    ///
    /// If `cli.config` is set, loads the TOML file from that path. A
    /// leading `~` is expanded to the home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The merged configuration is invalid
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let toml = if let Some(ref path) = cli.config {
            Some(TomlConfig::load(&expand_tilde(path))?)
        } else {
            None
        };

        Self::from_raw(cli, toml.as_ref())
    }

    fn resolve_url(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Url, ConfigError> {
        // CLI takes precedence
        let url_str = cli
            .url
            .as_deref()
            .or_else(|| toml.and_then(|t| t.target.url.as_deref()))
            .ok_or_else(|| {
                ConfigError::missing(field::URL, "Use --url or set target.url in config file")
            })?;

        Url::parse(url_str).map_err(|e| ConfigError::InvalidUrl {
            url: url_str.to_string(),
            reason: e.to_string(),
        })
    }

    fn resolve_payload(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<serde_json::Value, ConfigError> {
        if let Some(ref raw) = cli.payload {
            return parse_payload(raw);
        }

        if let Some(ref path) = cli.payload_file {
            let path = expand_tilde(path);
            let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileRead {
                path: path.clone(),
                source: e,
            })?;
            return parse_payload(&raw);
        }

        Ok(toml
            .and_then(|t| t.target.payload.clone())
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())))
    }

    fn build_webhook_config(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<WebhookConfig, ConfigError> {
        let section = toml.map(|t| &t.webhook);
        let mut config = WebhookConfig::default();

        let job = section
            .and_then(|w| w.webhook_job.as_deref())
            .unwrap_or(defaults::WEBHOOK_JOB);
        config.webhook_job = JobKind::by_name(job)?;

        if let Some(queue) = cli
            .queue
            .as_deref()
            .or_else(|| section.and_then(|w| w.queue.as_deref()))
        {
            config.queue = queue.to_string();
        }
        config.connection = section.and_then(|w| w.connection.clone());

        // Priority: CLI explicit > TOML > default
        let verb = cli
            .method
            .as_deref()
            .or_else(|| section.and_then(|w| w.http_verb.as_deref()))
            .unwrap_or(defaults::HTTP_VERB);
        config.http_verb = parse_http_verb(verb)?;

        config.tries = cli
            .tries
            .or_else(|| section.and_then(|w| w.tries))
            .unwrap_or(defaults::TRIES);
        if config.tries == 0 {
            return Err(ConfigError::InvalidCount { field: "tries" });
        }

        let parameters = Self::build_backoff_parameters(toml)?;
        let strategy = cli
            .backoff
            .as_deref()
            .or_else(|| section.and_then(|w| w.backoff_strategy.as_deref()))
            .unwrap_or(defaults::BACKOFF_STRATEGY);
        config.backoff_strategy = backoff_by_name(strategy, &parameters)?;
        config.backoff_parameters = parameters;

        config.timeout = Self::resolve_timeout(cli, toml)?;

        let signer = cli
            .signer
            .as_deref()
            .or_else(|| section.and_then(|w| w.signer.as_deref()))
            .unwrap_or(defaults::SIGNER);
        config.signer = signer_by_name(signer)?;

        config.headers = Self::resolve_headers(cli, toml, config.headers)?;

        // CLI tags replace TOML tags
        config.tags = if cli.tags.is_empty() {
            section.map(|w| w.tags.clone()).unwrap_or_default()
        } else {
            cli.tags.clone()
        };

        // Flags only enable
        config.verify_ssl =
            cli.verify_ssl || section.and_then(|w| w.verify_ssl).unwrap_or(defaults::VERIFY_SSL);
        config.throw_exception_on_failure = cli.throw_on_failure
            || section
                .and_then(|w| w.throw_exception_on_failure)
                .unwrap_or(defaults::THROW_EXCEPTION_ON_FAILURE);

        config.proxy = match cli.proxy {
            Some(ref proxy) => Some(ProxyConfig::All(proxy.clone())),
            None => section.and_then(|w| w.proxy.clone()),
        };

        Ok(config)
    }

    fn build_backoff_parameters(
        toml: Option<&TomlConfig>,
    ) -> Result<ExponentialBackoff, ConfigError> {
        let backoff = toml.map(|t| &t.backoff);

        let base_delay_secs = backoff
            .and_then(|b| b.base_delay)
            .unwrap_or(defaults::BACKOFF_BASE_DELAY_SECS);

        let max_delay_secs = backoff
            .and_then(|b| b.max_delay)
            .unwrap_or(defaults::BACKOFF_MAX_DELAY_SECS);

        let multiplier = backoff
            .and_then(|b| b.multiplier)
            .unwrap_or(defaults::BACKOFF_MULTIPLIER);

        if base_delay_secs == 0 {
            return Err(ConfigError::InvalidBackoff(
                "base_delay must be greater than 0".to_string(),
            ));
        }

        if multiplier < 1.0 || !multiplier.is_finite() {
            return Err(ConfigError::InvalidBackoff(
                "multiplier must be a finite number >= 1.0".to_string(),
            ));
        }

        if max_delay_secs < base_delay_secs {
            return Err(ConfigError::InvalidBackoff(format!(
                "max_delay ({max_delay_secs}s) must be >= base_delay ({base_delay_secs}s)"
            )));
        }

        Ok(ExponentialBackoff::new()
            .with_base_delay(Duration::from_secs(base_delay_secs))
            .with_max_delay(Duration::from_secs(max_delay_secs))
            .with_multiplier(multiplier))
    }

    fn resolve_timeout(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<Option<Duration>, ConfigError> {
        let seconds = cli
            .timeout
            .or_else(|| toml.and_then(|t| t.webhook.timeout_in_seconds));

        match seconds {
            Some(0) => Err(ConfigError::InvalidDuration {
                field: "timeout",
                reason: "must be greater than 0".to_string(),
            }),
            other => Ok(other.map(Duration::from_secs)),
        }
    }

    fn resolve_headers(
        cli: &Cli,
        toml: Option<&TomlConfig>,
        mut headers: HeaderMap,
    ) -> Result<HeaderMap, ConfigError> {
        // TOML headers first (CLI can override)
        if let Some(toml) = toml {
            for (name, value) in &toml.webhook.headers {
                let header_name = parse_header_name(name)?;
                let header_value = parse_header_value(name, value)?;
                headers.insert(header_name, header_value);
            }
        }

        for header_str in &cli.headers {
            let (name, value) = parse_header_string(header_str)?;
            let header_name = parse_header_name(&name)?;
            let header_value = parse_header_value(&name, &value)?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }
}

/// Writes the default configuration template to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let path = expand_tilde(path);
    let template = super::toml::default_config_template();
    std::fs::write(&path, template).map_err(|e| ConfigError::FileWrite { path, source: e })
}

/// Replaces a leading `~` with the home directory.
///
/// Paths without a leading `~`, or a missing home directory, are returned
/// unchanged.
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest))
}

// Helper functions

fn parse_payload(raw: &str) -> Result<serde_json::Value, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::InvalidPayload(e.to_string()))
}

fn parse_header_string(s: &str) -> Result<(String, String), ConfigError> {
    // Try "Key=Value" format first
    if let Some((name, value)) = s.split_once('=') {
        return Ok((name.trim().to_string(), value.trim().to_string()));
    }

    // Try "Key: Value" format
    if let Some((name, value)) = s.split_once(':') {
        return Ok((name.trim().to_string(), value.trim().to_string()));
    }

    Err(ConfigError::InvalidHeader {
        value: s.to_string(),
    })
}

fn parse_header_name(name: &str) -> Result<HeaderName, ConfigError> {
    name.parse::<HeaderName>()
        .map_err(|e| ConfigError::InvalidHeaderName {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeaderValue {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
