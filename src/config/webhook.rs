//! Process-wide defaults handed to every new [`WebhookCall`].
//!
//! [`WebhookCall`]: crate::webhook::WebhookCall

use std::sync::Arc;
use std::time::Duration;

use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, Method};

use crate::webhook::{
    BackoffStrategy, DefaultSigner, ExponentialBackoff, JobKind, ProxyConfig, Signer,
};

use super::defaults;

/// Defaults applied by [`WebhookCall::create`].
///
/// Built either with [`WebhookConfig::default`] or from a configuration
/// file through [`ValidatedConfig`](super::ValidatedConfig). Every field
/// can still be overridden per call on the builder.
///
/// | field | default |
/// |---|---|
/// | `webhook_job` | [`JobKind::CallWebhook`] |
/// | `queue` | `"default"` |
/// | `connection` | none |
/// | `http_verb` | `POST` |
/// | `tries` | 3 |
/// | `backoff_strategy` | [`ExponentialBackoff`], 10 s base, 1 h cap |
/// | `timeout` | none |
/// | `signer` | [`DefaultSigner`] |
/// | `headers` | `Content-Type: application/json` |
/// | `tags` | none |
/// | `verify_ssl` | `false` |
/// | `throw_exception_on_failure` | `false` |
/// | `proxy` | none |
///
/// [`WebhookCall::create`]: crate::webhook::WebhookCall::create
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Delivery job implementation
    pub webhook_job: JobKind,
    /// Queue name
    pub queue: String,
    /// Queue connection hint
    pub connection: Option<String>,
    /// HTTP verb
    pub http_verb: Method,
    /// Maximum attempts, including the first
    pub tries: u32,
    /// Delay between attempts
    pub backoff_strategy: Arc<dyn BackoffStrategy>,
    /// Parameters used when a backoff strategy is selected by name
    pub backoff_parameters: ExponentialBackoff,
    /// Per-attempt timeout
    pub timeout: Option<Duration>,
    /// Request signer
    pub signer: Arc<dyn Signer>,
    /// Headers sent with every call
    pub headers: HeaderMap,
    /// Opaque tags
    pub tags: Vec<String>,
    /// Whether TLS certificates are verified
    pub verify_ssl: bool,
    /// Whether an exhausted call is a hard failure
    pub throw_exception_on_failure: bool,
    /// Proxy routing
    pub proxy: Option<ProxyConfig>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(defaults::CONTENT_TYPE));

        let backoff = ExponentialBackoff::new()
            .with_base_delay(defaults::backoff_base_delay())
            .with_max_delay(defaults::backoff_max_delay())
            .with_multiplier(defaults::BACKOFF_MULTIPLIER);

        Self {
            webhook_job: JobKind::CallWebhook,
            queue: defaults::QUEUE.to_string(),
            connection: None,
            http_verb: Method::POST,
            tries: defaults::TRIES,
            backoff_strategy: Arc::new(backoff.clone()),
            backoff_parameters: backoff,
            timeout: None,
            signer: Arc::new(DefaultSigner),
            headers,
            tags: Vec::new(),
            verify_ssl: defaults::VERIFY_SSL,
            throw_exception_on_failure: defaults::THROW_EXCEPTION_ON_FAILURE,
            proxy: None,
        }
    }
}
