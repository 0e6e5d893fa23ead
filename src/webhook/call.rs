//! The `WebhookCall` builder.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::WebhookConfig;
use crate::time::Sleeper;

use super::backoff::backoff_by_name;
use super::job::JobParts;
use super::signer::signer_by_name;
use super::{
    BackoffStrategy, CallWebhookJob, ConfigurationError, CouldNotCallWebhook, DeliveryReport,
    DispatchError, ExponentialBackoff, HttpClient, JobKind, PendingDispatch, ProxyConfig, Signer,
    TaskQueue, TransportPolicy, WebhookError,
};

/// Header carrying the correlation id on every attempt.
pub const CORRELATION_HEADER: &str = "x-webhook-id";

/// Signing secret; never printed.
struct Secret(String);

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// Fluent builder for one outbound webhook delivery.
///
/// Start from [`WebhookCall::create`], chain setters, then hand the call to
/// one of the dispatch methods. Dispatch consumes the builder, so a call
/// cannot be dispatched twice.
///
/// Setters that select an implementation by name (`*_named`) validate the
/// name immediately and return a [`ConfigurationError`]. Missing URL or
/// secret are only detected at dispatch and reported as
/// [`CouldNotCallWebhook`].
///
/// # Example
///
/// ```no_run
/// use webhook_call::config::WebhookConfig;
/// use webhook_call::time::TokioSleeper;
/// use webhook_call::webhook::{ReqwestClient, WebhookCall};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let report = WebhookCall::create(&WebhookConfig::default())
///     .url("https://other-app.example.com/webhooks")
///     .payload(serde_json::json!({ "event": "order.shipped", "id": 42 }))
///     .use_secret("sign-using-this-secret")
///     .dispatch_sync(&ReqwestClient::new(), &TokioSleeper)
///     .await?;
/// println!("{report:?}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WebhookCall {
    uuid: String,
    url: Option<String>,
    method: Method,
    payload: Value,
    headers: HeaderMap,
    queue: String,
    connection: Option<String>,
    tries: u32,
    timeout: Option<Duration>,
    verify_ssl: bool,
    proxy: Option<ProxyConfig>,
    tags: Vec<String>,
    meta: Map<String, Value>,
    sign: bool,
    secret: Option<Secret>,
    signer: Arc<dyn Signer>,
    backoff: Arc<dyn BackoffStrategy>,
    backoff_parameters: ExponentialBackoff,
    job: JobKind,
    throw_exception_on_failure: bool,
}

impl WebhookCall {
    /// Creates a builder initialized from `config` with a fresh
    /// correlation id.
    #[must_use]
    pub fn create(config: &WebhookConfig) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            url: None,
            method: config.http_verb.clone(),
            payload: Value::Object(Map::new()),
            headers: config.headers.clone(),
            queue: config.queue.clone(),
            connection: config.connection.clone(),
            tries: config.tries.max(1),
            timeout: config.timeout,
            verify_ssl: config.verify_ssl,
            proxy: config.proxy.clone(),
            tags: config.tags.clone(),
            meta: Map::new(),
            sign: true,
            secret: None,
            signer: Arc::clone(&config.signer),
            backoff: Arc::clone(&config.backoff_strategy),
            backoff_parameters: config.backoff_parameters.clone(),
            job: config.webhook_job,
            throw_exception_on_failure: config.throw_exception_on_failure,
        }
    }

    /// Sets the target URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the payload from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPayload`] if `payload` cannot be
    /// represented as JSON.
    pub fn payload_from<T: Serialize + ?Sized>(
        self,
        payload: &T,
    ) -> Result<Self, ConfigurationError> {
        let value = serde_json::to_value(payload)
            .map_err(|e| ConfigurationError::InvalidPayload(e.to_string()))?;
        Ok(self.payload(value))
    }

    /// Replaces the generated correlation id.
    #[must_use]
    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    /// Returns the correlation id the delivery will carry.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.uuid
    }

    /// Sets the queue the job is pushed to.
    #[must_use]
    pub fn on_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Sets the queue connection hint.
    #[must_use]
    pub fn on_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    /// Sets the secret used for signing.
    #[must_use]
    pub fn use_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(Secret(secret.into()));
        self
    }

    /// Sets the HTTP verb (GET, POST, PUT, PATCH or DELETE; any case).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidHttpVerb`] for any other verb.
    pub fn use_http_verb(mut self, verb: &str) -> Result<Self, ConfigurationError> {
        self.method = parse_http_verb(verb)?;
        Ok(self)
    }

    /// Sets the maximum number of attempts, including the first.
    ///
    /// # Panics
    ///
    /// Panics if `tries` is 0.
    #[must_use]
    pub fn maximum_tries(mut self, tries: u32) -> Self {
        assert!(tries >= 1, "tries must be at least 1");
        self.tries = tries;
        self
    }

    /// Uses `strategy` to compute delays between attempts.
    #[must_use]
    pub fn use_backoff_strategy(mut self, strategy: impl BackoffStrategy + 'static) -> Self {
        self.backoff = Arc::new(strategy);
        self
    }

    /// Selects a built-in backoff strategy by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidBackoffStrategy`] if no strategy
    /// is registered under `name`.
    pub fn use_backoff_strategy_named(mut self, name: &str) -> Result<Self, ConfigurationError> {
        self.backoff = backoff_by_name(name, &self.backoff_parameters)?;
        Ok(self)
    }

    /// Bounds each attempt to `timeout`.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bounds each attempt to `seconds`.
    #[must_use]
    pub const fn timeout_in_seconds(self, seconds: u64) -> Self {
        self.timeout(Duration::from_secs(seconds))
    }

    /// Uses `signer` to compute the signature header.
    #[must_use]
    pub fn sign_using(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Arc::new(signer);
        self
    }

    /// Selects a built-in signer by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidSigner`] if no signer is
    /// registered under `name`.
    pub fn sign_using_named(mut self, name: &str) -> Result<Self, ConfigurationError> {
        self.signer = signer_by_name(name)?;
        Ok(self)
    }

    /// Sends the call without a signature header; no secret is needed.
    #[must_use]
    pub const fn do_not_sign(mut self) -> Self {
        self.sign = false;
        self
    }

    /// Merges `headers` into the current set; later values replace earlier
    /// ones with the same name.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        let mut last_name: Option<HeaderName> = None;
        for (name, value) in headers {
            // `None` marks another value of the previous header.
            match name {
                Some(name) => {
                    self.headers.insert(name.clone(), value);
                    last_name = Some(name);
                }
                None => {
                    if let Some(name) = &last_name {
                        self.headers.append(name.clone(), value);
                    }
                }
            }
        }
        self
    }

    /// Sets one header, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidHeader`] if the name or value
    /// is not valid in HTTP.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidHeader {
            name: name.to_string(),
            reason,
        };
        let header_name = name
            .parse::<HeaderName>()
            .map_err(|e| invalid(e.to_string()))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }

    /// Disables TLS certificate verification.
    #[must_use]
    pub const fn do_not_verify_ssl(self) -> Self {
        self.verify_ssl(false)
    }

    /// Controls whether exhausting every attempt is a hard failure.
    #[must_use]
    pub const fn throw_exception_on_failure(mut self, throw: bool) -> Self {
        self.throw_exception_on_failure = throw;
        self
    }

    /// Routes calls through `proxy`, or directly when `None`.
    #[must_use]
    pub fn use_proxy(mut self, proxy: impl Into<Option<ProxyConfig>>) -> Self {
        self.proxy = proxy.into();
        self
    }

    /// Attaches opaque metadata reported with delivery events.
    #[must_use]
    pub fn meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    /// Replaces the tags.
    #[must_use]
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Selects the delivery job implementation.
    #[must_use]
    pub const fn use_job(mut self, job: JobKind) -> Self {
        self.job = job;
        self
    }

    /// Selects the delivery job implementation by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidWebhookJob`] if no job is
    /// registered under `name`.
    pub fn use_job_named(mut self, name: &str) -> Result<Self, ConfigurationError> {
        self.job = JobKind::by_name(name)?;
        Ok(self)
    }

    /// Validates the call and freezes it into a delivery job.
    ///
    /// The signature header, when signing, is computed here from the URL as
    /// it was set (trimmed, not normalized), the payload and the secret.
    /// The correlation id header is added too and must not be blank.
    ///
    /// # Errors
    ///
    /// - [`CouldNotCallWebhook::UrlNotSet`] when no URL was set
    /// - [`CouldNotCallWebhook::InvalidUrl`] when the URL does not parse
    /// - [`CouldNotCallWebhook::SecretNotSet`] when signing without a secret
    /// - [`CouldNotCallWebhook::InvalidHeader`] when the correlation id or
    ///   signature cannot be sent as a header
    pub fn into_job(self) -> Result<CallWebhookJob, CouldNotCallWebhook> {
        let raw_url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(CouldNotCallWebhook::UrlNotSet)?;

        let url = url::Url::parse(raw_url).map_err(|e| CouldNotCallWebhook::InvalidUrl {
            url: raw_url.to_string(),
            reason: e.to_string(),
        })?;

        let secret = match (self.sign, self.secret.as_ref()) {
            (true, Some(Secret(secret))) if !secret.is_empty() => Some(secret.as_str()),
            (true, _) => return Err(CouldNotCallWebhook::SecretNotSet),
            (false, _) => None,
        };

        let mut headers = self.headers.clone();

        if self.uuid.trim().is_empty() {
            return Err(CouldNotCallWebhook::InvalidHeader(CORRELATION_HEADER.to_string()));
        }
        let correlation = HeaderValue::from_str(&self.uuid)
            .map_err(|_| CouldNotCallWebhook::InvalidHeader(CORRELATION_HEADER.to_string()))?;
        headers.insert(HeaderName::from_static(CORRELATION_HEADER), correlation);

        if let Some(secret) = secret {
            let header_name = self.signer.signature_header_name();
            let signature = self
                .signer
                .calculate_signature(raw_url, &self.payload, secret);
            let name = header_name
                .parse::<HeaderName>()
                .map_err(|_| CouldNotCallWebhook::InvalidHeader(header_name.to_string()))?;
            let value = HeaderValue::from_str(&signature)
                .map_err(|_| CouldNotCallWebhook::InvalidHeader(header_name.to_string()))?;
            headers.insert(name, value);
        }

        let parts = JobParts {
            uuid: self.uuid,
            method: self.method,
            url,
            headers,
            payload: self.payload,
            queue: self.queue,
            connection: self.connection,
            tries: self.tries,
            timeout: self.timeout,
            transport: TransportPolicy {
                verify_ssl: self.verify_ssl,
                proxy: self.proxy,
            },
            tags: self.tags,
            meta: self.meta,
            throw_exception_on_failure: self.throw_exception_on_failure,
            backoff: self.backoff,
        };

        Ok(match self.job {
            JobKind::CallWebhook => CallWebhookJob::from_parts(parts),
        })
    }

    /// Validates the call and pushes the job onto `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::CouldNotCall`] if a precondition fails (see
    /// [`into_job`](Self::into_job)) and [`DispatchError::Queue`] if the
    /// queue refuses the job.
    pub fn dispatch<Q: TaskQueue + ?Sized>(
        self,
        queue: &Q,
    ) -> Result<PendingDispatch, DispatchError> {
        let job = self.into_job()?;
        tracing::debug!(uuid = %job.uuid(), queue = %job.queue(), "Dispatching webhook call");
        Ok(queue.push(job)?)
    }

    /// Dispatches only when `condition` holds.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub fn dispatch_if<Q: TaskQueue + ?Sized>(
        self,
        condition: bool,
        queue: &Q,
    ) -> Result<Option<PendingDispatch>, DispatchError> {
        if condition {
            return self.dispatch(queue).map(Some);
        }
        Ok(None)
    }

    /// Dispatches only when `condition` does not hold.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub fn dispatch_unless<Q: TaskQueue + ?Sized>(
        self,
        condition: bool,
        queue: &Q,
    ) -> Result<Option<PendingDispatch>, DispatchError> {
        self.dispatch_if(!condition, queue)
    }

    /// Validates the call and runs every attempt in the caller's task,
    /// waiting through `sleeper` between attempts.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::CouldNotCall`] if a precondition fails, and
    /// [`WebhookError::MaxAttemptsExceeded`] if every attempt failed and the
    /// call throws on failure.
    pub async fn dispatch_sync<H, S>(
        self,
        client: &H,
        sleeper: &S,
    ) -> Result<DeliveryReport, WebhookError>
    where
        H: HttpClient,
        S: Sleeper,
    {
        let mut job = self.into_job()?;
        tracing::debug!(uuid = %job.uuid(), "Calling webhook synchronously");
        job.run_to_completion(client, sleeper).await
    }

    /// Runs [`dispatch_sync`](Self::dispatch_sync) only when `condition` holds.
    ///
    /// # Errors
    ///
    /// See [`dispatch_sync`](Self::dispatch_sync).
    pub async fn dispatch_sync_if<H, S>(
        self,
        condition: bool,
        client: &H,
        sleeper: &S,
    ) -> Result<Option<DeliveryReport>, WebhookError>
    where
        H: HttpClient,
        S: Sleeper,
    {
        if condition {
            return self.dispatch_sync(client, sleeper).await.map(Some);
        }
        Ok(None)
    }

    /// Runs [`dispatch_sync`](Self::dispatch_sync) only when `condition`
    /// does not hold.
    ///
    /// # Errors
    ///
    /// See [`dispatch_sync`](Self::dispatch_sync).
    pub async fn dispatch_sync_unless<H, S>(
        self,
        condition: bool,
        client: &H,
        sleeper: &S,
    ) -> Result<Option<DeliveryReport>, WebhookError>
    where
        H: HttpClient,
        S: Sleeper,
    {
        self.dispatch_sync_if(!condition, client, sleeper).await
    }
}

/// Parses one of the supported HTTP verbs, ignoring case.
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidHttpVerb`] unless `verb` is GET,
/// POST, PUT, PATCH or DELETE.
pub fn parse_http_verb(verb: &str) -> Result<Method, ConfigurationError> {
    match verb.trim().to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        _ => Err(ConfigurationError::InvalidHttpVerb(verb.to_string())),
    }
}
