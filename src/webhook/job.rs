//! The delivery job: one logical webhook delivery and its attempt cycle.

use std::sync::Arc;
use std::time::Duration;

use http::header::CONTENT_TYPE;
use serde_json::{Map, Value};

use crate::time::Sleeper;

use super::{
    AttemptError, BackoffStrategy, ConfigurationError, HttpClient, HttpRequest, HttpResponse,
    TransportPolicy, WebhookError,
};

/// Delivery job implementations that a call can be frozen into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobKind {
    /// [`CallWebhookJob`]: one HTTP call per attempt, backoff between attempts.
    #[default]
    CallWebhook,
}

impl JobKind {
    /// Looks up a job implementation by its configuration name.
    ///
    /// Accepts `call_webhook` and `CallWebhookJob`, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidWebhookJob`] for any other name.
    pub fn by_name(name: &str) -> Result<Self, ConfigurationError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "call_webhook" | "call-webhook" | "callwebhookjob" => Ok(Self::CallWebhook),
            _ => Err(ConfigurationError::InvalidWebhookJob(name.to_string())),
        }
    }
}

/// Lifecycle of a [`CallWebhookJob`].
///
/// ```text
/// Pending -> Attempting -> Succeeded
///                       -> AwaitingRetry -> Attempting ...
///                       -> Exhausted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Built but never attempted.
    Pending,
    /// An HTTP call is in flight.
    Attempting,
    /// The last attempt failed and the budget allows another one.
    AwaitingRetry {
        /// Delay requested before the next attempt
        retry_after: Duration,
    },
    /// An attempt received a 2xx response.
    Succeeded,
    /// Every attempt in the budget failed.
    Exhausted,
}

impl JobState {
    /// Returns true for `Succeeded` and `Exhausted`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted)
    }
}

/// Record of one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    /// 1-based attempt number
    pub attempt: u32,
    /// Response status, when the server answered
    pub status: Option<http::StatusCode>,
    /// Human-readable failure description
    pub message: String,
}

/// Result of a single [`CallWebhookJob::attempt`].
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The endpoint accepted the delivery.
    Succeeded(HttpResponse),
    /// The attempt failed; invoke [`CallWebhookJob::attempt`] again after
    /// this delay.
    RetryAfter(Duration),
    /// The attempt failed and it was the last one allowed.
    Exhausted(AttemptError),
    /// The job had already finished; no HTTP call was made.
    AlreadyFinished(JobState),
}

/// Final result of running a job to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReport {
    /// A 2xx response ended the delivery.
    Succeeded {
        /// Correlation id
        uuid: String,
        /// Attempts made, including the successful one
        attempts: u32,
        /// Status of the successful response
        status: http::StatusCode,
    },
    /// The attempt budget ran out and the job was configured not to throw.
    Exhausted {
        /// Correlation id
        uuid: String,
        /// Attempts made
        attempts: u32,
        /// Description of the final failure
        last_error: String,
    },
}

/// A frozen webhook delivery.
///
/// Produced by [`WebhookCall`](super::WebhookCall) when it is dispatched.
/// All request fields, including the signature header, are fixed at that
/// point; only the attempt counter, the state and the failure history
/// change afterwards.
///
/// Each call to [`attempt`](Self::attempt) makes exactly one HTTP request.
/// The job never waits on its own: when an attempt fails it reports the
/// backoff delay and leaves timing to whoever drives it.
#[derive(Debug, Clone)]
pub struct CallWebhookJob {
    uuid: String,
    method: http::Method,
    url: url::Url,
    headers: http::HeaderMap,
    payload: Value,
    queue: String,
    connection: Option<String>,
    tries: u32,
    timeout: Option<Duration>,
    transport: TransportPolicy,
    tags: Vec<String>,
    meta: Map<String, Value>,
    throw_exception_on_failure: bool,
    backoff: Arc<dyn BackoffStrategy>,
    attempts: u32,
    state: JobState,
    failures: Vec<AttemptFailure>,
    success_status: Option<http::StatusCode>,
}

/// Fields a job is frozen from.
#[derive(Debug)]
pub(crate) struct JobParts {
    pub uuid: String,
    pub method: http::Method,
    pub url: url::Url,
    pub headers: http::HeaderMap,
    pub payload: Value,
    pub queue: String,
    pub connection: Option<String>,
    pub tries: u32,
    pub timeout: Option<Duration>,
    pub transport: TransportPolicy,
    pub tags: Vec<String>,
    pub meta: Map<String, Value>,
    pub throw_exception_on_failure: bool,
    pub backoff: Arc<dyn BackoffStrategy>,
}

impl CallWebhookJob {
    pub(crate) fn from_parts(parts: JobParts) -> Self {
        Self {
            uuid: parts.uuid,
            method: parts.method,
            url: parts.url,
            headers: parts.headers,
            payload: parts.payload,
            queue: parts.queue,
            connection: parts.connection,
            tries: parts.tries.max(1),
            timeout: parts.timeout,
            transport: parts.transport,
            tags: parts.tags,
            meta: parts.meta,
            throw_exception_on_failure: parts.throw_exception_on_failure,
            backoff: parts.backoff,
            attempts: 0,
            state: JobState::Pending,
            failures: Vec::new(),
            success_status: None,
        }
    }

    /// Correlation id, identical for every attempt of this delivery.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Target URL.
    #[must_use]
    pub const fn url(&self) -> &url::Url {
        &self.url
    }

    /// HTTP verb.
    #[must_use]
    pub const fn method(&self) -> &http::Method {
        &self.method
    }

    /// Final header set, including the signature header when signing.
    #[must_use]
    pub const fn headers(&self) -> &http::HeaderMap {
        &self.headers
    }

    /// Payload as configured on the builder.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Queue the job should run on.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Queue connection hint.
    #[must_use]
    pub fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    /// Maximum number of attempts, including the first.
    #[must_use]
    pub const fn tries(&self) -> u32 {
        self.tries
    }

    /// Attempts made so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// TLS and proxy policy.
    #[must_use]
    pub const fn transport(&self) -> &TransportPolicy {
        &self.transport
    }

    /// Opaque tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Opaque metadata.
    #[must_use]
    pub const fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    /// Whether exhausting the attempt budget is a hard failure.
    #[must_use]
    pub const fn throws_on_exhaustion(&self) -> bool {
        self.throw_exception_on_failure
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> JobState {
        self.state
    }

    /// Failures recorded so far, oldest first.
    #[must_use]
    pub fn failures(&self) -> &[AttemptFailure] {
        &self.failures
    }

    /// Builds the HTTP request sent on every attempt.
    ///
    /// For GET the payload's top-level members become query parameters and
    /// no `Content-Type` is sent.
    /// Otherwise the payload is the body: form-encoded when the
    /// `Content-Type` header says so, JSON in every other case.
    #[must_use]
    pub fn to_request(&self) -> HttpRequest {
        let mut url = self.url.clone();
        let body = if self.method == http::Method::GET {
            let pairs = payload_pairs(&self.payload);
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
            None
        } else if self.is_form_encoded() {
            Some(
                url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(payload_pairs(&self.payload))
                    .finish()
                    .into_bytes(),
            )
        } else {
            Some(self.payload.to_string().into_bytes())
        };

        let mut headers = self.headers.clone();
        if body.is_none() {
            headers.remove(CONTENT_TYPE);
        }

        HttpRequest {
            method: self.method.clone(),
            url,
            headers,
            body,
            timeout: self.timeout,
            transport: self.transport.clone(),
        }
    }

    fn is_form_encoded(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| {
                v.trim()
                    .to_ascii_lowercase()
                    .starts_with("application/x-www-form-urlencoded")
            })
    }

    /// Makes one delivery attempt.
    ///
    /// Any transport error, timeout or non-2xx response counts as a failed
    /// attempt. While the budget allows, a failure yields
    /// [`AttemptOutcome::RetryAfter`] with the backoff delay for this
    /// attempt; the final failure yields [`AttemptOutcome::Exhausted`].
    pub async fn attempt<H: HttpClient>(&mut self, client: &H) -> AttemptOutcome {
        if self.state.is_terminal() {
            return AttemptOutcome::AlreadyFinished(self.state);
        }

        self.attempts += 1;
        self.state = JobState::Attempting;
        tracing::debug!(
            uuid = %self.uuid,
            attempt = self.attempts,
            tries = self.tries,
            url = %self.url,
            "Calling webhook"
        );

        match self.send_once(client).await {
            Ok(response) => {
                self.state = JobState::Succeeded;
                self.success_status = Some(response.status);
                tracing::info!(
                    uuid = %self.uuid,
                    attempt = self.attempts,
                    status = %response.status,
                    "Webhook call succeeded"
                );
                AttemptOutcome::Succeeded(response)
            }
            Err(error) => self.record_failure(error),
        }
    }

    async fn send_once<H: HttpClient>(&self, client: &H) -> Result<HttpResponse, AttemptError> {
        let response = client.request(self.to_request()).await?;

        if response.is_success() {
            return Ok(response);
        }

        Err(AttemptError::NonSuccessStatus {
            status: response.status,
            body: response.body_text().map(ToString::to_string),
        })
    }

    fn record_failure(&mut self, error: AttemptError) -> AttemptOutcome {
        self.failures.push(AttemptFailure {
            attempt: self.attempts,
            status: error.status(),
            message: error.to_string(),
        });

        if self.attempts < self.tries {
            let retry_after = self.backoff.delay_after_attempt(self.attempts);
            self.state = JobState::AwaitingRetry { retry_after };
            tracing::warn!(
                uuid = %self.uuid,
                attempt = self.attempts,
                tries = self.tries,
                retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Webhook call failed, will retry"
            );
            AttemptOutcome::RetryAfter(retry_after)
        } else {
            self.state = JobState::Exhausted;
            AttemptOutcome::Exhausted(error)
        }
    }

    /// Converts an exhaustion into the caller-visible result.
    ///
    /// Jobs that throw on exhaustion yield
    /// [`WebhookError::MaxAttemptsExceeded`]; others log the failure and
    /// yield [`DeliveryReport::Exhausted`].
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::MaxAttemptsExceeded`] when the job throws on
    /// exhaustion.
    pub fn conclude_exhausted(&self, error: AttemptError) -> Result<DeliveryReport, WebhookError> {
        if self.throw_exception_on_failure {
            tracing::error!(
                uuid = %self.uuid,
                attempts = self.attempts,
                error = %error,
                "Webhook call failed on final attempt"
            );
            return Err(WebhookError::MaxAttemptsExceeded {
                uuid: self.uuid.clone(),
                attempts: self.attempts,
                last_error: error,
            });
        }

        tracing::warn!(
            uuid = %self.uuid,
            attempts = self.attempts,
            error = %error,
            "Webhook call failed on final attempt"
        );
        Ok(DeliveryReport::Exhausted {
            uuid: self.uuid.clone(),
            attempts: self.attempts,
            last_error: error.to_string(),
        })
    }

    /// Runs attempts until the job succeeds or exhausts its budget,
    /// waiting between attempts with `sleeper`.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::MaxAttemptsExceeded`] if every attempt failed
    /// and the job throws on exhaustion.
    pub async fn run_to_completion<H, S>(
        &mut self,
        client: &H,
        sleeper: &S,
    ) -> Result<DeliveryReport, WebhookError>
    where
        H: HttpClient,
        S: Sleeper,
    {
        loop {
            match self.attempt(client).await {
                AttemptOutcome::Succeeded(response) => {
                    return Ok(DeliveryReport::Succeeded {
                        uuid: self.uuid.clone(),
                        attempts: self.attempts,
                        status: response.status,
                    });
                }
                AttemptOutcome::RetryAfter(delay) => sleeper.sleep(delay).await,
                AttemptOutcome::Exhausted(error) => return self.conclude_exhausted(error),
                AttemptOutcome::AlreadyFinished(state) => {
                    return Ok(self.report_finished(state));
                }
            }
        }
    }

    fn report_finished(&self, state: JobState) -> DeliveryReport {
        match (state, self.success_status) {
            (JobState::Succeeded, Some(status)) => DeliveryReport::Succeeded {
                uuid: self.uuid.clone(),
                attempts: self.attempts,
                status,
            },
            _ => DeliveryReport::Exhausted {
                uuid: self.uuid.clone(),
                attempts: self.attempts,
                last_error: self
                    .failures
                    .last()
                    .map(|f| f.message.clone())
                    .unwrap_or_default(),
            },
        }
    }
}

/// Flattens a payload into name/value pairs for query strings and forms.
fn payload_pairs(payload: &Value) -> Vec<(String, String)> {
    match payload {
        Value::Null => Vec::new(),
        Value::Object(map) => map
            .iter()
            .map(|(name, value)| (name.clone(), scalar_text(value)))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, value)| (index.to_string(), scalar_text(value)))
            .collect(),
        other => vec![("payload".to_string(), scalar_text(other))],
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
