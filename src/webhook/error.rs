//! Error types for webhook configuration, dispatch and delivery.

use thiserror::Error;

/// Error type for HTTP operations.
///
/// Describes what went wrong without dictating recovery strategy.
/// Delivery jobs treat every variant as a transient failure.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network connection failed.
    ///
    /// This includes DNS resolution failures, connection refused,
    /// TLS handshake failures and other network-level errors.
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Request timed out.
    ///
    /// The server did not respond within the configured per-attempt timeout.
    #[error("Request timed out")]
    Timeout,

    /// The transport could not build the request (bad proxy URL, etc.).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Failure of a single delivery attempt.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// The HTTP call itself failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The server answered with a status outside the 2xx range.
    #[error("Server responded with HTTP {status}")]
    NonSuccessStatus {
        /// Status code returned by the server
        status: http::StatusCode,
        /// Response body, if it was valid UTF-8
        body: Option<String>,
    },
}

impl AttemptError {
    /// Returns the response status when the failure came from a response.
    #[must_use]
    pub const fn status(&self) -> Option<http::StatusCode> {
        match self {
            Self::NonSuccessStatus { status, .. } => Some(*status),
            Self::Http(_) => None,
        }
    }
}

/// Misconfiguration detected while a [`WebhookCall`] is being built.
///
/// Raised by setters, before any dispatch is attempted.
///
/// [`WebhookCall`]: super::WebhookCall
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The named backoff strategy is not a registered [`BackoffStrategy`].
    ///
    /// [`BackoffStrategy`]: super::BackoffStrategy
    #[error("`{0}` is not a valid backoff strategy")]
    InvalidBackoffStrategy(String),

    /// The named signer is not a registered [`Signer`].
    ///
    /// [`Signer`]: super::Signer
    #[error("`{0}` is not a valid signer")]
    InvalidSigner(String),

    /// The named job is not a registered delivery job.
    #[error("`{0}` is not a valid webhook job")]
    InvalidWebhookJob(String),

    /// The HTTP verb is not one of GET, POST, PUT, PATCH or DELETE.
    #[error("`{0}` is not a supported HTTP verb")]
    InvalidHttpVerb(String),

    /// A header name or value cannot be sent over HTTP.
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader {
        /// Header name as given
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// The payload could not be serialized.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// A dispatch precondition was not met.
///
/// Raised once, when the builder is frozen into a job.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CouldNotCallWebhook {
    /// No target URL was set.
    #[error("Could not call the webhook because the url has not been set.")]
    UrlNotSet,

    /// The target URL did not parse.
    #[error("Could not call the webhook because the url `{url}` is invalid: {reason}")]
    InvalidUrl {
        /// The URL as given
        url: String,
        /// Parser message
        reason: String,
    },

    /// Signing is enabled but no secret was provided.
    #[error(
        "Could not call the webhook because no secret has been set. \
         Make sure to call `use_secret` or `do_not_sign`."
    )]
    SecretNotSet,

    /// The correlation id or the signer output cannot be sent as a header.
    #[error("Could not call the webhook because a header is invalid: {0}")]
    InvalidHeader(String),
}

/// Error returned by synchronous dispatch.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// A dispatch precondition failed; no HTTP call was made.
    #[error(transparent)]
    CouldNotCall(#[from] CouldNotCallWebhook),

    /// All attempts failed and the call was configured to surface that.
    #[error("Webhook call {uuid} failed after {attempts} attempts: {last_error}")]
    MaxAttemptsExceeded {
        /// Correlation id of the delivery
        uuid: String,
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        #[source]
        last_error: AttemptError,
    },
}

/// Error returned by a [`TaskQueue`] when a job cannot be accepted.
///
/// [`TaskQueue`]: super::TaskQueue
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue runtime has shut down.
    #[error("Queue runtime is closed")]
    Closed,

    /// No workers serve the requested queue.
    #[error("Unknown queue '{0}'")]
    UnknownQueue(String),
}

/// Error returned by asynchronous dispatch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A dispatch precondition failed; nothing was queued.
    #[error(transparent)]
    CouldNotCall(#[from] CouldNotCallWebhook),

    /// The queue runtime refused the job.
    #[error(transparent)]
    Queue(#[from] QueueError),
}
