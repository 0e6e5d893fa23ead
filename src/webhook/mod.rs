//! Outbound webhook delivery.
//!
//! This module provides types and traits for:
//! - Building and dispatching signed webhook calls ([`WebhookCall`])
//! - The frozen delivery job and its attempt cycle ([`CallWebhookJob`])
//! - Request signing ([`Signer`], [`DefaultSigner`], [`PayloadSigner`])
//! - Delays between attempts ([`BackoffStrategy`], [`ExponentialBackoff`], [`ConstantBackoff`])
//! - Queue runtimes ([`TaskQueue`], [`TokioQueue`])
//! - HTTP transport ([`HttpClient`], [`ReqwestClient`])

mod backoff;
mod call;
mod client;
mod error;
mod http;
mod job;
mod queue;
mod signer;

#[cfg(test)]
mod backoff_tests;
#[cfg(test)]
mod call_tests;
#[cfg(test)]
mod signer_tests;
#[cfg(test)]
mod test_support;

pub use backoff::{BackoffStrategy, ConstantBackoff, ExponentialBackoff, backoff_by_name};
pub use call::{CORRELATION_HEADER, WebhookCall, parse_http_verb};
pub use client::ReqwestClient;
pub use error::{
    AttemptError, ConfigurationError, CouldNotCallWebhook, DispatchError, HttpError, QueueError,
    WebhookError,
};
pub use http::{HttpClient, HttpRequest, HttpResponse, ProxyConfig, TransportPolicy};
pub use job::{
    AttemptFailure, AttemptOutcome, CallWebhookJob, DeliveryReport, JobKind, JobState,
};
pub use queue::{DeliveryEvent, PendingDispatch, QueueConfig, TaskQueue, TokioQueue};
pub use signer::{DefaultSigner, PayloadSigner, SIGNATURE_HEADER, Signer, signer_by_name};
