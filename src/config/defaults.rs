//! Default values for configuration options.
//!
//! Centralized constants to avoid magic numbers scattered across the codebase.

use std::time::Duration;

/// Default delivery job implementation.
pub const WEBHOOK_JOB: &str = "call_webhook";

/// Default queue name.
pub const QUEUE: &str = "default";

/// Default HTTP verb for webhook calls.
pub const HTTP_VERB: &str = "POST";

/// Default maximum number of attempts, including the first.
pub const TRIES: u32 = 3;

/// Default backoff strategy name.
pub const BACKOFF_STRATEGY: &str = "exponential";

/// Default backoff base delay in seconds.
pub const BACKOFF_BASE_DELAY_SECS: u64 = 10;

/// Default backoff delay cap in seconds.
pub const BACKOFF_MAX_DELAY_SECS: u64 = 3600;

/// Default backoff multiplier.
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default signer name.
pub const SIGNER: &str = "default";

/// Default `Content-Type` header.
pub const CONTENT_TYPE: &str = "application/json";

/// TLS certificates are not verified unless enabled.
pub const VERIFY_SSL: bool = false;

/// Exhausting the attempt budget is reported, not raised.
pub const THROW_EXCEPTION_ON_FAILURE: bool = false;

/// Default number of workers per queue for the in-process runtime.
pub const WORKERS: usize = 4;

/// Default backoff base delay as Duration.
#[must_use]
pub const fn backoff_base_delay() -> Duration {
    Duration::from_secs(BACKOFF_BASE_DELAY_SECS)
}

/// Default backoff delay cap as Duration.
#[must_use]
pub const fn backoff_max_delay() -> Duration {
    Duration::from_secs(BACKOFF_MAX_DELAY_SECS)
}
