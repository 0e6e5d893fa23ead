//! Time abstraction for testability.
//!
//! This module provides a [`Sleeper`] trait so that the synchronous
//! dispatch path can wait between attempts without hard-wiring
//! `tokio::time::sleep`, allowing tests to skip real delays.

use std::time::Duration;

/// Abstraction over waiting for a duration.
///
/// Used by [`WebhookCall::dispatch_sync`] to honor the backoff delay a
/// delivery job asks for between attempts.
///
/// # Example
///
/// ```
/// use webhook_call::time::{InstantSleeper, Sleeper};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// InstantSleeper.sleep(Duration::from_secs(3600)).await;
/// # }
/// ```
///
/// [`WebhookCall::dispatch_sync`]: crate::webhook::WebhookCall::dispatch_sync
pub trait Sleeper: Send + Sync {
    /// Waits for the given duration.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

/// Production sleeper backed by [`tokio::time::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper that returns immediately.
///
/// Intended for tests and for callers that want to retry without waiting.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantSleeper;

impl Sleeper for InstantSleeper {
    async fn sleep(&self, _duration: Duration) {}
}
