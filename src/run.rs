//! Application execution logic.
//!
//! This module builds the configured webhook call and delivers it,
//! either in the foreground or through the in-process queue runtime.

use thiserror::Error;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

use webhook_call::config::ValidatedConfig;
use webhook_call::time::{Sleeper, TokioSleeper};
use webhook_call::webhook::{
    DeliveryEvent, DeliveryReport, DispatchError, HttpClient, QueueConfig, ReqwestClient,
    TokioQueue, WebhookCall, WebhookError,
};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for runtime execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// The call could not be queued.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The foreground delivery failed.
    #[error(transparent)]
    Delivery(#[from] WebhookError),

    /// Every queued attempt failed and the call was configured to throw.
    #[error("Webhook call {uuid} failed after {attempts} attempts: {last_error}")]
    Failed {
        /// Correlation id of the delivery
        uuid: String,
        /// Number of attempts made
        attempts: u32,
        /// Description of the final failure
        last_error: String,
    },

    /// The queue runtime stopped publishing events.
    #[error("Queue runtime stopped before the delivery finished")]
    QueueStopped,

    /// A shutdown signal arrived first.
    #[error("Interrupted before the delivery finished")]
    Interrupted,
}

impl RunError {
    /// Returns true when the failure is a precondition that no retry can fix.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Dispatch(DispatchError::CouldNotCall(_))
                | Self::Delivery(WebhookError::CouldNotCall(_))
        )
    }
}

/// Delivers the configured call.
///
/// With `sync` every attempt runs in this task, sleeping between attempts.
/// Otherwise the call is pushed to a [`TokioQueue`] and this function waits
/// for its final event.
///
/// # Errors
///
/// Returns an error if the call cannot be dispatched, if every attempt
/// failed and the call throws on failure, or if a shutdown signal arrives
/// before the delivery finished.
///
/// Excluded from coverage - requires real network access and signal handling.
#[cfg(not(tarpaulin_include))]
pub async fn execute(config: ValidatedConfig) -> Result<DeliveryReport, RunError> {
    let call = build_call(&config);
    let client = ReqwestClient::new();

    tracing::info!(uuid = %call.correlation_id(), "Delivering webhook to {}", config.url);

    let delivery = async {
        if config.sync {
            deliver_sync(call, &client, &TokioSleeper).await
        } else {
            let queues =
                QueueConfig::new().with_queue(config.webhook.queue.clone(), config.workers);
            deliver_queued(call, &queues, client).await
        }
    };

    tokio::select! {
        biased;

        () = shutdown_signal() => {
            tracing::info!("Shutdown signal received, stopping...");
            Err(RunError::Interrupted)
        }

        result = delivery => result,
    }
}

/// Builds the webhook call described by the configuration.
fn build_call(config: &ValidatedConfig) -> WebhookCall {
    let call = WebhookCall::create(&config.webhook)
        .url(config.url.as_str())
        .payload(config.payload.clone());

    match (config.sign, config.secret.as_deref()) {
        (true, Some(secret)) => call.use_secret(secret),
        // A missing secret is reported when the call is dispatched.
        (true, None) => call,
        (false, _) => call.do_not_sign(),
    }
}

/// Runs every attempt in the current task.
async fn deliver_sync<H, S>(
    call: WebhookCall,
    client: &H,
    sleeper: &S,
) -> Result<DeliveryReport, RunError>
where
    H: HttpClient,
    S: Sleeper,
{
    Ok(call.dispatch_sync(client, sleeper).await?)
}

/// Pushes the call to a fresh queue runtime and waits for its final event.
async fn deliver_queued<H>(
    call: WebhookCall,
    queues: &QueueConfig,
    client: H,
) -> Result<DeliveryReport, RunError>
where
    H: HttpClient + 'static,
{
    let queue = TokioQueue::start(queues, client);
    let mut events = queue.subscribe();
    let handle = call.dispatch(&queue)?;

    let final_event = loop {
        match events.recv().await {
            Ok(event) if event.uuid() == handle.uuid => {
                if let DeliveryEvent::AttemptFailed { retry_after, .. } = &event {
                    tracing::debug!(
                        attempt = event.attempt(),
                        "Next attempt in {}s",
                        retry_after.as_secs()
                    );
                    continue;
                }
                break event;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Missed {skipped} delivery event(s)");
            }
            Err(RecvError::Closed) => return Err(RunError::QueueStopped),
        }
    };

    // The failed list is only updated once the job has finished.
    queue.wait_idle().await;
    let kept_as_failed = queue
        .failed_jobs()
        .iter()
        .any(|job| job.uuid() == handle.uuid);
    queue.shutdown().await;

    report_from_event(final_event, kept_as_failed)
}

/// Converts the final event of a queued delivery into its result.
fn report_from_event(
    event: DeliveryEvent,
    kept_as_failed: bool,
) -> Result<DeliveryReport, RunError> {
    match event {
        DeliveryEvent::Succeeded {
            uuid,
            attempt,
            status,
            ..
        } => Ok(DeliveryReport::Succeeded {
            uuid,
            attempts: attempt,
            status,
        }),
        DeliveryEvent::FinalAttemptFailed {
            uuid,
            attempt,
            error,
            ..
        }
        | DeliveryEvent::AttemptFailed {
            uuid,
            attempt,
            error,
            ..
        } => {
            if kept_as_failed {
                Err(RunError::Failed {
                    uuid,
                    attempts: attempt,
                    last_error: error,
                })
            } else {
                Ok(DeliveryReport::Exhausted {
                    uuid,
                    attempts: attempt,
                    last_error: error,
                })
            }
        }
    }
}

/// Returns a future that completes when a shutdown signal is received.
///
/// Excluded from coverage - requires OS signal handling.
#[cfg(not(tarpaulin_include))]
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
