//! Task-queue runtime contract and an in-process tokio implementation.
//!
//! Delivery jobs never wait on their own; a [`TaskQueue`] owns timing.
//! [`TokioQueue`] runs jobs on per-queue worker pools and re-enqueues a
//! failed job only after the delay its backoff strategy asked for, so the
//! attempts of one delivery never overlap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use super::{AttemptOutcome, CallWebhookJob, HttpClient, QueueError};

/// Handle for a job accepted by a [`TaskQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDispatch {
    /// Correlation id of the queued delivery
    pub uuid: String,
    /// Queue the job was pushed to
    pub queue: String,
    /// Connection hint carried by the job
    pub connection: Option<String>,
}

impl PendingDispatch {
    /// Creates the handle for `job`.
    #[must_use]
    pub fn for_job(job: &CallWebhookJob) -> Self {
        Self {
            uuid: job.uuid().to_string(),
            queue: job.queue().to_string(),
            connection: job.connection().map(ToString::to_string),
        }
    }
}

/// Runtime that executes delivery jobs.
///
/// Implementations must invoke [`CallWebhookJob::attempt`] until it stops
/// returning [`AttemptOutcome::RetryAfter`], waiting at least the returned
/// delay between invocations and never running two attempts of the same
/// job at once.
pub trait TaskQueue: Send + Sync {
    /// Accepts a job for execution.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the job cannot be accepted.
    fn push(&self, job: CallWebhookJob) -> Result<PendingDispatch, QueueError>;
}

/// Notification published by [`TokioQueue`] as jobs progress.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryEvent {
    /// An attempt got a 2xx response.
    Succeeded {
        /// Correlation id
        uuid: String,
        /// Attempt number
        attempt: u32,
        /// Response status
        status: http::StatusCode,
        /// Tags of the call
        tags: Vec<String>,
        /// Metadata of the call
        meta: Map<String, Value>,
    },
    /// An attempt failed and another one is scheduled.
    AttemptFailed {
        /// Correlation id
        uuid: String,
        /// Attempt number
        attempt: u32,
        /// Failure description
        error: String,
        /// Delay before the next attempt
        retry_after: Duration,
        /// Tags of the call
        tags: Vec<String>,
        /// Metadata of the call
        meta: Map<String, Value>,
    },
    /// The final attempt failed.
    FinalAttemptFailed {
        /// Correlation id
        uuid: String,
        /// Attempt number
        attempt: u32,
        /// Failure description
        error: String,
        /// Tags of the call
        tags: Vec<String>,
        /// Metadata of the call
        meta: Map<String, Value>,
    },
}

impl DeliveryEvent {
    /// Correlation id of the delivery the event belongs to.
    #[must_use]
    pub fn uuid(&self) -> &str {
        match self {
            Self::Succeeded { uuid, .. }
            | Self::AttemptFailed { uuid, .. }
            | Self::FinalAttemptFailed { uuid, .. } => uuid,
        }
    }

    /// Attempt number the event refers to.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        match self {
            Self::Succeeded { attempt, .. }
            | Self::AttemptFailed { attempt, .. }
            | Self::FinalAttemptFailed { attempt, .. } => *attempt,
        }
    }
}

/// Worker layout for [`TokioQueue`].
///
/// # Example
///
/// ```
/// use webhook_call::webhook::QueueConfig;
///
/// let config = QueueConfig::new()
///     .with_queue("default", 4)
///     .with_queue("priority", 2);
/// assert_eq!(config.queues().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    queues: Vec<(String, usize)>,
    event_capacity: usize,
}

impl QueueConfig {
    /// Default capacity of the event channel.
    pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

    /// Creates an empty layout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            queues: Vec::new(),
            event_capacity: Self::DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Adds a queue served by `workers` workers (at least one).
    ///
    /// Adding a queue name twice replaces the earlier worker count.
    #[must_use]
    pub fn with_queue(mut self, name: impl Into<String>, workers: usize) -> Self {
        let name = name.into();
        self.queues.retain(|(existing, _)| *existing != name);
        self.queues.push((name, workers.max(1)));
        self
    }

    /// Sets how many undelivered events a slow subscriber may fall behind.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Configured queues and their worker counts.
    #[must_use]
    pub fn queues(&self) -> &[(String, usize)] {
        &self.queues
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new().with_queue(crate::config::defaults::QUEUE, crate::config::defaults::WORKERS)
    }
}

type JobReceiver = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<CallWebhookJob>>>;

#[derive(Debug)]
struct Shared {
    senders: HashMap<String, mpsc::UnboundedSender<CallWebhookJob>>,
    events: broadcast::Sender<DeliveryEvent>,
    pending: watch::Sender<usize>,
    failed: Mutex<Vec<CallWebhookJob>>,
    closed: AtomicBool,
}

impl Shared {
    fn publish(&self, event: DeliveryEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn finish_job(&self) {
        self.pending.send_modify(|n| *n = n.saturating_sub(1));
    }

    fn enqueue(&self, job: CallWebhookJob) -> Result<(), QueueError> {
        let sender = self
            .senders
            .get(job.queue())
            .ok_or_else(|| QueueError::UnknownQueue(job.queue().to_string()))?;
        sender.send(job).map_err(|_| QueueError::Closed)
    }
}

/// In-process [`TaskQueue`] running on the tokio runtime.
///
/// Jobs live in memory only; pending retries are lost when the process
/// exits. Jobs that exhaust their attempts while configured to throw are
/// kept in a failed list (see [`failed_jobs`](Self::failed_jobs)).
#[derive(Debug)]
pub struct TokioQueue {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TokioQueue {
    /// Starts the worker pools described by `config`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start<H>(config: &QueueConfig, client: H) -> Self
    where
        H: HttpClient + 'static,
    {
        let client = Arc::new(client);
        let (events, _) = broadcast::channel(config.event_capacity);
        let (pending, _) = watch::channel(0);

        let mut senders = HashMap::new();
        let mut receivers = Vec::new();
        for (name, workers) in &config.queues {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.insert(name.clone(), tx);
            receivers.push((name.clone(), *workers, Arc::new(tokio::sync::Mutex::new(rx))));
        }

        let shared = Arc::new(Shared {
            senders,
            events,
            pending,
            failed: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });

        let mut handles = Vec::new();
        for (name, workers, receiver) in receivers {
            tracing::debug!(queue = %name, workers, "Starting queue workers");
            for _ in 0..workers {
                handles.push(tokio::spawn(run_worker(
                    Arc::clone(&shared),
                    Arc::clone(&receiver),
                    Arc::clone(&client),
                )));
            }
        }

        Self {
            shared,
            workers: Mutex::new(handles),
        }
    }

    /// Subscribes to delivery events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryEvent> {
        self.shared.events.subscribe()
    }

    /// Delivery events as a stream; events missed by a lagging consumer
    /// are skipped.
    pub fn events(&self) -> impl Stream<Item = DeliveryEvent> + use<> {
        BroadcastStream::new(self.subscribe()).filter_map(Result::ok)
    }

    /// Number of accepted jobs that have not finished yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        *self.shared.pending.borrow()
    }

    /// Jobs that exhausted their attempts while configured to throw.
    #[must_use]
    pub fn failed_jobs(&self) -> Vec<CallWebhookJob> {
        self.shared
            .failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Waits until every accepted job has finished, including retries.
    pub async fn wait_idle(&self) {
        let mut pending = self.shared.pending.subscribe();
        // The sender lives in `shared`, so the channel cannot close here.
        let _ = pending.wait_for(|n| *n == 0).await;
    }

    /// Stops accepting jobs, waits for running ones, then stops workers.
    pub async fn shutdown(self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.wait_idle().await;

        let handles = std::mem::take(
            &mut *self
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            handle.abort();
        }
        tracing::debug!("Queue runtime stopped");
    }
}

impl TaskQueue for TokioQueue {
    fn push(&self, job: CallWebhookJob) -> Result<PendingDispatch, QueueError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let handle = PendingDispatch::for_job(&job);
        self.shared.pending.send_modify(|n| *n += 1);
        if let Err(e) = self.shared.enqueue(job) {
            self.shared.finish_job();
            return Err(e);
        }

        tracing::debug!(uuid = %handle.uuid, queue = %handle.queue, "Webhook job queued");
        Ok(handle)
    }
}

impl Drop for TokioQueue {
    fn drop(&mut self) {
        let handles = self
            .workers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for handle in handles.drain(..) {
            handle.abort();
        }
    }
}

async fn run_worker<H: HttpClient>(shared: Arc<Shared>, receiver: JobReceiver, client: Arc<H>) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };
        process_job(&shared, job, client.as_ref()).await;
    }
}

async fn process_job<H: HttpClient>(shared: &Arc<Shared>, mut job: CallWebhookJob, client: &H) {
    match job.attempt(client).await {
        AttemptOutcome::Succeeded(response) => {
            shared.publish(DeliveryEvent::Succeeded {
                uuid: job.uuid().to_string(),
                attempt: job.attempts(),
                status: response.status,
                tags: job.tags().to_vec(),
                meta: job.meta().clone(),
            });
            shared.finish_job();
        }
        AttemptOutcome::RetryAfter(delay) => {
            shared.publish(DeliveryEvent::AttemptFailed {
                uuid: job.uuid().to_string(),
                attempt: job.attempts(),
                error: last_failure(&job),
                retry_after: delay,
                tags: job.tags().to_vec(),
                meta: job.meta().clone(),
            });
            schedule_retry(Arc::clone(shared), job, delay);
        }
        AttemptOutcome::Exhausted(error) => {
            shared.publish(DeliveryEvent::FinalAttemptFailed {
                uuid: job.uuid().to_string(),
                attempt: job.attempts(),
                error: error.to_string(),
                tags: job.tags().to_vec(),
                meta: job.meta().clone(),
            });
            if job.conclude_exhausted(error).is_err() {
                shared
                    .failed
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(job);
            }
            shared.finish_job();
        }
        AttemptOutcome::AlreadyFinished(state) => {
            tracing::debug!(uuid = %job.uuid(), ?state, "Skipping finished webhook job");
            shared.finish_job();
        }
    }
}

fn schedule_retry(shared: Arc<Shared>, job: CallWebhookJob, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let uuid = job.uuid().to_string();
        if let Err(e) = shared.enqueue(job) {
            tracing::error!(%uuid, error = %e, "Could not re-enqueue webhook job");
            shared.finish_job();
        }
    });
}

fn last_failure(job: &CallWebhookJob) -> String {
    job.failures()
        .last()
        .map(|f| f.message.clone())
        .unwrap_or_default()
}
