//! Shared fixtures for webhook tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::WebhookConfig;

use super::{ExponentialBackoff, HttpClient, HttpError, HttpRequest, HttpResponse, WebhookCall};

/// Mock HTTP client that returns a configurable sequence of responses.
///
/// Once the scripted responses run out, every further request succeeds
/// with `200 OK`.
#[derive(Debug)]
pub struct MockClient {
    responses: Mutex<Vec<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    call_count: AtomicUsize,
}

impl MockClient {
    pub fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn success() -> Self {
        Self::new(vec![Ok(response(http::StatusCode::OK))])
    }

    pub fn failing_then_success(failures: usize) -> Self {
        let mut responses = Vec::new();
        for _ in 0..failures {
            responses.push(Err(HttpError::Timeout));
        }
        responses.push(Ok(response(http::StatusCode::OK)));
        Self::new(responses)
    }

    pub fn always_failing() -> Self {
        Self::new((0..16).map(|_| Err(HttpError::Timeout)).collect())
    }

    pub fn with_statuses(statuses: &[u16]) -> Self {
        Self::new(
            statuses
                .iter()
                .map(|s| Ok(response(http::StatusCode::from_u16(*s).unwrap())))
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn captured_requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpClient for MockClient {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(req);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(response(http::StatusCode::OK));
        }
        responses.remove(0)
    }
}

pub fn response(status: http::StatusCode) -> HttpResponse {
    HttpResponse::new(status, http::HeaderMap::new(), Vec::new())
}

pub const TEST_URL: &str = "https://example.com/webhook";

/// Defaults with a one-second base delay so delays are easy to predict.
pub fn test_config() -> WebhookConfig {
    let backoff = ExponentialBackoff::new()
        .with_base_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(60));
    WebhookConfig {
        backoff_strategy: std::sync::Arc::new(backoff.clone()),
        backoff_parameters: backoff,
        ..WebhookConfig::default()
    }
}

/// A signed call to [`TEST_URL`] with a small payload.
pub fn test_call() -> WebhookCall {
    WebhookCall::create(&test_config())
        .url(TEST_URL)
        .payload(serde_json::json!({ "event": "ping", "id": 7 }))
        .use_secret("shh")
}
