//! Tests for the `WebhookCall` builder and its dispatch paths.

use std::sync::Mutex;
use std::time::Duration;

use http::HeaderMap;
use http::header::{CONTENT_TYPE, HeaderValue};
use serde_json::json;

use super::test_support::{MockClient, TEST_URL, test_call, test_config};
use super::{
    AttemptOutcome, CORRELATION_HEADER, CallWebhookJob, ConfigurationError, ConstantBackoff,
    CouldNotCallWebhook, DefaultSigner, DeliveryReport, DispatchError, PayloadSigner,
    PendingDispatch, ProxyConfig, QueueError, SIGNATURE_HEADER, Signer, TaskQueue, WebhookCall,
    WebhookError, parse_http_verb,
};
use crate::time::InstantSleeper;

/// Queue that records pushed jobs without running them.
#[derive(Default)]
struct RecordingQueue {
    jobs: Mutex<Vec<CallWebhookJob>>,
    refuse: bool,
}

impl RecordingQueue {
    fn refusing() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            refuse: true,
        }
    }

    fn jobs(&self) -> Vec<CallWebhookJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl TaskQueue for RecordingQueue {
    fn push(&self, job: CallWebhookJob) -> Result<PendingDispatch, QueueError> {
        if self.refuse {
            return Err(QueueError::Closed);
        }
        let handle = PendingDispatch::for_job(&job);
        self.jobs.lock().unwrap().push(job);
        Ok(handle)
    }
}

#[derive(Debug)]
struct StaticSigner;

impl Signer for StaticSigner {
    fn signature_header_name(&self) -> &str {
        "X-Custom-Signature"
    }

    fn calculate_signature(
        &self,
        _url: &str,
        _payload: &serde_json::Value,
        _secret: &str,
    ) -> String {
        "fixed".to_string()
    }
}

mod preconditions {
    use super::*;

    #[tokio::test]
    async fn missing_url_fails_before_any_http_call() {
        let client = MockClient::success();

        let err = WebhookCall::create(&test_config())
            .use_secret("shh")
            .dispatch_sync(&client, &InstantSleeper)
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::CouldNotCall(CouldNotCallWebhook::UrlNotSet)));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn empty_url_counts_as_missing() {
        let err = test_call().url("  ").into_job().unwrap_err();

        assert_eq!(err, CouldNotCallWebhook::UrlNotSet);
    }

    #[test]
    fn unparsable_url_is_rejected() {
        let err = test_call().url("not a url").into_job().unwrap_err();

        assert!(matches!(
            err,
            CouldNotCallWebhook::InvalidUrl { ref url, .. } if url == "not a url"
        ));
    }

    #[tokio::test]
    async fn missing_secret_fails_before_any_http_call() {
        let client = MockClient::success();

        let err = WebhookCall::create(&test_config())
            .url(TEST_URL)
            .dispatch_sync(&client, &InstantSleeper)
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::CouldNotCall(CouldNotCallWebhook::SecretNotSet)));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn empty_secret_counts_as_missing() {
        let err = test_call().use_secret("").into_job().unwrap_err();

        assert_eq!(err, CouldNotCallWebhook::SecretNotSet);
    }

    #[test]
    fn do_not_sign_needs_no_secret() {
        let job = WebhookCall::create(&test_config())
            .url(TEST_URL)
            .do_not_sign()
            .into_job()
            .unwrap();

        assert!(job.headers().get(SIGNATURE_HEADER).is_none());
    }

    #[test]
    fn queue_dispatch_checks_preconditions_first() {
        let queue = RecordingQueue::default();

        let err = WebhookCall::create(&test_config())
            .use_secret("shh")
            .dispatch(&queue)
            .unwrap_err();

        assert_eq!(err, DispatchError::CouldNotCall(CouldNotCallWebhook::UrlNotSet));
        assert!(queue.jobs().is_empty());
    }
}

mod signing {
    use super::*;

    #[test]
    fn signature_header_is_present_exactly_once() {
        let job = test_call().into_job().unwrap();

        assert_eq!(job.headers().get_all(SIGNATURE_HEADER).iter().count(), 1);
    }

    #[test]
    fn signature_matches_signer_output() {
        let payload = json!({ "event": "ping", "id": 7 });
        let expected = DefaultSigner.calculate_signature(TEST_URL, &payload, "shh");

        let job = test_call().into_job().unwrap();

        assert_eq!(job.headers()[SIGNATURE_HEADER], expected.as_str());
    }

    #[test]
    fn identical_calls_sign_identically() {
        let one = test_call().into_job().unwrap();
        let two = test_call().into_job().unwrap();

        assert_eq!(one.headers()[SIGNATURE_HEADER], two.headers()[SIGNATURE_HEADER]);
    }

    #[test]
    fn custom_signer_controls_header_name() {
        let job = test_call().sign_using(StaticSigner).into_job().unwrap();

        assert_eq!(job.headers()["x-custom-signature"], "fixed");
        assert!(job.headers().get(SIGNATURE_HEADER).is_none());
    }

    #[test]
    fn named_signer_is_used() {
        let payload = json!({ "event": "ping", "id": 7 });
        let expected = PayloadSigner.calculate_signature(TEST_URL, &payload, "shh");

        let job = test_call().sign_using_named("payload").unwrap().into_job().unwrap();

        assert_eq!(job.headers()[SIGNATURE_HEADER], expected.as_str());
    }

    #[test]
    fn signature_covers_url_as_given() {
        let payload = json!({ "a": 1 });
        let expected = DefaultSigner.calculate_signature("https://Example.COM", &payload, "s");

        let job = WebhookCall::create(&test_config())
            .url("https://Example.COM")
            .payload(payload)
            .use_secret("s")
            .into_job()
            .unwrap();

        assert_eq!(job.headers()[SIGNATURE_HEADER], expected.as_str());
        assert_eq!(job.url().as_str(), "https://example.com/");
    }

    #[test]
    fn secret_is_not_printed() {
        let debug = format!("{:?}", test_call().use_secret("very-secret-value"));

        assert!(!debug.contains("very-secret-value"));
        assert!(debug.contains("redacted"));
    }
}

mod correlation {
    use super::*;

    #[test]
    fn each_builder_gets_a_distinct_id() {
        let one = test_call();
        let two = test_call();

        assert_ne!(one.correlation_id(), two.correlation_id());
        assert!(uuid::Uuid::parse_str(one.correlation_id()).is_ok());
    }

    #[test]
    fn correlation_header_carries_the_id() {
        let call = test_call();
        let id = call.correlation_id().to_string();

        let job = call.into_job().unwrap();

        assert_eq!(job.uuid(), id);
        assert_eq!(job.headers()[CORRELATION_HEADER], id.as_str());
    }

    #[test]
    fn explicit_uuid_replaces_generated_one() {
        let job = test_call().uuid("order-42").into_job().unwrap();

        assert_eq!(job.uuid(), "order-42");
    }

    #[test]
    fn uuid_that_is_not_a_header_value_is_rejected() {
        let err = test_call().uuid("bad\nid").into_job().unwrap_err();

        assert_eq!(err, CouldNotCallWebhook::InvalidHeader(CORRELATION_HEADER.to_string()));
    }

    #[test]
    fn blank_uuid_is_rejected() {
        for id in ["", "   "] {
            let err = test_call().do_not_sign().uuid(id).into_job().unwrap_err();

            assert_eq!(err, CouldNotCallWebhook::InvalidHeader(CORRELATION_HEADER.to_string()));
        }
    }
}

mod setters {
    use super::*;

    #[test]
    fn defaults_come_from_config() {
        let job = test_call().into_job().unwrap();

        assert_eq!(job.method(), &http::Method::POST);
        assert_eq!(job.tries(), 3);
        assert_eq!(job.queue(), "default");
        assert!(job.connection().is_none());
        assert!(!job.transport().verify_ssl);
        assert!(!job.throws_on_exhaustion());
        assert_eq!(job.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn http_verb_is_case_insensitive() {
        let job = test_call().use_http_verb("patch").unwrap().into_job().unwrap();

        assert_eq!(job.method(), &http::Method::PATCH);
    }

    #[test]
    fn unsupported_verb_is_rejected_immediately() {
        let err = test_call().use_http_verb("TRACE").unwrap_err();

        assert_eq!(err, ConfigurationError::InvalidHttpVerb("TRACE".to_string()));
        assert!(parse_http_verb("HEAD").is_err());
    }

    #[test]
    fn unknown_backoff_name_is_rejected_immediately() {
        let err = test_call().use_backoff_strategy_named("linear").unwrap_err();

        assert_eq!(err, ConfigurationError::InvalidBackoffStrategy("linear".to_string()));
    }

    #[test]
    fn unknown_signer_name_is_rejected_immediately() {
        let err = test_call().sign_using_named("rot13").unwrap_err();

        assert_eq!(err, ConfigurationError::InvalidSigner("rot13".to_string()));
    }

    #[test]
    fn unknown_job_name_is_rejected_immediately() {
        let err = test_call().use_job_named("send_sms").unwrap_err();

        assert_eq!(err, ConfigurationError::InvalidWebhookJob("send_sms".to_string()));
    }

    #[test]
    #[should_panic(expected = "tries must be at least 1")]
    fn zero_tries_panics() {
        let _ = test_call().maximum_tries(0);
    }

    #[test]
    fn with_headers_overrides_same_name() {
        let mut extra = HeaderMap::new();
        extra.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        extra.insert("x-tenant", HeaderValue::from_static("acme"));

        let job = test_call().with_headers(extra).into_job().unwrap();

        assert_eq!(job.headers().get_all(CONTENT_TYPE).iter().count(), 1);
        assert_eq!(job.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(job.headers()["x-tenant"], "acme");
    }

    #[test]
    fn invalid_header_is_rejected_immediately() {
        let err = test_call().with_header("bad header", "x").unwrap_err();

        assert!(matches!(
            err,
            ConfigurationError::InvalidHeader { ref name, .. } if name == "bad header"
        ));
    }

    #[test]
    fn payload_from_serializes_struct() {
        #[derive(serde::Serialize)]
        struct Order {
            id: u32,
        }

        let job = test_call()
            .payload_from(&Order { id: 9 })
            .unwrap()
            .into_job()
            .unwrap();

        assert_eq!(job.payload(), &json!({ "id": 9 }));
    }

    #[test]
    fn transport_and_routing_setters_reach_job() {
        let mut meta = serde_json::Map::new();
        meta.insert("order".to_string(), json!(42));

        let job = test_call()
            .on_queue("priority")
            .on_connection("redis")
            .timeout(Duration::from_millis(1500))
            .verify_ssl(true)
            .use_proxy(ProxyConfig::All("http://proxy.test:3128".to_string()))
            .with_tags(["billing", "v2"])
            .meta(meta.clone())
            .throw_exception_on_failure(true)
            .into_job()
            .unwrap();

        assert_eq!(job.queue(), "priority");
        assert_eq!(job.connection(), Some("redis"));
        assert_eq!(job.timeout(), Some(Duration::from_millis(1500)));
        assert!(job.transport().verify_ssl);
        assert!(job.transport().proxy.is_some());
        assert_eq!(job.tags(), ["billing".to_string(), "v2".to_string()]);
        assert_eq!(job.meta(), &meta);
        assert!(job.throws_on_exhaustion());
    }

    #[test]
    fn do_not_verify_ssl_turns_verification_off() {
        let job = test_call().verify_ssl(true).do_not_verify_ssl().into_job().unwrap();

        assert!(!job.transport().verify_ssl);
    }
}

mod queued_dispatch {
    use super::*;

    #[test]
    fn dispatch_pushes_frozen_job() {
        let queue = RecordingQueue::default();
        let call = test_call().on_queue("priority");
        let id = call.correlation_id().to_string();

        let handle = call.dispatch(&queue).unwrap();

        assert_eq!(handle.uuid, id);
        assert_eq!(handle.queue, "priority");
        assert_eq!(queue.jobs().len(), 1);
    }

    #[test]
    fn refused_job_is_queue_error() {
        let err = test_call().dispatch(&RecordingQueue::refusing()).unwrap_err();

        assert_eq!(err, DispatchError::Queue(QueueError::Closed));
    }

    #[test]
    fn dispatch_if_false_does_nothing() {
        let queue = RecordingQueue::default();

        let result = test_call().dispatch_if(false, &queue).unwrap();

        assert!(result.is_none());
        assert!(queue.jobs().is_empty());
    }

    #[test]
    fn dispatch_unless_false_dispatches() {
        let queue = RecordingQueue::default();

        let result = test_call().dispatch_unless(false, &queue).unwrap();

        assert!(result.is_some());
        assert_eq!(queue.jobs().len(), 1);
    }

    #[test]
    fn skipped_dispatch_does_not_validate() {
        let queue = RecordingQueue::default();

        let result = WebhookCall::create(&test_config()).dispatch_unless(true, &queue);

        assert_eq!(result, Ok(None));
    }
}

mod sync_dispatch {
    use super::*;

    #[tokio::test]
    async fn succeeds_after_one_failure() {
        let client = MockClient::failing_then_success(1);

        let report = test_call()
            .dispatch_sync(&client, &InstantSleeper)
            .await
            .unwrap();

        assert!(matches!(report, DeliveryReport::Succeeded { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn every_attempt_carries_same_correlation_id() {
        let client = MockClient::failing_then_success(2);
        let call = test_call();
        let id = call.correlation_id().to_string();

        call.dispatch_sync(&client, &InstantSleeper).await.unwrap();

        let requests = client.captured_requests();
        assert_eq!(requests.len(), 3);
        for request in requests {
            assert_eq!(request.headers[CORRELATION_HEADER], id.as_str());
        }
    }

    #[tokio::test]
    async fn exhausted_without_throwing_reports_exhaustion() {
        let client = MockClient::always_failing();

        let report = test_call()
            .maximum_tries(2)
            .dispatch_sync(&client, &InstantSleeper)
            .await
            .unwrap();

        assert!(matches!(report, DeliveryReport::Exhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn exhausted_with_throwing_is_error() {
        let client = MockClient::with_statuses(&[503, 503]);

        let err = test_call()
            .maximum_tries(2)
            .throw_exception_on_failure(true)
            .dispatch_sync(&client, &InstantSleeper)
            .await
            .unwrap_err();

        match err {
            WebhookError::MaxAttemptsExceeded { attempts, last_error, .. } => {
                assert_eq!(attempts, 2);
                assert_eq!(last_error.status(), Some(http::StatusCode::SERVICE_UNAVAILABLE));
            }
            other @ WebhookError::CouldNotCall(_) => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn constant_backoff_is_honored() {
        let client = MockClient::always_failing();
        let mut job = test_call()
            .use_backoff_strategy(ConstantBackoff::new(Duration::from_secs(5)))
            .into_job()
            .unwrap();

        let outcome = job.attempt(&client).await;

        assert!(matches!(outcome, AttemptOutcome::RetryAfter(d) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn dispatch_sync_if_false_makes_no_call() {
        let client = MockClient::success();

        let report = test_call()
            .dispatch_sync_if(false, &client, &InstantSleeper)
            .await
            .unwrap();

        assert!(report.is_none());
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn dispatch_sync_unless_false_calls() {
        let client = MockClient::success();

        let report = test_call()
            .dispatch_sync_unless(false, &client, &InstantSleeper)
            .await
            .unwrap();

        assert!(report.is_some());
        assert_eq!(client.calls(), 1);
    }
}
