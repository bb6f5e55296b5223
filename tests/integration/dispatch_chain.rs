//! Dispatch chain behaviour through the public client: retry budget,
//! fallback order, fatal abort and cancellation.

use std::sync::Arc;
use std::time::Duration;
use tether::error::UpstreamError;
use tether::provider::{MockReply, MockTransport};
use tether::types::{AttemptOutcomeKind, Purpose};
use tether::{CancellationToken, GenerationError, RequestSpec};
use tokio::time::Instant;

use crate::integration::{scripted_client, FAST, QUALITY};

fn rate_limited(retry_after: Option<Duration>) -> MockReply {
    MockReply::Fail(UpstreamError::RateLimited {
        message: "Resource has been exhausted".to_string(),
        retry_after,
    })
}

fn unavailable(model: &str) -> MockReply {
    MockReply::Fail(UpstreamError::ModelUnavailable(format!(
        "models/{} is not found",
        model
    )))
}

#[tokio::test(start_paused = true)]
async fn rate_limit_waits_suggested_delay_then_succeeds() {
    let mock = Arc::new(
        MockTransport::new()
            .reply(FAST, rate_limited(Some(Duration::from_secs(2))))
            .reply(FAST, MockReply::Text("ok".to_string())),
    );
    let client = scripted_client(mock.clone());

    let started = Instant::now();
    let result = client
        .generate_detailed(&RequestSpec::new("hi"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(result.text, "ok");
    assert_eq!(result.model, FAST);
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(result.attempts[0].outcome, AttemptOutcomeKind::RateLimited);
    assert_eq!(
        result.attempts[0].wait_before_retry,
        Some(Duration::from_secs(2))
    );
    assert_eq!(result.attempts[1].attempt, 1);
    assert_eq!(mock.called_models(), vec![FAST, FAST]);
}

#[tokio::test(start_paused = true)]
async fn suggested_wait_is_capped() {
    let mock = Arc::new(
        MockTransport::new()
            .reply(FAST, rate_limited(Some(Duration::from_secs(120))))
            .reply(FAST, MockReply::Text("ok".to_string())),
    );
    let result = scripted_client(mock)
        .generate_detailed(&RequestSpec::new("hi"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        result.attempts[0].wait_before_retry,
        Some(Duration::from_secs(15))
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_rate_limit_budget_falls_back_to_next_model() {
    let mock = Arc::new(
        MockTransport::new()
            .reply(FAST, rate_limited(None))
            .reply(FAST, rate_limited(None))
            .reply(QUALITY, MockReply::Text("from pro".to_string())),
    );
    let result = scripted_client(mock.clone())
        .generate_detailed(&RequestSpec::new("hi"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.model, QUALITY);
    assert_eq!(mock.called_models(), vec![FAST, FAST, QUALITY]);
    // Only the first rate limit waits; the second ends the model's budget
    assert_eq!(
        result.attempts[0].wait_before_retry,
        Some(Duration::from_secs(5))
    );
    assert_eq!(result.attempts[1].wait_before_retry, None);
}

#[tokio::test]
async fn all_models_unavailable_reports_exhausted_in_order() {
    let mock = Arc::new(
        MockTransport::new()
            .reply(FAST, unavailable(FAST))
            .reply(QUALITY, unavailable(QUALITY)),
    );
    let err = scripted_client(mock)
        .generate(&RequestSpec::new("hi"))
        .await
        .unwrap_err();

    match &err {
        GenerationError::Exhausted { last_cause, .. } => {
            assert!(matches!(last_cause, Some(UpstreamError::ModelUnavailable(_))));
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
    assert_eq!(err.models_tried(), [FAST.to_string(), QUALITY.to_string()]);
}

#[tokio::test]
async fn fatal_error_aborts_without_fallback() {
    let mock = Arc::new(
        MockTransport::new()
            .reply(
                FAST,
                MockReply::Fail(UpstreamError::Upstream {
                    status: 500,
                    message: "internal".to_string(),
                }),
            )
            .reply(QUALITY, MockReply::Text("never".to_string())),
    );
    let err = scripted_client(mock.clone())
        .generate(&RequestSpec::new("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Failed { .. }));
    assert_eq!(err.models_tried(), [FAST.to_string()]);
    assert_eq!(mock.called_models(), vec![FAST]);
}

#[tokio::test]
async fn quality_purpose_starts_with_quality_model() {
    let mock = Arc::new(
        MockTransport::new()
            .reply(QUALITY, unavailable(QUALITY))
            .reply(FAST, MockReply::Text("fast answer".to_string())),
    );
    let result = scripted_client(mock.clone())
        .generate_detailed(
            &RequestSpec::new("hi").with_purpose(Purpose::Quality),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.model, FAST);
    assert_eq!(mock.called_models(), vec![QUALITY, FAST]);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_stops_the_chain() {
    let mock = Arc::new(
        MockTransport::new()
            .reply(FAST, rate_limited(Some(Duration::from_secs(10))))
            .reply(FAST, MockReply::Text("too late".to_string())),
    );
    let client = scripted_client(mock.clone());
    let cancel = CancellationToken::new();
    let request = RequestSpec::new("hi");

    let (result, _) = tokio::join!(client.generate_detailed(&request, &cancel), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    assert!(matches!(result, Err(GenerationError::Cancelled)));
    assert_eq!(mock.called_models(), vec![FAST]);
}

#[tokio::test]
async fn cancel_before_start_issues_no_request() {
    let mock = Arc::new(MockTransport::new().reply(FAST, MockReply::Text("x".to_string())));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = scripted_client(mock.clone())
        .generate_detailed(&RequestSpec::new("hi"), &cancel)
        .await;
    assert!(matches!(result, Err(GenerationError::Cancelled)));
    assert!(mock.called_models().is_empty());
}

#[tokio::test]
async fn concurrent_calls_keep_separate_histories() {
    let mock = Arc::new(
        MockTransport::new()
            .reply(FAST, MockReply::Text("one".to_string()))
            .reply(FAST, unavailable(FAST))
            .reply(QUALITY, MockReply::Text("two".to_string())),
    );
    let client = scripted_client(mock);
    let cancel = CancellationToken::new();
    let (first, second) = (RequestSpec::new("a"), RequestSpec::new("b"));

    let (a, b) = tokio::join!(
        client.generate_detailed(&first, &cancel),
        client.generate_detailed(&second, &cancel)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let mut texts = vec![a.text.clone(), b.text.clone()];
    texts.sort();
    assert_eq!(texts, vec!["one", "two"]);
    assert_eq!(a.attempts.len() + b.attempts.len(), 3);
}
