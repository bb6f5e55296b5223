//! Streamed generation: running-text delivery, restarts across attempts,
//! malformed frames and cancellation from the sink.

use std::sync::Arc;
use std::time::Duration;
use tether::error::UpstreamError;
use tether::provider::{MockReply, MockTransport, StreamFrame};
use tether::{CancellationToken, GenerationError, RequestSpec};

use crate::integration::{scripted_client, FAST, QUALITY};

fn text(chunk: &str) -> Result<StreamFrame, UpstreamError> {
    Ok(MockTransport::text_frame(chunk))
}

#[tokio::test]
async fn sink_receives_growing_prefixes() {
    let mock = Arc::new(MockTransport::new().reply(
        FAST,
        MockReply::Frames(vec![
            text("He"),
            text("llo"),
            text(" world"),
            Ok(StreamFrame::End),
        ]),
    ));
    let mut seen = Vec::new();
    let result = scripted_client(mock)
        .generate_streaming_detailed(
            &RequestSpec::new("hi"),
            |t: &str| seen.push(t.to_string()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(seen, vec!["He", "Hello", "Hello world"]);
    assert_eq!(result.text, "Hello world");
    assert_eq!(result.chunks, vec!["He", "llo", " world"]);
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let mock = Arc::new(MockTransport::new().reply(
        FAST,
        MockReply::Frames(vec![
            Ok(StreamFrame::Data("{not json".to_string())),
            text("ok"),
            Ok(MockTransport::thought_frame("thinking")),
            Ok(StreamFrame::End),
        ]),
    ));
    let text = scripted_client(mock)
        .generate_streaming(&RequestSpec::new("hi"), |_: &str| {})
        .await
        .unwrap();
    assert_eq!(text, "ok");
}

#[tokio::test(start_paused = true)]
async fn retry_restarts_accumulation_from_empty() {
    let mock = Arc::new(
        MockTransport::new()
            .reply(
                FAST,
                MockReply::Frames(vec![
                    text("par"),
                    Err(UpstreamError::RateLimited {
                        message: "quota".to_string(),
                        retry_after: Some(Duration::from_secs(1)),
                    }),
                ]),
            )
            .reply(FAST, MockReply::Text("full answer".to_string())),
    );
    let mut seen = Vec::new();
    let result = scripted_client(mock.clone())
        .generate_streaming_detailed(
            &RequestSpec::new("hi"),
            |t: &str| seen.push(t.to_string()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(seen, vec!["par", "full answer"]);
    assert_eq!(result.text, "full answer");
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(mock.called_models(), vec![FAST, FAST]);
}

#[tokio::test]
async fn unavailable_stream_falls_back() {
    let mock = Arc::new(
        MockTransport::new()
            .reply(
                FAST,
                MockReply::Fail(UpstreamError::ModelUnavailable("gone".to_string())),
            )
            .reply(QUALITY, MockReply::Text("pro".to_string())),
    );
    let result = scripted_client(mock)
        .generate_streaming_detailed(&RequestSpec::new("hi"), |_: &str| {}, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.model, QUALITY);
    assert_eq!(result.text, "pro");
}

#[tokio::test]
async fn dropped_connection_mid_stream_is_fatal() {
    let mock = Arc::new(
        MockTransport::new()
            .reply(
                FAST,
                MockReply::Frames(vec![
                    text("half"),
                    Err(UpstreamError::Transport("connection reset".to_string())),
                ]),
            )
            .reply(QUALITY, MockReply::Text("unused".to_string())),
    );
    let err = scripted_client(mock.clone())
        .generate_streaming(&RequestSpec::new("hi"), |_: &str| {})
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Failed {
            cause: UpstreamError::Transport(_),
            ..
        }
    ));
    assert_eq!(mock.called_models(), vec![FAST]);
}

#[tokio::test]
async fn cancel_from_sink_stops_delivery() {
    let mock = Arc::new(MockTransport::new().reply(
        FAST,
        MockReply::Hang(vec![
            MockTransport::text_frame("a"),
            MockTransport::text_frame("b"),
        ]),
    ));
    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    let mut seen = Vec::new();
    let result = scripted_client(mock)
        .generate_streaming_detailed(
            &RequestSpec::new("hi"),
            |t: &str| {
                seen.push(t.to_string());
                stopper.cancel();
            },
            &cancel,
        )
        .await;

    assert!(matches!(result, Err(GenerationError::Cancelled)));
    assert_eq!(seen, vec!["a"]);
}
