//! Tests for the per-connection pipeline.

use std::time::Duration;

use rstest::{fixture, rstest};
use tokio::{
    io::{AsyncWriteExt, duplex},
    time::timeout,
};
use tracing_test::traced_test;

use super::*;
use crate::{
    event::CanonicalEvent,
    forwarder::{OutboundReceiver, outbound_queue},
    jserial::{ParseError, Value},
    test_helpers::{LoggingEventBuilder, event_stream},
};

struct Harness {
    context: SessionContext,
    queue: OutboundReceiver,
}

#[fixture]
fn harness() -> Harness {
    let (tx, rx) = outbound_queue(16);
    Harness {
        context: SessionContext::new(tx),
        queue: rx,
    }
}

/// Run a session over `input` delivered through an in-memory socket.
async fn run_session(
    context: &SessionContext,
    input: Vec<u8>,
) -> Result<SessionSummary, SessionError> {
    let (mut client, server) = duplex(256);
    let writer = tokio::spawn(async move {
        // The session may hang up early on fatal errors.
        let _ = client.write_all(&input).await;
    });
    let result = context.run(server, None).await;
    writer.await.expect("join writer");
    result
}

fn drain(queue: &mut OutboundReceiver) -> Vec<CanonicalEvent> {
    std::iter::from_fn(|| queue.try_recv().ok())
        .map(|json| serde_json::from_str(&json).expect("queued record is JSON"))
        .collect()
}

#[rstest]
#[tokio::test]
async fn forwards_events_in_stream_order(mut harness: Harness) {
    let input = event_stream(&[
        LoggingEventBuilder::new("hello").thread("t-1"),
        LoggingEventBuilder::new("world").location("App.java", "main"),
    ]);

    let summary = run_session(&harness.context, input)
        .await
        .expect("session succeeds");

    assert_eq!(summary.frames, 2);
    assert_eq!(summary.queued, 2);
    let events = drain(&mut harness.queue);
    let messages: Vec<_> = events.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, ["hello", "world"]);
    assert_eq!(events[0].thread, "t-1");
    assert_eq!(events[1].method, "main");
}

#[rstest]
#[tokio::test]
async fn reset_only_frame_is_skipped(mut harness: Harness) {
    let mut input = event_stream(&[LoggingEventBuilder::new("before")]);
    input.push(0x79);

    let summary = run_session(&harness.context, input)
        .await
        .expect("session succeeds");

    assert_eq!(
        summary,
        SessionSummary {
            frames: 2,
            queued: 1,
            reset: 1,
            ..SessionSummary::default()
        }
    );
    assert_eq!(drain(&mut harness.queue).len(), 1);
}

#[rstest]
#[tokio::test]
async fn truncated_final_frame_is_skipped(mut harness: Harness) {
    let mut input = event_stream(&[LoggingEventBuilder::new("whole")]);
    let cut = LoggingEventBuilder::new("cut").to_wire();
    input.extend_from_slice(&cut[..cut.len() / 2]);

    let summary = run_session(&harness.context, input)
        .await
        .expect("session succeeds");

    assert_eq!(summary.queued, 1);
    assert_eq!(summary.truncated, 1);
    assert_eq!(drain(&mut harness.queue)[0].message, "whole");
}

#[rstest]
#[traced_test]
#[tokio::test]
async fn malformed_frame_is_logged_and_skipped(mut harness: Harness) {
    let mut input = crate::splitter::STREAM_PROLOGUE.to_vec();
    input.extend_from_slice(&[0x78, 0x70, 0x78, 0x79]);
    input.extend(LoggingEventBuilder::new("after").to_wire());

    let summary = run_session(&harness.context, input)
        .await
        .expect("session succeeds");

    assert_eq!(summary.malformed, 1);
    assert_eq!(summary.queued, 1);
    assert_eq!(drain(&mut harness.queue)[0].message, "after");
    assert!(logs_contain("skipping malformed frame"));
    assert!(logs_contain("ac ed 00 05 78 70 78 79 |....xpxy|"));
}

#[rstest]
#[tokio::test]
async fn missing_prologue_ends_session_without_events(mut harness: Harness) {
    let input = LoggingEventBuilder::new("no prologue").to_wire();

    let err = run_session(&harness.context, input)
        .await
        .expect_err("session must fail");

    assert!(matches!(
        err,
        SessionError::Framing(FramingError::MissingPrologue { .. })
    ));
    assert!(drain(&mut harness.queue).is_empty());
}

#[rstest]
#[tokio::test]
async fn oversized_frame_ends_session(harness: Harness) {
    let context = harness.context.max_frame_length(64);
    let input = event_stream(&[LoggingEventBuilder::new("x".repeat(200))]);

    let err = run_session(&context, input)
        .await
        .expect_err("session must fail");

    assert!(matches!(
        err,
        SessionError::Framing(FramingError::OversizedFrame { max: 64, .. })
    ));
}

#[rstest]
#[tokio::test]
async fn substitute_decoder_is_used(mut harness: Harness) {
    let context = harness
        .context
        .clone()
        .with_decoder(|_: &[u8]| -> Result<Vec<Value>, ParseError> {
            Ok(vec![Value::Object(
                [("renderedMessage".to_owned(), Value::String("stub".into()))]
                    .into_iter()
                    .collect(),
            )])
        });

    run_session(&context, event_stream(&[LoggingEventBuilder::new("real")]))
        .await
        .expect("session succeeds");

    assert_eq!(drain(&mut harness.queue)[0].message, "stub");
}

#[tokio::test]
async fn full_queue_suspends_session_until_drained() {
    let (tx, mut rx) = outbound_queue(1);
    let context = SessionContext::new(tx);
    let input = event_stream(&[
        LoggingEventBuilder::new("first"),
        LoggingEventBuilder::new("second"),
    ]);
    let mut session = tokio::spawn(async move { run_session(&context, input).await });

    assert!(
        timeout(Duration::from_millis(100), &mut session)
            .await
            .is_err(),
        "second push should wait for queue space"
    );

    let first = rx.recv().await.expect("first record");
    assert!(first.contains("\"message\":\"first\""));

    let summary = session
        .await
        .expect("join session")
        .expect("session succeeds");
    assert_eq!(summary.queued, 2);
    let second = rx.recv().await.expect("second record");
    assert!(second.contains("\"message\":\"second\""));
}

#[tokio::test]
async fn closed_queue_stops_session() {
    let (tx, rx) = outbound_queue(1);
    drop(rx);
    let context = SessionContext::new(tx);

    let err = run_session(&context, event_stream(&[LoggingEventBuilder::new("lost")]))
        .await
        .expect_err("queue is closed");

    assert!(matches!(err, SessionError::QueueClosed));
}
