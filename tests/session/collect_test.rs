//! Tests for the blocking collection helpers.

use std::time::{Duration, Instant};

use claude_session::{Error, Session};
use tokio_util::sync::CancellationToken;

use super::config_for;
use crate::common::{FakeCli, FIXTURE, FIXTURE_MODEL, FIXTURE_SESSION_ID, FIXTURE_TEXT};

#[tokio::test]
async fn collect_all_concatenates_assistant_text() {
    let fake = FakeCli::emitting(FIXTURE);
    let session = Session::new(config_for(&fake));

    let text = session
        .collect_all(&CancellationToken::new(), "fix it")
        .await
        .into_result()
        .unwrap();
    assert_eq!(text, FIXTURE_TEXT.concat());
}

#[tokio::test]
async fn collect_messages_returns_every_message() {
    let fake = FakeCli::emitting(FIXTURE);
    let session = Session::new(config_for(&fake));

    let collected = session
        .collect_messages(&CancellationToken::new(), "fix it")
        .await;
    assert!(collected.is_ok());
    assert_eq!(collected.value.len(), 10);
    assert!(collected.value[9].is_result());
}

#[tokio::test]
async fn run_and_collect_gathers_accounting() {
    let fake = FakeCli::emitting(FIXTURE);
    let session = Session::new(config_for(&fake));

    let result = session
        .run_and_collect(&CancellationToken::new(), "fix it")
        .await
        .into_result()
        .unwrap();

    assert_eq!(result.text, FIXTURE_TEXT.concat());
    assert_eq!(result.messages.len(), 10);
    assert_eq!(result.num_turns, 7);
    assert_eq!(result.model, FIXTURE_MODEL);
    assert_eq!(result.session_id, FIXTURE_SESSION_ID);
    assert_eq!(result.duration_api, Duration::from_millis(24484));
    assert!((result.total_cost_usd - 0.140_958_25).abs() < 1e-12);
    assert_eq!(result.usage.unwrap().cache_read_input_tokens, 115_944);
    assert_eq!(result.metrics.model, FIXTURE_MODEL);
    assert_eq!(result.metrics.num_turns, 7);
}

#[tokio::test]
async fn cancellation_returns_partial_text() {
    let fake = FakeCli::emitting_then_hanging(r#"{"type":"assistant","text":"partial"}"#);
    let session = Session::new(config_for(&fake));
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let collected = session.collect_all(&token, "hang").await;
    assert!(matches!(collected.error, Some(Error::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(10));

    tokio::time::timeout(Duration::from_secs(10), session.done())
        .await
        .unwrap();
    assert!(matches!(session.err(), Some(Error::Cancelled)));
}

#[tokio::test]
async fn exit_failure_keeps_collected_text() {
    let fake = FakeCli::script(
        "echo '{\"type\":\"assistant\",\"text\":\"half an answer\"}'\necho 'overloaded' >&2\nexit 1",
    );
    let session = Session::new(config_for(&fake));

    let collected = session.collect_all(&CancellationToken::new(), "hi").await;
    assert_eq!(collected.value, "half an answer");
    assert_eq!(collected.error.and_then(|e| e.exit_code()), Some(1));
}

#[tokio::test]
async fn collect_needs_its_channel() {
    let fake = FakeCli::emitting(FIXTURE);
    let session = Session::new(config_for(&fake));
    let _text = session.take_text().unwrap();

    let collected = session.collect_all(&CancellationToken::new(), "hi").await;
    assert!(matches!(collected.error, Some(Error::ChannelTaken("text"))));
    assert!(!session.is_done());
}
