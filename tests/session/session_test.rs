//! Tests for channel fan-out and session lifecycle.

use std::time::Duration;

use claude_session::{extract_text, Error, Session, StreamMessage};
use tokio_util::sync::CancellationToken;

use super::config_for;
use crate::common::{FakeCli, FIXTURE, FIXTURE_MODEL, FIXTURE_SESSION_ID, FIXTURE_TEXT};

const DONE_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn channels_carry_the_whole_stream() {
    let fake = FakeCli::emitting(FIXTURE);
    let session = Session::new(config_for(&fake).id("fixture"));
    let mut messages = session.take_messages().unwrap();
    let mut text = session.take_text().unwrap();

    session.run(&CancellationToken::new(), "fix it").await.unwrap();
    assert!(session.launcher_pid().is_some());

    let mut received = Vec::new();
    while let Some(msg) = messages.recv().await {
        received.push(msg);
    }
    let mut chunks = Vec::new();
    while let Some(chunk) = text.recv().await {
        chunks.push(chunk);
    }

    assert_eq!(received.len(), 10);
    assert!(matches!(received[0], StreamMessage::System(_)));
    assert_eq!(chunks, FIXTURE_TEXT);

    session.wait().await.unwrap();
    assert!(session.is_done());
    assert!(session.err().is_none());
    assert_eq!(session.id(), "fixture");
}

#[tokio::test]
async fn text_never_overtakes_its_message() {
    let fake = FakeCli::emitting(FIXTURE);
    let session = Session::new(config_for(&fake));
    let mut messages = session.take_messages().unwrap();
    let mut text = session.take_text().unwrap();
    session.run(&CancellationToken::new(), "fix it").await.unwrap();

    let mut with_text = 0;
    let mut chunks = 0;
    while let Some(_chunk) = text.recv().await {
        chunks += 1;
        while let Ok(msg) = messages.try_recv() {
            if msg.is_assistant() && !extract_text(&msg).is_empty() {
                with_text += 1;
            }
        }
        assert!(with_text >= chunks, "text chunk {chunks} arrived before its message");
    }

    assert_eq!(chunks, FIXTURE_TEXT.len());
    session.wait().await.unwrap();
}

#[tokio::test]
async fn metrics_keep_model_from_init() {
    let fake = FakeCli::emitting(FIXTURE);
    let session = Session::new(config_for(&fake));
    session.run(&CancellationToken::new(), "fix it").await.unwrap();
    tokio::time::timeout(DONE_TIMEOUT, session.done()).await.unwrap();

    let metrics = session.current_metrics();
    assert_eq!(metrics.model, FIXTURE_MODEL);
    assert_eq!(metrics.session_id, FIXTURE_SESSION_ID);
    assert_eq!(metrics.num_turns, 7);
    assert_eq!(metrics.output_tokens, 850);
}

#[tokio::test]
async fn undersized_buffer_drops_and_reports() {
    let burst: String = (0..50)
        .map(|i| format!("{{\"type\":\"assistant\",\"text\":\"chunk {i}\"}}\n"))
        .collect();
    let fake = FakeCli::emitting(&burst);
    let session = Session::new(config_for(&fake).channel_buffer(2));
    let mut messages = session.take_messages().unwrap();
    let mut errors = session.take_errors().unwrap();

    session.run(&CancellationToken::new(), "burst").await.unwrap();
    // Nothing is read until the run is over; the reader must not block.
    tokio::time::timeout(DONE_TIMEOUT, session.done()).await.unwrap();

    let mut delivered = 0;
    while messages.recv().await.is_some() {
        delivered += 1;
    }
    assert!(delivered >= 1 && delivered < 50, "delivered {delivered}");

    let mut buffer_full = 0;
    while let Some(err) = errors.recv().await {
        if matches!(err, Error::BufferFull) {
            buffer_full += 1;
        }
    }
    assert!(buffer_full >= 1);
    assert!(session.err().is_none());
}

#[tokio::test]
async fn session_runs_only_once() {
    let fake = FakeCli::emitting(FIXTURE);
    let session = Session::new(config_for(&fake));
    let token = CancellationToken::new();
    session.run(&token, "first").await.unwrap();

    let second = session.run(&token, "second").await;
    assert!(matches!(
        second,
        Err(Error::AlreadyStarted | Error::SessionClosed)
    ));

    tokio::time::timeout(DONE_TIMEOUT, session.done()).await.unwrap();
    assert!(matches!(
        session.run(&token, "third").await,
        Err(Error::SessionClosed)
    ));
}

#[tokio::test]
async fn failed_start_closes_session() {
    let session = Session::new(claude_session::SessionConfig::new(
        claude_session::LaunchOptions::new().binary("/nonexistent/claude"),
    ));
    let mut text = session.take_text().unwrap();

    let err = session.run(&CancellationToken::new(), "hi").await.unwrap_err();
    assert!(matches!(err, Error::CliNotFound { .. }));
    assert!(session.is_done());
    assert!(text.recv().await.is_none());
    assert!(matches!(session.wait().await, Err(Error::NotStarted)));
}

#[tokio::test]
async fn exit_error_is_recorded_before_done() {
    let fake = FakeCli::script("echo '{\"type\":\"assistant\",\"text\":\"partial\"}'\necho 'rate limited' >&2\nexit 2");
    let session = Session::new(config_for(&fake));
    session.run(&CancellationToken::new(), "hi").await.unwrap();

    let err = session.wait().await.unwrap_err();
    assert_eq!(err.exit_code(), Some(2));
    assert!(err.to_string().contains("rate limited"));
    assert_eq!(session.err().and_then(|e| e.exit_code()), Some(2));
}

#[tokio::test]
async fn kill_ends_a_hanging_session() {
    let fake = FakeCli::emitting_then_hanging(r#"{"type":"assistant","text":"thinking"}"#);
    let session = Session::new(config_for(&fake));
    let mut text = session.take_text().unwrap();
    session.run(&CancellationToken::new(), "hang").await.unwrap();

    assert_eq!(text.recv().await.as_deref(), Some("thinking"));
    session.kill().unwrap();

    tokio::time::timeout(DONE_TIMEOUT, session.done()).await.unwrap();
    assert!(text.recv().await.is_none());
    assert!(session.err().is_some());
}
