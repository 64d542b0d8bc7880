//! Tests for whole-transcript helpers on a captured stream.

use claude_session::{
    extract_all_file_access, extract_bash_command, extract_text, extract_thinking,
    get_all_tool_calls, metrics_from_transcript, parse_transcript, StreamMessage,
};

use crate::common::{FIXTURE, FIXTURE_MODEL, FIXTURE_SESSION_ID, FIXTURE_TEXT};

#[test]
fn fixture_metrics() {
    let metrics = metrics_from_transcript(FIXTURE);

    assert!((metrics.total_cost_usd - 0.140_958_25).abs() < 1e-12);
    assert_eq!(metrics.num_turns, 7);
    assert_eq!(metrics.input_tokens, 7);
    assert_eq!(metrics.output_tokens, 850);
    assert_eq!(metrics.cache_creation_input_tokens, 9277);
    assert_eq!(metrics.cache_read_input_tokens, 115_944);
    assert_eq!(metrics.total_tokens(), 857);
    assert_eq!(metrics.duration_ms, 33551);
    assert_eq!(metrics.duration_api_ms, 24484);
    assert_eq!(metrics.model, FIXTURE_MODEL);
    assert_eq!(metrics.session_id, FIXTURE_SESSION_ID);
    assert!(!metrics.is_error);
    assert_eq!(metrics.result_subtype, "success");
}

#[test]
fn fixture_extraction() {
    let messages = parse_transcript(FIXTURE);
    assert_eq!(messages.len(), 10);

    let texts: Vec<&str> = messages
        .iter()
        .filter(|m| m.is_assistant())
        .map(extract_text)
        .filter(|t| !t.is_empty())
        .collect();
    assert_eq!(texts, FIXTURE_TEXT);

    let tools: Vec<&str> = messages
        .iter()
        .flat_map(get_all_tool_calls)
        .map(|call| call.name)
        .collect();
    assert_eq!(tools, ["Read", "Edit", "Bash"]);

    assert!(extract_thinking(&messages[4]).starts_with("The kernel header is missing."));
    assert_eq!(
        extract_bash_command(&messages[6]),
        Some("west build -b native_sim samples/synchronization -p")
    );
    let files: Vec<&str> = messages.iter().flat_map(extract_all_file_access).collect();
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f.ends_with("samples/synchronization/src/main.c")));
}

#[test]
fn fixture_survives_reencoding() {
    for msg in parse_transcript(FIXTURE) {
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: StreamMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, msg, "changed after re-encoding: {encoded}");
    }
}

#[test]
fn empty_transcript_has_zero_metrics() {
    let metrics = metrics_from_transcript("\n[info] nothing happened\n");
    assert_eq!(metrics.total_tokens(), 0);
    assert!(metrics.model.is_empty());
}
