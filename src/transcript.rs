//! Helpers over a captured stdout dump of a whole run.

use crate::cli::{parse_line, SessionMetrics, StreamMessage};

/// Parse every message of a transcript.
///
/// Blank lines, log lines that are not JSON objects and malformed JSON are
/// skipped.
#[must_use]
pub fn parse_transcript(transcript: &str) -> Vec<StreamMessage> {
    transcript
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| match parse_line(line) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping transcript line");
                None
            }
        })
        .collect()
}

/// Metrics of a transcript.
///
/// Accounting comes from the last result message. The result line does not
/// name the model, so it is taken from the first init message; the session
/// id falls back to the init message too.
#[must_use]
pub fn metrics_from_transcript(transcript: &str) -> SessionMetrics {
    let messages = parse_transcript(transcript);

    let init = messages.iter().find_map(|msg| match msg {
        StreamMessage::System(system) if system.subtype == "init" => Some(system),
        _ => None,
    });

    let mut metrics = messages
        .iter()
        .rev()
        .find_map(StreamMessage::as_result)
        .map(SessionMetrics::from_result)
        .unwrap_or_default();

    if let Some(init) = init {
        metrics.fill_missing(&init.model, &init.session_id);
    }
    metrics
}
