//! Colored terminal output for the `claude-session` binary.

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::cli::SessionMetrics;

/// Current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

const DEFAULT_MAX_LEN: usize = 80;

fn flush() {
    let _ = io::stdout().flush();
}

/// Truncate to at most `max_len` characters, ending in an ellipsis when cut.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// Render tool input as `key=value` pairs with long values shortened.
#[must_use]
pub fn format_tool_input(input: &serde_json::Value) -> String {
    match input {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => truncate(s, 50),
                    other => truncate(&other.to_string(), 50),
                };
                format!("{k}={value}")
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => truncate(&other.to_string(), DEFAULT_MAX_LEN),
    }
}

pub fn print_session_start(pid: u32) {
    println!(
        "{} {} pid={}",
        timestamp().dimmed(),
        "[START]".blue().bold(),
        pid.cyan()
    );
    flush();
}

pub fn print_init(model: &str, session_id: &str) {
    println!(
        "{} {} model={}, session={}",
        timestamp().dimmed(),
        "[SESSION]".blue().bold(),
        model.cyan(),
        truncate(session_id, 20).dimmed()
    );
    flush();
}

pub fn print_tool_call(name: &str, input: &serde_json::Value) {
    println!(
        "\n{} {} ({})",
        "[TOOL]".cyan().bold(),
        name.bold(),
        format_tool_input(input).dimmed()
    );
    flush();
}

pub fn print_text(text: &str) {
    print!("{text}");
    flush();
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}

/// Print the accounting of a finished run.
pub fn print_metrics(metrics: &SessionMetrics) {
    let label = if metrics.is_error {
        "[RESULT]".red().bold().to_string()
    } else {
        "[RESULT]".green().bold().to_string()
    };
    println!(
        "\n{} {} cost=${:.4} turns={} tokens={} (in={} out={} cache_write={} cache_read={}) duration={}ms api={}ms",
        timestamp().dimmed(),
        label,
        metrics.total_cost_usd,
        metrics.num_turns,
        metrics.total_tokens(),
        metrics.input_tokens,
        metrics.output_tokens,
        metrics.cache_creation_input_tokens,
        metrics.cache_read_input_tokens,
        metrics.duration_ms,
        metrics.duration_api_ms,
    );
    if !metrics.model.is_empty() || !metrics.session_id.is_empty() {
        println!(
            "{} model={} session={}",
            " ".repeat(27),
            metrics.model.cyan(),
            metrics.session_id.dimmed()
        );
    }
    flush();
}

pub fn print_exit(code: i32, elapsed: Duration) {
    let status = if code == 0 {
        format!("exit {code}").green().to_string()
    } else {
        format!("exit {code}").red().to_string()
    };
    println!(
        "{} {} {} after {:.1}s",
        timestamp().dimmed(),
        "[EXIT]".blue().bold(),
        status,
        elapsed.as_secs_f64()
    );
    flush();
}

/// Print the outcome of a CLI availability check.
pub fn print_check(binary: Option<&Path>, version: Option<&str>) {
    match (binary, version) {
        (Some(path), Some(version)) => println!(
            "{} {} ({})",
            "[OK]".green().bold(),
            path.display(),
            version.trim().dimmed()
        ),
        (Some(path), None) => println!(
            "{} {} (version unknown)",
            "[WARN]".yellow().bold(),
            path.display()
        ),
        (None, _) => println!("{} claude CLI not found in PATH", "[MISSING]".red().bold()),
    }
    flush();
}
