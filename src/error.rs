//! Error types for launcher and session operations.

use std::time::Duration;

/// Maximum number of characters of an offending line kept in parse error messages.
pub const PARSE_ERROR_LINE_LIMIT: usize = 100;

/// Errors produced while launching, reading from, or waiting on the CLI.
///
/// Variants fall into a few groups:
/// - startup failures (`CliNotFound`, `Start`, `InvalidConfig`) are fatal and
///   returned synchronously from `start`/`run`;
/// - stream failures (`Parse`, `LineTooLong`, `Io`, `BufferFull`) are
///   non-fatal and the stream keeps going;
/// - exit failures (`Exit`, `Timeout`, `Cancelled`, `Wait`) terminate a run
///   and are reported once;
/// - usage errors (`AlreadyStarted`, `NotStarted`, `SessionClosed`,
///   `ChannelTaken`) indicate a programming mistake.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The CLI binary could not be located.
    #[error("claude CLI not found (searched: {searched})")]
    CliNotFound {
        /// Binary name or path that was looked up.
        searched: String,
    },

    /// Pipe setup or process spawn failed.
    #[error("start failed: {0}")]
    Start(#[source] std::io::Error),

    /// Launch options could not be turned into a command line.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stdout line was not a valid stream message.
    #[error("parse error: {source} (line: {})", truncate_line(.line))]
    Parse {
        /// The offending line, untruncated.
        line: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A stdout line exceeded the line buffer limit and was skipped.
    #[error("line of {len} bytes exceeds the {limit} byte limit")]
    LineTooLong {
        /// Number of bytes discarded.
        len: usize,
        /// Configured limit.
        limit: usize,
    },

    /// I/O error while reading the process output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Waiting on the process failed.
    #[error("wait failed: {0}")]
    Wait(#[source] std::io::Error),

    /// The process exited with a non-zero code.
    #[error("{}", exit_message(*.code, .stderr))]
    Exit {
        /// Process exit code (`-1` when terminated by a signal).
        code: i32,
        /// Captured standard error output.
        stderr: String,
    },

    /// The process exceeded its configured timeout and was killed.
    #[error("session timeout of {0:?} exceeded")]
    Timeout(Duration),

    /// The caller cancelled the run; the process was killed.
    #[error("session cancelled")]
    Cancelled,

    /// A message was dropped because the messages channel was full.
    #[error("message channel buffer full, dropping message")]
    BufferFull,

    /// `start` was called on a launcher that already started.
    #[error("launcher already started")]
    AlreadyStarted,

    /// The operation requires a started launcher.
    #[error("launcher not started")]
    NotStarted,

    /// The session has already ended.
    #[error("session is closed")]
    SessionClosed,

    /// A session receiver was already taken by another consumer.
    #[error("{0} receiver already taken")]
    ChannelTaken(&'static str),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a parse error for the given line.
    pub fn parse(line: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Parse {
            line: line.into(),
            source,
        }
    }

    /// Returns true for errors after which the stream can keep being read.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::LineTooLong { .. } | Self::Io(_) | Self::BufferFull
        )
    }

    /// Returns the exit code carried by an `Exit` error.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn truncate_line(line: &str) -> String {
    if line.chars().count() <= PARSE_ERROR_LINE_LIMIT {
        line.to_string()
    } else {
        let head: String = line.chars().take(PARSE_ERROR_LINE_LIMIT).collect();
        format!("{head}...")
    }
}

fn exit_message(code: i32, stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exit code {code}")
    } else {
        format!("exit code {code}: {stderr}")
    }
}
