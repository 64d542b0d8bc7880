//! Claude Session - drive the Claude Code CLI as a subprocess.
//!
//! The CLI is launched in `stream-json` mode and every stdout line is parsed
//! into a [`StreamMessage`]. [`Launcher`] owns one process and reads it
//! message by message, [`Session`] fans the stream out to channels, and the
//! [`extract`] functions pull text, tool calls and accounting out of
//! individual messages.
//!
//! ```no_run
//! # async fn demo() -> claude_session::Result<()> {
//! use claude_session::{extract_text, LaunchOptions, Launcher};
//! use tokio_util::sync::CancellationToken;
//!
//! let launcher = Launcher::new();
//! launcher
//!     .start(&CancellationToken::new(), "Summarize README.md", LaunchOptions::new())
//!     .await?;
//! while let Some(msg) = launcher.read_message().await? {
//!     print!("{}", extract_text(&msg));
//! }
//! launcher.wait().await
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod extract;
pub mod hooks;
pub mod session;
pub mod transcript;

pub use cli::{
    cli_available, cli_version, parse_line, read_messages, resolve_binary, ContentBlock,
    LaunchOptions, Launcher, LineReader, McpServer, MessageContent, PermissionMode,
    ResultMessage, SessionMetrics, StreamMessage, SystemMessage, TodoItem, Usage,
};
pub use error::{Error, Result};
pub use extract::*;
pub use hooks::{HookDispatcher, Hooks};
pub use session::{Collected, RunResult, Session, SessionConfig};
pub use transcript::{metrics_from_transcript, parse_transcript};
