//! Channel-based sessions on top of [`Launcher`].
//!
//! A [`Session`] runs one prompt and fans the output out to three bounded
//! channels: every message, assistant text, and non-fatal errors. Sends
//! never block the reader: when a channel is full the item is dropped and,
//! for messages, an [`Error::BufferFull`] is reported on the errors channel.
//! Delivery is therefore at-most-once under overload.

mod collect;
mod config;
mod multiplexer;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::cli::{Launcher, SessionMetrics, StreamMessage};
use crate::error::{Error, Result};

pub use collect::{Collected, RunResult};
pub use config::{SessionConfig, DEFAULT_CHANNEL_BUFFER, ERROR_CHANNEL_BUFFER};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Running,
    Closed,
}

#[derive(Debug, Default)]
struct State {
    phase: Phase,
    metrics: SessionMetrics,
    init_model: String,
    init_session_id: String,
}

/// Sending halves, owned by the reader task once the session runs.
#[derive(Debug)]
struct Senders {
    messages: mpsc::Sender<StreamMessage>,
    text: mpsc::Sender<String>,
    errors: mpsc::Sender<Error>,
}

#[derive(Debug, Default)]
struct Receivers {
    messages: Option<mpsc::Receiver<StreamMessage>>,
    text: Option<mpsc::Receiver<String>>,
    errors: Option<mpsc::Receiver<Error>>,
}

/// State shared between the session handle and its tasks.
#[derive(Debug)]
struct Shared {
    id: String,
    launcher: Launcher,
    state: Mutex<State>,
    senders: Mutex<Option<Senders>>,
    done: CancellationToken,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the session closed, drop any unused senders and signal done.
    /// Only the first call has an effect.
    fn close(&self) {
        {
            let mut state = self.lock_state();
            if state.phase == Phase::Closed {
                return;
            }
            state.phase = Phase::Closed;
        }
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        tracing::debug!(session = %self.id, "Session closed");
        self.done.cancel();
    }
}

/// One run of the CLI exposed as channels plus blocking helpers.
///
/// ```no_run
/// # async fn demo() -> claude_session::Result<()> {
/// use claude_session::{LaunchOptions, Session, SessionConfig};
/// use tokio_util::sync::CancellationToken;
///
/// let session = Session::new(SessionConfig::new(LaunchOptions::new().model("sonnet")));
/// let mut text = session.take_text()?;
/// session.run(&CancellationToken::new(), "Explain this codebase").await?;
///
/// while let Some(chunk) = text.recv().await {
///     println!("{chunk}");
/// }
/// session.wait().await
/// # }
/// ```
#[derive(Debug)]
pub struct Session {
    shared: Arc<Shared>,
    receivers: Mutex<Receivers>,
    config: SessionConfig,
}

impl Session {
    /// Create a session. Nothing runs until [`run`](Self::run).
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let buffer = config.effective_buffer();
        let (messages_tx, messages_rx) = mpsc::channel(buffer);
        let (text_tx, text_rx) = mpsc::channel(buffer);
        let (errors_tx, errors_rx) = mpsc::channel(ERROR_CHANNEL_BUFFER);

        let shared = Shared {
            id: config.effective_id(),
            launcher: Launcher::new(),
            state: Mutex::new(State::default()),
            senders: Mutex::new(Some(Senders {
                messages: messages_tx,
                text: text_tx,
                errors: errors_tx,
            })),
            done: CancellationToken::new(),
        };

        Self {
            shared: Arc::new(shared),
            receivers: Mutex::new(Receivers {
                messages: Some(messages_rx),
                text: Some(text_rx),
                errors: Some(errors_rx),
            }),
            config,
        }
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Take the receiver of every parsed message. Closed when the session ends.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelTaken` if it was already taken.
    pub fn take_messages(&self) -> Result<mpsc::Receiver<StreamMessage>> {
        self.lock_receivers()
            .messages
            .take()
            .ok_or(Error::ChannelTaken("messages"))
    }

    /// Take the receiver of assistant text. Closed when the session ends.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelTaken` if it was already taken.
    pub fn take_text(&self) -> Result<mpsc::Receiver<String>> {
        self.lock_receivers()
            .text
            .take()
            .ok_or(Error::ChannelTaken("text"))
    }

    /// Take the receiver of non-fatal errors. Closed when the session ends.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelTaken` if it was already taken.
    pub fn take_errors(&self) -> Result<mpsc::Receiver<Error>> {
        self.lock_receivers()
            .errors
            .take()
            .ok_or(Error::ChannelTaken("errors"))
    }

    /// Resolves once the session has ended and its outcome is recorded.
    pub fn done(&self) -> WaitForCancellationFuture<'_> {
        self.shared.done.cancelled()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.shared.done.is_cancelled()
    }

    /// Terminal error of the run; meaningful once [`done`](Self::done) resolved.
    #[must_use]
    pub fn err(&self) -> Option<Error> {
        self.shared.launcher.exit_error()
    }

    /// Wait for the session to end and return its terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotStarted` if the process never started, otherwise
    /// the error recorded when the process exited.
    pub async fn wait(&self) -> Result<()> {
        if !self.shared.launcher.is_started() {
            return Err(Error::NotStarted);
        }
        self.done().await;
        self.err().map_or(Ok(()), Err)
    }

    /// Latest metrics snapshot. Zeroed until the result message arrives,
    /// apart from the model and session id announced at init.
    #[must_use]
    pub fn current_metrics(&self) -> SessionMetrics {
        self.shared.lock_state().metrics.clone()
    }

    /// Send SIGINT to the CLI.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotStarted` before `run`.
    pub fn interrupt(&self) -> Result<()> {
        self.shared.launcher.interrupt()
    }

    /// Forcefully kill the CLI.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotStarted` before `run`.
    pub fn kill(&self) -> Result<()> {
        self.shared.launcher.kill()
    }

    /// Pid of the CLI process; `None` before `run`.
    #[must_use]
    pub fn launcher_pid(&self) -> Option<u32> {
        self.shared.launcher.pid()
    }

    fn lock_receivers(&self) -> MutexGuard<'_, Receivers> {
        self.receivers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
