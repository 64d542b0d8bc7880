//! Reader and waiter tasks that feed the session channels.

use std::sync::{Arc, PoisonError};

use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Phase, Senders, Session, Shared};
use crate::cli::{SessionMetrics, StreamMessage};
use crate::error::{Error, Result};
use crate::extract::extract_text;

impl Session {
    /// Start the CLI and stream its output to the channels.
    ///
    /// Returns as soon as the process is running. All channels close when
    /// the CLI exits; [`done`](Self::done) resolves after that, once the exit
    /// outcome is recorded. A session runs at most once.
    ///
    /// # Errors
    ///
    /// Returns `Error::SessionClosed` after the session ended,
    /// `Error::AlreadyStarted` while it runs, and any start error of the
    /// launcher. A failed start closes the session.
    pub async fn run(&self, token: &CancellationToken, prompt: &str) -> Result<()> {
        {
            let mut state = self.shared.lock_state();
            match state.phase {
                Phase::Closed => return Err(Error::SessionClosed),
                Phase::Running => return Err(Error::AlreadyStarted),
                Phase::Idle => state.phase = Phase::Running,
            }
        }

        let launch = self.config.launch.clone();
        if let Err(e) = self.shared.launcher.start(token, prompt, launch).await {
            tracing::warn!(session = %self.shared.id, error = %e, "Session failed to start");
            self.shared.close();
            return Err(e);
        }
        tracing::info!(
            session = %self.shared.id,
            pid = ?self.shared.launcher.pid(),
            "Session started"
        );

        let senders = self
            .shared
            .senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(Error::SessionClosed)?;

        let waiter = tokio::spawn(wait_loop(Arc::clone(&self.shared)));
        tokio::spawn(read_loop(Arc::clone(&self.shared), senders, waiter));
        Ok(())
    }
}

async fn read_loop(shared: Arc<Shared>, senders: Senders, waiter: JoinHandle<()>) {
    loop {
        match shared.launcher.read_message().await {
            Ok(Some(msg)) => shared.dispatch(&senders, msg),
            Ok(None) => break,
            Err(e @ Error::Io(_)) => {
                tracing::warn!(session = %shared.id, error = %e, "Stdout read failed");
                senders.error(e);
                break;
            }
            Err(e) => senders.error(e),
        }
    }

    // Channels close before done fires.
    drop(senders);
    if let Err(e) = waiter.await {
        tracing::warn!(session = %shared.id, error = %e, "Waiter task failed");
    }
    shared.close();
}

async fn wait_loop(shared: Arc<Shared>) {
    match shared.launcher.wait().await {
        Ok(()) => tracing::debug!(session = %shared.id, "Process exited cleanly"),
        Err(e) => tracing::info!(session = %shared.id, error = %e, "Process ended with error"),
    }
}

impl Shared {
    fn dispatch(&self, senders: &Senders, msg: StreamMessage) {
        // Text channel carries assistant text only.
        let text = match &msg {
            StreamMessage::Assistant(_) => Some(extract_text(&msg).to_string()),
            _ => None,
        }
        .filter(|text| !text.is_empty());
        let result = msg.as_result().map(SessionMetrics::from_result);
        let init = match &msg {
            StreamMessage::System(system) if system.subtype == "init" => {
                Some((system.model.clone(), system.session_id.clone()))
            }
            _ => None,
        };

        // Derived text and metrics never overtake their message.
        senders.message(msg);

        if let Some(text) = text {
            senders.text(text);
        }
        if let Some(mut metrics) = result {
            let mut state = self.lock_state();
            metrics.fill_missing(&state.init_model, &state.init_session_id);
            state.metrics = metrics;
        }
        if let Some((model, session_id)) = init {
            let mut state = self.lock_state();
            state.metrics.model.clone_from(&model);
            state.metrics.session_id.clone_from(&session_id);
            state.init_model = model;
            state.init_session_id = session_id;
        }
    }
}

impl Senders {
    fn message(&self, msg: StreamMessage) {
        match self.messages.try_send(msg) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!("Message channel full, dropping message");
                self.error(Error::BufferFull);
            }
        }
    }

    fn text(&self, text: String) {
        if let Err(TrySendError::Full(_)) = self.text.try_send(text) {
            tracing::debug!("Text channel full, dropping text");
        }
    }

    fn error(&self, err: Error) {
        if let Err(TrySendError::Full(dropped)) = self.errors.try_send(err) {
            tracing::debug!(error = %dropped, "Error channel full, dropping error");
        }
    }
}
