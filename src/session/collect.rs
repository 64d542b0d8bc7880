//! Blocking helpers that run a prompt and gather its output.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::Session;
use crate::cli::{SessionMetrics, StreamMessage, Usage};
use crate::error::{Error, Result};
use crate::extract::extract_text;

/// Output gathered by a collection call together with the run's outcome.
///
/// On cancellation or failure `value` still holds whatever arrived first.
#[derive(Debug)]
pub struct Collected<T> {
    pub value: T,
    pub error: Option<Error>,
}

impl<T> Collected<T> {
    fn failed(value: T, error: Error) -> Self {
        Self {
            value,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Discard partial output on failure.
    ///
    /// # Errors
    ///
    /// Returns the recorded error, if any.
    pub fn into_result(self) -> Result<T> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.value),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    /// Concatenated assistant text.
    pub text: String,
    pub messages: Vec<StreamMessage>,
    pub total_cost_usd: f64,
    pub cost_usd: f64,
    /// Wall time observed by the collector.
    pub duration: Duration,
    /// API time reported by the CLI.
    pub duration_api: Duration,
    pub model: String,
    pub session_id: String,
    pub num_turns: u32,
    pub usage: Option<Usage>,
    pub structured_output: Option<serde_json::Value>,
    pub metrics: SessionMetrics,
}

impl RunResult {
    fn absorb(&mut self, msg: StreamMessage) {
        match &msg {
            StreamMessage::Assistant(_) => self.text.push_str(extract_text(&msg)),
            StreamMessage::Result(result) => {
                self.total_cost_usd = result.total_cost_usd;
                self.cost_usd = result.cost_usd;
                self.num_turns = result.num_turns;
                self.usage = result.usage;
                self.structured_output.clone_from(&result.structured_output);
                if result.duration_api_ms > 0 {
                    self.duration_api = Duration::from_millis(result.duration_api_ms);
                }
                if !result.session_id.is_empty() {
                    self.session_id.clone_from(&result.session_id);
                }
                if !result.model.is_empty() {
                    self.model.clone_from(&result.model);
                }
            }
            StreamMessage::System(system) if system.subtype == "init" => {
                if !system.session_id.is_empty() {
                    self.session_id.clone_from(&system.session_id);
                }
                if !system.model.is_empty() {
                    self.model.clone_from(&system.model);
                }
            }
            _ => {}
        }
        self.messages.push(msg);
    }
}

impl Session {
    /// Run a prompt and return its concatenated assistant text.
    ///
    /// Cancelling `token` kills the process and returns the text gathered
    /// so far with `Error::Cancelled`. Non-fatal stream errors are ignored.
    pub async fn collect_all(&self, token: &CancellationToken, prompt: &str) -> Collected<String> {
        let rx = match self.take_text() {
            Ok(rx) => rx,
            Err(e) => return Collected::failed(String::new(), e),
        };
        if let Err(e) = self.run(token, prompt).await {
            return Collected::failed(String::new(), e);
        }

        let mut text = String::new();
        let error = self.drain(token, rx, |chunk| text.push_str(&chunk)).await;
        Collected { value: text, error }
    }

    /// Run a prompt and return every message.
    pub async fn collect_messages(
        &self,
        token: &CancellationToken,
        prompt: &str,
    ) -> Collected<Vec<StreamMessage>> {
        let rx = match self.take_messages() {
            Ok(rx) => rx,
            Err(e) => return Collected::failed(Vec::new(), e),
        };
        if let Err(e) = self.run(token, prompt).await {
            return Collected::failed(Vec::new(), e);
        }

        let mut messages = Vec::new();
        let error = self.drain(token, rx, |msg| messages.push(msg)).await;
        Collected {
            value: messages,
            error,
        }
    }

    /// Run a prompt and return text, messages and accounting in one value.
    pub async fn run_and_collect(
        &self,
        token: &CancellationToken,
        prompt: &str,
    ) -> Collected<RunResult> {
        let rx = match self.take_messages() {
            Ok(rx) => rx,
            Err(e) => return Collected::failed(RunResult::default(), e),
        };
        if let Err(e) = self.run(token, prompt).await {
            return Collected::failed(RunResult::default(), e);
        }

        let started = Instant::now();
        let mut result = RunResult::default();
        let error = self.drain(token, rx, |msg| result.absorb(msg)).await;
        result.duration = started.elapsed();
        result.metrics = self.current_metrics();
        Collected {
            value: result,
            error,
        }
    }

    /// Feed every item of `rx` to `sink` until the session ends or `token`
    /// is cancelled, then return the terminal error.
    async fn drain<T>(
        &self,
        token: &CancellationToken,
        mut rx: mpsc::Receiver<T>,
        mut sink: impl FnMut(T),
    ) -> Option<Error> {
        let mut errors = self.take_errors().ok();
        let done = self.shared.done.clone();

        loop {
            tokio::select! {
                biased;

                () = token.cancelled() => return Some(self.cancel_run()),
                item = rx.recv() => match item {
                    Some(item) => sink(item),
                    None => break,
                },
                err = recv_or_pending(&mut errors) => match err {
                    Some(e) => tracing::debug!(session = %self.id(), error = %e, "Ignoring stream error"),
                    None => errors = None,
                },
                () = done.cancelled() => {
                    while let Ok(item) = rx.try_recv() {
                        sink(item);
                    }
                    break;
                }
            }
        }

        // The channel closes slightly before the exit outcome is recorded.
        tokio::select! {
            biased;

            () = token.cancelled() => Some(self.cancel_run()),
            () = done.cancelled() => self.err(),
        }
    }

    fn cancel_run(&self) -> Error {
        tracing::info!(session = %self.id(), "Collection cancelled, killing process");
        if let Err(e) = self.kill() {
            tracing::debug!(error = %e, "Kill after cancellation failed");
        }
        Error::Cancelled
    }
}

async fn recv_or_pending<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
