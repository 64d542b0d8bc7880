//! Lifecycle and message callbacks.
//!
//! Hooks run inline on the task that produced the event, in stream order.
//! They must return quickly: a slow hook stalls reading of the CLI output.
//! Offload anything expensive to a channel or a spawned task.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::{SessionMetrics, StreamMessage};
use crate::error::Error;

type StartHook = Arc<dyn Fn(u32) + Send + Sync>;
type MessageHook = Arc<dyn Fn(&StreamMessage) + Send + Sync>;
type TextHook = Arc<dyn Fn(&str) + Send + Sync>;
type ToolCallHook = Arc<dyn Fn(&str, &serde_json::Value) + Send + Sync>;
type MetricsHook = Arc<dyn Fn(&SessionMetrics) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;
type ExitHook = Arc<dyn Fn(i32, Duration) + Send + Sync>;

/// Optional callbacks fired by the launcher.
///
/// ```
/// use claude_session::Hooks;
///
/// let hooks = Hooks::new()
///     .on_text(|text| print!("{text}"))
///     .on_exit(|code, elapsed| eprintln!("exit {code} after {elapsed:?}"));
/// ```
#[derive(Clone, Default)]
pub struct Hooks {
    start: Option<StartHook>,
    message: Option<MessageHook>,
    text: Option<TextHook>,
    tool_call: Option<ToolCallHook>,
    metrics: Option<MetricsHook>,
    error: Option<ErrorHook>,
    exit: Option<ExitHook>,
}

impl Hooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the child pid once the process has spawned.
    #[must_use]
    pub fn on_start(mut self, f: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.start = Some(Arc::new(f));
        self
    }

    /// Called for every parsed message.
    #[must_use]
    pub fn on_message(mut self, f: impl Fn(&StreamMessage) + Send + Sync + 'static) -> Self {
        self.message = Some(Arc::new(f));
        self
    }

    /// Called when a message carries text.
    #[must_use]
    pub fn on_text(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.text = Some(Arc::new(f));
        self
    }

    /// Called with the first tool invocation of a message.
    #[must_use]
    pub fn on_tool_call(
        mut self,
        f: impl Fn(&str, &serde_json::Value) + Send + Sync + 'static,
    ) -> Self {
        self.tool_call = Some(Arc::new(f));
        self
    }

    /// Called when a result message arrives.
    #[must_use]
    pub fn on_metrics(mut self, f: impl Fn(&SessionMetrics) + Send + Sync + 'static) -> Self {
        self.metrics = Some(Arc::new(f));
        self
    }

    /// Called when a line fails to parse.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    /// Called once with the exit code and elapsed time.
    #[must_use]
    pub fn on_exit(mut self, f: impl Fn(i32, Duration) + Send + Sync + 'static) -> Self {
        self.exit = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_start", &self.start.is_some())
            .field("on_message", &self.message.is_some())
            .field("on_text", &self.text.is_some())
            .field("on_tool_call", &self.tool_call.is_some())
            .field("on_metrics", &self.metrics.is_some())
            .field("on_error", &self.error.is_some())
            .field("on_exit", &self.exit.is_some())
            .finish()
    }
}

/// Null-safe invoker over an optional hook bundle.
#[derive(Debug, Clone, Default)]
pub struct HookDispatcher(Option<Arc<Hooks>>);

impl HookDispatcher {
    #[must_use]
    pub fn new(hooks: Option<Arc<Hooks>>) -> Self {
        Self(hooks)
    }

    pub fn start(&self, pid: u32) {
        if let Some(f) = self.0.as_ref().and_then(|h| h.start.as_ref()) {
            f(pid);
        }
    }

    pub fn message(&self, msg: &StreamMessage) {
        if let Some(f) = self.0.as_ref().and_then(|h| h.message.as_ref()) {
            f(msg);
        }
    }

    pub fn text(&self, text: &str) {
        if let Some(f) = self.0.as_ref().and_then(|h| h.text.as_ref()) {
            f(text);
        }
    }

    pub fn tool_call(&self, name: &str, input: &serde_json::Value) {
        if let Some(f) = self.0.as_ref().and_then(|h| h.tool_call.as_ref()) {
            f(name, input);
        }
    }

    pub fn metrics(&self, metrics: &SessionMetrics) {
        if let Some(f) = self.0.as_ref().and_then(|h| h.metrics.as_ref()) {
            f(metrics);
        }
    }

    pub fn error(&self, err: &Error) {
        if let Some(f) = self.0.as_ref().and_then(|h| h.error.as_ref()) {
            f(err);
        }
    }

    pub fn exit(&self, code: i32, elapsed: Duration) {
        if let Some(f) = self.0.as_ref().and_then(|h| h.exit.as_ref()) {
            f(code, elapsed);
        }
    }
}
