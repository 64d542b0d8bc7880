//! Session configuration.

use crate::cli::LaunchOptions;

/// Default capacity of the messages and text channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 100;

/// Capacity of the errors channel.
pub const ERROR_CHANNEL_BUFFER: usize = 10;

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Identifier used in logs; `session-<uuid>` when unset.
    pub id: Option<String>,
    /// Options for the underlying launcher.
    pub launch: LaunchOptions,
    /// Capacity of the messages and text channels. Zero means the default.
    pub channel_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id: None,
            launch: LaunchOptions::default(),
            channel_buffer: DEFAULT_CHANNEL_BUFFER,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new(launch: LaunchOptions) -> Self {
        Self {
            launch,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn channel_buffer(mut self, size: usize) -> Self {
        self.channel_buffer = size;
        self
    }

    pub(crate) fn effective_buffer(&self) -> usize {
        if self.channel_buffer == 0 {
            DEFAULT_CHANNEL_BUFFER
        } else {
            self.channel_buffer
        }
    }

    pub(crate) fn effective_id(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("session-{}", uuid::Uuid::new_v4()),
        }
    }
}
