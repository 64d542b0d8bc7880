//! Configuration types.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::{LaunchOptions, PermissionMode};
use crate::session::{SessionConfig, DEFAULT_CHANNEL_BUFFER};

/// Launch defaults loaded from a TOML file.
///
/// Every field is optional; unset fields leave the launcher defaults alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Path to the CLI binary.
    pub binary: Option<PathBuf>,
    pub model: Option<String>,
    pub permission_mode: Option<PermissionMode>,
    pub skip_permissions: bool,
    pub max_turns: Option<u32>,
    /// Kill the process after this many seconds.
    pub timeout_secs: Option<u64>,
    pub work_dir: Option<PathBuf>,
    /// Capacity of the session channels.
    pub channel_buffer: Option<usize>,
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub append_system_prompt: Option<String>,
    /// Extra environment for the CLI process.
    pub env: BTreeMap<String, String>,
}

impl FileConfig {
    /// Build launch options from the file values.
    #[must_use]
    pub fn to_launch_options(&self) -> LaunchOptions {
        let mut opts = LaunchOptions::new().skip_permissions(self.skip_permissions);

        if let Some(binary) = &self.binary {
            opts = opts.binary(binary.clone());
        }
        if let Some(model) = &self.model {
            opts = opts.model(model.clone());
        }
        if let Some(mode) = self.permission_mode {
            opts = opts.permission_mode(mode);
        }
        if let Some(turns) = self.max_turns {
            opts = opts.max_turns(turns);
        }
        if let Some(secs) = self.timeout_secs.filter(|&s| s > 0) {
            opts = opts.timeout(Duration::from_secs(secs));
        }
        if let Some(dir) = &self.work_dir {
            opts = opts.work_dir(dir.clone());
        }
        if let Some(prompt) = &self.append_system_prompt {
            opts = opts.append_system_prompt(prompt.clone());
        }
        for tool in &self.allowed_tools {
            opts = opts.allowed_tool(tool.clone());
        }
        for tool in &self.disallowed_tools {
            opts = opts.disallowed_tool(tool.clone());
        }
        for (key, value) in &self.env {
            opts = opts.env(key.clone(), value.clone());
        }
        opts
    }

    /// Session configuration wrapping [`to_launch_options`](Self::to_launch_options).
    #[must_use]
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig::new(self.to_launch_options())
            .channel_buffer(self.channel_buffer.unwrap_or(DEFAULT_CHANNEL_BUFFER))
    }
}
