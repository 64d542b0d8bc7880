//! Launch options and command-line construction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hooks::Hooks;

/// Flags every launch starts with. The parser depends on this output mode.
pub const REQUIRED_ARGS: [&str; 4] = ["--print", "--output-format", "stream-json", "--verbose"];

/// Permission handling mode (`--permission-mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    Default,
    AcceptEdits,
    Plan,
    BypassPermissions,
}

impl PermissionMode {
    /// CLI value for this mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
        }
    }
}

impl std::str::FromStr for PermissionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(Self::Default),
            "acceptEdits" => Ok(Self::AcceptEdits),
            "plan" => Ok(Self::Plan),
            "bypassPermissions" => Ok(Self::BypassPermissions),
            other => Err(Error::InvalidConfig(format!(
                "unknown permission mode: {other}"
            ))),
        }
    }
}

/// A sub-agent definition passed through `--agents`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub description: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// One MCP server entry of the `--mcp-config` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServer {
    /// Transport (`stdio`, `sse`, `http`); stdio when absent.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl McpServer {
    /// A stdio server started with `command`.
    #[must_use]
    pub fn stdio(command: impl Into<String>, args: &[&str]) -> Self {
        Self {
            command: Some(command.into()),
            args: args.iter().map(|s| (*s).to_string()).collect(),
            ..Self::default()
        }
    }
}

/// Builder for configuring a CLI launch.
///
/// Every option is optional; an empty builder runs the CLI with its own
/// defaults.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    binary: Option<PathBuf>,
    api_key: Option<String>,
    permission_mode: Option<PermissionMode>,
    skip_permissions: bool,
    allowed_tools: Vec<String>,
    disallowed_tools: Vec<String>,
    model: Option<String>,
    fallback_model: Option<String>,
    max_budget_usd: Option<f64>,
    betas: Vec<String>,
    system_prompt: Option<String>,
    append_system_prompt: Option<String>,
    resume: Option<String>,
    continue_session: bool,
    fork_session: bool,
    session_id: Option<String>,
    no_session_persistence: bool,
    max_turns: Option<u32>,
    tools: Vec<String>,
    agents: BTreeMap<String, AgentDefinition>,
    disable_slash_commands: bool,
    json_schema: Option<serde_json::Value>,
    include_partial_messages: bool,
    settings: Option<String>,
    add_dirs: Vec<PathBuf>,
    mcp_servers: BTreeMap<String, McpServer>,
    strict_mcp: bool,
    max_thinking_tokens: Option<u32>,
    env: Vec<(String, String)>,
    work_dir: Option<PathBuf>,
    timeout: Option<Duration>,
    additional_args: Vec<String>,
    hooks: Option<Arc<Hooks>>,
}

impl LaunchOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run this binary instead of looking up `claude` on `PATH`.
    #[must_use]
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Set `ANTHROPIC_API_KEY` for the child.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.permission_mode = Some(mode);
        self
    }

    /// Pass `--dangerously-skip-permissions`. Ignored when a permission mode is set.
    #[must_use]
    pub fn skip_permissions(mut self, skip: bool) -> Self {
        self.skip_permissions = skip;
        self
    }

    /// Allow a tool or tool pattern such as `Bash(git:*)`.
    #[must_use]
    pub fn allowed_tool(mut self, tool: impl Into<String>) -> Self {
        self.allowed_tools.push(tool.into());
        self
    }

    /// Set the allowed tools for this session.
    #[must_use]
    pub fn allowed_tools(mut self, tools: &[&str]) -> Self {
        self.allowed_tools = tools.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn disallowed_tool(mut self, tool: impl Into<String>) -> Self {
        self.disallowed_tools.push(tool.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = Some(model.into());
        self
    }

    /// Stop the run once it has spent this many dollars.
    #[must_use]
    pub fn max_budget_usd(mut self, budget: f64) -> Self {
        self.max_budget_usd = Some(budget);
        self
    }

    #[must_use]
    pub fn beta(mut self, beta: impl Into<String>) -> Self {
        self.betas.push(beta.into());
        self
    }

    /// Replace the system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Append to the system prompt.
    #[must_use]
    pub fn append_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.append_system_prompt = Some(prompt.into());
        self
    }

    /// Resume an existing session.
    #[must_use]
    pub fn resume(mut self, session_id: impl Into<String>) -> Self {
        self.resume = Some(session_id.into());
        self
    }

    /// Continue the most recent session in the working directory.
    #[must_use]
    pub fn continue_session(mut self, enabled: bool) -> Self {
        self.continue_session = enabled;
        self
    }

    /// Fork instead of appending when resuming.
    #[must_use]
    pub fn fork_session(mut self, enabled: bool) -> Self {
        self.fork_session = enabled;
        self
    }

    /// Use a specific session id for the new conversation.
    #[must_use]
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn no_session_persistence(mut self, enabled: bool) -> Self {
        self.no_session_persistence = enabled;
        self
    }

    /// Set the maximum number of turns.
    #[must_use]
    pub fn max_turns(mut self, turns: u32) -> Self {
        self.max_turns = Some(turns);
        self
    }

    /// Restrict the built-in tool set.
    #[must_use]
    pub fn tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn agent(mut self, name: impl Into<String>, agent: AgentDefinition) -> Self {
        self.agents.insert(name.into(), agent);
        self
    }

    #[must_use]
    pub fn disable_slash_commands(mut self, disabled: bool) -> Self {
        self.disable_slash_commands = disabled;
        self
    }

    /// Validate the final output against a JSON schema.
    #[must_use]
    pub fn json_schema(mut self, schema: serde_json::Value) -> Self {
        self.json_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn include_partial_messages(mut self, enabled: bool) -> Self {
        self.include_partial_messages = enabled;
        self
    }

    /// Settings file path or inline JSON.
    #[must_use]
    pub fn settings(mut self, settings: impl Into<String>) -> Self {
        self.settings = Some(settings.into());
        self
    }

    #[must_use]
    pub fn add_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.add_dirs.push(dir.into());
        self
    }

    /// Register an MCP server. The configuration is written to a private
    /// temp file for the duration of the run.
    #[must_use]
    pub fn mcp_server(mut self, name: impl Into<String>, server: McpServer) -> Self {
        self.mcp_servers.insert(name.into(), server);
        self
    }

    /// Only use MCP servers from `--mcp-config`.
    #[must_use]
    pub fn strict_mcp(mut self, strict: bool) -> Self {
        self.strict_mcp = strict;
        self
    }

    /// Set `MAX_THINKING_TOKENS` for the child.
    #[must_use]
    pub fn max_thinking_tokens(mut self, tokens: u32) -> Self {
        self.max_thinking_tokens = Some(tokens);
        self
    }

    /// Add an environment variable. A later value for the same key wins.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the working directory for the Claude process.
    #[must_use]
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Kill the process if it runs longer than this.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Extra arguments inserted before the prompt.
    #[must_use]
    pub fn additional_arg(mut self, arg: impl Into<String>) -> Self {
        self.additional_args.push(arg.into());
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    /// Get the binary override, if set.
    #[must_use]
    pub fn get_binary(&self) -> Option<&Path> {
        self.binary.as_deref()
    }

    /// Get the working directory, if set.
    #[must_use]
    pub fn get_work_dir(&self) -> Option<&Path> {
        self.work_dir.as_deref()
    }

    #[must_use]
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn get_model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    #[must_use]
    pub fn get_hooks(&self) -> Option<Arc<Hooks>> {
        self.hooks.clone()
    }

    /// Whether a `--mcp-config` file is needed.
    #[must_use]
    pub fn has_mcp_servers(&self) -> bool {
        !self.mcp_servers.is_empty()
    }

    /// JSON written to the `--mcp-config` file.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the servers cannot be serialized.
    pub fn mcp_config_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&serde_json::json!({ "mcpServers": &self.mcp_servers }))
            .map_err(|e| Error::InvalidConfig(format!("mcp config: {e}")))
    }

    /// Environment assignments for the child, in application order.
    #[must_use]
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut vars = Vec::with_capacity(self.env.len() + 2);
        if let Some(key) = &self.api_key {
            vars.push(("ANTHROPIC_API_KEY".to_string(), key.clone()));
        }
        if let Some(tokens) = self.max_thinking_tokens {
            vars.push(("MAX_THINKING_TOKENS".to_string(), tokens.to_string()));
        }
        vars.extend(self.env.iter().cloned());
        vars
    }

    /// Build the command-line arguments. The prompt is always last.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if `additional_args` tries to change
    /// the output format or the agents cannot be serialized.
    pub fn build_args(&self, prompt: &str, mcp_config_file: Option<&Path>) -> Result<Vec<String>> {
        if let Some(arg) = self
            .additional_args
            .iter()
            .find(|a| *a == "--output-format" || a.starts_with("--output-format="))
        {
            return Err(Error::InvalidConfig(format!(
                "{arg} cannot be overridden; stream-json output is required"
            )));
        }

        let mut args: Vec<String> = REQUIRED_ARGS.iter().map(|s| (*s).to_string()).collect();
        let mut flag = |name: &str, value: Option<String>| {
            args.push(name.to_string());
            if let Some(value) = value {
                args.push(value);
            }
        };

        if let Some(mode) = self.permission_mode {
            flag("--permission-mode", Some(mode.as_str().to_string()));
        } else if self.skip_permissions {
            flag("--dangerously-skip-permissions", None);
        }
        for tool in &self.allowed_tools {
            flag("--allowedTools", Some(tool.clone()));
        }
        for tool in &self.disallowed_tools {
            flag("--disallowedTools", Some(tool.clone()));
        }

        if let Some(model) = &self.model {
            flag("--model", Some(model.clone()));
        }
        if let Some(model) = &self.fallback_model {
            flag("--fallback-model", Some(model.clone()));
        }
        if let Some(budget) = self.max_budget_usd.filter(|b| *b > 0.0) {
            flag("--max-budget-usd", Some(format!("{budget:.2}")));
        }
        if !self.betas.is_empty() {
            flag("--betas", Some(self.betas.join(",")));
        }

        if let Some(prompt) = &self.system_prompt {
            flag("--system-prompt", Some(prompt.clone()));
        }
        if let Some(prompt) = &self.append_system_prompt {
            flag("--append-system-prompt", Some(prompt.clone()));
        }

        if let Some(id) = &self.resume {
            flag("--resume", Some(id.clone()));
        }
        if self.continue_session {
            flag("--continue", None);
        }
        if self.fork_session {
            flag("--fork-session", None);
        }
        if let Some(id) = &self.session_id {
            flag("--session-id", Some(id.clone()));
        }
        if self.no_session_persistence {
            flag("--no-session-persistence", None);
        }

        if let Some(turns) = self.max_turns.filter(|t| *t > 0) {
            flag("--max-turns", Some(turns.to_string()));
        }

        if !self.tools.is_empty() {
            flag("--tools", Some(self.tools.join(",")));
        }
        if !self.agents.is_empty() {
            let agents = serde_json::to_string(&self.agents)
                .map_err(|e| Error::InvalidConfig(format!("agents: {e}")))?;
            flag("--agents", Some(agents));
        }
        if self.disable_slash_commands {
            flag("--disable-slash-commands", None);
        }

        if let Some(schema) = &self.json_schema {
            flag("--json-schema", Some(schema.to_string()));
        }
        if self.include_partial_messages {
            flag("--include-partial-messages", None);
        }

        if let Some(settings) = &self.settings {
            flag("--settings", Some(settings.clone()));
        }
        for dir in &self.add_dirs {
            flag("--add-dir", Some(dir.display().to_string()));
        }

        if let Some(path) = mcp_config_file {
            flag("--mcp-config", Some(path.display().to_string()));
        }
        if self.strict_mcp {
            flag("--strict-mcp-config", None);
        }

        args.extend(self.additional_args.iter().cloned());
        args.push(prompt.to_string());
        Ok(args)
    }
}
