//! Fake `claude` executables for driving the launcher without the real CLI.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

/// Stream captured from a real run: init, assistant text, three tool calls
/// with their results, a thinking block and the final result.
pub const FIXTURE: &str = r##"{"type":"system","subtype":"init","cwd":"/root/zephyrproject/zephyr","session_id":"040873fd-e7a9-4bc7-ae19-359f6fa74be2","tools":["Bash","Edit","Read","Write","Glob","Grep"],"model":"claude-opus-4-5-20251101","permissionMode":"default"}
{"type":"assistant","message":{"role":"assistant","content":[{"type":"text","text":"I'll start by examining the source file."}]},"session_id":"040873fd-e7a9-4bc7-ae19-359f6fa74be2"}
{"type":"assistant","message":{"role":"assistant","content":[{"type":"tool_use","id":"toolu_01Read","name":"Read","input":{"file_path":"/root/zephyrproject/zephyr/samples/synchronization/src/main.c"}}]},"session_id":"040873fd-e7a9-4bc7-ae19-359f6fa74be2"}
{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"toolu_01Read","content":"#include <zephyr/sys/printk.h>\nvoid main(void) { }"}]},"session_id":"040873fd-e7a9-4bc7-ae19-359f6fa74be2"}
{"type":"assistant","message":{"role":"assistant","content":[{"type":"thinking","thinking":"The kernel header is missing. I need to add #include <zephyr/kernel.h>."},{"type":"text","text":"The root cause is clear: the kernel header is missing."},{"type":"tool_use","id":"toolu_01Edit","name":"Edit","input":{"file_path":"/root/zephyrproject/zephyr/samples/synchronization/src/main.c","old_string":"#include <zephyr/sys/printk.h>","new_string":"#include <zephyr/kernel.h>\n#include <zephyr/sys/printk.h>"}}]},"session_id":"040873fd-e7a9-4bc7-ae19-359f6fa74be2"}
{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"toolu_01Edit","content":"File updated successfully."}]},"session_id":"040873fd-e7a9-4bc7-ae19-359f6fa74be2"}
{"type":"assistant","message":{"role":"assistant","content":[{"type":"tool_use","id":"toolu_01Bash","name":"Bash","input":{"command":"west build -b native_sim samples/synchronization -p"}}]},"session_id":"040873fd-e7a9-4bc7-ae19-359f6fa74be2"}
{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"toolu_01Bash","content":"[95/95] Running utility command for native_runner_executable"}]},"session_id":"040873fd-e7a9-4bc7-ae19-359f6fa74be2"}
{"type":"assistant","message":{"role":"assistant","content":[{"type":"text","text":"Build succeeds. The fix was to add the missing kernel header."}]},"session_id":"040873fd-e7a9-4bc7-ae19-359f6fa74be2"}
{"type":"result","subtype":"success","is_error":false,"duration_ms":33551,"duration_api_ms":24484,"num_turns":7,"result":"Build succeeds.","session_id":"040873fd-e7a9-4bc7-ae19-359f6fa74be2","total_cost_usd":0.14095825,"usage":{"input_tokens":7,"cache_creation_input_tokens":9277,"cache_read_input_tokens":115944,"output_tokens":850}}
"##;

pub const FIXTURE_SESSION_ID: &str = "040873fd-e7a9-4bc7-ae19-359f6fa74be2";
pub const FIXTURE_MODEL: &str = "claude-opus-4-5-20251101";

/// Assistant text of the fixture, in stream order.
pub const FIXTURE_TEXT: [&str; 3] = [
    "I'll start by examining the source file.",
    "The root cause is clear: the kernel header is missing.",
    "Build succeeds. The fix was to add the missing kernel header.",
];

/// A shell script standing in for the CLI. Removed on drop.
pub struct FakeCli {
    dir: TempDir,
    path: PathBuf,
}

impl FakeCli {
    /// Script running `body` under `/bin/sh`.
    pub fn script(body: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claude");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir, path }
    }

    /// Script printing `stdout` verbatim and exiting 0.
    pub fn emitting(stdout: &str) -> Self {
        Self::script(&format!("cat <<'CLAUDE_EOF'\n{}\nCLAUDE_EOF", stdout.trim_end()))
    }

    /// Script printing `stdout`, then blocking until killed.
    pub fn emitting_then_hanging(stdout: &str) -> Self {
        Self::script(&format!(
            "cat <<'CLAUDE_EOF'\n{}\nCLAUDE_EOF\nexec sleep 30",
            stdout.trim_end()
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scratch directory next to the script.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Thread-safe event log for hook assertions.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }
}
