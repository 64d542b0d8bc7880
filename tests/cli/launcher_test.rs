//! Tests for spawning, reading and reaping the CLI process.

use std::time::{Duration, Instant};

use claude_session::{Error, Hooks, LaunchOptions, Launcher, McpServer, StreamMessage};
use tokio_util::sync::CancellationToken;

use crate::common::{FakeCli, Recorder, FIXTURE, FIXTURE_SESSION_ID};

async fn read_all(launcher: &Launcher) -> Vec<StreamMessage> {
    let mut messages = Vec::new();
    loop {
        match launcher.read_message().await {
            Ok(Some(msg)) => messages.push(msg),
            Ok(None) => return messages,
            Err(e) => assert!(e.is_recoverable(), "unexpected fatal error: {e}"),
        }
    }
}

async fn start(launcher: &Launcher, fake: &FakeCli, opts: LaunchOptions) {
    launcher
        .start(&CancellationToken::new(), "fix the build", opts.binary(fake.path()))
        .await
        .unwrap();
}

#[tokio::test]
async fn launcher_streams_fixture() {
    let fake = FakeCli::emitting(FIXTURE);
    let launcher = Launcher::new();
    start(&launcher, &fake, LaunchOptions::new()).await;

    assert!(launcher.pid().is_some());
    let messages = read_all(&launcher).await;
    assert_eq!(messages.len(), 10);
    assert!(messages[0].is_init());
    assert_eq!(messages[0].session_id(), FIXTURE_SESSION_ID);
    assert!(messages[9].is_result());

    launcher.wait().await.unwrap();
    assert!(launcher.is_done());
    assert!(!launcher.running());
    assert!(launcher.exit_error().is_none());
    assert!(launcher.elapsed().is_some());
}

#[tokio::test]
async fn hooks_fire_in_stream_order() {
    let rec = Recorder::default();
    let hooks = Hooks::new()
        .on_start({
            let rec = rec.clone();
            move |_| rec.push("start")
        })
        .on_message({
            let rec = rec.clone();
            move |msg| rec.push(format!("message:{}", msg.kind()))
        })
        .on_text({
            let rec = rec.clone();
            move |_| rec.push("text")
        })
        .on_tool_call({
            let rec = rec.clone();
            move |name, _| rec.push(format!("tool:{name}"))
        })
        .on_metrics({
            let rec = rec.clone();
            move |metrics| rec.push(format!("metrics:{}", metrics.num_turns))
        })
        .on_exit({
            let rec = rec.clone();
            move |code, _| rec.push(format!("exit:{code}"))
        });

    let fake = FakeCli::emitting(FIXTURE);
    let launcher = Launcher::new();
    start(&launcher, &fake, LaunchOptions::new().hooks(hooks)).await;
    read_all(&launcher).await;
    launcher.wait().await.unwrap();
    launcher.wait().await.unwrap();

    let events = rec.events();
    assert_eq!(events.first().map(String::as_str), Some("start"));
    assert_eq!(events.last().map(String::as_str), Some("exit:0"));
    assert_eq!(rec.count("message:"), 10);
    assert_eq!(rec.count("exit:"), 1);
    assert_eq!(rec.count("metrics:7"), 1);
    // Three assistant texts plus the result text.
    assert_eq!(rec.count("text"), 4);

    let tools: Vec<_> = events.iter().filter(|e| e.starts_with("tool:")).collect();
    assert_eq!(tools, ["tool:Read", "tool:Edit", "tool:Bash"]);

    let edit = events.iter().position(|e| e == "tool:Edit").unwrap();
    assert_eq!(events[edit - 1], "text");
    assert_eq!(events[edit - 2], "message:assistant");
}

#[tokio::test]
async fn non_zero_exit_reports_stderr() {
    let fake = FakeCli::script("echo 'invalid api key' >&2\nexit 3");
    let launcher = Launcher::new();
    start(&launcher, &fake, LaunchOptions::new()).await;

    assert!(read_all(&launcher).await.is_empty());
    let err = launcher.wait().await.unwrap_err();
    match &err {
        Error::Exit { code, stderr } => {
            assert_eq!(*code, 3);
            assert!(stderr.contains("invalid api key"));
        }
        other => panic!("expected exit error, got {other:?}"),
    }
    assert_eq!(err.exit_code(), Some(3));
    assert!(launcher.stderr().contains("invalid api key"));

    // Later waits report the same outcome.
    assert_eq!(launcher.wait().await.unwrap_err().exit_code(), Some(3));
    assert_eq!(launcher.exit_error().and_then(|e| e.exit_code()), Some(3));
}

#[tokio::test]
async fn timeout_kills_process() {
    let fake = FakeCli::emitting_then_hanging(r#"{"type":"assistant","text":"working"}"#);
    let launcher = Launcher::new();
    let started = Instant::now();
    start(
        &launcher,
        &fake,
        LaunchOptions::new().timeout(Duration::from_millis(300)),
    )
    .await;

    let messages = read_all(&launcher).await;
    assert_eq!(messages.len(), 1);

    let err = launcher.wait().await.unwrap_err();
    assert!(matches!(err, Error::Timeout(limit) if limit == Duration::from_millis(300)));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn exit_before_deadline_is_not_a_timeout() {
    let fake = FakeCli::emitting(FIXTURE);
    let launcher = Launcher::new();
    start(
        &launcher,
        &fake,
        LaunchOptions::new().timeout(Duration::from_millis(300)),
    )
    .await;

    assert_eq!(read_all(&launcher).await.len(), 10);
    // Reap only after the deadline has passed.
    tokio::time::sleep(Duration::from_millis(600)).await;

    launcher.wait().await.unwrap();
    assert!(launcher.exit_error().is_none());
}

#[tokio::test]
async fn cancellation_kills_process() {
    let fake = FakeCli::emitting_then_hanging(r#"{"type":"assistant","text":"working"}"#);
    let launcher = Launcher::new();
    let token = CancellationToken::new();
    launcher
        .start(&token, "hang", LaunchOptions::new().binary(fake.path()))
        .await
        .unwrap();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    read_all(&launcher).await;
    assert!(matches!(launcher.wait().await, Err(Error::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn kill_and_interrupt_after_exit_are_noops() {
    let fake = FakeCli::emitting(FIXTURE);
    let launcher = Launcher::new();
    start(&launcher, &fake, LaunchOptions::new()).await;
    read_all(&launcher).await;
    launcher.wait().await.unwrap();

    assert!(launcher.kill().is_ok());
    assert!(launcher.interrupt().is_ok());
    assert!(launcher.exit_error().is_none());
}

#[tokio::test]
async fn second_start_is_rejected() {
    let fake = FakeCli::emitting(FIXTURE);
    let launcher = Launcher::new();
    start(&launcher, &fake, LaunchOptions::new()).await;

    let again = launcher
        .start(
            &CancellationToken::new(),
            "again",
            LaunchOptions::new().binary(fake.path()),
        )
        .await;
    assert!(matches!(again, Err(Error::AlreadyStarted)));

    read_all(&launcher).await;
    launcher.wait().await.unwrap();
}

#[tokio::test]
async fn malformed_lines_are_skipped() {
    let errors = Recorder::default();
    let hooks = Hooks::new().on_error({
        let errors = errors.clone();
        move |e| errors.push(e.to_string())
    });

    let fake = FakeCli::emitting("not json\n\n{\"type\":\"assistant\",\"text\":\"still here\"}");
    let launcher = Launcher::new();
    start(&launcher, &fake, LaunchOptions::new().hooks(hooks)).await;

    assert!(matches!(
        launcher.read_message().await,
        Err(Error::Parse { .. })
    ));
    let msg = launcher.read_message().await.unwrap().unwrap();
    assert_eq!(msg.direct_text(), "still here");
    assert!(launcher.read_message().await.unwrap().is_none());
    launcher.wait().await.unwrap();

    assert_eq!(errors.count(""), 1);
    assert!(errors.events()[0].contains("not json"));
}

#[tokio::test]
async fn arguments_and_environment_reach_the_process() {
    let fake = FakeCli::script(
        "printf '%s\\n' \"$@\" > \"$OUT_DIR/args\"\npwd > \"$OUT_DIR/pwd\"\necho \"$EXTRA\" > \"$OUT_DIR/env\"",
    );
    let out = fake.dir().to_path_buf();
    let work = tempfile::tempdir().unwrap();
    let opts = LaunchOptions::new()
        .model("sonnet")
        .max_turns(3)
        .work_dir(work.path())
        .env("OUT_DIR", out.display().to_string())
        .env("EXTRA", "from-options");

    let launcher = Launcher::new();
    start(&launcher, &fake, opts).await;
    read_all(&launcher).await;
    launcher.wait().await.unwrap();

    let args = std::fs::read_to_string(out.join("args")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(&args[..4], ["--print", "--output-format", "stream-json", "--verbose"]);
    assert!(args.windows(2).any(|w| w == ["--model", "sonnet"]));
    assert!(args.windows(2).any(|w| w == ["--max-turns", "3"]));
    assert_eq!(args.last(), Some(&"fix the build"));

    let pwd = std::fs::read_to_string(out.join("pwd")).unwrap();
    assert_eq!(
        std::fs::canonicalize(pwd.trim()).unwrap(),
        std::fs::canonicalize(work.path()).unwrap()
    );
    let env = std::fs::read_to_string(out.join("env")).unwrap();
    assert_eq!(env.trim(), "from-options");
}

#[tokio::test]
async fn mcp_config_is_removed_after_wait() {
    let fake = FakeCli::script(
        r#"prev=""
for arg in "$@"; do
  if [ "$prev" = "--mcp-config" ]; then
    cp "$arg" "$OUT_DIR/mcp.json"
    printf '%s' "$arg" > "$OUT_DIR/mcp_path"
  fi
  prev="$arg"
done"#,
    );
    let out = fake.dir().to_path_buf();
    let opts = LaunchOptions::new()
        .mcp_server("files", McpServer::stdio("npx", &["file-server"]))
        .env("OUT_DIR", out.display().to_string());

    let launcher = Launcher::new();
    start(&launcher, &fake, opts).await;
    read_all(&launcher).await;
    launcher.wait().await.unwrap();

    let config: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("mcp.json")).unwrap()).unwrap();
    assert_eq!(config["mcpServers"]["files"]["command"], "npx");

    let temp_path = std::fs::read_to_string(out.join("mcp_path")).unwrap();
    assert!(!std::path::Path::new(&temp_path).exists());
}
