//! Claude Session - run the Claude Code CLI and stream its output.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use claude_session::config::{ConfigLoader, FileConfig};
use claude_session::display;
use claude_session::{
    cli_version, extract_text, metrics_from_transcript, resolve_binary, Hooks, Session,
    SessionConfig, StreamMessage,
};

#[derive(Parser)]
#[command(
    name = "claude-session",
    about = "Run the Claude Code CLI and stream its output",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a prompt and stream text and tool calls as they arrive.
    Run {
        prompt: String,
        #[command(flatten)]
        launch: LaunchArgs,
    },
    /// Run a prompt and print the collected result.
    Collect {
        prompt: String,
        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        launch: LaunchArgs,
    },
    /// Compute metrics from a saved stream-json dump.
    Metrics {
        file: PathBuf,
    },
    /// Check that the CLI is installed and report its version.
    Check,
}

#[derive(Args, Debug, Default)]
struct LaunchArgs {
    /// Model to use.
    #[arg(long)]
    model: Option<String>,
    /// Maximum number of agentic turns.
    #[arg(long)]
    max_turns: Option<u32>,
    /// Kill the CLI after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Working directory for the CLI.
    #[arg(long)]
    work_dir: Option<PathBuf>,
    /// Pass --dangerously-skip-permissions.
    #[arg(long)]
    skip_permissions: bool,
}

impl LaunchArgs {
    /// Command-line flags take precedence over the config file.
    fn apply(self, file: &mut FileConfig) {
        if self.model.is_some() {
            file.model = self.model;
        }
        if self.max_turns.is_some() {
            file.max_turns = self.max_turns;
        }
        if self.timeout_secs.is_some() {
            file.timeout_secs = self.timeout_secs;
        }
        if self.work_dir.is_some() {
            file.work_dir = self.work_dir;
        }
        file.skip_permissions |= self.skip_permissions;
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping session");
            child.cancel();
        }
    });
    token
}

async fn stream(config: SessionConfig, prompt: &str) -> claude_session::Result<()> {
    let mut config = config;
    let hooks = Hooks::new()
        .on_start(display::print_session_start)
        .on_tool_call(display::print_tool_call)
        .on_exit(display::print_exit);
    config.launch = config.launch.hooks(hooks);

    let session = Session::new(config);
    let mut messages = session.take_messages()?;
    let mut errors = session.take_errors()?;
    session.run(&cancel_on_ctrl_c(), prompt).await?;

    loop {
        tokio::select! {
            msg = messages.recv() => match msg {
                Some(StreamMessage::System(system)) if system.subtype == "init" => {
                    display::print_init(&system.model, &system.session_id);
                }
                Some(msg @ StreamMessage::Assistant(_)) => display::print_text(extract_text(&msg)),
                Some(_) => {}
                None => break,
            },
            Some(err) = errors.recv() => tracing::warn!(error = %err, "Stream error"),
        }
    }

    let outcome = session.wait().await;
    display::print_metrics(&session.current_metrics());
    outcome
}

async fn collect(config: SessionConfig, prompt: &str, json: bool) -> claude_session::Result<()> {
    let session = Session::new(config);
    let collected = session.run_and_collect(&cancel_on_ctrl_c(), prompt).await;
    let result = collected.value;

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(out) => println!("{out}"),
            Err(e) => display::print_error(&format!("failed to encode result: {e}")),
        }
    } else {
        println!("{}", result.text);
        display::print_metrics(&result.metrics);
    }

    collected.error.map_or(Ok(()), Err)
}

fn metrics(file: &Path) -> claude_session::Result<()> {
    let transcript = std::fs::read_to_string(file)?;
    let metrics = metrics_from_transcript(&transcript);
    display::print_metrics(&metrics);
    Ok(())
}

async fn check(file: &FileConfig) -> claude_session::Result<()> {
    let path = match resolve_binary(file.binary.as_deref()) {
        Ok(path) => path,
        Err(e) => {
            display::print_check(None, None);
            return Err(e);
        }
    };
    let query = cli_version(Some(path.as_path()));
    let version = tokio::time::timeout(Duration::from_secs(10), query)
        .await
        .ok()
        .and_then(Result::ok);
    display::print_check(Some(path.as_path()), version.as_deref());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli.config.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let mut file = match loader.load() {
        Ok(file) => file,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Run { prompt, launch } => {
            launch.apply(&mut file);
            stream(file.to_session_config(), &prompt).await
        }
        Commands::Collect {
            prompt,
            json,
            launch,
        } => {
            launch.apply(&mut file);
            collect(file.to_session_config(), &prompt, json).await
        }
        Commands::Metrics { file: path } => metrics(&path),
        Commands::Check => check(&file).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_error(&e.to_string());
            let code = e.exit_code().and_then(|c| u8::try_from(c).ok()).filter(|&c| c != 0);
            code.map_or(ExitCode::FAILURE, ExitCode::from)
        }
    }
}
