#![forbid(unsafe_code)]

//! `acp-client`: run prompts against an ACP coding agent from the terminal.
//!
//! Loads the TOML configuration, spawns the agent, opens (or loads) a
//! session, sends each `--prompt` as one turn while streaming the reply to
//! stdout, and optionally prints the transcript at the end.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use acp_client::acp::connection::ConnectionState;
use acp_client::error_kind::ClassifiedError;
use acp_client::host::{PermissionPolicy, PolicyPermissions, WorkspaceFiles};
use acp_client::models::{SessionStatus, ToolCall, Turn};
use acp_client::orchestrator::session_manager::{
    FileSystemHandler, SessionEvents, SessionManager, StreamKey, StreamKind,
};
use acp_client::orchestrator::stream_buffer::StreamFlush;
use acp_client::{AppError, ClientConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum TranscriptFormat {
    Markdown,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "acp-client", about = "Agent Client Protocol client", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Override the agent working directory.
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Prompt to send; repeat for several turns.
    #[arg(long = "prompt", required = true)]
    prompts: Vec<String>,

    /// Resume an existing session instead of starting a new one.
    #[arg(long)]
    load: Option<String>,

    /// How to answer tool-call permission requests (allow, reject, ask).
    #[arg(long, default_value_t = PermissionPolicy::Ask)]
    permission: PermissionPolicy,

    /// Print the transcript to stdout when done.
    #[arg(long, value_enum)]
    transcript: Option<TranscriptFormat>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = ClientConfig::load_from_path(&args.config)?;
    if let Some(cwd) = args.cwd {
        config.override_working_dir(cwd)?;
    }
    info!(
        command = %config.agent.command,
        working_dir = %config.agent.working_dir.display(),
        "configuration loaded"
    );

    let files: Option<Arc<dyn FileSystemHandler>> =
        if config.client.read_text_file || config.client.write_text_file {
            Some(Arc::new(WorkspaceFiles::new(config.agent.working_dir.clone())))
        } else {
            None
        };

    let manager = Arc::new(SessionManager::new(
        config.session_options(),
        Arc::new(PolicyPermissions::new(args.permission)),
        files,
        Arc::new(ConsoleEvents::default()),
    ));

    manager.connect(&config.spawn_config()).await?;

    let session = match &args.load {
        Some(session_id) => {
            manager
                .load(session_id, &config.agent.working_dir, config.mcp_servers.clone())
                .await?
        }
        None => {
            manager
                .start(&config.agent.working_dir, config.mcp_servers.clone())
                .await?
        }
    };
    info!(session_id = %session.session_id, "session ready");

    let stop = CancellationToken::new();
    let interrupts = tokio::spawn(watch_interrupts(Arc::clone(&manager), stop.clone()));

    for prompt in &args.prompts {
        if stop.is_cancelled() {
            break;
        }
        if let Err(err) = manager.send_prompt(prompt).await {
            error!(%err, "prompt failed");
            if manager.connection().state() != ConnectionState::Connected {
                break;
            }
        }
    }

    interrupts.abort();

    if let Some(format) = args.transcript {
        let rendered = match format {
            TranscriptFormat::Markdown => manager.to_markdown(),
            TranscriptFormat::Json => serde_json::to_string_pretty(&manager.to_json())?,
        };
        println!("{rendered}");
    }

    manager.disconnect().await;
    info!("acp-client shut down");
    Ok(())
}

/// First Ctrl-C cancels the running turn; the second one disconnects.
async fn watch_interrupts(manager: Arc<SessionManager>, stop: CancellationToken) {
    let mut presses = 0u32;
    while tokio::signal::ctrl_c().await.is_ok() {
        presses += 1;
        if presses == 1 && manager.status() == SessionStatus::Processing {
            eprintln!("\n^C cancelling turn (press again to quit)");
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                if let Err(err) = manager.cancel().await {
                    warn!(%err, "cancel failed");
                }
            });
            continue;
        }
        eprintln!("\n^C disconnecting");
        stop.cancel();
        manager.disconnect().await;
        return;
    }
}

/// Prints streamed replies on stdout and everything else on stderr.
#[derive(Debug, Default)]
struct ConsoleEvents {
    /// Whether the current line on stdout is unterminated.
    mid_line: AtomicBool,
}

impl SessionEvents for ConsoleEvents {
    fn on_stream(&self, flush: &StreamFlush<StreamKey>) {
        if flush.key.kind != StreamKind::Assistant {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(flush.delta.as_bytes());
        let _ = stdout.flush();
        if !flush.delta.is_empty() {
            self.mid_line
                .store(!flush.delta.ends_with('\n'), Ordering::Relaxed);
        }
    }

    fn on_tool_call(&self, _turn_id: &str, call: &ToolCall) {
        let title = if call.title.is_empty() {
            &call.tool_call_id
        } else {
            &call.title
        };
        eprintln!("[tool] {title} ({:?})", call.status);
    }

    fn on_turn_complete(&self, turn: &Turn) {
        if self.mid_line.swap(false, Ordering::Relaxed) {
            println!();
        }
        if let Some(reason) = turn.stop_reason {
            info!(turn_id = %turn.id, stop_reason = reason.as_str(), "turn finished");
        }
    }

    fn on_error(&self, error: &ClassifiedError) {
        eprintln!("[error] {}: {}", error.kind.label(), error.message);
    }

    fn on_disconnected(&self, reason: &str) {
        eprintln!("[disconnected] {reason}");
    }

    fn on_diagnostic(&self, line: &str) {
        tracing::debug!(line, "agent diagnostic");
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the conversation; logs go to stderr.
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
