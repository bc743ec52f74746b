use crate::api::ApiClient;
use crate::model::{LogLevel, PanelConfig, ProfileRecord, DEFAULT_PROFILE};
use crate::orchestrator::{self, UiCommand};
use crate::panel::{Panel, PanelEvent, RunForm, RunningState};
use crate::push::{self, ChannelEvent};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "bot-panel",
    version,
    about = "Control panel for the commenting bot backend"
)]
pub struct Cli {
    /// Base URL of the bot backend
    #[arg(long, env = "BOT_PANEL_URL", default_value = "http://127.0.0.1:5000")]
    pub base_url: String,

    /// Push-channel WebSocket URL (default: derived from --base-url)
    #[arg(long)]
    pub events_url: Option<String>,

    /// TCP connect timeout for backend requests
    #[arg(long, default_value = "5s")]
    pub connect_timeout: humantime::Duration,

    /// Delay before reconnecting a dropped push channel
    #[arg(long, default_value = "2s")]
    pub reconnect_delay: humantime::Duration,

    /// Start one run, stream its log to stdout and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Print saved profiles as JSON and exit (passwords redacted)
    #[arg(long, conflicts_with = "text")]
    pub list_profiles: bool,

    /// Target post URL (required with --text, pre-fills the TUI form otherwise)
    #[arg(long)]
    pub post_url: Option<String>,

    /// Comment text to post
    #[arg(long)]
    pub comment: Option<String>,

    /// Number of comments to post
    #[arg(long, default_value_t = 1)]
    pub count: u32,

    /// Ask the backend to drive its browser headless
    #[arg(long)]
    pub headless: bool,

    /// Saved profile to run as
    #[arg(long, default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// Write tracing output to this file (TUI default: cache dir; otherwise stderr)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Whether this invocation hands the terminal to the TUI.
    pub fn uses_tui(&self) -> bool {
        cfg!(feature = "tui") && !self.text && !self.list_profiles
    }

    /// Where tracing output should go for this invocation.
    pub fn log_target(&self) -> Option<PathBuf> {
        match &self.log_file {
            Some(p) => Some(p.clone()),
            None if self.uses_tui() => crate::logging::default_log_file(),
            None => None,
        }
    }

    /// Initial run form built from the flags.
    pub fn run_form(&self) -> RunForm {
        RunForm {
            post_url: self.post_url.clone().unwrap_or_default(),
            comment: self.comment.clone().unwrap_or_default(),
            count: self.count.to_string(),
            headless: self.headless,
        }
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if args.list_profiles {
        return list_profiles(args).await;
    }

    if !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args).await;
        }
    }

    run_text(args).await
}

/// Build a `PanelConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> PanelConfig {
    PanelConfig {
        base_url: args.base_url.clone(),
        events_url: args.events_url.clone(),
        connect_timeout: Duration::from(args.connect_timeout),
        reconnect_delay: Duration::from(args.reconnect_delay),
        user_agent: format!("bot-panel/{}", env!("CARGO_PKG_VERSION")),
    }
}

async fn list_profiles(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let api = ApiClient::new(&cfg)?;
    let profiles = api
        .list_profiles()
        .await
        .with_context(|| format!("failed to fetch profiles from {}", api.base_url()))?;

    let map: serde_json::Map<String, serde_json::Value> = profiles
        .into_iter()
        .map(|(name, record)| -> Result<(String, serde_json::Value)> {
            let redacted = ProfileRecord {
                password: record.password.map(|_| "********".to_string()),
                ..record
            };
            Ok((name, serde_json::to_value(redacted)?))
        })
        .collect::<Result<_>>()?;

    let (out_tx, out_handle) = spawn_output_writer();
    let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string_pretty(&map)?));
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

async fn run_text(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let mut panel = Panel::new(args.run_form());
    if panel.run_form.post_url.is_empty() || panel.run_form.comment.is_empty() {
        anyhow::bail!("--text needs both --post-url and --comment");
    }
    if args.profile != DEFAULT_PROFILE {
        panel.profiles.rebuild([args.profile.clone()]);
        panel.profiles.select(&args.profile);
    }

    let api = Arc::new(ApiClient::new(&cfg)?);
    let (out_tx, out_handle) = spawn_output_writer();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<PanelEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let push_handle = tokio::spawn(push::run_push_channel(cfg.clone(), event_tx.clone()));
    let controller = tokio::spawn(orchestrator::run_controller(api, event_tx, cmd_rx));

    // Subscribe before starting so the first log lines of the job aren't missed.
    let connected = tokio::time::timeout(cfg.connect_timeout, async {
        while let Some(ev) = event_rx.recv().await {
            if matches!(ev, PanelEvent::Channel(ChannelEvent::Connected)) {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    if !connected {
        let _ = out_tx.send(OutputLine::Stderr(
            "Push channel not connected; log lines may be missing.".into(),
        ));
    }

    let cmd = panel.submit_run().context("run form is incomplete")?;
    let run_id = match &cmd {
        UiCommand::StartRun { run_id, .. } => *run_id,
        _ => 0,
    };
    cmd_tx.send(cmd).context("controller stopped")?;

    let mut mark = 0u64;
    let mut failed = false;
    loop {
        let (fresh, next_mark) = panel.logs_since(mark);
        for entry in fresh {
            let line = format!("[{}] {:<7} {}", entry.timestamp, entry.level, entry.message);
            let _ = out_tx.send(match entry.level {
                LogLevel::Error => OutputLine::Stderr(line),
                _ => OutputLine::Stdout(line),
            });
        }
        mark = next_mark;
        if panel.running() == RunningState::Ready {
            break;
        }

        tokio::select! {
            ev = event_rx.recv() => {
                let Some(ev) = ev else { break };
                if matches!(&ev, PanelEvent::RunFailed { run_id: id, .. } if *id == run_id) {
                    failed = true;
                }
                panel.apply(ev);
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = out_tx.send(OutputLine::Stderr(
                    "Interrupted; the job keeps running on the backend.".into(),
                ));
                break;
            }
        }
    }

    let _ = cmd_tx.send(UiCommand::Quit);
    push_handle.abort();
    let _ = controller.await;
    drop(out_tx);
    let _ = out_handle.await;

    if failed {
        anyhow::bail!("run was not started");
    }
    Ok(())
}
