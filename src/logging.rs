//! Tracing subscriber setup.
//!
//! - `BOT_PANEL_LOG` or `RUST_LOG`: filter directive (default `bot_panel=info,warn`)
//! - `BOT_PANEL_LOG_FORMAT`: `pretty`, `compact` (default) or `json`
//!
//! The TUI owns the terminal, so in that mode events go to a file instead of stderr.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "bot_panel=info,warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub filter: String,
    pub format: LogFormat,
    /// `None` writes to stderr.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    pub fn from_env(file: Option<PathBuf>) -> Self {
        let filter = std::env::var("BOT_PANEL_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_FILTER.to_string());
        let format = std::env::var("BOT_PANEL_LOG_FORMAT")
            .map(|s| LogFormat::parse(&s))
            .unwrap_or_default();
        Self {
            filter,
            format,
            file,
        }
    }
}

/// Default log file for the TUI: `<cache dir>/bot-panel/bot-panel.log`.
pub fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("bot-panel").join("bot-panel.log"))
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber. Later calls are ignored. If the log file can't be opened,
/// logging is disabled rather than written over the TUI.
pub fn init(config: LogConfig) {
    let env_filter =
        EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match config.file.as_deref() {
        Some(path) => {
            let file = match open_log_file(path) {
                Ok(f) => f,
                Err(_) => return,
            };
            let writer = Mutex::new(file);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            match config.format {
                LogFormat::Json => {
                    let _ = tracing_subscriber::registry()
                        .with(env_filter)
                        .with(layer.json())
                        .try_init();
                }
                LogFormat::Pretty => {
                    let _ = tracing_subscriber::registry()
                        .with(env_filter)
                        .with(layer.pretty())
                        .try_init();
                }
                LogFormat::Compact => {
                    let _ = tracing_subscriber::registry()
                        .with(env_filter)
                        .with(layer.compact())
                        .try_init();
                }
            }
        }
        None => {
            let layer = fmt::layer().with_writer(std::io::stderr);
            match config.format {
                LogFormat::Json => {
                    let _ = tracing_subscriber::registry()
                        .with(env_filter)
                        .with(layer.json())
                        .try_init();
                }
                LogFormat::Pretty => {
                    let _ = tracing_subscriber::registry()
                        .with(env_filter)
                        .with(layer.pretty())
                        .try_init();
                }
                LogFormat::Compact => {
                    let _ = tracing_subscriber::registry()
                        .with(env_filter)
                        .with(layer.compact())
                        .try_init();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("whatever"), LogFormat::Compact);
    }

    #[test]
    fn default_log_file_is_namespaced() {
        if let Some(path) = default_log_file() {
            assert!(path.ends_with("bot-panel/bot-panel.log"));
        }
    }
}
