use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Value of the synthetic selector entry that means "no saved credentials".
pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_PROFILE_LABEL: &str = "Default (No saved credentials)";

/// Connection settings shared by the HTTP client and the push channel.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub base_url: String,
    pub events_url: Option<String>,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub user_agent: String,
}

/// A named credential pair, as posted to `POST /profiles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub username: String,
    pub password: String,
}

/// Value side of the `GET /profiles` map. The backend may omit the password.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub post_url: String,
    pub comment: String,
    pub count: u32,
    pub headless: bool,
    pub profile_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<u64>,
}

/// Severity attached to a log line. Server lines use upper-case names,
/// lines synthesised by the panel use `system`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    #[default]
    Info,
    Warning,
    Error,
    System,
    Other(String),
}

impl LogLevel {
    pub fn as_str(&self) -> &str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::System => "system",
            LogLevel::Other(s) => s,
        }
    }
}

impl From<String> for LogLevel {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => LogLevel::Info,
            "WARNING" | "WARN" => LogLevel::Warning,
            "ERROR" => LogLevel::Error,
            "SYSTEM" => LogLevel::System,
            _ => LogLevel::Other(s),
        }
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub timestamp: String,
}

impl LogEntry {
    /// A panel-generated line stamped with the local wall clock.
    pub fn system(message: impl Into<String>) -> Self {
        Self::now(message, LogLevel::System)
    }

    pub fn now(message: impl Into<String>, level: LogLevel) -> Self {
        Self {
            message: message.into(),
            level,
            timestamp: local_timestamp(),
        }
    }
}

/// Snapshot from `GET /status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotStatus {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub current_task: Option<String>,
    #[serde(default)]
    pub last_log: Option<serde_json::Value>,
}

/// Notifications delivered over the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    Log(LogEntry),
    Finished {
        run_id: Option<u64>,
        success: Option<bool>,
    },
}

/// Local wall-clock time as `HH:MM:SS`, falling back to UTC when the local
/// offset can't be determined (e.g. multi-threaded processes on some Unixes).
pub fn local_timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(time::macros::format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "--:--:--".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn log_level_parses_server_and_client_names() {
        assert_eq!(LogLevel::from("INFO".to_string()), LogLevel::Info);
        assert_eq!(LogLevel::from("warning".to_string()), LogLevel::Warning);
        assert_eq!(LogLevel::from("ERROR".to_string()), LogLevel::Error);
        assert_eq!(LogLevel::from("system".to_string()), LogLevel::System);
        assert_eq!(
            LogLevel::from("TRACE".to_string()),
            LogLevel::Other("TRACE".into())
        );
        assert_eq!(LogLevel::System.to_string(), "system");
    }

    #[test]
    fn bot_log_payload_deserializes() {
        let entry: LogEntry = serde_json::from_value(serde_json::json!({
            "message": "Opened post",
            "level": "WARNING",
            "timestamp": "12:00:01"
        }))
        .unwrap();
        assert_eq!(entry.level, LogLevel::Warning);
        assert_eq!(entry.timestamp, "12:00:01");

        let sparse: LogEntry = serde_json::from_value(serde_json::json!({"message": "x"})).unwrap();
        assert_eq!(sparse.level, LogLevel::Info);
    }

    #[test]
    fn run_request_omits_missing_run_id() {
        let req = RunRequest {
            post_url: "https://x".into(),
            comment: "hi".into(),
            count: 1,
            headless: false,
            profile_name: DEFAULT_PROFILE.into(),
            run_id: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("run_id").is_none());
        assert_eq!(v["count"], 1);
    }

    #[test]
    fn timestamp_has_clock_shape() {
        let ts = local_timestamp();
        assert_eq!(ts.len(), 8);
        assert_eq!(ts.as_bytes()[2], b':');
    }
}
