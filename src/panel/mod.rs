//! Application state for the control panel.
//!
//! `Panel` is the single owner of everything the user sees: the profile selector, both forms,
//! the running flag and the log console. Presentation layers mutate it only through the action
//! methods (which return the `UiCommand` to execute, if any) and through `Panel::apply`, which
//! folds controller and push-channel events back in.

mod notify;
mod profiles;

pub use notify::{Notice, Origin, Severity, Surface};
pub use profiles::{ProfileDraft, ProfileOption, ProfileSelector};

use crate::model::{BotStatus, LogEntry, LogLevel, PushEvent, RunRequest};
use crate::orchestrator::UiCommand;
use crate::push::ChannelEvent;
use std::collections::{vec_deque, VecDeque};
use tracing::{debug, error, info, warn};

/// Oldest log lines are dropped past this many entries.
pub const MAX_LOG_ENTRIES: usize = 5000;

/// Events delivered to the panel by the controller and the push channel.
#[derive(Debug, Clone)]
pub enum PanelEvent {
    ProfilesLoaded(Vec<String>),
    ProfilesFailed(String),
    ProfileSaved { name: String },
    ProfileSaveFailed(String),
    ProfileDeleted { name: String },
    ProfileDeleteFailed(String),
    RunAccepted { run_id: u64 },
    RunFailed { run_id: u64, failure: RunFailure },
    StatusSynced(BotStatus),
    StatusFailed(String),
    Channel(ChannelEvent),
    Push(PushEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFailure {
    /// Non-2xx answer; carries the backend's `error` text.
    Rejected(String),
    Network(String),
}

impl RunFailure {
    fn log_message(&self) -> String {
        match self {
            RunFailure::Rejected(msg) => format!("Error: {msg}"),
            RunFailure::Network(msg) => format!("Network Error: {msg}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningState {
    Ready,
    /// `accepted` flips once `POST /run` answers 2xx.
    Running { run_id: u64, accepted: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Connected,
    Down(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingConfirm {
    DeleteProfile(String),
}

impl PendingConfirm {
    pub fn prompt(&self) -> String {
        match self {
            PendingConfirm::DeleteProfile(name) => {
                format!("Are you sure you want to delete profile \"{name}\"?")
            }
        }
    }
}

/// Run form fields. `count` stays text so it can be edited in place.
#[derive(Debug, Clone)]
pub struct RunForm {
    pub post_url: String,
    pub comment: String,
    pub count: String,
    pub headless: bool,
}

impl Default for RunForm {
    fn default() -> Self {
        Self {
            post_url: String::new(),
            comment: String::new(),
            count: "1".into(),
            headless: false,
        }
    }
}

impl RunForm {
    /// Parsed comment count; blank, zero or garbage falls back to 1.
    pub fn count_value(&self) -> u32 {
        self.count
            .trim()
            .parse()
            .ok()
            .filter(|c| *c > 0)
            .unwrap_or(1)
    }
}

pub struct Panel {
    pub profiles: ProfileSelector,
    pub draft: ProfileDraft,
    pub run_form: RunForm,
    pub channel: ChannelState,
    pub alert: Option<Notice>,
    pub confirm: Option<PendingConfirm>,
    pub status_line: Option<Notice>,
    running: RunningState,
    next_run_id: u64,
    logs: VecDeque<LogEntry>,
    appended: u64,
}

impl Default for Panel {
    fn default() -> Self {
        Self::new(RunForm::default())
    }
}

impl Panel {
    pub fn new(run_form: RunForm) -> Self {
        Self {
            profiles: ProfileSelector::default(),
            draft: ProfileDraft::default(),
            run_form,
            channel: ChannelState::Connecting,
            alert: None,
            confirm: None,
            status_line: None,
            running: RunningState::Ready,
            next_run_id: 1,
            logs: VecDeque::new(),
            appended: 0,
        }
    }

    /// Commands issued once when the panel opens.
    pub fn startup_commands(&self) -> Vec<UiCommand> {
        vec![UiCommand::FetchProfiles, UiCommand::SyncStatus]
    }

    pub fn running(&self) -> RunningState {
        self.running
    }

    pub fn is_running(&self) -> bool {
        matches!(self.running, RunningState::Running { .. })
    }

    pub fn status_text(&self) -> &'static str {
        if self.is_running() {
            "Running"
        } else {
            "Ready"
        }
    }

    pub fn start_label(&self) -> &'static str {
        if self.is_running() {
            "Automation Active..."
        } else {
            "Start Automation"
        }
    }

    pub fn logs(&self) -> &VecDeque<LogEntry> {
        &self.logs
    }

    /// Entries appended after `mark` (a previous return value), plus the new mark.
    /// Entries already dropped by the cap or by clearing are skipped.
    pub fn logs_since(&self, mark: u64) -> (vec_deque::Iter<'_, LogEntry>, u64) {
        let fresh = self.appended.saturating_sub(mark) as usize;
        let start = self.logs.len().saturating_sub(fresh);
        (self.logs.range(start..), self.appended)
    }

    pub fn push_log(&mut self, entry: LogEntry) {
        self.logs.push_back(entry);
        self.appended += 1;
        while self.logs.len() > MAX_LOG_ENTRIES {
            self.logs.pop_front();
        }
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
        self.push_log(LogEntry::system("Logs cleared."));
    }

    /// Route a notice to its surface and mirror it into the tracing log.
    pub fn notify(&mut self, notice: Notice) {
        match notice.severity {
            Severity::Info => info!(origin = ?notice.origin, "{}", notice.message),
            Severity::Warning => warn!(origin = ?notice.origin, "{}", notice.message),
            Severity::Error => error!(origin = ?notice.origin, "{}", notice.message),
        }
        match notice.surface() {
            Surface::StatusLine => self.status_line = Some(notice),
            Surface::Alert => self.alert = Some(notice),
            Surface::LogPanel => {
                let level = match notice.severity {
                    Severity::Error => LogLevel::Error,
                    Severity::Warning => LogLevel::Warning,
                    Severity::Info => LogLevel::System,
                };
                self.push_log(LogEntry::now(notice.message, level));
            }
        }
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    pub fn toggle_add_form(&mut self) {
        self.draft.visible = !self.draft.visible;
    }

    pub fn toggle_password_visibility(&mut self) {
        self.draft.password_visible = !self.draft.password_visible;
    }

    pub fn refresh_profiles(&self) -> UiCommand {
        UiCommand::FetchProfiles
    }

    pub fn save_profile(&mut self) -> Option<UiCommand> {
        if !self.draft.is_complete() {
            self.notify(Notice::new(
                Origin::Validation,
                Severity::Warning,
                "Please fill all fields to save a profile.",
            ));
            return None;
        }
        Some(UiCommand::SaveProfile(self.draft.to_profile()))
    }

    /// Ask for confirmation before deleting the selected profile.
    /// The default entry can't be deleted.
    pub fn request_delete(&mut self) {
        if self.profiles.is_default_selected() {
            return;
        }
        self.confirm = Some(PendingConfirm::DeleteProfile(
            self.profiles.selected_value().to_string(),
        ));
    }

    pub fn resolve_confirm(&mut self, accepted: bool) -> Option<UiCommand> {
        match self.confirm.take()? {
            PendingConfirm::DeleteProfile(name) if accepted => Some(UiCommand::DeleteProfile(name)),
            PendingConfirm::DeleteProfile(_) => None,
        }
    }

    /// Validate the run form and start a run. Missing URL or comment is a silent no-op,
    /// as is submitting while a run is active.
    pub fn submit_run(&mut self) -> Option<UiCommand> {
        if self.is_running() {
            return None;
        }
        let form = &self.run_form;
        if form.post_url.is_empty() || form.comment.is_empty() {
            return None;
        }

        let run_id = self.next_run_id;
        self.next_run_id += 1;
        let request = RunRequest {
            post_url: form.post_url.clone(),
            comment: form.comment.clone(),
            count: form.count_value(),
            headless: form.headless,
            profile_name: self.profiles.selected_value().to_string(),
            run_id: Some(run_id),
        };

        self.running = RunningState::Running {
            run_id,
            accepted: false,
        };
        self.push_log(LogEntry::system(format!(
            "Starting bot for: {} [Profile: {}]",
            request.post_url, request.profile_name
        )));
        Some(UiCommand::StartRun { run_id, request })
    }

    /// Fold an asynchronous outcome into the state.
    pub fn apply(&mut self, ev: PanelEvent) {
        match ev {
            PanelEvent::ProfilesLoaded(names) => self.profiles.rebuild(names),
            PanelEvent::ProfilesFailed(msg) => self.notify(Notice::new(
                Origin::ProfileList,
                Severity::Warning,
                format!("Failed to fetch profiles: {msg}"),
            )),
            PanelEvent::ProfileSaved { name } => {
                self.draft.clear();
                self.draft.visible = false;
                self.notify(Notice::new(
                    Origin::ProfileMutation,
                    Severity::Info,
                    format!("Profile {name} saved"),
                ));
            }
            PanelEvent::ProfileSaveFailed(msg) => self.notify(Notice::new(
                Origin::ProfileMutation,
                Severity::Error,
                format!("Error saving profile: {msg}"),
            )),
            PanelEvent::ProfileDeleted { name } => self.notify(Notice::new(
                Origin::ProfileMutation,
                Severity::Info,
                format!("Profile {name} deleted"),
            )),
            PanelEvent::ProfileDeleteFailed(msg) => self.notify(Notice::new(
                Origin::ProfileMutation,
                Severity::Error,
                format!("Error deleting profile: {msg}"),
            )),
            PanelEvent::RunAccepted { run_id } => {
                if let RunningState::Running {
                    run_id: current,
                    accepted,
                } = &mut self.running
                {
                    if *current == run_id {
                        *accepted = true;
                    }
                }
            }
            PanelEvent::RunFailed { run_id, failure } => {
                if !self.is_current_run(run_id) {
                    debug!(run_id, "dropping outcome of a superseded run");
                    return;
                }
                self.notify(Notice::new(
                    Origin::Run,
                    Severity::Error,
                    failure.log_message(),
                ));
                self.running = RunningState::Ready;
            }
            PanelEvent::StatusSynced(status) => {
                if status.running && !self.is_running() {
                    let run_id = self.next_run_id;
                    self.next_run_id += 1;
                    self.running = RunningState::Running {
                        run_id,
                        accepted: true,
                    };
                    let message = match status.current_task.as_deref() {
                        Some(task) => format!("Attached to running job: {task}"),
                        None => "Attached to running job.".to_string(),
                    };
                    self.push_log(LogEntry::system(message));
                }
            }
            PanelEvent::StatusFailed(msg) => self.notify(Notice::new(
                Origin::Status,
                Severity::Warning,
                format!("Failed to read bot status: {msg}"),
            )),
            PanelEvent::Channel(ChannelEvent::Connected) => {
                self.channel = ChannelState::Connected;
                self.notify(Notice::new(
                    Origin::Channel,
                    Severity::Info,
                    "Push channel connected",
                ));
            }
            PanelEvent::Channel(ChannelEvent::Disconnected(reason)) => {
                if self.channel == ChannelState::Down(reason.clone()) {
                    return;
                }
                self.channel = ChannelState::Down(reason.clone());
                self.notify(Notice::new(
                    Origin::Channel,
                    Severity::Warning,
                    format!("Push channel down: {reason}"),
                ));
            }
            PanelEvent::Push(PushEvent::Log(entry)) => self.push_log(entry),
            PanelEvent::Push(PushEvent::Finished { run_id, .. }) => {
                // Tagged completions only count for the run they name, and only while it is active.
                if let Some(id) = run_id {
                    if !self.is_current_run(id) {
                        debug!(run_id = id, "ignoring completion of another run");
                        return;
                    }
                }
                self.running = RunningState::Ready;
                self.push_log(LogEntry::system("Process finished."));
            }
        }
    }

    fn is_current_run(&self, run_id: u64) -> bool {
        matches!(self.running, RunningState::Running { run_id: current, .. } if current == run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Profile;
    use pretty_assertions::assert_eq;

    fn panel_with_form(url: &str, comment: &str) -> Panel {
        Panel::new(RunForm {
            post_url: url.into(),
            comment: comment.into(),
            ..Default::default()
        })
    }

    fn started(panel: &mut Panel) -> u64 {
        match panel.submit_run() {
            Some(UiCommand::StartRun { run_id, .. }) => run_id,
            other => panic!("expected StartRun, got {other:?}"),
        }
    }

    fn last_log(panel: &Panel) -> &LogEntry {
        panel.logs().back().expect("log is empty")
    }

    #[test]
    fn loaded_profiles_follow_default_option() {
        let mut panel = Panel::default();
        panel.apply(PanelEvent::ProfilesLoaded(vec!["alice".into()]));
        let values: Vec<&str> = panel
            .profiles
            .options()
            .iter()
            .map(|o| o.value.as_str())
            .collect();
        assert_eq!(values, vec!["default", "alice"]);
    }

    #[test]
    fn profile_list_failure_is_not_blocking() {
        let mut panel = Panel::default();
        panel.apply(PanelEvent::ProfilesFailed("connection refused".into()));
        assert!(panel.alert.is_none());
        assert!(panel.logs().is_empty());
        assert_eq!(
            panel.status_line.as_ref().map(|n| n.message.as_str()),
            Some("Failed to fetch profiles: connection refused")
        );
    }

    #[test]
    fn incomplete_profile_is_not_sent() {
        let mut panel = Panel::default();
        panel.draft.name = "alice".into();
        panel.draft.username = "al".into();
        assert!(panel.save_profile().is_none());
        let alert = panel.alert.as_ref().expect("validation alert");
        assert_eq!(alert.message, "Please fill all fields to save a profile.");
    }

    #[test]
    fn complete_profile_is_sent_and_cleared_on_success() {
        let mut panel = Panel::default();
        panel.toggle_add_form();
        panel.draft.name = "alice".into();
        panel.draft.username = "al".into();
        panel.draft.password = "pw".into();
        match panel.save_profile() {
            Some(UiCommand::SaveProfile(p)) => assert_eq!(
                p,
                Profile {
                    name: "alice".into(),
                    username: "al".into(),
                    password: "pw".into(),
                }
            ),
            other => panic!("unexpected {other:?}"),
        }
        panel.apply(PanelEvent::ProfileSaved {
            name: "alice".into(),
        });
        assert!(panel.draft.name.is_empty() && panel.draft.password.is_empty());
        assert!(!panel.draft.visible);
        assert!(panel.alert.is_none());
    }

    #[test]
    fn profile_mutation_failure_raises_alert() {
        let mut panel = Panel::default();
        panel.apply(PanelEvent::ProfileSaveFailed("HTTP 500".into()));
        assert_eq!(
            panel.alert.as_ref().map(|n| n.message.as_str()),
            Some("Error saving profile: HTTP 500")
        );
        panel.dismiss_alert();
        panel.apply(PanelEvent::ProfileDeleteFailed("Profile not found".into()));
        assert_eq!(
            panel.alert.as_ref().map(|n| n.message.as_str()),
            Some("Error deleting profile: Profile not found")
        );
    }

    #[test]
    fn default_profile_cannot_be_deleted() {
        let mut panel = Panel::default();
        panel.request_delete();
        assert!(panel.confirm.is_none());
        assert!(panel.resolve_confirm(true).is_none());
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut panel = Panel::default();
        panel.apply(PanelEvent::ProfilesLoaded(vec!["alice".into()]));
        panel.profiles.select("alice");

        panel.request_delete();
        assert_eq!(
            panel.confirm.as_ref().map(PendingConfirm::prompt).as_deref(),
            Some("Are you sure you want to delete profile \"alice\"?")
        );
        assert!(panel.resolve_confirm(false).is_none());
        assert!(panel.confirm.is_none());

        panel.request_delete();
        assert!(matches!(
            panel.resolve_confirm(true),
            Some(UiCommand::DeleteProfile(name)) if name == "alice"
        ));
    }

    #[test]
    fn run_needs_url_and_comment() {
        let mut panel = panel_with_form("https://x", "");
        assert!(panel.submit_run().is_none());
        panel.run_form.comment = "hi".into();
        panel.run_form.post_url.clear();
        assert!(panel.submit_run().is_none());
        assert!(!panel.is_running());
        assert!(panel.logs().is_empty());
    }

    #[test]
    fn accepted_run_stays_running_until_finished() {
        let mut panel = panel_with_form("https://x", "hi");
        let run_id = started(&mut panel);
        assert!(panel.is_running());

        panel.apply(PanelEvent::RunAccepted { run_id });
        assert_eq!(
            panel.running(),
            RunningState::Running {
                run_id,
                accepted: true
            }
        );
        assert_eq!(panel.status_text(), "Running");
        assert_eq!(panel.start_label(), "Automation Active...");
        assert!(panel.submit_run().is_none());

        panel.apply(PanelEvent::Push(PushEvent::Finished {
            run_id: None,
            success: Some(true),
        }));
        assert_eq!(panel.status_text(), "Ready");
        assert_eq!(last_log(&panel).message, "Process finished.");
        assert_eq!(last_log(&panel).level, LogLevel::System);
    }

    #[test]
    fn rejected_run_logs_error_and_resets() {
        let mut panel = panel_with_form("https://x", "hi");
        let run_id = started(&mut panel);
        panel.apply(PanelEvent::RunFailed {
            run_id,
            failure: RunFailure::Rejected("X".into()),
        });
        assert!(!panel.is_running());
        let entry = last_log(&panel);
        assert_eq!(entry.message, "Error: X");
        assert_eq!(entry.level.to_string(), "ERROR");
    }

    #[test]
    fn network_failure_logs_error_and_resets() {
        let mut panel = panel_with_form("https://x", "hi");
        let run_id = started(&mut panel);
        panel.apply(PanelEvent::RunFailed {
            run_id,
            failure: RunFailure::Network("connection refused".into()),
        });
        assert!(!panel.is_running());
        assert_eq!(last_log(&panel).message, "Network Error: connection refused");
    }

    #[test]
    fn stale_outcomes_do_not_touch_the_current_run() {
        let mut panel = panel_with_form("https://x", "hi");
        let first = started(&mut panel);
        panel.apply(PanelEvent::RunFailed {
            run_id: first,
            failure: RunFailure::Network("reset".into()),
        });
        let second = started(&mut panel);
        assert!(second > first);

        panel.apply(PanelEvent::RunFailed {
            run_id: first,
            failure: RunFailure::Network("late".into()),
        });
        panel.apply(PanelEvent::Push(PushEvent::Finished {
            run_id: Some(first),
            success: None,
        }));
        assert_eq!(
            panel.running(),
            RunningState::Running {
                run_id: second,
                accepted: false
            }
        );

        panel.apply(PanelEvent::Push(PushEvent::Finished {
            run_id: Some(second),
            success: Some(true),
        }));
        assert!(!panel.is_running());
    }

    #[test]
    fn clearing_leaves_single_entry() {
        let mut panel = Panel::default();
        panel.push_log(LogEntry::system("one"));
        panel.push_log(LogEntry::system("two"));
        panel.clear_logs();
        assert_eq!(panel.logs().len(), 1);
        assert_eq!(panel.logs()[0].message, "Logs cleared.");
    }

    #[test]
    fn server_log_lines_are_kept_verbatim() {
        let mut panel = Panel::default();
        let entry = LogEntry {
            message: "Logged in".into(),
            level: LogLevel::Warning,
            timestamp: "08:00:00".into(),
        };
        panel.apply(PanelEvent::Push(PushEvent::Log(entry.clone())));
        assert_eq!(panel.logs().len(), 1);
        assert_eq!(panel.logs()[0], entry);
    }

    #[test]
    fn log_is_capped() {
        let mut panel = Panel::default();
        for i in 0..(MAX_LOG_ENTRIES + 10) {
            panel.push_log(LogEntry::system(format!("line {i}")));
        }
        assert_eq!(panel.logs().len(), MAX_LOG_ENTRIES);
        assert_eq!(panel.logs()[0].message, "line 10");
        assert_eq!(
            panel.logs().back().map(|e| e.message.as_str()),
            Some(format!("line {}", MAX_LOG_ENTRIES + 9).as_str())
        );
    }

    #[test]
    fn logs_since_returns_only_new_lines() {
        let mut panel = Panel::default();
        panel.push_log(LogEntry::system("a"));
        let (seen, mark) = panel.logs_since(0);
        assert_eq!(seen.len(), 1);
        panel.push_log(LogEntry::system("b"));
        panel.push_log(LogEntry::system("c"));
        let (fresh, _) = panel.logs_since(mark);
        let msgs: Vec<&str> = fresh.map(|e| e.message.as_str()).collect();
        assert_eq!(msgs, vec!["b", "c"]);
    }

    #[test]
    fn status_sync_attaches_to_running_job() {
        let mut panel = Panel::default();
        panel.apply(PanelEvent::StatusSynced(BotStatus {
            running: true,
            current_task: Some("Posting to https://x via alice".into()),
            last_log: None,
        }));
        assert!(panel.is_running());
        assert_eq!(
            last_log(&panel).message,
            "Attached to running job: Posting to https://x via alice"
        );

        panel.apply(PanelEvent::StatusSynced(BotStatus::default()));
        assert!(panel.is_running());
    }

    #[test]
    fn repeated_disconnects_notify_once() {
        let mut panel = Panel::default();
        panel.apply(PanelEvent::Channel(ChannelEvent::Disconnected("refused".into())));
        panel.status_line = None;
        panel.apply(PanelEvent::Channel(ChannelEvent::Disconnected("refused".into())));
        assert!(panel.status_line.is_none());
        panel.apply(PanelEvent::Channel(ChannelEvent::Connected));
        assert_eq!(panel.channel, ChannelState::Connected);
    }

    #[test]
    fn count_falls_back_to_one() {
        let mut form = RunForm::default();
        assert_eq!(form.count_value(), 1);
        form.count = "5".into();
        assert_eq!(form.count_value(), 5);
        form.count = "0".into();
        assert_eq!(form.count_value(), 1);
        form.count = "many".into();
        assert_eq!(form.count_value(), 1);
    }

    #[test]
    fn start_to_finish_with_saved_profile() {
        let mut panel = Panel::default();
        panel.apply(PanelEvent::ProfilesLoaded(vec!["alice".into()]));
        assert!(panel.profiles.select("alice"));
        panel.run_form.post_url = "https://x".into();
        panel.run_form.comment = "hi".into();

        let (run_id, request) = match panel.submit_run() {
            Some(UiCommand::StartRun { run_id, request }) => (run_id, request),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(request.profile_name, "alice");
        assert_eq!(request.count, 1);
        assert!(panel.is_running());
        assert_eq!(
            last_log(&panel).message,
            "Starting bot for: https://x [Profile: alice]"
        );

        panel.apply(PanelEvent::RunAccepted { run_id });
        panel.apply(PanelEvent::Push(PushEvent::Log(LogEntry {
            message: "Comment 1 posted".into(),
            level: LogLevel::Info,
            timestamp: "10:00:00".into(),
        })));
        assert!(panel.is_running());

        panel.apply(PanelEvent::Push(PushEvent::Finished {
            run_id: None,
            success: Some(true),
        }));
        assert!(!panel.is_running());
        assert_eq!(last_log(&panel).message, "Process finished.");
    }
}
