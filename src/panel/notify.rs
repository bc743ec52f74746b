//! Notices: the one path every failure and status message takes to reach the user.

/// Which operation produced the notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    ProfileList,
    ProfileMutation,
    Validation,
    Run,
    Status,
    Channel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Where a notice is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// Non-blocking status bar; also the only surface for background refreshes.
    StatusLine,
    /// Modal that must be dismissed.
    Alert,
    /// A line in the log console.
    LogPanel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub origin: Origin,
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn new(origin: Origin, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            origin,
            severity,
            message: message.into(),
        }
    }

    pub fn surface(&self) -> Surface {
        match (self.severity, self.origin) {
            (Severity::Info, _) => Surface::StatusLine,
            (_, Origin::ProfileMutation | Origin::Validation) => Surface::Alert,
            (_, Origin::Run) => Surface::LogPanel,
            (_, Origin::ProfileList | Origin::Status | Origin::Channel) => Surface::StatusLine,
        }
    }
}
