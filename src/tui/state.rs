use crate::panel::{Panel, PanelEvent};

/// Form field that receives typed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Profile,
    NewName,
    NewUsername,
    NewPassword,
    PostUrl,
    Comment,
    Count,
    Headless,
}

impl Focus {
    const ORDER: [Focus; 8] = [
        Focus::Profile,
        Focus::NewName,
        Focus::NewUsername,
        Focus::NewPassword,
        Focus::PostUrl,
        Focus::Comment,
        Focus::Count,
        Focus::Headless,
    ];

    pub fn is_profile_form(self) -> bool {
        matches!(self, Focus::NewName | Focus::NewUsername | Focus::NewPassword)
    }

    fn step(self, forward: bool, form_visible: bool) -> Focus {
        let n = Self::ORDER.len();
        let mut idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        loop {
            idx = if forward { (idx + 1) % n } else { (idx + n - 1) % n };
            let candidate = Self::ORDER[idx];
            if form_visible || !candidate.is_profile_form() {
                return candidate;
            }
        }
    }

    pub fn next(self, form_visible: bool) -> Focus {
        self.step(true, form_visible)
    }

    pub fn prev(self, form_visible: bool) -> Focus {
        self.step(false, form_visible)
    }
}

/// View state around the panel; owned by the UI thread only.
pub struct UiState {
    pub tab: usize,
    pub focus: Focus,
    /// Lines scrolled up from the tail; 0 follows new output.
    pub log_scroll: usize,
    pub tick: usize,
    /// Profile named on the command line, selected once the list arrives.
    pub preferred_profile: Option<String>,
    pub panel: Panel,
}

impl UiState {
    pub fn new(panel: Panel) -> Self {
        Self {
            tab: 0,
            focus: Focus::PostUrl,
            log_scroll: 0,
            tick: 0,
            preferred_profile: None,
            panel,
        }
    }

    pub fn apply(&mut self, ev: PanelEvent) {
        let reloaded = matches!(ev, PanelEvent::ProfilesLoaded(_));
        self.panel.apply(ev);
        if reloaded {
            if let Some(name) = self.preferred_profile.take() {
                if !self.panel.profiles.select(&name) {
                    self.preferred_profile = Some(name);
                }
            }
        }
        self.ensure_focus_visible();
    }

    /// Move focus off the add-profile fields once the form is hidden.
    pub fn ensure_focus_visible(&mut self) {
        if !self.panel.draft.visible && self.focus.is_profile_form() {
            self.focus = Focus::Profile;
        }
    }

    pub fn text_field_mut(&mut self) -> Option<&mut String> {
        let panel = &mut self.panel;
        match self.focus {
            Focus::NewName => Some(&mut panel.draft.name),
            Focus::NewUsername => Some(&mut panel.draft.username),
            Focus::NewPassword => Some(&mut panel.draft.password),
            Focus::PostUrl => Some(&mut panel.run_form.post_url),
            Focus::Comment => Some(&mut panel.run_form.comment),
            Focus::Count => Some(&mut panel.run_form.count),
            Focus::Profile | Focus::Headless => None,
        }
    }
}
