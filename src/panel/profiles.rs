use crate::model::{Profile, DEFAULT_PROFILE, DEFAULT_PROFILE_LABEL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileOption {
    pub value: String,
    pub label: String,
}

impl ProfileOption {
    fn synthetic_default() -> Self {
        Self {
            value: DEFAULT_PROFILE.to_string(),
            label: DEFAULT_PROFILE_LABEL.to_string(),
        }
    }
}

/// Profile dropdown. The synthetic default entry is always first.
#[derive(Debug, Clone)]
pub struct ProfileSelector {
    options: Vec<ProfileOption>,
    selected: usize,
}

impl Default for ProfileSelector {
    fn default() -> Self {
        Self {
            options: vec![ProfileOption::synthetic_default()],
            selected: 0,
        }
    }
}

impl ProfileSelector {
    /// Replace the server-backed entries, keeping the current selection when it still exists.
    pub fn rebuild<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        let previous = self.selected_value().to_string();
        self.options = vec![ProfileOption::synthetic_default()];
        self.options.extend(
            names
                .into_iter()
                .filter(|name| name != DEFAULT_PROFILE)
                .map(|name| ProfileOption {
                    label: name.clone(),
                    value: name,
                }),
        );
        self.selected = self
            .options
            .iter()
            .position(|o| o.value == previous)
            .unwrap_or(0);
    }

    pub fn options(&self) -> &[ProfileOption] {
        &self.options
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_value(&self) -> &str {
        // `options` is never empty: the default entry is always present.
        &self.options[self.selected].value
    }

    pub fn is_default_selected(&self) -> bool {
        self.selected_value() == DEFAULT_PROFILE
    }

    /// Select by value. Returns false when no such entry exists.
    pub fn select(&mut self, value: &str) -> bool {
        match self.options.iter().position(|o| o.value == value) {
            Some(idx) => {
                self.selected = idx;
                true
            }
            None => false,
        }
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.options.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }
}

/// The add-profile form.
#[derive(Debug, Clone, Default)]
pub struct ProfileDraft {
    pub name: String,
    pub username: String,
    pub password: String,
    pub visible: bool,
    pub password_visible: bool,
}

impl ProfileDraft {
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn to_profile(&self) -> Profile {
        Profile {
            name: self.name.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    pub fn clear(&mut self) {
        self.name.clear();
        self.username.clear();
        self.password.clear();
    }

    /// Password as shown in the form: plain when toggled visible, bullets otherwise.
    pub fn password_display(&self) -> String {
        if self.password_visible {
            self.password.clone()
        } else {
            "•".repeat(self.password.chars().count())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn values(sel: &ProfileSelector) -> Vec<&str> {
        sel.options().iter().map(|o| o.value.as_str()).collect()
    }

    #[test]
    fn rebuild_puts_default_first() {
        let mut sel = ProfileSelector::default();
        sel.rebuild(vec!["alice".to_string()]);
        assert_eq!(values(&sel), vec!["default", "alice"]);
        assert_eq!(sel.options()[0].label, DEFAULT_PROFILE_LABEL);
        assert!(sel.is_default_selected());
    }

    #[test]
    fn rebuild_keeps_surviving_selection() {
        let mut sel = ProfileSelector::default();
        sel.rebuild(vec!["alice".into(), "bob".into()]);
        assert!(sel.select("bob"));
        sel.rebuild(vec!["bob".into(), "carol".into()]);
        assert_eq!(sel.selected_value(), "bob");

        sel.rebuild(vec!["carol".into()]);
        assert_eq!(sel.selected_value(), "default");
    }

    #[test]
    fn server_entry_named_default_is_not_duplicated() {
        let mut sel = ProfileSelector::default();
        sel.rebuild(vec!["default".into(), "alice".into()]);
        assert_eq!(values(&sel), vec!["default", "alice"]);
    }

    #[test]
    fn navigation_is_clamped() {
        let mut sel = ProfileSelector::default();
        sel.rebuild(vec!["alice".into()]);
        sel.select_prev();
        assert_eq!(sel.selected_index(), 0);
        sel.select_next();
        sel.select_next();
        assert_eq!(sel.selected_value(), "alice");
        assert!(!sel.select("nobody"));
    }

    #[test]
    fn password_is_masked_until_toggled() {
        let mut draft = ProfileDraft {
            password: "hunter2".into(),
            ..Default::default()
        };
        assert_eq!(draft.password_display(), "•••••••");
        draft.password_visible = true;
        assert_eq!(draft.password_display(), "hunter2");
    }
}
