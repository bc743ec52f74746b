use super::state::{Focus, UiState};
use crate::orchestrator::UiCommand;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

const LOG_PAGE: usize = 10;

#[derive(Debug)]
pub enum KeyOutcome {
    Continue,
    Command(UiCommand),
    Quit,
}

impl From<Option<UiCommand>> for KeyOutcome {
    fn from(cmd: Option<UiCommand>) -> Self {
        cmd.map_or(KeyOutcome::Continue, KeyOutcome::Command)
    }
}

pub fn handle_key(state: &mut UiState, key: KeyEvent) -> KeyOutcome {
    if key.kind != KeyEventKind::Press {
        return KeyOutcome::Continue;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
        return KeyOutcome::Quit;
    }

    // Modals swallow every other key until answered.
    if state.panel.confirm.is_some() {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                state.panel.resolve_confirm(true).into()
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.panel.resolve_confirm(false).into()
            }
            _ => KeyOutcome::Continue,
        };
    }
    if state.panel.alert.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
            state.panel.dismiss_alert();
        }
        return KeyOutcome::Continue;
    }

    if state.tab == 1 {
        if matches!(key.code, KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?')) {
            state.tab = 0;
        }
        return KeyOutcome::Continue;
    }

    if ctrl {
        return match key.code {
            KeyCode::Char('s') => submit(state),
            KeyCode::Char('w') => state.panel.save_profile().into(),
            KeyCode::Char('l') => {
                state.panel.clear_logs();
                state.log_scroll = 0;
                KeyOutcome::Continue
            }
            KeyCode::Char('n') => {
                state.panel.toggle_add_form();
                if state.panel.draft.visible {
                    state.focus = Focus::NewName;
                } else {
                    state.ensure_focus_visible();
                }
                KeyOutcome::Continue
            }
            KeyCode::Char('p') => {
                state.panel.toggle_password_visibility();
                KeyOutcome::Continue
            }
            KeyCode::Char('d') => {
                state.panel.request_delete();
                KeyOutcome::Continue
            }
            KeyCode::Char('r') => KeyOutcome::Command(state.panel.refresh_profiles()),
            _ => KeyOutcome::Continue,
        };
    }

    match key.code {
        KeyCode::F(1) => state.tab = 1,
        KeyCode::Tab => state.focus = state.focus.next(state.panel.draft.visible),
        KeyCode::BackTab => state.focus = state.focus.prev(state.panel.draft.visible),
        KeyCode::Esc => {
            if state.panel.draft.visible {
                state.panel.toggle_add_form();
                state.ensure_focus_visible();
            }
        }
        KeyCode::PageUp => {
            state.log_scroll = (state.log_scroll + LOG_PAGE)
                .min(state.panel.logs().len().saturating_sub(1));
        }
        KeyCode::PageDown => state.log_scroll = state.log_scroll.saturating_sub(LOG_PAGE),
        KeyCode::End => state.log_scroll = 0,
        KeyCode::Up if state.focus == Focus::Profile => state.panel.profiles.select_prev(),
        KeyCode::Down if state.focus == Focus::Profile => state.panel.profiles.select_next(),
        KeyCode::Enter => {
            return match state.focus {
                f if f.is_profile_form() => state.panel.save_profile().into(),
                Focus::Headless => {
                    state.panel.run_form.headless = !state.panel.run_form.headless;
                    KeyOutcome::Continue
                }
                Focus::Profile => KeyOutcome::Continue,
                _ => submit(state),
            };
        }
        KeyCode::Char(' ') if state.focus == Focus::Headless => {
            state.panel.run_form.headless = !state.panel.run_form.headless;
        }
        KeyCode::Char(c) => {
            let digits_only = state.focus == Focus::Count;
            if let Some(field) = state.text_field_mut() {
                if !digits_only || c.is_ascii_digit() {
                    field.push(c);
                }
            }
        }
        KeyCode::Backspace => {
            if let Some(field) = state.text_field_mut() {
                field.pop();
            }
        }
        _ => {}
    }
    KeyOutcome::Continue
}

fn submit(state: &mut UiState) -> KeyOutcome {
    let outcome: KeyOutcome = state.panel.submit_run().into();
    if matches!(outcome, KeyOutcome::Command(_)) {
        state.log_scroll = 0;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::{Panel, PanelEvent};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(state: &mut UiState, text: &str) {
        for c in text.chars() {
            handle_key(state, key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn typing_fills_focused_field_and_enter_submits() {
        let mut state = UiState::new(Panel::default());
        type_text(&mut state, "https://x");
        handle_key(&mut state, key(KeyCode::Tab));
        type_text(&mut state, "hi");
        assert_eq!(state.panel.run_form.post_url, "https://x");
        assert_eq!(state.panel.run_form.comment, "hi");

        match handle_key(&mut state, key(KeyCode::Enter)) {
            KeyOutcome::Command(UiCommand::StartRun { request, .. }) => {
                assert_eq!(request.post_url, "https://x");
                assert_eq!(request.comment, "hi");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(state.panel.is_running());
    }

    #[test]
    fn empty_form_submit_does_nothing() {
        let mut state = UiState::new(Panel::default());
        assert!(matches!(handle_key(&mut state, ctrl('s')), KeyOutcome::Continue));
        assert!(!state.panel.is_running());
    }

    #[test]
    fn count_accepts_digits_only() {
        let mut state = UiState::new(Panel::default());
        state.focus = Focus::Count;
        handle_key(&mut state, key(KeyCode::Backspace));
        type_text(&mut state, "1a2");
        assert_eq!(state.panel.run_form.count, "12");
    }

    #[test]
    fn add_form_toggle_and_save_validation() {
        let mut state = UiState::new(Panel::default());
        handle_key(&mut state, ctrl('n'));
        assert!(state.panel.draft.visible);
        assert_eq!(state.focus, Focus::NewName);
        type_text(&mut state, "alice");

        assert!(matches!(handle_key(&mut state, key(KeyCode::Enter)), KeyOutcome::Continue));
        assert!(state.panel.alert.is_some());

        // The alert blocks typing until dismissed.
        type_text(&mut state, "zz");
        assert_eq!(state.panel.draft.name, "alice");
        handle_key(&mut state, key(KeyCode::Enter));
        assert!(state.panel.alert.is_none());

        handle_key(&mut state, key(KeyCode::Esc));
        assert!(!state.panel.draft.visible);
        assert_eq!(state.focus, Focus::Profile);
    }

    #[test]
    fn password_toggle_flips_visibility() {
        let mut state = UiState::new(Panel::default());
        assert!(!state.panel.draft.password_visible);
        handle_key(&mut state, ctrl('p'));
        assert!(state.panel.draft.password_visible);
    }

    #[test]
    fn delete_flow_goes_through_confirmation() {
        let mut state = UiState::new(Panel::default());
        handle_key(&mut state, ctrl('d'));
        assert!(state.panel.confirm.is_none());

        state.apply(PanelEvent::ProfilesLoaded(vec!["alice".into()]));
        state.focus = Focus::Profile;
        handle_key(&mut state, key(KeyCode::Down));
        handle_key(&mut state, ctrl('d'));
        assert!(state.panel.confirm.is_some());

        match handle_key(&mut state, key(KeyCode::Char('y'))) {
            KeyOutcome::Command(UiCommand::DeleteProfile(name)) => assert_eq!(name, "alice"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn clear_logs_and_quit() {
        let mut state = UiState::new(Panel::default());
        handle_key(&mut state, ctrl('l'));
        assert_eq!(state.panel.logs().len(), 1);
        assert!(matches!(handle_key(&mut state, ctrl('q')), KeyOutcome::Quit));
    }

    #[test]
    fn help_tab_ignores_typing() {
        let mut state = UiState::new(Panel::default());
        handle_key(&mut state, key(KeyCode::F(1)));
        assert_eq!(state.tab, 1);
        type_text(&mut state, "abc");
        assert!(state.panel.run_form.post_url.is_empty());
        handle_key(&mut state, key(KeyCode::Esc));
        assert_eq!(state.tab, 0);
    }
}
