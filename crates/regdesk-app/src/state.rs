// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{EntityKind, FormKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabKind {
    Dashboard,
    Entity(EntityKind),
}

impl TabKind {
    pub const ALL: [Self; 7] = [
        Self::Dashboard,
        Self::Entity(EntityKind::Acts),
        Self::Entity(EntityKind::Events),
        Self::Entity(EntityKind::Documents),
        Self::Entity(EntityKind::Forms),
        Self::Entity(EntityKind::States),
        Self::Entity(EntityKind::Categories),
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Entity(kind) => kind.label(),
        }
    }

    pub const fn entity(self) -> Option<EntityKind> {
        match self {
            Self::Dashboard => None,
            Self::Entity(kind) => Some(kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Nav,
    Filter,
    OptionPicker,
    Dialog(FormKind),
    ConfirmDelete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub active_tab: TabKind,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            active_tab: TabKind::Dashboard,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NextTab,
    PrevTab,
    OpenFilter,
    OpenOptionPicker,
    OpenDialog(FormKind),
    AskDeleteConfirmation,
    ExitToNav,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    TabChanged(TabKind),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::OpenFilter => self.enter(AppMode::Filter),
            AppCommand::OpenOptionPicker => {
                if self.active_tab == TabKind::Dashboard {
                    return vec![self.set_status("no selector on dashboard")];
                }
                self.enter(AppMode::OptionPicker)
            }
            AppCommand::OpenDialog(kind) => self.enter(AppMode::Dialog(kind)),
            AppCommand::AskDeleteConfirmation => {
                let mut events = self.enter(AppMode::ConfirmDelete);
                events.push(self.set_status("delete? y/n"));
                events
            }
            AppCommand::ExitToNav => self.enter(AppMode::Nav),
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn enter(&mut self, mode: AppMode) -> Vec<AppEvent> {
        self.mode = mode;
        vec![AppEvent::ModeChanged(self.mode)]
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        let tabs = TabKind::ALL;
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        self.mode = AppMode::Nav;
        vec![AppEvent::TabChanged(self.active_tab)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppMode, AppState, TabKind};
    use crate::{EntityKind, FormKind};

    #[test]
    fn tab_rotation_wraps() {
        let mut state = AppState {
            active_tab: TabKind::Entity(EntityKind::Categories),
            ..AppState::default()
        };

        let events = state.dispatch(AppCommand::NextTab);
        assert_eq!(state.active_tab, TabKind::Dashboard);
        assert_eq!(events, vec![AppEvent::TabChanged(TabKind::Dashboard)]);

        state.dispatch(AppCommand::PrevTab);
        assert_eq!(state.active_tab, TabKind::Entity(EntityKind::Categories));
    }

    #[test]
    fn option_picker_is_refused_on_dashboard() {
        let mut state = AppState::default();
        let events = state.dispatch(AppCommand::OpenOptionPicker);
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(
            events,
            vec![AppEvent::StatusUpdated("no selector on dashboard".to_owned())]
        );
    }

    #[test]
    fn mode_transitions() {
        let mut state = AppState {
            active_tab: TabKind::Entity(EntityKind::States),
            ..AppState::default()
        };

        state.dispatch(AppCommand::OpenDialog(FormKind::State));
        assert_eq!(state.mode, AppMode::Dialog(FormKind::State));

        state.dispatch(AppCommand::AskDeleteConfirmation);
        assert_eq!(state.mode, AppMode::ConfirmDelete);
        assert_eq!(state.status_line.as_deref(), Some("delete? y/n"));

        state.dispatch(AppCommand::ExitToNav);
        assert_eq!(state.mode, AppMode::Nav);

        state.dispatch(AppCommand::ClearStatus);
        assert!(state.status_line.is_none());
    }

    #[test]
    fn switching_tabs_leaves_modal_modes() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::OpenFilter);
        state.dispatch(AppCommand::NextTab);
        assert_eq!(state.mode, AppMode::Nav);
    }
}
