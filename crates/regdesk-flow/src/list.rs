// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use regdesk_app::{DetailRow, EntityKind, OptionId, RowId, SelectableOption};
use regdesk_gateway::endpoints::endpoints_for;
use regdesk_gateway::{Backend, GatewayError, fetch_details, fetch_options};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPhase {
    Idle,
    LoadingOptions,
    OptionsReady,
    OptionsError,
    LoadingDetails,
    DetailsReady,
    DetailsEmpty,
    DetailsError,
}

impl ListPhase {
    pub const fn is_loading(self) -> bool {
        matches!(self, Self::LoadingOptions | Self::LoadingDetails)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Options,
    Details,
}

impl LoadKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Options => "options",
            Self::Details => "details",
        }
    }
}

/// Issued when a load starts; only the most recent ticket of each kind may
/// apply its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub entity: EntityKind,
    pub kind: LoadKind,
    pub generation: u64,
    pub option: Option<OptionId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    PhaseChanged(ListPhase),
    OptionsLoaded(usize),
    RowsLoaded(usize),
    RowsCleared,
    SelectionChanged(Option<OptionId>),
    SelectionDropped(OptionId),
    LoadFailed { kind: LoadKind, message: String },
    StaleDiscarded { kind: LoadKind, generation: u64 },
    RowRemoved(RowId),
}

/// Drives "load options, select one, load its details" for one screen.
#[derive(Debug, Clone)]
pub struct EntityListController {
    entity: EntityKind,
    phase: ListPhase,
    options: Vec<SelectableOption>,
    selected: Option<OptionId>,
    rows: Vec<DetailRow>,
    error: Option<String>,
    options_generation: u64,
    details_generation: u64,
}

impl EntityListController {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            phase: ListPhase::Idle,
            options: Vec::new(),
            selected: None,
            rows: Vec::new(),
            error: None,
            options_generation: 0,
            details_generation: 0,
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn phase(&self) -> ListPhase {
        self.phase
    }

    pub fn options(&self) -> &[SelectableOption] {
        &self.options
    }

    pub fn selected(&self) -> Option<OptionId> {
        self.selected
    }

    pub fn selected_option(&self) -> Option<&SelectableOption> {
        let selected = self.selected?;
        self.options.iter().find(|option| option.id == selected)
    }

    pub fn rows(&self) -> &[DetailRow] {
        &self.rows
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn has_option_step(&self) -> bool {
        endpoints_for(self.entity).has_option_step()
    }

    /// What a details load should be keyed by right now, if anything can be
    /// loaded: screens without a selector always load, others need a
    /// selection.
    pub fn details_target(&self) -> Option<Option<OptionId>> {
        if self.has_option_step() {
            self.selected.map(Some)
        } else {
            Some(None)
        }
    }

    pub fn begin_options(&mut self) -> (LoadTicket, Vec<ListEvent>) {
        self.options_generation += 1;
        let ticket = LoadTicket {
            entity: self.entity,
            kind: LoadKind::Options,
            generation: self.options_generation,
            option: None,
        };
        let events = self.set_phase(ListPhase::LoadingOptions).into_iter().collect();
        (ticket, events)
    }

    pub fn finish_options(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<SelectableOption>, GatewayError>,
    ) -> Vec<ListEvent> {
        if let Some(stale) = self.discard_if_stale(&ticket) {
            return vec![stale];
        }

        let mut events = Vec::new();
        match result {
            Ok(options) => {
                self.error = None;
                self.options = options;
                events.push(ListEvent::OptionsLoaded(self.options.len()));
                if let Some(selected) = self.selected
                    && !self.options.iter().any(|option| option.id == selected)
                {
                    tracing::info!(
                        entity = self.entity.as_str(),
                        option = selected.get(),
                        "selected option no longer offered"
                    );
                    self.selected = None;
                    self.rows.clear();
                    events.push(ListEvent::SelectionDropped(selected));
                    events.push(ListEvent::RowsCleared);
                }
                events.extend(self.set_phase(ListPhase::OptionsReady));
            }
            Err(error) => {
                let message = error.to_string();
                tracing::warn!(entity = self.entity.as_str(), %message, "options load failed");
                self.options.clear();
                self.error = Some(message.clone());
                events.push(ListEvent::LoadFailed {
                    kind: LoadKind::Options,
                    message,
                });
                events.extend(self.set_phase(ListPhase::OptionsError));
            }
        }
        events
    }

    pub fn begin_details(&mut self, option: Option<OptionId>) -> (LoadTicket, Vec<ListEvent>) {
        self.details_generation += 1;
        let mut events = Vec::new();
        if self.has_option_step() && self.selected != option {
            self.selected = option;
            events.push(ListEvent::SelectionChanged(option));
        }
        let ticket = LoadTicket {
            entity: self.entity,
            kind: LoadKind::Details,
            generation: self.details_generation,
            option,
        };
        events.extend(self.set_phase(ListPhase::LoadingDetails));
        (ticket, events)
    }

    pub fn finish_details(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<DetailRow>, GatewayError>,
    ) -> Vec<ListEvent> {
        if let Some(stale) = self.discard_if_stale(&ticket) {
            return vec![stale];
        }

        let mut events = Vec::new();
        match result {
            Ok(rows) => {
                self.error = None;
                self.rows = rows;
                events.push(ListEvent::RowsLoaded(self.rows.len()));
                let phase = if self.rows.is_empty() {
                    ListPhase::DetailsEmpty
                } else {
                    ListPhase::DetailsReady
                };
                events.extend(self.set_phase(phase));
            }
            Err(error) => {
                let message = error.to_string();
                tracing::warn!(entity = self.entity.as_str(), %message, "details load failed");
                self.rows.clear();
                self.error = Some(message.clone());
                events.push(ListEvent::RowsCleared);
                events.push(ListEvent::LoadFailed {
                    kind: LoadKind::Details,
                    message,
                });
                events.extend(self.set_phase(ListPhase::DetailsError));
            }
        }
        events
    }

    /// Clears the selection and its rows. Any details load still in flight
    /// is invalidated.
    pub fn clear_selection(&mut self) -> Vec<ListEvent> {
        self.details_generation += 1;
        let mut events = Vec::new();
        if self.selected.take().is_some() {
            events.push(ListEvent::SelectionChanged(None));
        }
        self.rows.clear();
        self.error = None;
        events.push(ListEvent::RowsCleared);
        events.extend(self.set_phase(ListPhase::OptionsReady));
        events
    }

    pub fn load_options(&mut self, backend: &dyn Backend) -> Vec<ListEvent> {
        let (ticket, mut events) = self.begin_options();
        let result = fetch_options(backend, self.entity);
        events.extend(self.finish_options(ticket, result));
        events
    }

    pub fn load_details(&mut self, backend: &dyn Backend, option: Option<OptionId>) -> Vec<ListEvent> {
        let (ticket, mut events) = self.begin_details(option);
        let result = fetch_details(backend, self.entity, option);
        events.extend(self.finish_details(ticket, result));
        events
    }

    pub fn select_option(&mut self, backend: &dyn Backend, option: Option<OptionId>) -> Vec<ListEvent> {
        match option {
            None => self.clear_selection(),
            Some(id) => self.load_details(backend, Some(id)),
        }
    }

    /// Reloads options, then the details of the current selection if it
    /// survived.
    pub fn refresh(&mut self, backend: &dyn Backend) -> Vec<ListEvent> {
        let mut events = Vec::new();
        if self.has_option_step() {
            events.extend(self.load_options(backend));
            if self.phase == ListPhase::OptionsError {
                return events;
            }
        }
        if let Some(target) = self.details_target() {
            events.extend(self.load_details(backend, target));
        }
        events
    }

    /// Drops a row locally ahead of the confirming re-fetch.
    pub fn remove_row(&mut self, id: &RowId) -> Vec<ListEvent> {
        let before = self.rows.len();
        self.rows.retain(|row| &row.id != id);
        if self.rows.len() == before {
            return Vec::new();
        }
        let mut events = vec![ListEvent::RowRemoved(id.clone())];
        if self.rows.is_empty() && self.phase == ListPhase::DetailsReady {
            events.extend(self.set_phase(ListPhase::DetailsEmpty));
        }
        events
    }

    fn discard_if_stale(&self, ticket: &LoadTicket) -> Option<ListEvent> {
        let latest = match ticket.kind {
            LoadKind::Options => self.options_generation,
            LoadKind::Details => self.details_generation,
        };
        if ticket.entity == self.entity && ticket.generation == latest {
            return None;
        }
        tracing::debug!(
            entity = self.entity.as_str(),
            kind = ticket.kind.as_str(),
            generation = ticket.generation,
            latest,
            "discarding stale response"
        );
        Some(ListEvent::StaleDiscarded {
            kind: ticket.kind,
            generation: ticket.generation,
        })
    }

    fn set_phase(&mut self, phase: ListPhase) -> Option<ListEvent> {
        if self.phase == phase {
            return None;
        }
        tracing::debug!(
            entity = self.entity.as_str(),
            from = ?self.phase,
            to = ?phase,
            "list phase"
        );
        self.phase = phase;
        Some(ListEvent::PhaseChanged(phase))
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityListController, ListEvent, ListPhase, LoadKind};
    use regdesk_app::{DetailRow, EntityKind, OptionId, RowId, SelectableOption};
    use regdesk_gateway::GatewayError;

    fn option(id: i64, label: &str) -> SelectableOption {
        SelectableOption {
            id: OptionId::new(id),
            label: label.to_owned(),
            secondary_key: None,
        }
    }

    #[test]
    fn older_details_response_is_discarded() {
        let mut list = EntityListController::new(EntityKind::Documents);
        let (first, _) = list.begin_details(Some(OptionId::new(1)));
        let (second, _) = list.begin_details(Some(OptionId::new(2)));

        list.finish_details(second, Ok(vec![DetailRow::placeholder("b")]));
        let events = list.finish_details(first, Ok(vec![DetailRow::placeholder("a")]));

        assert_eq!(
            events,
            vec![ListEvent::StaleDiscarded {
                kind: LoadKind::Details,
                generation: 1,
            }]
        );
        assert_eq!(list.rows()[0].id, RowId::from("b"));
        assert_eq!(list.selected(), Some(OptionId::new(2)));
    }

    #[test]
    fn options_failure_leaves_no_partial_options() {
        let mut list = EntityListController::new(EntityKind::Acts);
        let (ticket, _) = list.begin_options();
        list.finish_options(ticket, Ok(vec![option(1, "Factories Act")]));

        let (ticket, _) = list.begin_options();
        let events = list.finish_options(
            ticket,
            Err(GatewayError::backend(Some(500), Some("database offline"))),
        );
        assert_eq!(list.phase(), ListPhase::OptionsError);
        assert!(list.options().is_empty());
        assert_eq!(list.error(), Some("database offline"));
        assert!(events.contains(&ListEvent::PhaseChanged(ListPhase::OptionsError)));
    }

    #[test]
    fn vanished_selection_is_dropped_on_options_reload() {
        let mut list = EntityListController::new(EntityKind::Forms);
        let (ticket, _) = list.begin_options();
        list.finish_options(ticket, Ok(vec![option(1, "a"), option(2, "b")]));
        let (ticket, _) = list.begin_details(Some(OptionId::new(2)));
        list.finish_details(ticket, Ok(vec![DetailRow::placeholder("9")]));

        let (ticket, _) = list.begin_options();
        let events = list.finish_options(ticket, Ok(vec![option(1, "a")]));
        assert!(events.contains(&ListEvent::SelectionDropped(OptionId::new(2))));
        assert_eq!(list.selected(), None);
        assert!(list.rows().is_empty());
        assert_eq!(list.details_target(), None);
    }

    #[test]
    fn clearing_selection_invalidates_inflight_details() {
        let mut list = EntityListController::new(EntityKind::Documents);
        let (ticket, _) = list.begin_details(Some(OptionId::new(5)));
        list.clear_selection();
        let events = list.finish_details(ticket, Ok(vec![DetailRow::placeholder("1")]));
        assert!(matches!(events[0], ListEvent::StaleDiscarded { .. }));
        assert!(list.rows().is_empty());
        assert_eq!(list.phase(), ListPhase::OptionsReady);
    }

    #[test]
    fn empty_details_and_local_removal() {
        let mut list = EntityListController::new(EntityKind::States);
        assert_eq!(list.details_target(), Some(None));

        let (ticket, _) = list.begin_details(None);
        list.finish_details(ticket, Ok(Vec::new()));
        assert_eq!(list.phase(), ListPhase::DetailsEmpty);

        let (ticket, _) = list.begin_details(None);
        list.finish_details(ticket, Ok(vec![DetailRow::placeholder("4")]));
        assert_eq!(list.phase(), ListPhase::DetailsReady);
        let events = list.remove_row(&RowId::from("4"));
        assert_eq!(
            events,
            vec![
                ListEvent::RowRemoved(RowId::from("4")),
                ListEvent::PhaseChanged(ListPhase::DetailsEmpty),
            ]
        );
        assert!(list.remove_row(&RowId::from("4")).is_empty());
    }
}
