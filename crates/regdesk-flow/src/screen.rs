// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use regdesk_app::{DetailRow, EntityKind, FormKind, OperationKind, OptionId, RowId, TableViewModel};
use regdesk_gateway::{Backend, GatewayError};
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::dialog::{MutationDialogController, MutationOutcome, MutationTicket, RefreshSignal};
use crate::list::{EntityListController, ListEvent};

/// One master-data screen: list controller, table and dialog wired
/// together. Rows flow list -> table; successful mutations flow dialog ->
/// list refresh.
#[derive(Debug, Clone)]
pub struct ScreenSession {
    list: EntityListController,
    table: TableViewModel,
    dialog: MutationDialogController,
}

impl ScreenSession {
    pub fn new(entity: EntityKind, page_size: usize, notification_ttl: Duration) -> Result<Self> {
        Ok(Self {
            list: EntityListController::new(entity),
            table: TableViewModel::with_page_size(page_size)?,
            dialog: MutationDialogController::new(entity, notification_ttl),
        })
    }

    pub fn entity(&self) -> EntityKind {
        self.list.entity()
    }

    pub fn list(&self) -> &EntityListController {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut EntityListController {
        &mut self.list
    }

    pub fn table(&self) -> &TableViewModel {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut TableViewModel {
        &mut self.table
    }

    pub fn dialog(&self) -> &MutationDialogController {
        &self.dialog
    }

    pub fn dialog_mut(&mut self) -> &mut MutationDialogController {
        &mut self.dialog
    }

    /// Copies list rows into the table whenever `events` changed them.
    pub fn apply(&mut self, events: &[ListEvent]) {
        let mut reload = false;
        for event in events {
            match event {
                ListEvent::RowsLoaded(_) | ListEvent::RowsCleared => reload = true,
                // local removal keeps the current page
                ListEvent::RowRemoved(id) => {
                    self.table.remove_row(id);
                }
                _ => {}
            }
        }
        if reload {
            self.table.set_source(self.list.rows().to_vec());
        }
    }

    /// First load: options for selector screens, rows for the others.
    pub fn mount(&mut self, backend: &dyn Backend) -> Vec<ListEvent> {
        let events = self.list.refresh(backend);
        self.apply(&events);
        events
    }

    pub fn select(&mut self, backend: &dyn Backend, option: Option<OptionId>) -> Vec<ListEvent> {
        let events = self.list.select_option(backend, option);
        self.apply(&events);
        events
    }

    pub fn refresh(&mut self, backend: &dyn Backend) -> Vec<ListEvent> {
        let events = self.list.refresh(backend);
        self.apply(&events);
        events
    }

    pub fn open_create(&mut self, kind: FormKind) -> Result<()> {
        self.dialog.open(kind, None)
    }

    pub fn open_edit(&mut self, backend: &dyn Backend, id: &RowId, now: Instant) -> Result<bool> {
        let Some(row) = self.table.row(id).cloned() else {
            bail!("row {id} is not loaded -- refresh and retry");
        };
        self.dialog.open_edit(backend, &row, now)
    }

    pub fn submit(&mut self, backend: &dyn Backend, now: Instant) -> MutationOutcome {
        let outcome = self.dialog.submit(backend, now);
        self.after_mutation(backend, &outcome);
        outcome
    }

    pub fn delete(
        &mut self,
        backend: &dyn Backend,
        id: &RowId,
        confirm: impl FnOnce(&RowId) -> bool,
        now: Instant,
    ) -> MutationOutcome {
        let outcome = self.dialog.delete(backend, id, confirm, now);
        self.after_mutation(backend, &outcome);
        outcome
    }

    pub fn confirm_delete(&mut self, backend: &dyn Backend, accepted: bool, now: Instant) -> MutationOutcome {
        let outcome = self.dialog.confirm_delete(backend, accepted, now);
        self.after_mutation(backend, &outcome);
        outcome
    }

    /// Applies a mutation whose request ran on another thread. Deleted rows
    /// leave the table at once; the caller schedules the refresh.
    pub fn finish_mutation(
        &mut self,
        ticket: MutationTicket,
        result: Result<Value, GatewayError>,
        now: Instant,
    ) -> MutationOutcome {
        let outcome = self.dialog.finish(ticket, result, now);
        if let MutationOutcome::Succeeded(signal) = &outcome {
            self.remove_deleted(signal);
        }
        outcome
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        self.dialog.tick(now)
    }

    pub fn visible_rows(&self) -> &[DetailRow] {
        self.table.visible_rows()
    }

    fn after_mutation(&mut self, backend: &dyn Backend, outcome: &MutationOutcome) {
        if let MutationOutcome::Succeeded(signal) = outcome {
            self.remove_deleted(signal);
            self.refresh(backend);
        }
    }

    fn remove_deleted(&mut self, signal: &RefreshSignal) {
        if signal.operation != OperationKind::Delete {
            return;
        }
        if let Some(id) = &signal.target_id {
            let events = self.list.remove_row(id);
            self.apply(&events);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ScreenSession;
    use crate::list::ListEvent;
    use regdesk_app::{DEFAULT_NOTIFICATION_TTL, DetailRow, EntityKind, RowId};
    use regdesk_gateway::GatewayError;

    #[test]
    fn list_rows_reach_the_table_only_on_row_events() -> anyhow::Result<()> {
        let mut screen = ScreenSession::new(EntityKind::States, 10, DEFAULT_NOTIFICATION_TTL)?;
        let (ticket, _) = screen.list_mut().begin_details(None);
        let events = screen
            .list_mut()
            .finish_details(ticket, Ok(vec![DetailRow::placeholder("1"), DetailRow::placeholder("2")]));
        screen.apply(&events);
        assert_eq!(screen.table().source_len(), 2);

        let events = screen.list_mut().remove_row(&RowId::from("1"));
        screen.apply(&events);
        assert_eq!(screen.table().source_len(), 1);

        screen.apply(&[ListEvent::StaleDiscarded {
            kind: crate::list::LoadKind::Details,
            generation: 0,
        }]);
        assert_eq!(screen.table().source_len(), 1);

        let (ticket, _) = screen.list_mut().begin_details(None);
        let events = screen
            .list_mut()
            .finish_details(ticket, Err(GatewayError::backend(None, None)));
        screen.apply(&events);
        assert_eq!(screen.table().source_len(), 0);
        Ok(())
    }

    #[test]
    fn unsupported_page_size_is_rejected() {
        assert!(ScreenSession::new(EntityKind::Acts, 15, DEFAULT_NOTIFICATION_TTL).is_err());
    }
}
