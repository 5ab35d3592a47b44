// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use regdesk_app::{
    DetailRow, EntityKind, FieldError, FormKind, FormPayload, MutationRequest,
    NotificationSeverity, NotificationState, OperationKind, RowId,
};
use regdesk_gateway::endpoints::endpoints_for;
use regdesk_gateway::{Backend, GatewayError, fetch_state_prefill, submit_mutation};
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// How long a successful dialog stays visible before closing itself.
pub const CLOSE_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogPhase {
    Closed,
    Open,
    Validating,
    Submitting,
    Success,
    Failure,
}

impl DialogPhase {
    const fn is_editable(self) -> bool {
        matches!(self, Self::Open | Self::Failure)
    }
}

/// Tells the owning screen its list is out of date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSignal {
    pub entity: EntityKind,
    pub operation: OperationKind,
    pub target_id: Option<RowId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefill {
    pub id: RowId,
    pub payload: FormPayload,
}

/// A mutation ready to send. Produced by `begin_*`, consumed by
/// [`MutationDialogController::finish`] together with the backend result.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationTicket {
    pub entity: EntityKind,
    pub request: MutationRequest,
    pub payload: Option<FormPayload>,
    /// Dialog submission this ticket belongs to; `None` for deletes.
    pub submission: Option<u64>,
}

impl MutationTicket {
    pub fn send(&self, backend: &dyn Backend) -> Result<Value, GatewayError> {
        submit_mutation(backend, self.entity, &self.request, self.payload.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Validation failed; nothing was sent.
    Blocked(BTreeSet<FieldError>),
    /// The user declined the delete confirmation.
    Cancelled,
    /// The entity has no endpoint for this mutation.
    Unsupported,
    /// No dialog was open, or a submission is already under way.
    Ignored,
    Succeeded(RefreshSignal),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct MutationDialogController {
    entity: EntityKind,
    phase: DialogPhase,
    form: Option<FormPayload>,
    operation: OperationKind,
    target_id: Option<RowId>,
    errors: BTreeSet<FieldError>,
    notification: NotificationState,
    close_at: Option<Instant>,
    pending_delete: Option<RowId>,
    submission: u64,
}

impl MutationDialogController {
    pub fn new(entity: EntityKind, notification_ttl: Duration) -> Self {
        Self {
            entity,
            phase: DialogPhase::Closed,
            form: None,
            operation: OperationKind::Create,
            target_id: None,
            errors: BTreeSet::new(),
            notification: NotificationState::with_ttl(notification_ttl),
            close_at: None,
            pending_delete: None,
            submission: 0,
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn phase(&self) -> DialogPhase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase != DialogPhase::Closed
    }

    pub fn form(&self) -> Option<&FormPayload> {
        self.form.as_ref()
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub fn target_id(&self) -> Option<&RowId> {
        self.target_id.as_ref()
    }

    pub fn errors(&self) -> &BTreeSet<FieldError> {
        &self.errors
    }

    pub fn notification(&self) -> &NotificationState {
        &self.notification
    }

    pub fn pending_delete(&self) -> Option<&RowId> {
        self.pending_delete.as_ref()
    }

    pub fn can_delete(&self) -> bool {
        endpoints_for(self.entity).delete.is_some()
    }

    /// Opens `kind`. With a prefill the dialog edits that row, otherwise it
    /// creates from a blank form.
    pub fn open(&mut self, kind: FormKind, prefill: Option<Prefill>) -> Result<()> {
        if kind.entity() != self.entity {
            bail!(
                "{} form belongs to {}, not {}",
                kind.title(),
                kind.entity().label(),
                self.entity.label()
            );
        }
        let (operation, target_id, form) = match prefill {
            Some(prefill) => {
                if !kind.supports_update() {
                    bail!("{} form cannot edit existing rows", kind.title());
                }
                if prefill.payload.kind() != kind {
                    bail!(
                        "prefill is a {} form, expected {}",
                        prefill.payload.kind().title(),
                        kind.title()
                    );
                }
                (OperationKind::Update, Some(prefill.id), prefill.payload)
            }
            None => (OperationKind::Create, None, FormPayload::blank_for(kind)),
        };
        tracing::debug!(
            entity = self.entity.as_str(),
            form = kind.title(),
            operation = operation.as_str(),
            "dialog opened"
        );
        self.operation = operation;
        self.target_id = target_id;
        self.form = Some(form);
        self.errors.clear();
        self.close_at = None;
        self.phase = DialogPhase::Open;
        Ok(())
    }

    /// Opens the edit dialog for `row`, asking the backend for the record
    /// where it has a prefill endpoint. A failed prefill is reported as a
    /// notification and leaves the dialog closed.
    pub fn open_edit(&mut self, backend: &dyn Backend, row: &DetailRow, now: Instant) -> Result<bool> {
        let Some(kind) = FormKind::primary_for(self.entity).filter(|kind| kind.supports_update())
        else {
            bail!("{} rows cannot be edited here", self.entity.label());
        };
        let source = if endpoints_for(self.entity).prefill.is_some() {
            match fetch_state_prefill(backend, &row.id) {
                Ok(fetched) => fetched,
                Err(error) => {
                    self.prefill_failed(&error, now);
                    return Ok(false);
                }
            }
        } else {
            row.clone()
        };
        let Some(payload) = FormPayload::from_row(kind, &source) else {
            bail!("{} form has no prefill", kind.title());
        };
        self.open(
            kind,
            Some(Prefill {
                id: row.id.clone(),
                payload,
            }),
        )?;
        Ok(true)
    }

    pub fn prefill_failed(&mut self, error: &GatewayError, now: Instant) {
        tracing::warn!(entity = self.entity.as_str(), %error, "prefill failed");
        self.notification
            .show(error.to_string(), NotificationSeverity::Error, now);
    }

    pub fn set_field(&mut self, name: &str, raw: &str) -> Result<()> {
        self.editable_form()?.set_field(name, raw)?;
        self.after_edit();
        Ok(())
    }

    pub fn attach_file(&mut self, file_name: &str, data: Vec<u8>) -> Result<()> {
        self.editable_form()?.attach_file(file_name, data)?;
        self.after_edit();
        Ok(())
    }

    pub fn validate(&mut self) -> BTreeSet<FieldError> {
        let Some(form) = &self.form else {
            return BTreeSet::new();
        };
        self.phase = DialogPhase::Validating;
        self.errors = form.validate();
        self.phase = DialogPhase::Open;
        self.errors.clone()
    }

    /// Validates and packages the open form. Returns the outcome instead
    /// when nothing should be sent.
    pub fn begin_submit(&mut self) -> Result<MutationTicket, MutationOutcome> {
        if !self.phase.is_editable() {
            return Err(MutationOutcome::Ignored);
        }
        let errors = self.validate();
        if !errors.is_empty() {
            tracing::debug!(
                entity = self.entity.as_str(),
                errors = errors.len(),
                "submission blocked by validation"
            );
            return Err(MutationOutcome::Blocked(errors));
        }
        let Some(form) = self.form.clone() else {
            return Err(MutationOutcome::Ignored);
        };
        self.phase = DialogPhase::Submitting;
        self.submission += 1;
        Ok(MutationTicket {
            entity: self.entity,
            request: form.to_request(self.operation, self.target_id.as_ref()),
            payload: Some(form),
            submission: Some(self.submission),
        })
    }

    /// Starts a delete of `id`. `confirm` is asked first; the backend is
    /// never reached unless it agrees.
    pub fn begin_delete(
        &mut self,
        id: &RowId,
        confirm: impl FnOnce(&RowId) -> bool,
    ) -> Result<MutationTicket, MutationOutcome> {
        if !self.can_delete() {
            return Err(MutationOutcome::Unsupported);
        }
        if !confirm(id) {
            tracing::debug!(entity = self.entity.as_str(), %id, "delete declined");
            return Err(MutationOutcome::Cancelled);
        }
        Ok(MutationTicket {
            entity: self.entity,
            request: MutationRequest::delete(id.clone()),
            payload: None,
            submission: None,
        })
    }

    /// Applies the backend's answer to a ticket from `begin_submit` or
    /// `begin_delete`. A submit reply only moves the dialog when it answers
    /// the submission still waiting; the form open now may be a newer one.
    pub fn finish(
        &mut self,
        ticket: MutationTicket,
        result: Result<Value, GatewayError>,
        now: Instant,
    ) -> MutationOutcome {
        let operation = ticket.request.operation;
        let awaited = ticket.submission == Some(self.submission)
            && self.phase == DialogPhase::Submitting;
        if ticket.submission.is_some() && !awaited {
            tracing::debug!(
                entity = self.entity.as_str(),
                submission = ticket.submission,
                "reply for an abandoned dialog"
            );
        }
        match result {
            Ok(_) => {
                let label = match &ticket.payload {
                    Some(payload) => payload.kind().title(),
                    None => self.entity.singular(),
                };
                let message = capitalize(&format!("{label} {}", operation.past_tense()));
                tracing::info!(entity = self.entity.as_str(), operation = operation.as_str(), "mutation applied");
                self.notification
                    .show(message, NotificationSeverity::Success, now);
                if awaited {
                    self.phase = DialogPhase::Success;
                    self.close_at = Some(now + CLOSE_DELAY);
                }
                MutationOutcome::Succeeded(RefreshSignal {
                    entity: self.entity,
                    operation,
                    target_id: ticket.request.target_id,
                })
            }
            Err(error) => {
                let message = error.to_string();
                tracing::warn!(entity = self.entity.as_str(), operation = operation.as_str(), %message, "mutation failed");
                self.notification
                    .show(message.clone(), NotificationSeverity::Error, now);
                if awaited {
                    self.phase = DialogPhase::Failure;
                }
                MutationOutcome::Failed(message)
            }
        }
    }

    pub fn submit(&mut self, backend: &dyn Backend, now: Instant) -> MutationOutcome {
        match self.begin_submit() {
            Ok(ticket) => {
                let result = ticket.send(backend);
                self.finish(ticket, result, now)
            }
            Err(outcome) => outcome,
        }
    }

    pub fn delete(
        &mut self,
        backend: &dyn Backend,
        id: &RowId,
        confirm: impl FnOnce(&RowId) -> bool,
        now: Instant,
    ) -> MutationOutcome {
        match self.begin_delete(id, confirm) {
            Ok(ticket) => {
                let result = ticket.send(backend);
                self.finish(ticket, result, now)
            }
            Err(outcome) => outcome,
        }
    }

    /// First half of an interactive delete: remembers the row until the
    /// user answers.
    pub fn request_delete(&mut self, id: RowId) -> bool {
        if !self.can_delete() {
            return false;
        }
        self.pending_delete = Some(id);
        true
    }

    pub fn take_delete(&mut self, accepted: bool) -> Result<MutationTicket, MutationOutcome> {
        let Some(id) = self.pending_delete.take() else {
            return Err(MutationOutcome::Ignored);
        };
        self.begin_delete(&id, |_| accepted)
    }

    pub fn confirm_delete(&mut self, backend: &dyn Backend, accepted: bool, now: Instant) -> MutationOutcome {
        match self.take_delete(accepted) {
            Ok(ticket) => {
                let result = ticket.send(backend);
                self.finish(ticket, result, now)
            }
            Err(outcome) => outcome,
        }
    }

    pub fn close(&mut self) {
        self.phase = DialogPhase::Closed;
        self.form = None;
        self.target_id = None;
        self.errors.clear();
        self.close_at = None;
    }

    /// Runs the close and dismiss deadlines. Returns whether anything
    /// visible changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = self.notification.tick(now);
        if self.phase == DialogPhase::Success
            && let Some(deadline) = self.close_at
            && now >= deadline
        {
            self.close();
            changed = true;
        }
        changed
    }

    fn editable_form(&mut self) -> Result<&mut FormPayload> {
        if !self.phase.is_editable() {
            bail!("no editable dialog is open");
        }
        match self.form.as_mut() {
            Some(form) => Ok(form),
            None => bail!("no editable dialog is open"),
        }
    }

    fn after_edit(&mut self) {
        self.phase = DialogPhase::Open;
        if !self.errors.is_empty()
            && let Some(form) = &self.form
        {
            self.errors = form.validate();
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{CLOSE_DELAY, DialogPhase, MutationDialogController, MutationOutcome, Prefill};
    use regdesk_app::{
        DEFAULT_NOTIFICATION_TTL, EntityKind, FormKind, FormPayload, NotificationSeverity,
        OperationKind, RowId,
    };
    use regdesk_gateway::GatewayError;
    use serde_json::Value;
    use std::time::Instant;

    fn dialog(entity: EntityKind) -> MutationDialogController {
        MutationDialogController::new(entity, DEFAULT_NOTIFICATION_TTL)
    }

    #[test]
    fn blank_state_form_is_blocked() -> anyhow::Result<()> {
        let mut dialog = dialog(EntityKind::States);
        dialog.open(FormKind::State, None)?;
        dialog.set_field("short_name", "GA")?;
        let outcome = dialog.begin_submit().expect_err("blank name");
        let MutationOutcome::Blocked(errors) = outcome else {
            panic!("expected a validation block, got {outcome:?}");
        };
        assert!(errors.iter().any(|error| error.field == "name"));
        assert_eq!(dialog.phase(), DialogPhase::Open);
        Ok(())
    }

    #[test]
    fn prefill_opens_update_with_target() -> anyhow::Result<()> {
        let mut dialog = dialog(EntityKind::States);
        let mut payload = FormPayload::blank_for(FormKind::State);
        payload.set_field("name", "Goa")?;
        payload.set_field("short_name", "GA")?;
        dialog.open(
            FormKind::State,
            Some(Prefill {
                id: RowId::from(4),
                payload,
            }),
        )?;
        assert_eq!(dialog.operation(), OperationKind::Update);
        let ticket = dialog.begin_submit().map_err(|outcome| anyhow::anyhow!("{outcome:?}"))?;
        assert_eq!(ticket.request.payload.get("id"), Some(&Value::from(4)));
        assert_eq!(ticket.request.payload.get("edit"), Some(&Value::Bool(true)));
        Ok(())
    }

    #[test]
    fn forms_of_other_screens_and_edits_of_actions_are_refused() {
        let mut dialog = dialog(EntityKind::Documents);
        assert!(dialog.open(FormKind::State, None).is_err());
        let prefill = Prefill {
            id: RowId::from(1),
            payload: FormPayload::blank_for(FormKind::CopyLibrary),
        };
        assert!(dialog.open(FormKind::CopyLibrary, Some(prefill)).is_err());
        assert!(!dialog.is_open());
    }

    #[test]
    fn success_closes_after_delay_and_failure_stays_open() -> anyhow::Result<()> {
        let now = Instant::now();
        let mut dialog = dialog(EntityKind::Categories);
        dialog.open(FormKind::Category, None)?;
        dialog.set_field("name", "Labour")?;

        let ticket = dialog.begin_submit().map_err(|outcome| anyhow::anyhow!("{outcome:?}"))?;
        let outcome = dialog.finish(
            ticket,
            Err(GatewayError::backend(Some(409), Some("Category already exists"))),
            now,
        );
        assert_eq!(outcome, MutationOutcome::Failed("Category already exists".to_owned()));
        assert_eq!(dialog.phase(), DialogPhase::Failure);
        assert_eq!(dialog.notification().severity, NotificationSeverity::Error);
        assert!(dialog.is_open());

        dialog.set_field("name", "Labour Welfare")?;
        let ticket = dialog.begin_submit().map_err(|outcome| anyhow::anyhow!("{outcome:?}"))?;
        let outcome = dialog.finish(ticket, Ok(Value::Null), now);
        assert!(matches!(outcome, MutationOutcome::Succeeded(_)));
        assert_eq!(dialog.phase(), DialogPhase::Success);
        assert_eq!(dialog.notification().message, "Category created");

        assert!(!dialog.tick(now + CLOSE_DELAY / 2));
        assert!(dialog.is_open());
        assert!(dialog.tick(now + CLOSE_DELAY));
        assert!(!dialog.is_open());
        assert!(dialog.notification().visible);
        dialog.tick(now + DEFAULT_NOTIFICATION_TTL);
        assert!(!dialog.notification().visible);
        Ok(())
    }

    #[test]
    fn reply_for_an_abandoned_form_leaves_the_reopened_one_alone() -> anyhow::Result<()> {
        let now = Instant::now();
        let mut dialog = dialog(EntityKind::Categories);
        dialog.open(FormKind::Category, None)?;
        dialog.set_field("name", "Labour")?;
        let abandoned = dialog.begin_submit().map_err(|outcome| anyhow::anyhow!("{outcome:?}"))?;
        dialog.close();

        dialog.open(FormKind::Category, None)?;
        dialog.set_field("name", "half typed")?;
        let outcome = dialog.finish(abandoned, Ok(Value::Null), now);
        assert!(matches!(outcome, MutationOutcome::Succeeded(_)));
        assert_eq!(dialog.notification().message, "Category created");
        assert_eq!(dialog.phase(), DialogPhase::Open);

        dialog.tick(now + CLOSE_DELAY);
        assert_eq!(dialog.phase(), DialogPhase::Open);
        let name = dialog
            .form()
            .and_then(|form| form.fields().into_iter().find(|field| field.name == "name"))
            .map(|field| field.value);
        assert_eq!(name.as_deref(), Some("half typed"));
        Ok(())
    }

    #[test]
    fn older_failure_does_not_touch_a_newer_submission() -> anyhow::Result<()> {
        let now = Instant::now();
        let mut dialog = dialog(EntityKind::Categories);
        dialog.open(FormKind::Category, None)?;
        dialog.set_field("name", "Labour")?;
        let first = dialog.begin_submit().map_err(|outcome| anyhow::anyhow!("{outcome:?}"))?;
        dialog.close();

        dialog.open(FormKind::Category, None)?;
        dialog.set_field("name", "Tax")?;
        let second = dialog.begin_submit().map_err(|outcome| anyhow::anyhow!("{outcome:?}"))?;
        assert_ne!(first.submission, second.submission);

        dialog.finish(first, Err(GatewayError::backend(Some(500), None)), now);
        assert_eq!(dialog.phase(), DialogPhase::Submitting);
        dialog.finish(second, Ok(Value::Null), now);
        assert_eq!(dialog.phase(), DialogPhase::Success);
        Ok(())
    }

    #[test]
    fn submitting_twice_is_ignored() -> anyhow::Result<()> {
        let mut dialog = dialog(EntityKind::Categories);
        dialog.open(FormKind::Category, None)?;
        dialog.set_field("name", "Tax")?;
        let _ticket = dialog.begin_submit().map_err(|outcome| anyhow::anyhow!("{outcome:?}"))?;
        assert_eq!(dialog.begin_submit(), Err(MutationOutcome::Ignored));
        Ok(())
    }

    #[test]
    fn declined_delete_never_builds_a_request() {
        let mut dialog = dialog(EntityKind::Documents);
        let mut asked = false;
        let outcome = dialog.begin_delete(&RowId::from(3), |_| {
            asked = true;
            false
        });
        assert!(asked);
        assert_eq!(outcome, Err(MutationOutcome::Cancelled));

        let mut acts = super::MutationDialogController::new(EntityKind::Acts, DEFAULT_NOTIFICATION_TTL);
        assert_eq!(
            acts.begin_delete(&RowId::from(3), |_| true),
            Err(MutationOutcome::Unsupported)
        );
    }

    #[test]
    fn pending_delete_is_taken_once() {
        let mut dialog = dialog(EntityKind::States);
        assert!(dialog.request_delete(RowId::from(8)));
        assert_eq!(dialog.pending_delete(), Some(&RowId::from(8)));
        let ticket = dialog.take_delete(true).expect("confirmed delete");
        assert_eq!(ticket.request.target_id, Some(RowId::from(8)));
        assert_eq!(dialog.take_delete(true), Err(MutationOutcome::Ignored));
    }
}
