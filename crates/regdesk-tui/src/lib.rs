// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use regdesk_app::{
    AppCommand, AppMode, AppState, DashboardCounts, DetailRow, EntityKind, FormKind, FormPayload,
    NotificationSeverity, NotificationState, OperationKind, OptionId, RowFilter, RowId, RowStatus,
    SelectableOption, SortColumn, SortDirection, SortSpec, TabKind,
};
use regdesk_flow::{
    DialogPhase, ListEvent, ListPhase, LoadTicket, MutationDialogController, MutationOutcome,
    MutationTicket, Prefill, ScreenSession,
};
use regdesk_gateway::endpoints::endpoints_for;
use regdesk_gateway::{
    Backend, GatewayError, download_sample_excel, fetch_dashboard, fetch_details, fetch_news,
    fetch_options, fetch_state_prefill,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(120);
const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(4);

/// Everything the screens need from the outside world. Requests run on
/// worker threads, so the backend is shared.
pub trait AppRuntime {
    fn backend(&self) -> Arc<dyn Backend>;
    fn page_size(&self) -> usize;
    fn notification_ttl(&self) -> Duration;
    /// Reads the spreadsheet named in the bulk upload form.
    fn read_upload(&mut self, path: &str) -> Result<UploadSource>;
    fn save_sample(&mut self, data: &[u8]) -> Result<PathBuf>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    Options {
        ticket: LoadTicket,
        result: Result<Vec<SelectableOption>, GatewayError>,
    },
    Details {
        ticket: LoadTicket,
        result: Result<Vec<DetailRow>, GatewayError>,
    },
    Mutation {
        ticket: MutationTicket,
        result: Result<Value, GatewayError>,
    },
    Prefill {
        entity: EntityKind,
        result: Result<DetailRow, GatewayError>,
        id: RowId,
    },
    Dashboard {
        request_id: u64,
        result: Result<DashboardCounts, GatewayError>,
    },
    News {
        request_id: u64,
        result: Result<Vec<DetailRow>, GatewayError>,
    },
    Sample {
        result: Result<Vec<u8>, GatewayError>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
struct DashboardUiState {
    counts: Option<DashboardCounts>,
    error: Option<String>,
    request_id: u64,
    loading: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct NewsUiState {
    visible: bool,
    rows: Vec<DetailRow>,
    error: Option<String>,
    request_id: u64,
    loading: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TableCursor {
    row: usize,
    column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldEdit {
    Push(char),
    Pop,
    Toggle,
}

#[derive(Debug, Clone)]
struct ViewData {
    screens: BTreeMap<EntityKind, ScreenSession>,
    mounted: BTreeSet<EntityKind>,
    dashboard: DashboardUiState,
    news: NewsUiState,
    cursor: TableCursor,
    option_cursor: usize,
    filter_input: String,
    field_index: usize,
    help_visible: bool,
    status_token: u64,
    in_flight: usize,
}

impl ViewData {
    fn new(page_size: usize, notification_ttl: Duration) -> Result<Self> {
        let mut screens = BTreeMap::new();
        for entity in EntityKind::ALL {
            screens.insert(
                entity,
                ScreenSession::new(entity, page_size, notification_ttl)
                    .with_context(|| format!("set up {} screen", entity.label()))?,
            );
        }
        Ok(Self {
            screens,
            mounted: BTreeSet::new(),
            dashboard: DashboardUiState::default(),
            news: NewsUiState::default(),
            cursor: TableCursor::default(),
            option_cursor: 0,
            filter_input: String::new(),
            field_index: 0,
            help_visible: false,
            status_token: 0,
            in_flight: 0,
        })
    }

    fn screen(&self, tab: TabKind) -> Option<&ScreenSession> {
        tab.entity().and_then(|entity| self.screens.get(&entity))
    }

    fn screen_mut(&mut self, tab: TabKind) -> Option<&mut ScreenSession> {
        tab.entity().and_then(|entity| self.screens.get_mut(&entity))
    }
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    let mut view_data = ViewData::new(runtime.page_size(), runtime.notification_ttl())?;

    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let (internal_tx, internal_rx) = mpsc::channel();
    activate_tab(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);
        tick(state, &mut view_data, Instant::now());

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(POLL_INTERVAL).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        handle_internal_event(state, runtime, view_data, tx, event);
    }
}

fn handle_internal_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    event: InternalEvent,
) {
    match event {
        InternalEvent::ClearStatus { token } if token == view_data.status_token => {
            state.dispatch(AppCommand::ClearStatus);
        }
        InternalEvent::ClearStatus { .. } => {}
        InternalEvent::Options { ticket, result } => {
            finish_request(view_data);
            let entity = ticket.entity;
            let Some(screen) = view_data.screens.get_mut(&entity) else {
                return;
            };
            let events = screen.list_mut().finish_options(ticket, result);
            screen.apply(&events);
            let target = screen.list().details_target();
            report_list_events(state, view_data, tx, entity, &events);
            let fresh = !events.iter().any(|event| {
                matches!(
                    event,
                    ListEvent::StaleDiscarded { .. } | ListEvent::LoadFailed { .. }
                )
            });
            // a kept selection reloads its rows
            if fresh && let Some(Some(option)) = target {
                start_details(runtime, view_data, tx, entity, Some(option));
            }
        }
        InternalEvent::Details { ticket, result } => {
            finish_request(view_data);
            let entity = ticket.entity;
            let Some(screen) = view_data.screens.get_mut(&entity) else {
                return;
            };
            let events = screen.list_mut().finish_details(ticket, result);
            screen.apply(&events);
            report_list_events(state, view_data, tx, entity, &events);
            clamp_cursor(state, view_data);
        }
        InternalEvent::Mutation { ticket, result } => {
            finish_request(view_data);
            let entity = ticket.entity;
            let Some(screen) = view_data.screens.get_mut(&entity) else {
                return;
            };
            let outcome = screen.finish_mutation(ticket, result, Instant::now());
            clamp_cursor(state, view_data);
            if let MutationOutcome::Succeeded(signal) = outcome {
                tracing::debug!(
                    entity = signal.entity.as_str(),
                    operation = signal.operation.as_str(),
                    "refreshing after mutation"
                );
                start_refresh(runtime, view_data, tx, entity);
            }
        }
        InternalEvent::Prefill { entity, result, id } => {
            finish_request(view_data);
            match result {
                Ok(row) => open_prefilled(state, view_data, tx, entity, id, &row),
                Err(error) => {
                    if let Some(screen) = view_data.screens.get_mut(&entity) {
                        screen.dialog_mut().prefill_failed(&error, Instant::now());
                    }
                }
            }
        }
        InternalEvent::Dashboard { request_id, result } => {
            finish_request(view_data);
            if request_id != view_data.dashboard.request_id {
                return;
            }
            view_data.dashboard.loading = false;
            match result {
                Ok(counts) => {
                    view_data.dashboard.counts = Some(counts);
                    view_data.dashboard.error = None;
                }
                Err(error) => {
                    tracing::warn!(%error, "dashboard load failed");
                    view_data.dashboard.error = Some(error.to_string());
                }
            }
        }
        InternalEvent::News { request_id, result } => {
            finish_request(view_data);
            if request_id != view_data.news.request_id {
                return;
            }
            view_data.news.loading = false;
            match result {
                Ok(rows) => {
                    view_data.news.rows = rows;
                    view_data.news.error = None;
                }
                Err(error) => view_data.news.error = Some(error.to_string()),
            }
        }
        InternalEvent::Sample { result } => {
            finish_request(view_data);
            let message = match result {
                Ok(data) => match runtime.save_sample(&data) {
                    Ok(path) => format!("sample saved to {}", path.display()),
                    Err(error) => format!("save sample: {error:#}"),
                },
                Err(error) => format!("sample download failed: {error}"),
            };
            emit_status(state, view_data, tx, message);
        }
    }
}

fn finish_request(view_data: &mut ViewData) {
    view_data.in_flight = view_data.in_flight.saturating_sub(1);
}

fn report_list_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    entity: EntityKind,
    events: &[ListEvent],
) {
    for event in events {
        match event {
            ListEvent::LoadFailed { kind, message } => emit_status(
                state,
                view_data,
                tx,
                format!("{} {} failed: {message}", entity.label(), kind.as_str()),
            ),
            ListEvent::SelectionDropped(option) => emit_status(
                state,
                view_data,
                tx,
                format!("{} {option} is no longer offered", selector_noun(entity)),
            ),
            _ => {}
        }
    }
}

fn tick(state: &mut AppState, view_data: &mut ViewData, now: Instant) {
    for screen in view_data.screens.values_mut() {
        screen.tick(now);
    }
    sync_mode(state, view_data);
}

/// Leaves dialog mode once the active dialog closed itself.
fn sync_mode(state: &mut AppState, view_data: &ViewData) {
    let dialog_open = view_data
        .screen(state.active_tab)
        .is_some_and(|screen| screen.dialog().is_open());
    if matches!(state.mode, AppMode::Dialog(_)) && !dialog_open {
        state.dispatch(AppCommand::ExitToNav);
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_DELAY);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn spawn_request<F>(
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    backend: Arc<dyn Backend>,
    work: F,
) where
    F: FnOnce(&dyn Backend) -> InternalEvent + Send + 'static,
{
    view_data.in_flight += 1;
    let sender = internal_tx.clone();
    thread::spawn(move || {
        let event = work(backend.as_ref());
        let _ = sender.send(event);
    });
}

fn activate_tab<R: AppRuntime>(
    state: &AppState,
    runtime: &R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    view_data.cursor = TableCursor::default();
    view_data.option_cursor = 0;
    match state.active_tab {
        TabKind::Dashboard => start_dashboard(runtime, view_data, tx),
        TabKind::Entity(entity) => {
            if view_data.mounted.insert(entity) {
                start_refresh(runtime, view_data, tx, entity);
            }
        }
    }
}

fn start_dashboard<R: AppRuntime>(runtime: &R, view_data: &mut ViewData, tx: &Sender<InternalEvent>) {
    view_data.dashboard.request_id += 1;
    view_data.dashboard.loading = true;
    let request_id = view_data.dashboard.request_id;
    spawn_request(view_data, tx, runtime.backend(), move |backend| {
        InternalEvent::Dashboard {
            request_id,
            result: fetch_dashboard(backend),
        }
    });
}

fn start_news<R: AppRuntime>(runtime: &R, view_data: &mut ViewData, tx: &Sender<InternalEvent>) {
    view_data.news.request_id += 1;
    view_data.news.loading = true;
    view_data.news.visible = true;
    let request_id = view_data.news.request_id;
    spawn_request(view_data, tx, runtime.backend(), move |backend| {
        InternalEvent::News {
            request_id,
            result: fetch_news(backend),
        }
    });
}

/// Reloads a screen from the top: options first where the screen has a
/// selector, rows directly otherwise.
fn start_refresh<R: AppRuntime>(
    runtime: &R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    entity: EntityKind,
) {
    let Some(screen) = view_data.screens.get_mut(&entity) else {
        return;
    };
    if !screen.list().has_option_step() {
        start_details(runtime, view_data, tx, entity, None);
        return;
    }
    let (ticket, events) = screen.list_mut().begin_options();
    screen.apply(&events);
    spawn_request(view_data, tx, runtime.backend(), move |backend| {
        InternalEvent::Options {
            result: fetch_options(backend, ticket.entity),
            ticket,
        }
    });
}

fn start_details<R: AppRuntime>(
    runtime: &R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    entity: EntityKind,
    option: Option<OptionId>,
) {
    let Some(screen) = view_data.screens.get_mut(&entity) else {
        return;
    };
    let (ticket, events) = screen.list_mut().begin_details(option);
    screen.apply(&events);
    spawn_request(view_data, tx, runtime.backend(), move |backend| {
        InternalEvent::Details {
            result: fetch_details(backend, ticket.entity, ticket.option),
            ticket,
        }
    });
}

fn spawn_mutation<R: AppRuntime>(
    runtime: &R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    ticket: MutationTicket,
) {
    spawn_request(view_data, tx, runtime.backend(), move |backend| {
        let result = ticket.send(backend);
        InternalEvent::Mutation { ticket, result }
    });
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }
    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }
    if view_data.news.visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('w')) {
            view_data.news.visible = false;
        }
        return false;
    }

    match state.mode {
        AppMode::Nav => return handle_nav_key(state, runtime, view_data, internal_tx, key),
        AppMode::Filter => handle_filter_key(state, view_data, internal_tx, key),
        AppMode::OptionPicker => {
            handle_option_picker_key(state, runtime, view_data, internal_tx, key);
        }
        AppMode::Dialog(_) => handle_dialog_key(state, runtime, view_data, internal_tx, key),
        AppMode::ConfirmDelete => {
            handle_confirm_delete_key(state, runtime, view_data, internal_tx, key);
        }
    }
    false
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), KeyModifiers::NONE) => return true,
        (KeyCode::Tab, _) | (KeyCode::Char('f'), KeyModifiers::NONE) => {
            state.dispatch(AppCommand::NextTab);
            activate_tab(state, runtime, view_data, internal_tx);
        }
        (KeyCode::BackTab, _) | (KeyCode::Char('b'), KeyModifiers::NONE) => {
            state.dispatch(AppCommand::PrevTab);
            activate_tab(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('?'), _) => view_data.help_visible = true,
        (KeyCode::Char('r'), KeyModifiers::NONE) => match state.active_tab {
            TabKind::Dashboard => start_dashboard(runtime, view_data, internal_tx),
            TabKind::Entity(entity) => start_refresh(runtime, view_data, internal_tx, entity),
        },
        _ => {
            if let TabKind::Entity(entity) = state.active_tab {
                handle_entity_key(state, runtime, view_data, internal_tx, entity, key);
            }
        }
    }
    false
}

fn handle_entity_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    entity: EntityKind,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => move_row(state, view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_row(state, view_data, -1),
        KeyCode::Char('h') | KeyCode::Left => move_column(view_data, entity, -1),
        KeyCode::Char('l') | KeyCode::Right => move_column(view_data, entity, 1),
        KeyCode::Char('s') => {
            let column = columns_for(entity)
                .get(view_data.cursor.column)
                .cloned()
                .unwrap_or(SortColumn::Id);
            let Some(screen) = view_data.screens.get_mut(&entity) else {
                return;
            };
            let message = match screen.table_mut().cycle_sort(column) {
                Some(sort) => format!("sorted by {} {}", sort.column.label(), sort.direction.as_str()),
                None => "sort cleared".to_owned(),
            };
            emit_status(state, view_data, tx, message);
        }
        KeyCode::Char('S') => {
            if let Some(screen) = view_data.screens.get_mut(&entity) {
                screen.table_mut().clear_sort();
            }
            emit_status(state, view_data, tx, "sort cleared");
        }
        KeyCode::Char(']') | KeyCode::PageDown => {
            if let Some(screen) = view_data.screens.get_mut(&entity) {
                screen.table_mut().next_page();
            }
            view_data.cursor.row = 0;
        }
        KeyCode::Char('[') | KeyCode::PageUp => {
            if let Some(screen) = view_data.screens.get_mut(&entity) {
                screen.table_mut().prev_page();
            }
            view_data.cursor.row = 0;
        }
        KeyCode::Char('z') => {
            let Some(screen) = view_data.screens.get_mut(&entity) else {
                return;
            };
            let size = screen.table_mut().cycle_page_size();
            clamp_cursor(state, view_data);
            emit_status(state, view_data, tx, format!("{size} rows per page"));
        }
        KeyCode::Char('/') => {
            view_data.filter_input = match view_data
                .screens
                .get(&entity)
                .and_then(|screen| screen.table().filter())
            {
                Some(RowFilter::AnyText(needle)) => needle.clone(),
                _ => String::new(),
            };
            state.dispatch(AppCommand::OpenFilter);
        }
        KeyCode::Char('o') => {
            let Some(screen) = view_data.screens.get(&entity) else {
                return;
            };
            if !screen.list().has_option_step() {
                emit_status(state, view_data, tx, format!("{} has no selector", entity.label()));
                return;
            }
            let selected = screen.list().selected();
            view_data.option_cursor = screen
                .list()
                .options()
                .iter()
                .position(|option| Some(option.id) == selected)
                .unwrap_or(0);
            state.dispatch(AppCommand::OpenOptionPicker);
        }
        KeyCode::Char(' ') => {
            let Some(id) = cursor_row_id(state, view_data) else {
                return;
            };
            if let Some(screen) = view_data.screens.get_mut(&entity) {
                screen.table_mut().toggle_row_selection(&id);
            }
        }
        KeyCode::Char('a') => {
            open_create_dialog(state, view_data, tx, entity, FormKind::primary_for(entity));
        }
        KeyCode::Char('m') if entity == EntityKind::Documents => {
            open_create_dialog(state, view_data, tx, entity, Some(FormKind::MergeActName));
        }
        KeyCode::Char('e') => start_edit(state, runtime, view_data, tx, entity),
        KeyCode::Char('d') => {
            let Some(id) = cursor_row_id(state, view_data) else {
                emit_status(state, view_data, tx, "no row under the cursor");
                return;
            };
            let Some(screen) = view_data.screens.get_mut(&entity) else {
                return;
            };
            if screen.dialog_mut().request_delete(id.clone()) {
                state.dispatch(AppCommand::AskDeleteConfirmation);
                state.dispatch(AppCommand::SetStatus(format!(
                    "delete {} {id}? y/n",
                    entity.singular()
                )));
            } else {
                emit_status(
                    state,
                    view_data,
                    tx,
                    format!("{} rows cannot be deleted", entity.label()),
                );
            }
        }
        KeyCode::Char('x') if entity == EntityKind::Events => {
            spawn_request(view_data, tx, runtime.backend(), |backend| {
                InternalEvent::Sample {
                    result: download_sample_excel(backend),
                }
            });
            emit_status(state, view_data, tx, "downloading sample sheet");
        }
        KeyCode::Char('w') if entity == EntityKind::Acts => start_news(runtime, view_data, tx),
        _ => {}
    }
}

fn cursor_row_id(state: &AppState, view_data: &ViewData) -> Option<RowId> {
    view_data
        .screen(state.active_tab)?
        .visible_rows()
        .get(view_data.cursor.row)
        .map(|row| row.id.clone())
}

fn move_row(state: &AppState, view_data: &mut ViewData, delta: isize) {
    let len = view_data
        .screen(state.active_tab)
        .map_or(0, |screen| screen.visible_rows().len());
    if len == 0 {
        view_data.cursor.row = 0;
        return;
    }
    let next = (view_data.cursor.row as isize + delta).clamp(0, len as isize - 1);
    view_data.cursor.row = next as usize;
}

fn move_column(view_data: &mut ViewData, entity: EntityKind, delta: isize) {
    let len = columns_for(entity).len() as isize;
    let next = (view_data.cursor.column as isize + delta).clamp(0, len - 1);
    view_data.cursor.column = next as usize;
}

fn clamp_cursor(state: &AppState, view_data: &mut ViewData) {
    let len = view_data
        .screen(state.active_tab)
        .map_or(0, |screen| screen.visible_rows().len());
    view_data.cursor.row = view_data.cursor.row.min(len.saturating_sub(1));
}

fn handle_filter_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            view_data.filter_input.clear();
            apply_filter_input(state, view_data);
            state.dispatch(AppCommand::ExitToNav);
            emit_status(state, view_data, tx, "filter cleared");
        }
        KeyCode::Enter => {
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Backspace => {
            view_data.filter_input.pop();
            apply_filter_input(state, view_data);
        }
        KeyCode::Char(ch) => {
            view_data.filter_input.push(ch);
            apply_filter_input(state, view_data);
        }
        _ => {}
    }
}

fn apply_filter_input(state: &AppState, view_data: &mut ViewData) {
    let needle = view_data.filter_input.clone();
    let Some(screen) = view_data.screen_mut(state.active_tab) else {
        return;
    };
    if needle.trim().is_empty() {
        screen.table_mut().clear_filter();
    } else {
        screen.table_mut().set_filter(RowFilter::AnyText(needle));
    }
    view_data.cursor.row = 0;
}

fn handle_option_picker_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let TabKind::Entity(entity) = state.active_tab else {
        state.dispatch(AppCommand::ExitToNav);
        return;
    };
    let option_count = view_data
        .screens
        .get(&entity)
        .map_or(0, |screen| screen.list().options().len());
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            view_data.option_cursor =
                (view_data.option_cursor + 1).min(option_count.saturating_sub(1));
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.option_cursor = view_data.option_cursor.saturating_sub(1);
        }
        KeyCode::Enter => {
            let chosen = view_data.screens.get(&entity).and_then(|screen| {
                screen
                    .list()
                    .options()
                    .get(view_data.option_cursor)
                    .map(|option| option.id)
            });
            state.dispatch(AppCommand::ExitToNav);
            if let Some(option) = chosen {
                view_data.cursor = TableCursor::default();
                start_details(runtime, view_data, tx, entity, Some(option));
            }
        }
        KeyCode::Char('x') | KeyCode::Backspace => {
            if let Some(screen) = view_data.screens.get_mut(&entity) {
                let events = screen.list_mut().clear_selection();
                screen.apply(&events);
            }
            view_data.cursor = TableCursor::default();
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Esc => {
            state.dispatch(AppCommand::ExitToNav);
        }
        _ => {}
    }
}

fn open_create_dialog(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    entity: EntityKind,
    kind: Option<FormKind>,
) {
    let Some(kind) = kind else {
        emit_status(state, view_data, tx, format!("{} has no add form", entity.label()));
        return;
    };
    let Some(screen) = view_data.screens.get_mut(&entity) else {
        return;
    };
    match screen.open_create(kind) {
        Ok(()) => {
            view_data.field_index = 0;
            state.dispatch(AppCommand::OpenDialog(kind));
        }
        Err(error) => emit_status(state, view_data, tx, format!("{error:#}")),
    }
}

fn start_edit<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    entity: EntityKind,
) {
    if FormKind::primary_for(entity).is_none_or(|kind| !kind.supports_update()) {
        emit_status(
            state,
            view_data,
            tx,
            format!("{} rows cannot be edited here", entity.label()),
        );
        return;
    }
    let Some(id) = cursor_row_id(state, view_data) else {
        emit_status(state, view_data, tx, "no row under the cursor");
        return;
    };

    if endpoints_for(entity).prefill.is_some() {
        spawn_request(view_data, tx, runtime.backend(), move |backend| {
            InternalEvent::Prefill {
                entity,
                result: fetch_state_prefill(backend, &id),
                id,
            }
        });
        return;
    }

    let backend = runtime.backend();
    let Some(screen) = view_data.screens.get_mut(&entity) else {
        return;
    };
    match screen.open_edit(backend.as_ref(), &id, Instant::now()) {
        Ok(true) => {
            if let Some(kind) = screen.dialog().form().map(FormPayload::kind) {
                view_data.field_index = 0;
                state.dispatch(AppCommand::OpenDialog(kind));
            }
        }
        Ok(false) => {}
        Err(error) => emit_status(state, view_data, tx, format!("{error:#}")),
    }
}

fn open_prefilled(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    entity: EntityKind,
    id: RowId,
    row: &DetailRow,
) {
    if state.active_tab != TabKind::Entity(entity) || state.mode != AppMode::Nav {
        tracing::debug!(entity = entity.as_str(), %id, "prefill arrived after leaving the screen");
        return;
    }
    let Some(kind) = FormKind::primary_for(entity) else {
        return;
    };
    let Some(payload) = FormPayload::from_row(kind, row) else {
        emit_status(state, view_data, tx, format!("{} form has no prefill", kind.title()));
        return;
    };
    let Some(screen) = view_data.screens.get_mut(&entity) else {
        return;
    };
    match screen.dialog_mut().open(kind, Some(Prefill { id, payload })) {
        Ok(()) => {
            view_data.field_index = 0;
            state.dispatch(AppCommand::OpenDialog(kind));
        }
        Err(error) => emit_status(state, view_data, tx, format!("{error:#}")),
    }
}

fn handle_dialog_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let field_count = view_data
        .screen(state.active_tab)
        .and_then(|screen| screen.dialog().form())
        .map_or(0, |form| form.fields().len());
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            if let Some(screen) = view_data.screen_mut(state.active_tab) {
                screen.dialog_mut().close();
            }
            state.dispatch(AppCommand::ExitToNav);
        }
        (KeyCode::Tab, _) | (KeyCode::Down, _) => {
            if field_count > 0 {
                view_data.field_index = (view_data.field_index + 1) % field_count;
            }
        }
        (KeyCode::BackTab, _) | (KeyCode::Up, _) => {
            if field_count > 0 {
                view_data.field_index = (view_data.field_index + field_count - 1) % field_count;
            }
        }
        (KeyCode::Enter, _) | (KeyCode::Char('s'), KeyModifiers::CONTROL) => {
            submit_dialog(state, runtime, view_data, tx);
        }
        (KeyCode::Backspace, _) => edit_dialog_field(state, view_data, tx, FieldEdit::Pop),
        (KeyCode::Left | KeyCode::Right, _) => {
            edit_dialog_field(state, view_data, tx, FieldEdit::Toggle);
        }
        (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
            edit_dialog_field(state, view_data, tx, FieldEdit::Push(ch));
        }
        _ => {}
    }
}

fn edit_dialog_field(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    edit: FieldEdit,
) {
    let index = view_data.field_index;
    let Some(screen) = view_data.screen_mut(state.active_tab) else {
        return;
    };
    let fields = screen
        .dialog()
        .form()
        .map(FormPayload::fields)
        .unwrap_or_default();
    let Some(field) = fields.get(index) else {
        return;
    };
    let dialog = screen.dialog_mut();
    let applied = if field.name == "status" {
        match edit {
            FieldEdit::Push(' ') | FieldEdit::Toggle => {
                let next = match RowStatus::parse(&field.value) {
                    Some(RowStatus::Active) => RowStatus::Inactive,
                    _ => RowStatus::Active,
                };
                dialog.set_field(field.name, next.as_str())
            }
            _ => Ok(()),
        }
    } else {
        let mut value = field.value.clone();
        match edit {
            FieldEdit::Push(ch) => value.push(ch),
            FieldEdit::Pop => {
                value.pop();
            }
            FieldEdit::Toggle => return,
        }
        if field.name == "file" {
            // a new path drops whatever was read for the old one
            dialog.attach_file(&value, Vec::new())
        } else {
            dialog.set_field(field.name, &value)
        }
    };
    if let Err(error) = applied {
        emit_status(state, view_data, tx, format!("{error:#}"));
    }
}

fn submit_dialog<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    let tab = state.active_tab;
    let upload_path = match view_data.screen(tab).and_then(|screen| screen.dialog().form()) {
        Some(FormPayload::BulkUpload(input))
            if input.data.is_empty() && !input.file_name.trim().is_empty() =>
        {
            Some(input.file_name.clone())
        }
        _ => None,
    };
    if let Some(path) = upload_path {
        let attached = runtime.read_upload(&path).and_then(|source| {
            let Some(screen) = view_data.screen_mut(tab) else {
                return Ok(());
            };
            screen.dialog_mut().attach_file(&source.file_name, source.data)
        });
        if let Err(error) = attached {
            emit_status(state, view_data, tx, format!("{error:#}"));
            return;
        }
    }

    let Some(screen) = view_data.screen_mut(tab) else {
        return;
    };
    match screen.dialog_mut().begin_submit() {
        Ok(ticket) => {
            spawn_mutation(runtime, view_data, tx, ticket);
        }
        Err(MutationOutcome::Blocked(errors)) => {
            if let Some(first) = errors.iter().next() {
                let message = first.message.clone();
                emit_status(state, view_data, tx, message);
            }
        }
        Err(_) => {}
    }
}

fn handle_confirm_delete_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let accepted = match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => true,
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => false,
        _ => return,
    };
    state.dispatch(AppCommand::ExitToNav);
    state.dispatch(AppCommand::ClearStatus);
    let Some(screen) = view_data.screen_mut(state.active_tab) else {
        return;
    };
    match screen.dialog_mut().take_delete(accepted) {
        Ok(ticket) => spawn_mutation(runtime, view_data, tx, ticket),
        Err(MutationOutcome::Cancelled) => emit_status(state, view_data, tx, "delete cancelled"),
        Err(_) => {}
    }
}

/// Table columns for an entity, derived from the fields its records carry.
fn columns_for(entity: EntityKind) -> Vec<SortColumn> {
    let schema = endpoints_for(entity).record_schema;
    let mut columns = vec![SortColumn::Id, SortColumn::DisplayName];
    if !schema.description.is_empty() {
        columns.push(SortColumn::Description);
    }
    columns.extend(
        schema
            .links
            .iter()
            .map(|link| SortColumn::Link(link.key.to_owned())),
    );
    if !schema.status.is_empty() {
        columns.push(SortColumn::Status);
    }
    if !schema.created.is_empty() {
        columns.push(SortColumn::CreatedAt);
    }
    columns
}

fn column_width(column: &SortColumn) -> Constraint {
    match column {
        SortColumn::Id => Constraint::Length(8),
        SortColumn::Status => Constraint::Length(10),
        SortColumn::CreatedAt | SortColumn::UpdatedAt => Constraint::Length(17),
        SortColumn::DisplayName => Constraint::Min(24),
        SortColumn::Description | SortColumn::Link(_) => Constraint::Min(12),
    }
}

fn selector_noun(entity: EntityKind) -> &'static str {
    match entity {
        EntityKind::Events => "event",
        _ => "act",
    }
}

fn tab_title(tab: TabKind, view_data: &ViewData) -> String {
    let loading = match tab {
        TabKind::Dashboard => view_data.dashboard.loading,
        TabKind::Entity(_) => view_data
            .screen(tab)
            .is_some_and(|screen| screen.list().phase().is_loading()),
    };
    if loading {
        format!(" {} … ", tab.label())
    } else {
        format!(" {} ", tab.label())
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let selected = TabKind::ALL
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let tab_titles = TabKind::ALL
        .iter()
        .map(|tab| tab_title(*tab, view_data))
        .collect::<Vec<String>>();
    let tabs = Tabs::new(tab_titles)
        .block(Block::default().title("regdesk").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    if state.active_tab == TabKind::Dashboard {
        let body = Paragraph::new(render_dashboard_text(&view_data.dashboard))
            .block(Block::default().borders(Borders::ALL).title("dashboard"));
        frame.render_widget(body, layout[1]);
    } else {
        render_table(frame, layout[1], state, view_data);
    }

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    let Some(screen) = view_data.screen(state.active_tab) else {
        render_help(frame, view_data);
        return;
    };

    if state.mode == AppMode::OptionPicker {
        let area = centered_rect(60, 60, frame.area());
        frame.render_widget(Clear, area);
        let picker = Paragraph::new(render_option_picker_text(screen, view_data.option_cursor))
            .block(
                Block::default()
                    .title(format!("choose {}", selector_noun(screen.entity())))
                    .borders(Borders::ALL),
            );
        frame.render_widget(picker, area);
    }

    if screen.dialog().is_open() {
        let area = centered_rect(64, 50, frame.area());
        frame.render_widget(Clear, area);
        let title = screen
            .dialog()
            .form()
            .map_or("form", |form| form.kind().title());
        let dialog = Paragraph::new(render_dialog_text(screen.dialog(), view_data.field_index))
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Cyan)),
            );
        frame.render_widget(dialog, area);
    }

    if view_data.news.visible {
        let area = centered_rect(80, 60, frame.area());
        frame.render_widget(Clear, area);
        let news = Paragraph::new(render_news_text(&view_data.news))
            .block(Block::default().title("act news").borders(Borders::ALL));
        frame.render_widget(news, area);
    }

    let notification = screen.dialog().notification();
    if notification.visible {
        let area = notification_rect(frame.area());
        frame.render_widget(Clear, area);
        let color = match notification.severity {
            NotificationSeverity::Success => Color::Green,
            NotificationSeverity::Error => Color::Red,
            NotificationSeverity::Warning => Color::Yellow,
            NotificationSeverity::Info => Color::White,
        };
        let toast = Paragraph::new(notification_text(notification))
            .style(Style::default().fg(color))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(toast, area);
    }

    render_help(frame, view_data);
}

fn render_help(frame: &mut ratatui::Frame<'_>, view_data: &ViewData) {
    if view_data.help_visible {
        let area = centered_rect(80, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let Some(screen) = view_data.screen(state.active_tab) else {
        return;
    };
    let block = Block::default()
        .title(table_title(screen))
        .borders(Borders::ALL);
    if let Some(message) = empty_table_message(screen) {
        frame.render_widget(Paragraph::new(message).block(block), area);
        return;
    }

    let columns = columns_for(screen.entity());
    let sort = screen.table().sort();
    let header = Row::new(
        columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                Cell::from(header_label(column, sort, index == view_data.cursor.column))
            })
            .collect::<Vec<_>>(),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));

    let selection = screen.table().selected_ids();
    let rows = screen.visible_rows().iter().enumerate().map(|(index, row)| {
        let cells = columns
            .iter()
            .map(|column| Cell::from(row.cell_text(column)))
            .collect::<Vec<_>>();
        let mut style = Style::default();
        if selection.contains(&row.id) {
            style = style.fg(Color::Green);
        }
        if index == view_data.cursor.row {
            style = style.bg(Color::DarkGray);
        }
        Row::new(cells).style(style)
    });
    let widths = columns.iter().map(column_width).collect::<Vec<_>>();

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(block);
    frame.render_widget(table, area);
}

fn header_label(column: &SortColumn, sort: Option<&SortSpec>, focused: bool) -> String {
    let mut label = column.label();
    if let Some(sort) = sort
        && sort.column == *column
    {
        label.push(' ');
        label.push_str(match sort.direction {
            SortDirection::Asc => "↑",
            SortDirection::Desc => "↓",
        });
    }
    if focused {
        format!("[{label}]")
    } else {
        label
    }
}

fn table_title(screen: &ScreenSession) -> String {
    let entity = screen.entity();
    let table = screen.table();
    let mut parts = vec![entity.label().to_owned()];
    if let Some(option) = screen.list().selected_option() {
        parts.push(format!("{} {}", selector_noun(entity), option.label));
    }
    parts.push(format!(
        "page {}/{}",
        table.page_index() + 1,
        table.page_count().max(1)
    ));
    parts.push(format!("{} of {} rows", table.filtered_len(), table.source_len()));
    if let Some(sort) = table.sort() {
        parts.push(format!("sort {} {}", sort.column.label(), sort.direction.as_str()));
    }
    if let Some(RowFilter::AnyText(needle)) = table.filter() {
        parts.push(format!("filter {needle:?}"));
    }
    let selected = table.selected_ids().len();
    if selected > 0 {
        parts.push(format!("{selected} marked"));
    }
    format!(" {} ", parts.join(" | "))
}

/// What to show instead of the table body, if the table has nothing to show.
fn empty_table_message(screen: &ScreenSession) -> Option<String> {
    if !screen.visible_rows().is_empty() {
        return None;
    }
    let entity = screen.entity();
    let list = screen.list();
    let message = match list.phase() {
        ListPhase::LoadingOptions | ListPhase::LoadingDetails => "loading…".to_owned(),
        ListPhase::OptionsError | ListPhase::DetailsError => format!(
            "{}\n\npress r to retry",
            list.error().unwrap_or(regdesk_gateway::GENERIC_FAILURE)
        ),
        _ if list.has_option_step() && list.selected().is_none() => {
            format!("press o to choose an {}", selector_noun(entity))
        }
        _ if screen.table().source_len() > 0 => "no rows match the filter".to_owned(),
        _ => format!("no {} yet", entity.label()),
    };
    Some(message)
}

fn render_dashboard_text(dashboard: &DashboardUiState) -> String {
    if let Some(error) = &dashboard.error {
        return format!("dashboard unavailable: {error}\n\npress r to retry");
    }
    let Some(counts) = &dashboard.counts else {
        return "loading dashboard…".to_owned();
    };
    let lines = [
        ("acts", counts.acts),
        ("compliances", counts.compliances),
        ("documents", counts.documents),
        ("forms", counts.forms),
        ("states", counts.states),
        ("events", counts.events),
    ]
    .iter()
    .map(|(label, value)| format!("{label:<14}{value:>8}"))
    .collect::<Vec<_>>();
    format!(
        "{}\n\ntab/f/b switch screens | r refresh | ? help",
        lines.join("\n")
    )
}

fn render_option_picker_text(screen: &ScreenSession, cursor: usize) -> String {
    let list = screen.list();
    if list.options().is_empty() {
        return match list.phase() {
            ListPhase::LoadingOptions => "loading…".to_owned(),
            _ => format!("no {}s available", selector_noun(screen.entity())),
        };
    }
    let selected = list.selected();
    let mut lines = list
        .options()
        .iter()
        .enumerate()
        .map(|(index, option)| {
            let pointer = if index == cursor { ">" } else { " " };
            let mark = if Some(option.id) == selected { " *" } else { "" };
            format!("{pointer} {:>5}  {}{mark}", option.id.get(), option.label)
        })
        .collect::<Vec<_>>();
    lines.push(String::new());
    lines.push("j/k move | enter select | x clear | esc back".to_owned());
    lines.join("\n")
}

fn render_dialog_text(dialog: &MutationDialogController, field_index: usize) -> String {
    let Some(form) = dialog.form() else {
        return String::new();
    };
    let heading = match (dialog.operation(), dialog.target_id()) {
        (OperationKind::Update, Some(id)) => format!("edit {} {id}", form.kind().title()),
        _ => format!("new {}", form.kind().title()),
    };
    let mut lines = vec![heading, String::new()];
    for (index, field) in form.fields().iter().enumerate() {
        let pointer = if index == field_index { ">" } else { " " };
        let required = if field.required { "*" } else { "" };
        let mut line = format!("{pointer} {}{required}: {}", field.label, field.value);
        if let FormPayload::BulkUpload(input) = form
            && field.name == "file"
            && !input.data.is_empty()
        {
            line.push_str(&format!(" ({} bytes read)", input.data.len()));
        }
        lines.push(line);
    }
    if !dialog.errors().is_empty() {
        lines.push(String::new());
        lines.extend(dialog.errors().iter().map(|error| format!("! {}", error.message)));
    }
    lines.push(String::new());
    lines.push(
        match dialog.phase() {
            DialogPhase::Submitting => "saving…",
            DialogPhase::Success => "saved",
            DialogPhase::Failure => "not saved -- fix and press enter to retry",
            _ => "tab next field | left/right toggle status | enter save | esc cancel",
        }
        .to_owned(),
    );
    lines.join("\n")
}

fn render_news_text(news: &NewsUiState) -> String {
    if let Some(error) = &news.error {
        return format!("news unavailable: {error}");
    }
    if news.loading {
        return "loading…".to_owned();
    }
    if news.rows.is_empty() {
        return "no news links".to_owned();
    }
    news.rows
        .iter()
        .map(|row| {
            let url = row
                .link("url")
                .map(|value| value.display())
                .unwrap_or_default();
            format!("{}  {url}", row.display_name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn notification_text(notification: &NotificationState) -> String {
    format!("{}: {}", notification.severity.as_str(), notification.message)
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ? help | esc close overlay\n\
nav: tab/shift+tab or f/b switch screens | r refresh | q quit\n\
table: j/k rows | h/l columns | s sort column | S clear sort | [/] page | z page size\n\
table: / filter | space mark row | o choose act or event\n\
edit: a add | e edit | d delete (y/n) | m merge act name (docs)\n\
extras: x sample sheet (events) | w act news (acts)\n\
form: tab/shift+tab field | type to edit | left/right status | enter or ctrl+s save | esc cancel\n\
picker: j/k move | enter select | x clear | esc back"
}

fn mode_label(mode: AppMode) -> &'static str {
    match mode {
        AppMode::Nav => "NAV",
        AppMode::Filter => "FILTER",
        AppMode::OptionPicker => "PICK",
        AppMode::Dialog(_) => "FORM",
        AppMode::ConfirmDelete => "CONFIRM",
    }
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if view_data.help_visible {
        return String::new();
    }
    let mode = mode_label(state.mode);
    let hints = match state.mode {
        AppMode::Nav => nav_hints(state.active_tab),
        AppMode::Filter => format!("filter: {}_ | enter keep | esc clear", view_data.filter_input),
        AppMode::OptionPicker => "j/k | enter select | x clear | esc back".to_owned(),
        AppMode::Dialog(_) => "tab field | enter save | esc cancel".to_owned(),
        AppMode::ConfirmDelete => "y delete | n keep".to_owned(),
    };
    let busy = if view_data.in_flight > 0 { " | busy" } else { "" };
    match &state.status_line {
        Some(status) => format!("{mode}{busy} | {status} | {hints}"),
        None => format!("{mode}{busy} | {hints}"),
    }
}

fn nav_hints(tab: TabKind) -> String {
    let TabKind::Entity(entity) = tab else {
        return "tab/f/b switch | r refresh | ? help | q quit".to_owned();
    };
    let endpoints = endpoints_for(entity);
    let mut hints = vec!["j/k/h/l", "[/] page", "s sort", "/ filter"];
    if endpoints.has_option_step() {
        hints.push("o choose");
    }
    if let Some(kind) = FormKind::primary_for(entity) {
        hints.push("a add");
        if kind.supports_update() {
            hints.push("e edit");
        }
    }
    if endpoints.delete.is_some() {
        hints.push("d delete");
    }
    match entity {
        EntityKind::Documents => hints.push("m merge"),
        EntityKind::Events => hints.push("x sample"),
        EntityKind::Acts => hints.push("w news"),
        _ => {}
    }
    hints.extend(["r refresh", "? help"]);
    hints.join(" | ")
}

fn notification_rect(area: Rect) -> Rect {
    let width = area.width.min(56);
    Rect {
        x: area.x + area.width.saturating_sub(width + 1),
        y: area.y + 3,
        width,
        height: area.height.min(3),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, DashboardUiState, InternalEvent, UploadSource, ViewData, activate_tab,
        columns_for, handle_internal_event, handle_key_event, help_overlay_text, mode_label,
        nav_hints, render_dashboard_text, render_dialog_text, render_option_picker_text,
        status_text, table_title, tick,
    };
    use anyhow::{Result, anyhow};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use regdesk_app::{
        AppMode, AppState, DEFAULT_NOTIFICATION_TTL, DashboardCounts, EntityKind, FormKind,
        SortColumn, TabKind,
    };
    use regdesk_flow::CLOSE_DELAY;
    use regdesk_gateway::Backend;
    use regdesk_testkit::MockBackend;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::time::{Duration, Instant};

    struct TestRuntime {
        backend: Arc<MockBackend>,
        files: BTreeMap<String, Vec<u8>>,
        saved: Vec<Vec<u8>>,
    }

    impl AppRuntime for TestRuntime {
        fn backend(&self) -> Arc<dyn Backend> {
            self.backend.clone()
        }

        fn page_size(&self) -> usize {
            10
        }

        fn notification_ttl(&self) -> Duration {
            DEFAULT_NOTIFICATION_TTL
        }

        fn read_upload(&mut self, path: &str) -> Result<UploadSource> {
            let data = self
                .files
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow!("read {path}: no such file"))?;
            Ok(UploadSource {
                file_name: path.to_owned(),
                data,
            })
        }

        fn save_sample(&mut self, data: &[u8]) -> Result<PathBuf> {
            self.saved.push(data.to_vec());
            Ok(PathBuf::from("/tmp/compliance-sample.xlsx"))
        }
    }

    struct Harness {
        state: AppState,
        runtime: TestRuntime,
        view: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn on(tab: TabKind) -> Self {
            let runtime = TestRuntime {
                backend: Arc::new(MockBackend::seeded(7)),
                files: BTreeMap::new(),
                saved: Vec::new(),
            };
            let view = ViewData::new(runtime.page_size(), runtime.notification_ttl())
                .expect("valid page size");
            let (tx, rx) = mpsc::channel();
            let mut harness = Self {
                state: AppState {
                    active_tab: tab,
                    ..AppState::default()
                },
                runtime,
                view,
                tx,
                rx,
            };
            activate_tab(&harness.state, &harness.runtime, &mut harness.view, &harness.tx);
            harness.settle();
            harness
        }

        fn key(&mut self, code: KeyCode) -> bool {
            handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view,
                &self.tx,
                KeyEvent::new(code, KeyModifiers::NONE),
            )
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.key(KeyCode::Char(ch));
            }
        }

        /// Applies worker replies until nothing is in flight, including
        /// loads chained off earlier replies.
        fn settle(&mut self) {
            while self.view.in_flight > 0 {
                let event = self
                    .rx
                    .recv_timeout(Duration::from_secs(5))
                    .expect("worker reply");
                handle_internal_event(
                    &mut self.state,
                    &mut self.runtime,
                    &mut self.view,
                    &self.tx,
                    event,
                );
            }
        }

        fn screen(&self, entity: EntityKind) -> &regdesk_flow::ScreenSession {
            &self.view.screens[&entity]
        }
    }

    #[test]
    fn picking_an_act_pages_its_documents() {
        let mut harness = Harness::on(TabKind::Entity(EntityKind::Documents));
        assert_eq!(harness.screen(EntityKind::Documents).list().options().len(), 8);
        assert!(harness.screen(EntityKind::Documents).visible_rows().is_empty());

        harness.key(KeyCode::Char('o'));
        assert_eq!(harness.state.mode, AppMode::OptionPicker);
        harness.key(KeyCode::Enter);
        assert_eq!(harness.state.mode, AppMode::Nav);
        harness.settle();

        let screen = harness.screen(EntityKind::Documents);
        assert_eq!(screen.table().source_len(), 23);
        assert_eq!(screen.visible_rows().len(), 10);
        assert!(table_title(screen).contains("page 1/3"));

        harness.key(KeyCode::Char(']'));
        harness.key(KeyCode::Char(']'));
        harness.key(KeyCode::Char(']'));
        let screen = harness.screen(EntityKind::Documents);
        assert_eq!(screen.table().page_index(), 2);
        assert_eq!(screen.visible_rows().len(), 3);
    }

    #[test]
    fn clearing_the_selection_empties_the_table() {
        let mut harness = Harness::on(TabKind::Entity(EntityKind::Forms));
        harness.key(KeyCode::Char('o'));
        harness.key(KeyCode::Enter);
        harness.settle();
        assert!(harness.screen(EntityKind::Forms).table().source_len() > 0);

        harness.key(KeyCode::Char('o'));
        harness.key(KeyCode::Char('x'));
        let screen = harness.screen(EntityKind::Forms);
        assert_eq!(screen.list().selected(), None);
        assert_eq!(screen.table().source_len(), 0);
    }

    #[test]
    fn filter_mode_narrows_rows_live() {
        let mut harness = Harness::on(TabKind::Entity(EntityKind::States));
        assert_eq!(harness.screen(EntityKind::States).table().source_len(), 12);

        harness.key(KeyCode::Char('/'));
        assert_eq!(harness.state.mode, AppMode::Filter);
        harness.type_text("kar");
        assert_eq!(harness.screen(EntityKind::States).table().filtered_len(), 1);
        // q is text while filtering
        assert!(!harness.key(KeyCode::Char('q')));

        harness.key(KeyCode::Esc);
        assert_eq!(harness.state.mode, AppMode::Nav);
        assert_eq!(harness.screen(EntityKind::States).table().filtered_len(), 12);
        assert_eq!(harness.state.status_line.as_deref(), Some("filter cleared"));
    }

    #[test]
    fn created_state_shows_up_and_dialog_closes_after_delay() {
        let mut harness = Harness::on(TabKind::Entity(EntityKind::States));
        harness.key(KeyCode::Char('a'));
        assert_eq!(harness.state.mode, AppMode::Dialog(FormKind::State));

        harness.type_text("Zetland");
        harness.key(KeyCode::Tab);
        harness.type_text("ZT");
        harness.key(KeyCode::Enter);
        harness.settle();

        let screen = harness.screen(EntityKind::States);
        assert_eq!(screen.dialog().notification().message, "State created");
        assert_eq!(screen.table().source_len(), 13);
        assert!(
            screen
                .list()
                .rows()
                .iter()
                .any(|row| row.display_name == "Zetland")
        );
        assert_eq!(
            harness
                .runtime
                .backend
                .calls_to("/stateMaster/createStateMaster")
                .len(),
            1
        );

        tick(
            &mut harness.state,
            &mut harness.view,
            Instant::now() + CLOSE_DELAY + Duration::from_millis(10),
        );
        assert_eq!(harness.state.mode, AppMode::Nav);
        assert!(!harness.screen(EntityKind::States).dialog().is_open());
    }

    #[test]
    fn blocked_submit_never_reaches_the_backend() {
        let mut harness = Harness::on(TabKind::Entity(EntityKind::States));
        harness.key(KeyCode::Char('a'));
        harness.key(KeyCode::Enter);

        assert_eq!(harness.view.in_flight, 0);
        assert_eq!(harness.state.mode, AppMode::Dialog(FormKind::State));
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("state name is required -- enter a name and retry")
        );
        assert!(
            harness
                .runtime
                .backend
                .calls_to("/stateMaster/createStateMaster")
                .is_empty()
        );

        harness.key(KeyCode::Esc);
        assert_eq!(harness.state.mode, AppMode::Nav);
    }

    #[test]
    fn delete_waits_for_confirmation() {
        let mut harness = Harness::on(TabKind::Entity(EntityKind::States));
        harness.key(KeyCode::Char('d'));
        assert_eq!(harness.state.mode, AppMode::ConfirmDelete);
        harness.key(KeyCode::Char('n'));
        assert_eq!(harness.state.mode, AppMode::Nav);
        assert_eq!(harness.state.status_line.as_deref(), Some("delete cancelled"));
        assert!(
            harness
                .runtime
                .backend
                .calls_to("/stateMaster/removeState")
                .is_empty()
        );

        harness.key(KeyCode::Char('d'));
        harness.key(KeyCode::Char('y'));
        harness.settle();
        assert_eq!(
            harness
                .runtime
                .backend
                .calls_to("/stateMaster/removeState")
                .len(),
            1
        );
        assert_eq!(harness.screen(EntityKind::States).table().source_len(), 11);
    }

    #[test]
    fn state_edit_opens_with_backend_prefill() {
        let mut harness = Harness::on(TabKind::Entity(EntityKind::States));
        let first = harness.screen(EntityKind::States).visible_rows()[0].clone();

        harness.key(KeyCode::Char('e'));
        harness.settle();

        assert_eq!(harness.state.mode, AppMode::Dialog(FormKind::State));
        let dialog = harness.screen(EntityKind::States).dialog();
        assert_eq!(dialog.target_id(), Some(&first.id));
        let text = render_dialog_text(dialog, 0);
        assert!(text.starts_with(&format!("edit state {}", first.id)));
        assert!(text.contains(&format!("> name*: {}", first.display_name)));
        assert_eq!(
            harness
                .runtime
                .backend
                .calls_to("/stateMaster/statePrefill")
                .len(),
            1
        );
    }

    #[test]
    fn screens_without_forms_say_so() {
        let mut harness = Harness::on(TabKind::Entity(EntityKind::Forms));
        harness.key(KeyCode::Char('a'));
        assert_eq!(harness.state.mode, AppMode::Nav);
        assert_eq!(harness.state.status_line.as_deref(), Some("forms has no add form"));

        harness.key(KeyCode::Char('e'));
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("forms rows cannot be edited here")
        );
    }

    #[test]
    fn bulk_upload_reads_the_named_file() {
        let mut harness = Harness::on(TabKind::Entity(EntityKind::Events));
        harness
            .runtime
            .files
            .insert("sheet.xlsx".to_owned(), b"PK\x03\x04 sheet".to_vec());

        harness.key(KeyCode::Char('a'));
        assert_eq!(harness.state.mode, AppMode::Dialog(FormKind::BulkCompliance));
        harness.type_text("sheet.xlsx");
        harness.key(KeyCode::Enter);
        harness.settle();

        assert_eq!(harness.runtime.backend.uploads(), 1);
        assert_eq!(
            harness
                .screen(EntityKind::Events)
                .dialog()
                .notification()
                .message,
            "Bulk compliance upload created"
        );
    }

    #[test]
    fn missing_upload_file_is_reported() {
        let mut harness = Harness::on(TabKind::Entity(EntityKind::Events));
        harness.key(KeyCode::Char('a'));
        harness.type_text("gone.xlsx");
        harness.key(KeyCode::Enter);

        assert_eq!(harness.view.in_flight, 0);
        assert_eq!(harness.runtime.backend.uploads(), 0);
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("read gone.xlsx: no such file")
        );
    }

    #[test]
    fn sample_sheet_is_saved_through_the_runtime() {
        let mut harness = Harness::on(TabKind::Entity(EntityKind::Events));
        harness.key(KeyCode::Char('x'));
        harness.settle();
        assert_eq!(harness.runtime.saved.len(), 1);
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("sample saved to /tmp/compliance-sample.xlsx")
        );
    }

    #[test]
    fn dashboard_loads_counts_and_ignores_stale_replies() {
        let mut harness = Harness::on(TabKind::Dashboard);
        assert!(harness.view.dashboard.counts.is_some());
        let request_id = harness.view.dashboard.request_id;

        handle_internal_event(
            &mut harness.state,
            &mut harness.runtime,
            &mut harness.view,
            &harness.tx,
            InternalEvent::Dashboard {
                request_id: request_id - 1,
                result: Ok(DashboardCounts {
                    acts: 999,
                    ..DashboardCounts::default()
                }),
            },
        );
        assert_ne!(harness.view.dashboard.counts.as_ref().map(|c| c.acts), Some(999));
    }

    #[test]
    fn tabs_mount_screens_once() {
        let mut harness = Harness::on(TabKind::Dashboard);
        harness.key(KeyCode::Tab);
        assert_eq!(harness.state.active_tab, TabKind::Entity(EntityKind::Acts));
        harness.settle();
        let calls = harness.runtime.backend.calls().len();

        harness.key(KeyCode::Tab);
        harness.key(KeyCode::BackTab);
        harness.settle();
        assert_eq!(harness.state.active_tab, TabKind::Entity(EntityKind::Acts));
        // events mounted once, acts not reloaded
        assert_eq!(harness.runtime.backend.calls().len(), calls + 1);
    }

    #[test]
    fn q_quits_from_nav() {
        let mut harness = Harness::on(TabKind::Dashboard);
        assert!(harness.key(KeyCode::Char('q')));
    }

    #[test]
    fn dashboard_text_lists_counts() {
        let text = render_dashboard_text(&DashboardUiState {
            counts: Some(DashboardCounts {
                acts: 12,
                compliances: 340,
                ..DashboardCounts::default()
            }),
            ..DashboardUiState::default()
        });
        assert!(text.starts_with("acts                12\ncompliances        340"));

        let text = render_dashboard_text(&DashboardUiState {
            error: Some("Network error".to_owned()),
            ..DashboardUiState::default()
        });
        assert_eq!(text, "dashboard unavailable: Network error\n\npress r to retry");
    }

    #[test]
    fn option_picker_marks_cursor_and_selection() {
        let mut harness = Harness::on(TabKind::Entity(EntityKind::Documents));
        harness.key(KeyCode::Char('o'));
        harness.key(KeyCode::Enter);
        harness.settle();

        let text = render_option_picker_text(harness.screen(EntityKind::Documents), 1);
        let lines = text.lines().collect::<Vec<_>>();
        assert!(lines[0].starts_with("      1  "));
        assert!(lines[0].ends_with(" *"));
        assert!(lines[1].starts_with(">     2  "));
    }

    #[test]
    fn columns_follow_record_fields() {
        let columns = columns_for(EntityKind::States);
        assert_eq!(columns[0], SortColumn::Id);
        assert!(columns.contains(&SortColumn::Link("short_name".to_owned())));
        assert!(columns.contains(&SortColumn::Status));
    }

    #[test]
    fn status_text_hints_per_screen() {
        let view = ViewData::new(10, DEFAULT_NOTIFICATION_TTL).expect("valid page size");
        let state = AppState {
            active_tab: TabKind::Entity(EntityKind::Documents),
            status_line: Some("docs options failed: Network error".to_owned()),
            ..AppState::default()
        };
        let text = status_text(&state, &view);
        assert!(text.starts_with("NAV | docs options failed: Network error | "));
        assert!(text.contains("o choose"));
        assert!(text.contains("m merge"));
        assert!(!nav_hints(TabKind::Entity(EntityKind::Acts)).contains("d delete"));
        assert!(nav_hints(TabKind::Entity(EntityKind::States)).contains("e edit"));
        assert_eq!(mode_label(AppMode::ConfirmDelete), "CONFIRM");
        assert!(help_overlay_text().contains("ctrl+q quit"));
    }
}
