// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::ids::*;

pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Acts,
    Events,
    Documents,
    Forms,
    States,
    Categories,
}

impl EntityKind {
    pub const ALL: [Self; 6] = [
        Self::Acts,
        Self::Events,
        Self::Documents,
        Self::Forms,
        Self::States,
        Self::Categories,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Acts => "acts",
            Self::Events => "events",
            Self::Documents => "documents",
            Self::Forms => "forms",
            Self::States => "states",
            Self::Categories => "categories",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "acts" => Some(Self::Acts),
            "events" => Some(Self::Events),
            "documents" => Some(Self::Documents),
            "forms" => Some(Self::Forms),
            "states" => Some(Self::States),
            "categories" => Some(Self::Categories),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Acts => "acts",
            Self::Events => "events",
            Self::Documents => "docs",
            Self::Forms => "forms",
            Self::States => "states",
            Self::Categories => "categories",
        }
    }

    /// Noun used in notifications, e.g. "state saved".
    pub const fn singular(self) -> &'static str {
        match self {
            Self::Acts => "act",
            Self::Events => "event",
            Self::Documents => "document",
            Self::Forms => "form",
            Self::States => "state",
            Self::Categories => "category",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RowStatus {
    Active,
    Inactive,
    Pending,
}

impl RowStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Pending => "pending",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
            Self::Pending => "Pending",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "active" | "yes" | "on" => Some(Self::Active),
            "0" | "false" | "inactive" | "no" | "off" | "" => Some(Self::Inactive),
            "2" | "pending" => Some(Self::Pending),
            _ => None,
        }
    }

    pub const fn from_flag(active: bool) -> Self {
        if active { Self::Active } else { Self::Inactive }
    }

    /// Wire encoding used by the master-data save endpoints.
    pub const fn as_flag(self) -> i64 {
        match self {
            Self::Active => 1,
            Self::Inactive => 0,
            Self::Pending => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkValue {
    Text(String),
    Number(i64),
}

impl LinkValue {
    pub fn display(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Number(value) => value.to_string(),
        }
    }

    fn cmp_value(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(left), Self::Number(right)) => left.cmp(right),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
            (Self::Text(left), Self::Text(right)) => compare_text(left, right),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectableOption {
    pub id: OptionId,
    pub label: String,
    pub secondary_key: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRow {
    pub id: RowId,
    pub display_name: String,
    pub description: String,
    pub status: RowStatus,
    pub created_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
    pub links: BTreeMap<String, LinkValue>,
}

impl DetailRow {
    /// Row with every optional field at its placeholder value.
    pub fn placeholder(id: impl Into<RowId>) -> Self {
        Self {
            id: id.into(),
            display_name: String::new(),
            description: String::new(),
            status: RowStatus::Inactive,
            created_at: None,
            updated_at: None,
            links: BTreeMap::new(),
        }
    }

    pub fn link(&self, key: &str) -> Option<&LinkValue> {
        self.links.get(key)
    }

    /// Text shown for a column. Never empty-vs-null ambiguous: missing values
    /// render as the empty string.
    pub fn cell_text(&self, column: &SortColumn) -> String {
        match column {
            SortColumn::Id => self.id.to_string(),
            SortColumn::DisplayName => self.display_name.clone(),
            SortColumn::Description => self.description.clone(),
            SortColumn::Status => self.status.label().to_owned(),
            SortColumn::CreatedAt => format_timestamp(self.created_at),
            SortColumn::UpdatedAt => format_timestamp(self.updated_at),
            SortColumn::Link(key) => self.links.get(key).map(LinkValue::display).unwrap_or_default(),
        }
    }

    pub fn cmp_by(&self, other: &Self, column: &SortColumn) -> Ordering {
        match column {
            SortColumn::Id => match (self.id.as_number(), other.id.as_number()) {
                (Some(left), Some(right)) => left.cmp(&right),
                _ => compare_text(self.id.as_str(), other.id.as_str()),
            },
            SortColumn::DisplayName => compare_text(&self.display_name, &other.display_name),
            SortColumn::Description => compare_text(&self.description, &other.description),
            SortColumn::Status => self.status.cmp(&other.status),
            SortColumn::CreatedAt => self.created_at.cmp(&other.created_at),
            SortColumn::UpdatedAt => self.updated_at.cmp(&other.updated_at),
            SortColumn::Link(key) => match (self.links.get(key), other.links.get(key)) {
                (Some(left), Some(right)) => left.cmp_value(right),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        }
    }
}

fn compare_text(left: &str, right: &str) -> Ordering {
    left.to_lowercase().cmp(&right.to_lowercase())
}

pub fn format_timestamp(value: Option<OffsetDateTime>) -> String {
    value
        .and_then(|value| {
            value
                .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
                .ok()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortColumn {
    Id,
    DisplayName,
    Description,
    Status,
    CreatedAt,
    UpdatedAt,
    Link(String),
}

impl SortColumn {
    pub fn label(&self) -> String {
        match self {
            Self::Id => "id".to_owned(),
            Self::DisplayName => "name".to_owned(),
            Self::Description => "description".to_owned(),
            Self::Status => "status".to_owned(),
            Self::CreatedAt => "created".to_owned(),
            Self::UpdatedAt => "updated".to_owned(),
            Self::Link(key) => key.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub const fn past_tense(self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Update => "updated",
            Self::Delete => "deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub operation: OperationKind,
    pub target_id: Option<RowId>,
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl MutationRequest {
    pub fn delete(target_id: RowId) -> Self {
        let mut payload = serde_json::Map::new();
        let id = match target_id.as_number() {
            Some(number) => serde_json::Value::from(number),
            None => serde_json::Value::from(target_id.as_str()),
        };
        payload.insert("id".to_owned(), id);
        Self {
            operation: OperationKind::Delete,
            target_id: Some(target_id),
            payload,
        }
    }

    pub fn body(&self) -> serde_json::Value {
        serde_json::Value::Object(self.payload.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationSeverity {
    Success,
    Error,
    Info,
    Warning,
}

impl NotificationSeverity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
            Self::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationState {
    pub visible: bool,
    pub message: String,
    pub severity: NotificationSeverity,
    expires_at: Option<Instant>,
    ttl: Duration,
}

impl Default for NotificationState {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_NOTIFICATION_TTL)
    }
}

impl NotificationState {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            visible: false,
            message: String::new(),
            severity: NotificationSeverity::Info,
            expires_at: None,
            ttl,
        }
    }

    pub fn show(&mut self, message: impl Into<String>, severity: NotificationSeverity, now: Instant) {
        self.visible = true;
        self.message = message.into();
        self.severity = severity;
        self.expires_at = Some(now + self.ttl);
    }

    pub fn dismiss(&mut self) {
        self.visible = false;
        self.expires_at = None;
    }

    /// Hides the notification once its deadline passed. Returns whether it
    /// was dismissed by this call.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) if self.visible && now >= deadline => {
                self.dismiss();
                true
            }
            _ => false,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DashboardCounts {
    #[serde(alias = "actCount", alias = "totalActs")]
    pub acts: i64,
    #[serde(alias = "complianceCount", alias = "totalCompliance")]
    pub compliances: i64,
    #[serde(alias = "documentCount", alias = "totalDocuments")]
    pub documents: i64,
    #[serde(alias = "formCount", alias = "totalForms")]
    pub forms: i64,
    #[serde(alias = "stateCount", alias = "totalStates")]
    pub states: i64,
    #[serde(alias = "eventCount", alias = "totalEvents")]
    pub events: i64,
}

#[cfg(test)]
mod tests {
    use super::{
        DetailRow, LinkValue, NotificationSeverity, NotificationState, RowStatus, SortColumn,
    };
    use crate::RowId;
    use std::cmp::Ordering;
    use std::time::{Duration, Instant};

    #[test]
    fn status_parses_backend_flags() {
        assert_eq!(RowStatus::parse("1"), Some(RowStatus::Active));
        assert_eq!(RowStatus::parse("Inactive"), Some(RowStatus::Inactive));
        assert_eq!(RowStatus::parse(""), Some(RowStatus::Inactive));
        assert_eq!(RowStatus::parse("archived"), None);
        assert_eq!(RowStatus::Active.as_flag(), 1);
    }

    #[test]
    fn placeholder_row_renders_empty_cells() {
        let row = DetailRow::placeholder("7");
        assert_eq!(row.cell_text(&SortColumn::DisplayName), "");
        assert_eq!(row.cell_text(&SortColumn::CreatedAt), "");
        assert_eq!(row.cell_text(&SortColumn::Link("url".to_owned())), "");
        assert_eq!(row.cell_text(&SortColumn::Status), "Inactive");
    }

    #[test]
    fn numeric_ids_compare_numerically() {
        let nine = DetailRow::placeholder(RowId::from(9));
        let ten = DetailRow::placeholder(RowId::from(10));
        assert_eq!(nine.cmp_by(&ten, &SortColumn::Id), Ordering::Less);
    }

    #[test]
    fn missing_link_sorts_after_present_link() {
        let mut linked = DetailRow::placeholder("1");
        linked
            .links
            .insert("act".to_owned(), LinkValue::Text("Factories Act".to_owned()));
        let bare = DetailRow::placeholder("2");
        assert_eq!(
            linked.cmp_by(&bare, &SortColumn::Link("act".to_owned())),
            Ordering::Less
        );
    }

    #[test]
    fn notification_expires_after_ttl() {
        let mut notification = NotificationState::with_ttl(Duration::from_secs(2));
        let start = Instant::now();
        notification.show("saved", NotificationSeverity::Success, start);
        assert!(notification.visible);

        assert!(!notification.tick(start + Duration::from_secs(1)));
        assert!(notification.visible);

        assert!(notification.tick(start + Duration::from_secs(2)));
        assert!(!notification.visible);
    }
}
