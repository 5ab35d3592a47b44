// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;

use crate::{ActId, DetailRow, EntityKind, LinkValue, MutationRequest, OperationKind, RowId, RowStatus};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const UPLOAD_EXTENSIONS: [&str; 2] = ["xls", "xlsx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormKind {
    State,
    Category,
    ActCategory,
    CopyLibrary,
    MergeActName,
    BulkCompliance,
}

impl FormKind {
    pub const fn entity(self) -> EntityKind {
        match self {
            Self::State => EntityKind::States,
            Self::Category => EntityKind::Categories,
            Self::ActCategory => EntityKind::Acts,
            Self::CopyLibrary | Self::MergeActName => EntityKind::Documents,
            Self::BulkCompliance => EntityKind::Events,
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Category => "category",
            Self::ActCategory => "act category",
            Self::CopyLibrary => "copy library",
            Self::MergeActName => "merge act name",
            Self::BulkCompliance => "bulk compliance upload",
        }
    }

    /// Form used by the add/edit dialog of an entity screen, if it has one.
    pub const fn primary_for(entity: EntityKind) -> Option<Self> {
        match entity {
            EntityKind::States => Some(Self::State),
            EntityKind::Categories => Some(Self::Category),
            EntityKind::Acts => Some(Self::ActCategory),
            EntityKind::Documents => Some(Self::CopyLibrary),
            EntityKind::Events => Some(Self::BulkCompliance),
            EntityKind::Forms => None,
        }
    }

    /// Whether existing rows can be reopened in this form for an update.
    pub const fn supports_update(self) -> bool {
        matches!(self, Self::State | Self::Category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub value: String,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateFormInput {
    pub name: String,
    pub short_name: String,
    pub status: RowStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFormInput {
    pub name: String,
    pub description: String,
    pub status: RowStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActCategoryInput {
    pub url: String,
    pub tax: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyLibraryInput {
    pub from_act: Option<ActId>,
    pub to_act: Option<ActId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeActNameInput {
    pub url: String,
    pub act_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkUploadInput {
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPayload {
    State(StateFormInput),
    Category(CategoryFormInput),
    ActCategory(ActCategoryInput),
    CopyLibrary(CopyLibraryInput),
    MergeActName(MergeActNameInput),
    BulkUpload(BulkUploadInput),
}

impl FormPayload {
    pub fn kind(&self) -> FormKind {
        match self {
            Self::State(_) => FormKind::State,
            Self::Category(_) => FormKind::Category,
            Self::ActCategory(_) => FormKind::ActCategory,
            Self::CopyLibrary(_) => FormKind::CopyLibrary,
            Self::MergeActName(_) => FormKind::MergeActName,
            Self::BulkUpload(_) => FormKind::BulkCompliance,
        }
    }

    pub fn blank_for(kind: FormKind) -> Self {
        match kind {
            FormKind::State => Self::State(StateFormInput {
                name: String::new(),
                short_name: String::new(),
                status: RowStatus::Active,
            }),
            FormKind::Category => Self::Category(CategoryFormInput {
                name: String::new(),
                description: String::new(),
                status: RowStatus::Active,
            }),
            FormKind::ActCategory => Self::ActCategory(ActCategoryInput {
                url: String::new(),
                tax: String::new(),
            }),
            FormKind::CopyLibrary => Self::CopyLibrary(CopyLibraryInput {
                from_act: None,
                to_act: None,
            }),
            FormKind::MergeActName => Self::MergeActName(MergeActNameInput {
                url: String::new(),
                act_name: String::new(),
            }),
            FormKind::BulkCompliance => Self::BulkUpload(BulkUploadInput {
                file_name: String::new(),
                data: Vec::new(),
            }),
        }
    }

    /// Prefill built from an already loaded row, for screens whose backend
    /// has no dedicated prefill endpoint.
    pub fn from_row(kind: FormKind, row: &DetailRow) -> Option<Self> {
        match kind {
            FormKind::State => Some(Self::State(StateFormInput {
                name: row.display_name.clone(),
                short_name: match row.link("short_name") {
                    Some(LinkValue::Text(value)) => value.clone(),
                    Some(LinkValue::Number(value)) => value.to_string(),
                    None => String::new(),
                },
                status: row.status,
            })),
            FormKind::Category => Some(Self::Category(CategoryFormInput {
                name: row.display_name.clone(),
                description: row.description.clone(),
                status: row.status,
            })),
            _ => None,
        }
    }

    pub fn validate(&self) -> BTreeSet<FieldError> {
        let mut errors = BTreeSet::new();
        match self {
            Self::State(state) => {
                if state.name.trim().is_empty() {
                    errors.insert(FieldError::new(
                        "name",
                        "state name is required -- enter a name and retry",
                    ));
                }
                if state.short_name.trim().is_empty() {
                    errors.insert(FieldError::new(
                        "short_name",
                        "state short name is required -- enter a code such as MH",
                    ));
                }
            }
            Self::Category(category) => {
                if category.name.trim().is_empty() {
                    errors.insert(FieldError::new(
                        "name",
                        "category name is required -- enter a name and retry",
                    ));
                }
            }
            Self::ActCategory(input) => {
                if input.url.trim().is_empty() {
                    errors.insert(FieldError::new("url", "act url is required"));
                }
                if input.tax.trim().is_empty() {
                    errors.insert(FieldError::new(
                        "tax",
                        "category is required -- choose a category and retry",
                    ));
                }
            }
            Self::CopyLibrary(input) => {
                if input.from_act.is_none_or(|id| id.get() <= 0) {
                    errors.insert(FieldError::new("from_act", "source act is required"));
                }
                if input.to_act.is_none_or(|id| id.get() <= 0) {
                    errors.insert(FieldError::new("to_act", "target act is required"));
                }
                if let (Some(from), Some(to)) = (input.from_act, input.to_act)
                    && from == to
                {
                    errors.insert(FieldError::new(
                        "to_act",
                        "target act must differ from source act",
                    ));
                }
            }
            Self::MergeActName(input) => {
                if input.url.trim().is_empty() {
                    errors.insert(FieldError::new("url", "act url is required"));
                }
                if input.act_name.trim().is_empty() {
                    errors.insert(FieldError::new("act_name", "act name is required"));
                }
            }
            Self::BulkUpload(input) => {
                if input.file_name.trim().is_empty() {
                    errors.insert(FieldError::new(
                        "file",
                        "choose an Excel file (.xls or .xlsx) to upload",
                    ));
                } else if !has_upload_extension(&input.file_name) {
                    errors.insert(FieldError::new(
                        "file",
                        "only Excel files (.xls, .xlsx) can be uploaded",
                    ));
                }
                if input.data.len() > MAX_UPLOAD_BYTES {
                    errors.insert(FieldError::new("file", "file exceeds the 10MB upload limit"));
                } else if !input.file_name.trim().is_empty() && input.data.is_empty() {
                    errors.insert(FieldError::new("file", "file is empty"));
                }
            }
        }
        errors
    }

    pub fn ensure_valid(&self) -> Result<()> {
        if let Some(error) = self.validate().into_iter().next() {
            bail!("{}", error.message);
        }
        Ok(())
    }

    pub fn fields(&self) -> Vec<FormField> {
        match self {
            Self::State(state) => vec![
                field("name", "name", &state.name, true),
                field("short_name", "short name", &state.short_name, true),
                field("status", "status", state.status.as_str(), false),
            ],
            Self::Category(category) => vec![
                field("name", "name", &category.name, true),
                field("description", "description", &category.description, false),
                field("status", "status", category.status.as_str(), false),
            ],
            Self::ActCategory(input) => vec![
                field("url", "act url", &input.url, true),
                field("tax", "category", &input.tax, true),
            ],
            Self::CopyLibrary(input) => vec![
                field("from_act", "from act id", &optional_id(input.from_act), true),
                field("to_act", "to act id", &optional_id(input.to_act), true),
            ],
            Self::MergeActName(input) => vec![
                field("url", "act url", &input.url, true),
                field("act_name", "act name", &input.act_name, true),
            ],
            Self::BulkUpload(input) => vec![field("file", "excel file", &input.file_name, true)],
        }
    }

    /// Applies a raw text value to a named field. Binary upload content is
    /// attached separately with [`FormPayload::attach_file`].
    pub fn set_field(&mut self, name: &str, raw: &str) -> Result<()> {
        match (self, name) {
            (Self::State(state), "name") => state.name = raw.to_owned(),
            (Self::State(state), "short_name") => state.short_name = raw.to_owned(),
            (Self::State(state), "status") => state.status = parse_status(raw)?,
            (Self::Category(category), "name") => category.name = raw.to_owned(),
            (Self::Category(category), "description") => category.description = raw.to_owned(),
            (Self::Category(category), "status") => category.status = parse_status(raw)?,
            (Self::ActCategory(input), "url") => input.url = raw.to_owned(),
            (Self::ActCategory(input), "tax") => input.tax = raw.to_owned(),
            (Self::CopyLibrary(input), "from_act") => input.from_act = parse_act_id(raw)?,
            (Self::CopyLibrary(input), "to_act") => input.to_act = parse_act_id(raw)?,
            (Self::MergeActName(input), "url") => input.url = raw.to_owned(),
            (Self::MergeActName(input), "act_name") => input.act_name = raw.to_owned(),
            (Self::BulkUpload(input), "file") => input.file_name = raw.to_owned(),
            (payload, name) => bail!("{} form has no field {name:?}", payload.kind().title()),
        }
        Ok(())
    }

    pub fn attach_file(&mut self, file_name: &str, data: Vec<u8>) -> Result<()> {
        match self {
            Self::BulkUpload(input) => {
                input.file_name = file_name.to_owned();
                input.data = data;
                Ok(())
            }
            other => bail!("{} form does not take a file", other.kind().title()),
        }
    }

    /// Wire payload for the save endpoint of this form.
    pub fn to_request(&self, operation: OperationKind, target_id: Option<&RowId>) -> MutationRequest {
        let edit = operation == OperationKind::Update;
        let mut payload = Map::new();
        match self {
            Self::State(state) => {
                payload.insert("edit".to_owned(), json!(edit));
                payload.insert("name".to_owned(), json!(state.name.trim()));
                payload.insert("short_name".to_owned(), json!(state.short_name.trim()));
                payload.insert("status".to_owned(), json!(state.status.as_flag()));
            }
            Self::Category(category) => {
                payload.insert("edit".to_owned(), json!(edit));
                payload.insert("name".to_owned(), json!(category.name.trim()));
                payload.insert("description".to_owned(), json!(category.description.trim()));
                payload.insert("status".to_owned(), json!(category.status.as_flag()));
            }
            Self::ActCategory(input) => {
                payload.insert("url".to_owned(), json!(input.url.trim()));
                payload.insert("tax".to_owned(), json!(input.tax.trim()));
            }
            Self::CopyLibrary(input) => {
                payload.insert("fromAct".to_owned(), json!(input.from_act.map(ActId::get)));
                payload.insert("toAct".to_owned(), json!(input.to_act.map(ActId::get)));
            }
            Self::MergeActName(input) => {
                payload.insert("url".to_owned(), json!(input.url.trim()));
                payload.insert("actName".to_owned(), json!(input.act_name.trim()));
            }
            Self::BulkUpload(input) => {
                payload.insert("fileName".to_owned(), json!(input.file_name));
            }
        }
        if edit && let Some(id) = target_id {
            let value = match id.as_number() {
                Some(number) => Value::from(number),
                None => Value::from(id.as_str()),
            };
            payload.insert("id".to_owned(), value);
        }
        MutationRequest {
            operation,
            target_id: target_id.cloned(),
            payload,
        }
    }
}

fn field(name: &'static str, label: &'static str, value: &str, required: bool) -> FormField {
    FormField {
        name,
        label,
        value: value.to_owned(),
        required,
    }
}

fn optional_id(id: Option<ActId>) -> String {
    id.map(|id| id.to_string()).unwrap_or_default()
}

fn parse_status(raw: &str) -> Result<RowStatus> {
    match RowStatus::parse(raw) {
        Some(status) => Ok(status),
        None => bail!("unknown status {raw:?}; use active, inactive, or pending"),
    }
}

fn parse_act_id(raw: &str) -> Result<Option<ActId>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<i64>() {
        Ok(value) => Ok(Some(ActId::new(value))),
        Err(_) => bail!("act id must be a number, got {raw:?}"),
    }
}

pub fn has_upload_extension(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, extension)| {
            let extension = extension.to_ascii_lowercase();
            UPLOAD_EXTENSIONS.contains(&extension.as_str())
        })
        .unwrap_or(false)
}
