// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Per-endpoint record schemas and the pure mapping into [`DetailRow`] and
//! [`SelectableOption`].
//!
//! The backend is inconsistent about field names and casing, so every
//! canonical field lists the source keys it may arrive under, in priority
//! order. Anything missing maps to a placeholder; only a wrongly shaped
//! `data` payload is an error.

use regdesk_app::{DetailRow, LinkValue, OptionId, RowId, RowStatus, SelectableOption};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::GatewayError;

#[derive(Debug)]
pub struct OptionSchema {
    pub id: &'static [&'static str],
    pub label: &'static [&'static str],
    pub secondary: &'static [&'static str],
}

#[derive(Debug)]
pub struct LinkSpec {
    pub key: &'static str,
    pub sources: &'static [&'static str],
}

#[derive(Debug)]
pub struct RecordSchema {
    pub id: &'static [&'static str],
    pub name: &'static [&'static str],
    pub description: &'static [&'static str],
    pub status: &'static [&'static str],
    pub created: &'static [&'static str],
    pub updated: &'static [&'static str],
    pub links: &'static [LinkSpec],
}

const STATUS_KEYS: &[&str] = &["status", "isActive", "is_active", "active"];
const CREATED_KEYS: &[&str] = &["createdAt", "created_at", "created", "createdOn"];
const UPDATED_KEYS: &[&str] = &["updatedAt", "updated_at", "updated", "modifiedOn"];

pub static ACT_OPTION: OptionSchema = OptionSchema {
    id: &["id"],
    label: &["name", "actName", "act_name", "label"],
    secondary: &["actId", "act_id"],
};

pub static EVENT_OPTION: OptionSchema = OptionSchema {
    id: &["id", "eventId", "event_id"],
    label: &["name", "eventName", "event_name", "event"],
    secondary: &[],
};

pub static ACT_DETAIL: RecordSchema = RecordSchema {
    id: &["id", "actId", "act_id", "sr"],
    name: &["name", "actName", "act_name", "title"],
    description: &["description", "desc", "summary"],
    status: STATUS_KEYS,
    created: CREATED_KEYS,
    updated: UPDATED_KEYS,
    links: &[
        LinkSpec {
            key: "country",
            sources: &["country", "countryName", "country_name"],
        },
        LinkSpec {
            key: "category",
            sources: &["category", "tax", "categoryName"],
        },
        LinkSpec {
            key: "url",
            sources: &["url", "link", "actUrl"],
        },
    ],
};

pub static DOCUMENT: RecordSchema = RecordSchema {
    id: &["id", "sr", "documentId", "document_id"],
    name: &["docname", "docName", "document_name", "name"],
    description: &["description", "remarks"],
    status: STATUS_KEYS,
    created: CREATED_KEYS,
    updated: UPDATED_KEYS,
    links: &[
        LinkSpec {
            key: "act",
            sources: &["actName", "act_name", "act"],
        },
        LinkSpec {
            key: "url",
            sources: &["url", "docUrl", "doc_url", "file"],
        },
    ],
};

pub static FORM: RecordSchema = RecordSchema {
    id: &["id", "formId", "form_id", "sr"],
    name: &["formName", "form_name", "name"],
    description: &["description", "purpose"],
    status: STATUS_KEYS,
    created: CREATED_KEYS,
    updated: UPDATED_KEYS,
    links: &[
        LinkSpec {
            key: "form_no",
            sources: &["formNo", "form_no"],
        },
        LinkSpec {
            key: "act",
            sources: &["actName", "act_name", "act"],
        },
        LinkSpec {
            key: "url",
            sources: &["url", "formUrl", "form_url"],
        },
    ],
};

pub static EVENT: RecordSchema = RecordSchema {
    id: &["id", "complianceId", "compliance_id", "eventId", "sr"],
    name: &[
        "compliance",
        "complianceName",
        "compliance_name",
        "name",
        "event",
    ],
    description: &["description", "particulars"],
    status: STATUS_KEYS,
    created: CREATED_KEYS,
    updated: UPDATED_KEYS,
    links: &[
        LinkSpec {
            key: "company",
            sources: &["company", "companyName", "company_name"],
        },
        LinkSpec {
            key: "due_date",
            sources: &["dueDate", "due_date"],
        },
        LinkSpec {
            key: "frequency",
            sources: &["frequency"],
        },
    ],
};

pub static STATE: RecordSchema = RecordSchema {
    id: &["id", "stateId", "state_id"],
    name: &["name", "stateName", "state_name"],
    description: &["description"],
    status: STATUS_KEYS,
    created: CREATED_KEYS,
    updated: UPDATED_KEYS,
    links: &[LinkSpec {
        key: "short_name",
        sources: &["short_name", "shortName"],
    }],
};

pub static CATEGORY: RecordSchema = RecordSchema {
    id: &["id", "categoryId", "category_id"],
    name: &["name", "categoryName", "category_name"],
    description: &["description"],
    status: STATUS_KEYS,
    created: CREATED_KEYS,
    updated: UPDATED_KEYS,
    links: &[],
};

pub static NEWS: RecordSchema = RecordSchema {
    id: &["id", "sr"],
    name: &["title", "name", "headline"],
    description: &["description", "summary"],
    status: STATUS_KEYS,
    created: CREATED_KEYS,
    updated: UPDATED_KEYS,
    links: &[LinkSpec {
        key: "url",
        sources: &["url", "link", "newsUrl"],
    }],
};

/// Maps a dropdown payload. Entries without a usable id cannot be selected
/// and are skipped.
pub fn map_options(
    url: &str,
    data: &Value,
    schema: &OptionSchema,
) -> Result<Vec<SelectableOption>, GatewayError> {
    let records = records(url, data)?;
    let mut options = Vec::with_capacity(records.len());
    for record in records {
        let Some(id) = pick(record, schema.id).and_then(integer) else {
            tracing::warn!(%url, "skipping dropdown entry without id");
            continue;
        };
        options.push(SelectableOption {
            id: OptionId::new(id),
            label: pick(record, schema.label).and_then(text).unwrap_or_default(),
            secondary_key: pick(record, schema.secondary).and_then(integer),
        });
    }
    Ok(options)
}

/// Maps a detail/list payload. Ids are unique within the returned set.
pub fn map_rows(url: &str, data: &Value, schema: &RecordSchema) -> Result<Vec<DetailRow>, GatewayError> {
    let records = records(url, data)?;
    let mut seen = BTreeSet::new();
    let mut rows = Vec::with_capacity(records.len());
    for (position, record) in records.into_iter().enumerate() {
        let mut row = map_record(record, schema, position);
        if !seen.insert(row.id.clone()) {
            let mut suffix = 2;
            loop {
                let candidate = RowId::new(format!("{}#{suffix}", row.id));
                if seen.insert(candidate.clone()) {
                    tracing::warn!(%url, id = %row.id, "duplicate row id from backend");
                    row.id = candidate;
                    break;
                }
                suffix += 1;
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Maps a single-record payload such as a prefill response; accepts either
/// an object or a one-element array.
pub fn map_single(url: &str, data: &Value, schema: &RecordSchema) -> Result<DetailRow, GatewayError> {
    let record = match data {
        Value::Object(record) => record,
        Value::Array(items) => match items.first() {
            Some(Value::Object(record)) => record,
            _ => return Err(GatewayError::malformed(url, "expected one record, got none")),
        },
        _ => return Err(GatewayError::malformed(url, "expected a record object")),
    };
    Ok(map_record(record, schema, 0))
}

pub fn map_record(record: &Map<String, Value>, schema: &RecordSchema, position: usize) -> DetailRow {
    let id = pick(record, schema.id)
        .and_then(text)
        .filter(|id| !id.trim().is_empty())
        .map(|id| id.trim().to_owned())
        .unwrap_or_else(|| format!("row-{}", position + 1));

    let mut row = DetailRow::placeholder(id);
    row.display_name = pick(record, schema.name).and_then(text).unwrap_or_default();
    row.description = pick(record, schema.description)
        .and_then(text)
        .unwrap_or_default();
    row.status = pick(record, schema.status)
        .map(status)
        .unwrap_or(RowStatus::Inactive);
    row.created_at = pick(record, schema.created).and_then(timestamp);
    row.updated_at = pick(record, schema.updated).and_then(timestamp);
    for link in schema.links {
        let value = pick(record, link.sources)
            .and_then(link_value)
            .unwrap_or_else(|| LinkValue::Text(String::new()));
        row.links.insert(link.key.to_owned(), value);
    }
    row
}

fn records<'a>(url: &str, data: &'a Value) -> Result<Vec<&'a Map<String, Value>>, GatewayError> {
    match data {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_object().ok_or_else(|| {
                    GatewayError::malformed(url, format!("entry {index} is not an object"))
                })
            })
            .collect(),
        _ => Err(GatewayError::malformed(url, "expected a list in data")),
    }
}

fn pick<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(value) => Some(value.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0)
                .map(|float| float as i64)
        }),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn status(value: &Value) -> RowStatus {
    match value {
        Value::Bool(flag) => RowStatus::from_flag(*flag),
        other => text(other)
            .and_then(|raw| RowStatus::parse(&raw))
            .unwrap_or(RowStatus::Inactive),
    }
}

fn link_value(value: &Value) -> Option<LinkValue> {
    match value {
        Value::Bool(flag) => Some(LinkValue::Number(i64::from(*flag))),
        Value::Number(number) => Some(match number.as_i64() {
            Some(integer) => LinkValue::Number(integer),
            None => LinkValue::Text(number.to_string()),
        }),
        Value::String(raw) => Some(LinkValue::Text(raw.clone())),
        _ => None,
    }
}

fn timestamp(value: &Value) -> Option<OffsetDateTime> {
    match value {
        Value::Number(number) => {
            let raw = number.as_i64()?;
            // values beyond year 5138 in seconds are epoch milliseconds
            let seconds = if raw.abs() >= 100_000_000_000 { raw / 1000 } else { raw };
            OffsetDateTime::from_unix_timestamp(seconds).ok()
        }
        Value::String(raw) => parse_timestamp(raw),
        _ => None,
    }
}

pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed);
    }
    if let Ok(parsed) = PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Some(parsed.assume_utc());
    }
    if let Ok(parsed) = PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(parsed.assume_utc());
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}

#[cfg(test)]
mod tests {
    use super::{
        ACT_OPTION, DOCUMENT, EVENT_OPTION, STATE, map_options, map_rows, map_single,
        parse_timestamp,
    };
    use crate::GatewayError;
    use regdesk_app::{LinkValue, OptionId, RowStatus};
    use serde_json::json;
    use time::macros::datetime;

    const URL: &str = "https://backend.test/documentMaster/getDocumentList?id=42";

    #[test]
    fn document_record_maps_serial_and_docname() -> Result<(), GatewayError> {
        let rows = map_rows(URL, &json!([{"sr": 1, "docname": "Form A", "status": 1}]), &DOCUMENT)?;
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.id.as_str(), "1");
        assert_eq!(row.display_name, "Form A");
        assert_eq!(row.status, RowStatus::Active);
        assert_eq!(row.status.label(), "Active");
        Ok(())
    }

    #[test]
    fn missing_fields_become_placeholders() -> Result<(), GatewayError> {
        let rows = map_rows(URL, &json!([{"id": 9, "docname": null}]), &DOCUMENT)?;
        let row = &rows[0];
        assert_eq!(row.display_name, "");
        assert_eq!(row.description, "");
        assert_eq!(row.status, RowStatus::Inactive);
        assert!(row.created_at.is_none());
        assert_eq!(row.links.get("act"), Some(&LinkValue::Text(String::new())));
        assert_eq!(row.links.get("url"), Some(&LinkValue::Text(String::new())));
        Ok(())
    }

    #[test]
    fn rows_without_ids_get_positional_ids_and_duplicates_are_suffixed() -> Result<(), GatewayError>
    {
        let rows = map_rows(
            URL,
            &json!([{"docname": "a"}, {"id": 5}, {"id": "5"}, {"id": 5}]),
            &DOCUMENT,
        )?;
        let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec!["row-1", "5", "5#2", "5#3"]);
        Ok(())
    }

    #[test]
    fn null_data_is_an_empty_list() -> Result<(), GatewayError> {
        assert!(map_rows(URL, &json!(null), &DOCUMENT)?.is_empty());
        Ok(())
    }

    #[test]
    fn wrongly_shaped_data_is_malformed() {
        for data in [json!({"id": 1}), json!("rows"), json!([1, 2])] {
            let error = map_rows(URL, &data, &DOCUMENT).expect_err("shape mismatch");
            assert!(matches!(error, GatewayError::MalformedResponse { .. }));
        }
    }

    #[test]
    fn act_options_carry_secondary_key() -> Result<(), GatewayError> {
        let options = map_options(
            URL,
            &json!([
                {"id": 42, "actId": 7, "name": "Factories Act"},
                {"actId": 8, "name": "no id"},
                {"id": "43", "name": "Shops Act"}
            ]),
            &ACT_OPTION,
        )?;
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].id, OptionId::new(42));
        assert_eq!(options[0].secondary_key, Some(7));
        assert_eq!(options[1].id, OptionId::new(43));
        assert_eq!(options[1].secondary_key, None);
        Ok(())
    }

    #[test]
    fn event_options_read_event_name() -> Result<(), GatewayError> {
        let options = map_options(URL, &json!([{"event_id": 3, "event_name": "AGM"}]), &EVENT_OPTION)?;
        assert_eq!(options[0].label, "AGM");
        Ok(())
    }

    #[test]
    fn state_prefill_accepts_object_or_singleton_list() -> Result<(), GatewayError> {
        let record = json!({"id": 4, "name": "Goa", "short_name": "GA", "status": "1"});
        let from_object = map_single(URL, &record, &STATE)?;
        let from_list = map_single(URL, &json!([record]), &STATE)?;
        assert_eq!(from_object, from_list);
        assert_eq!(
            from_object.links.get("short_name"),
            Some(&LinkValue::Text("GA".to_owned()))
        );
        assert!(map_single(URL, &json!([]), &STATE).is_err());
        Ok(())
    }

    #[test]
    fn timestamps_parse_common_backend_formats() {
        assert_eq!(
            parse_timestamp("2025-03-01T10:20:30.000Z"),
            Some(datetime!(2025-03-01 10:20:30 UTC))
        );
        assert_eq!(
            parse_timestamp("2025-03-01 10:20:30"),
            Some(datetime!(2025-03-01 10:20:30 UTC))
        );
        assert_eq!(
            parse_timestamp("2025-03-01"),
            Some(datetime!(2025-03-01 00:00:00 UTC))
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
