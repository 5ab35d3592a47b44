// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use regdesk_gateway::{Backend, GatewayError, Method, UploadFile};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::{ComplianceFaker, backend_timestamp};

pub const SAMPLE_EXCEL: &[u8] = b"PK\x03\x04regdesk-sample-compliance.xlsx";

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
    pub file_name: Option<String>,
}

impl RecordedCall {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Default)]
struct Store {
    acts: Vec<Value>,
    act_details: BTreeMap<i64, Vec<Value>>,
    documents: BTreeMap<i64, Vec<Value>>,
    forms: BTreeMap<i64, Vec<Value>>,
    event_options: Vec<Value>,
    events: BTreeMap<i64, Vec<Value>>,
    states: Vec<Value>,
    categories: Vec<Value>,
    news: Vec<Value>,
    uploads: usize,
    next_id: i64,
}

#[derive(Debug, Default)]
struct MockState {
    store: Store,
    calls: Vec<RecordedCall>,
    failures: BTreeMap<String, VecDeque<GatewayError>>,
    canned: BTreeMap<String, Value>,
}

/// In-memory stand-in for the compliance backend. Records every call,
/// serves seeded master data, applies mutations, and can be told to fail.
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
    latency: Option<Duration>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Realistic master data for demos and workflow tests.
    pub fn seeded(seed: u64) -> Self {
        let mut faker = ComplianceFaker::new(seed);
        let mut store = Store {
            acts: faker.act_options(8),
            event_options: faker.event_options(),
            states: faker.states(),
            categories: faker.categories(),
            news: faker.news(6),
            next_id: 1000,
            ..Store::default()
        };

        let mut next_sr = 1;
        let mut next_form = 1;
        for act in store.acts.clone() {
            let Some(id) = act.get("id").and_then(Value::as_i64) else {
                continue;
            };
            let name = act.get("name").and_then(Value::as_str).unwrap_or_default();
            store.act_details.insert(id, faker.act_details(id, name));
            // the first act has enough documents to span pages
            let documents = if id == 1 { 23 } else { faker.int_range(3, 14) as usize };
            store
                .documents
                .insert(id, faker.documents(name, next_sr, documents));
            next_sr += documents as i64;
            let forms = faker.int_range(2, 6) as usize;
            store.forms.insert(id, faker.forms(name, next_form, forms));
            next_form += forms as i64;
        }
        let mut next_event = 1;
        for option in store.event_options.clone() {
            let Some(id) = option.get("id").and_then(Value::as_i64) else {
                continue;
            };
            let count = faker.int_range(4, 12) as usize;
            store.events.insert(id, faker.company_events(next_event, count));
            next_event += count as i64;
        }

        Self {
            state: Mutex::new(MockState {
                store,
                ..MockState::default()
            }),
            latency: None,
        }
    }

    /// Sleeps before every answer so front ends can show loading states.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.path == path)
            .cloned()
            .collect()
    }

    /// Makes the next call to `path` fail with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, path: &str, error: GatewayError) {
        self.lock()
            .failures
            .entry(path.to_owned())
            .or_default()
            .push_back(error);
    }

    /// Serves `data` for every call to `path`, bypassing the seeded store.
    pub fn respond_with(&self, path: &str, data: Value) {
        self.lock().canned.insert(path.to_owned(), data);
    }

    pub fn set_acts(&self, acts: Vec<Value>) {
        self.lock().store.acts = acts;
    }

    pub fn set_documents(&self, act_id: i64, documents: Vec<Value>) {
        self.lock().store.documents.insert(act_id, documents);
    }

    pub fn uploads(&self) -> usize {
        self.lock().store.uploads
    }

    fn pause(&self) {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
    }
}

impl Backend for MockBackend {
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<Value, GatewayError> {
        self.pause();
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            method,
            path: path.to_owned(),
            body: body.cloned(),
            query: query
                .iter()
                .map(|(key, value)| ((*key).to_owned(), value.clone()))
                .collect(),
            file_name: None,
        });
        if let Some(error) = state.take_failure(path) {
            return Err(error);
        }
        if let Some(data) = state.canned.get(path) {
            return Ok(data.clone());
        }
        let empty = Value::Object(Map::new());
        let body = body.unwrap_or(&empty);
        state.store.route(method, path, body, query)
    }

    fn upload(
        &self,
        path: &str,
        query: &[(&str, String)],
        file: &UploadFile<'_>,
    ) -> Result<Value, GatewayError> {
        self.pause();
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            method: Method::Post,
            path: path.to_owned(),
            body: None,
            query: query
                .iter()
                .map(|(key, value)| ((*key).to_owned(), value.clone()))
                .collect(),
            file_name: Some(file.file_name.to_owned()),
        });
        if let Some(error) = state.take_failure(path) {
            return Err(error);
        }
        if path != "/complianceMaster/addBulkCompliance" {
            return Err(not_found(Method::Post, path));
        }
        if file.data.is_empty() {
            return Err(GatewayError::backend(Some(400), Some("uploaded file is empty")));
        }
        state.store.uploads += 1;
        Ok(Value::Null)
    }

    fn download(&self, path: &str) -> Result<Vec<u8>, GatewayError> {
        self.pause();
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            method: Method::Get,
            path: path.to_owned(),
            body: None,
            query: Vec::new(),
            file_name: None,
        });
        if let Some(error) = state.take_failure(path) {
            return Err(error);
        }
        if path == "/complianceMaster/downloadSampleExcel" {
            Ok(SAMPLE_EXCEL.to_vec())
        } else {
            Err(not_found(Method::Get, path))
        }
    }
}

impl MockState {
    fn take_failure(&mut self, path: &str) -> Option<GatewayError> {
        self.failures.get_mut(path).and_then(VecDeque::pop_front)
    }
}

impl Store {
    fn route(
        &mut self,
        method: Method,
        path: &str,
        body: &Value,
        query: &[(&str, String)],
    ) -> Result<Value, GatewayError> {
        let query_id = query
            .iter()
            .find(|(key, _)| *key == "id")
            .and_then(|(_, value)| value.parse::<i64>().ok());

        match (method, path) {
            (Method::Get, "/dashboard") => Ok(self.dashboard()),
            (
                Method::Get,
                "/actMaster/getInternationalActDrop"
                | "/documentMaster/getDocumentActDrop"
                | "/formMaster/getFormActDrop",
            ) => Ok(Value::Array(self.acts.clone())),
            (Method::Get, "/actMaster/getInternationalAct") => {
                Ok(keyed(&self.act_details, query_id))
            }
            (Method::Get, "/actMaster/newsUrl") => Ok(Value::Array(self.news.clone())),
            (Method::Post, "/actMaster/actCategory") => self.assign_category(body),
            (Method::Get, "/documentMaster/getDocumentList") => {
                Ok(keyed(&self.documents, query_id))
            }
            (Method::Post, "/documentMaster/removeDocument") => {
                let id = body_id(body)?;
                remove_keyed(&mut self.documents, &["sr", "id"], id, "document")
            }
            (Method::Post, "/documentMaster/copyLibrary") => self.copy_library(body),
            (Method::Post, "/documentMaster/mergeActName") => self.merge_act_name(body),
            (Method::Get, "/formMaster/getFormList") => Ok(keyed(&self.forms, query_id)),
            (Method::Post, "/formMaster/removeForm") => {
                let id = body_id(body)?;
                remove_keyed(&mut self.forms, &["id"], id, "form")
            }
            (Method::Get, "/eventMaster/getEventInfoDrop") => {
                Ok(Value::Array(self.event_options.clone()))
            }
            (Method::Post, "/eventMaster/getCompanyEventList") => {
                let event = body.get("event").and_then(as_i64);
                Ok(keyed(&self.events, event))
            }
            (Method::Get, "/stateMaster/getStateMasterList") => {
                Ok(Value::Array(self.states.clone()))
            }
            (Method::Get, "/stateMaster/statePrefill") => {
                let Some(id) = query_id else {
                    return Err(GatewayError::backend(Some(400), Some("id is required")));
                };
                self.states
                    .iter()
                    .find(|record| record_id(record, &["id"]) == Some(id))
                    .cloned()
                    .ok_or_else(|| GatewayError::backend(Some(404), Some("State not found")))
            }
            (Method::Post, "/stateMaster/createStateMaster") => {
                self.save_named(body, &["short_name"], "State")
            }
            (Method::Post, "/stateMaster/removeState") => {
                let id = body_id(body)?;
                remove_from(&mut self.states, id, "State")
            }
            (Method::Get, "/categoryMaster/getCategoryList") => {
                Ok(Value::Array(self.categories.clone()))
            }
            (Method::Post, "/categoryMaster/createCategory") => {
                self.save_named(body, &["description"], "Category")
            }
            (Method::Post, "/categoryMaster/removeCategory") => {
                let id = body_id(body)?;
                remove_from(&mut self.categories, id, "Category")
            }
            _ => Err(not_found(method, path)),
        }
    }

    fn dashboard(&self) -> Value {
        let count = |map: &BTreeMap<i64, Vec<Value>>| map.values().map(Vec::len).sum::<usize>();
        json!({
            "acts": self.acts.len(),
            "compliances": count(&self.events),
            "documents": count(&self.documents),
            "forms": count(&self.forms),
            "states": self.states.len(),
            "events": self.event_options.len(),
        })
    }

    /// Create or update for the `{edit, name, ...}` master forms. The
    /// backend rejects duplicate names on create.
    fn save_named(&mut self, body: &Value, extra: &[&str], label: &str) -> Result<Value, GatewayError> {
        let table = if label == "State" {
            &mut self.states
        } else {
            &mut self.categories
        };
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if name.is_empty() {
            return Err(GatewayError::backend(Some(400), Some(&format!("{label} name is required"))));
        }
        let edit = body.get("edit").and_then(Value::as_bool).unwrap_or(false);
        let now = backend_timestamp(time::OffsetDateTime::now_utc());

        if edit {
            let id = body_id(body)?;
            let Some(record) = table
                .iter_mut()
                .find(|record| record_id(record, &["id"]) == Some(id))
            else {
                return Err(GatewayError::backend(Some(404), Some(&format!("{label} not found"))));
            };
            if let Some(fields) = record.as_object_mut() {
                fields.insert("name".to_owned(), json!(name));
                for key in extra.iter().chain(&["status"]) {
                    if let Some(value) = body.get(*key) {
                        fields.insert((*key).to_owned(), value.clone());
                    }
                }
                fields.insert("updatedAt".to_owned(), json!(now));
            }
            return Ok(Value::Null);
        }

        let duplicate = table.iter().any(|record| {
            record
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|existing| existing.eq_ignore_ascii_case(name))
        });
        if duplicate {
            return Err(GatewayError::backend(
                Some(409),
                Some(&format!("{label} already exists")),
            ));
        }

        self.next_id += 1;
        let mut record = Map::new();
        record.insert("id".to_owned(), json!(self.next_id));
        record.insert("name".to_owned(), json!(name));
        for key in extra.iter().chain(&["status"]) {
            if let Some(value) = body.get(*key) {
                record.insert((*key).to_owned(), value.clone());
            }
        }
        record.insert("createdAt".to_owned(), json!(now));
        record.insert("updatedAt".to_owned(), json!(now));
        table.push(Value::Object(record));
        Ok(json!({"id": self.next_id}))
    }

    fn assign_category(&mut self, body: &Value) -> Result<Value, GatewayError> {
        let url = required_text(body, "url")?;
        let tax = required_text(body, "tax")?;
        let mut touched = false;
        for record in self.act_details.values_mut().flatten() {
            if record.get("url").and_then(Value::as_str) == Some(url.as_str())
                && let Some(fields) = record.as_object_mut()
            {
                fields.insert("category".to_owned(), json!(tax));
                touched = true;
            }
        }
        if touched {
            Ok(Value::Null)
        } else {
            Err(GatewayError::backend(Some(404), Some("no act matches that url")))
        }
    }

    fn copy_library(&mut self, body: &Value) -> Result<Value, GatewayError> {
        let from = body.get("fromAct").and_then(as_i64);
        let to = body.get("toAct").and_then(as_i64);
        let (Some(from), Some(to)) = (from, to) else {
            return Err(GatewayError::backend(Some(400), Some("fromAct and toAct are required")));
        };
        if from == to {
            return Err(GatewayError::backend(
                Some(400),
                Some("source and target act must differ"),
            ));
        }
        let source = self.documents.get(&from).cloned().unwrap_or_default();
        let target_name = self
            .acts
            .iter()
            .find(|act| record_id(act, &["id"]) == Some(to))
            .and_then(|act| act.get("name").and_then(Value::as_str))
            .unwrap_or_default()
            .to_owned();
        let mut copied = 0;
        for mut document in source {
            self.next_id += 1;
            if let Some(fields) = document.as_object_mut() {
                fields.insert("sr".to_owned(), json!(self.next_id));
                fields.insert("actName".to_owned(), json!(target_name));
            }
            self.documents.entry(to).or_default().push(document);
            copied += 1;
        }
        Ok(json!({"copied": copied}))
    }

    fn merge_act_name(&mut self, body: &Value) -> Result<Value, GatewayError> {
        let url = required_text(body, "url")?;
        let act_name = required_text(body, "actName")?;
        let mut merged = 0;
        for record in self.documents.values_mut().flatten() {
            if record.get("url").and_then(Value::as_str) == Some(url.as_str())
                && let Some(fields) = record.as_object_mut()
            {
                fields.insert("actName".to_owned(), json!(act_name));
                merged += 1;
            }
        }
        Ok(json!({"merged": merged}))
    }
}

fn keyed(map: &BTreeMap<i64, Vec<Value>>, id: Option<i64>) -> Value {
    id.and_then(|id| map.get(&id))
        .map(|records| Value::Array(records.clone()))
        .unwrap_or_else(|| Value::Array(Vec::new()))
}

fn remove_keyed(
    map: &mut BTreeMap<i64, Vec<Value>>,
    keys: &[&str],
    id: i64,
    label: &str,
) -> Result<Value, GatewayError> {
    for records in map.values_mut() {
        if let Some(index) = records
            .iter()
            .position(|record| record_id(record, keys) == Some(id))
        {
            records.remove(index);
            return Ok(Value::Null);
        }
    }
    Err(GatewayError::backend(Some(404), Some(&format!("{label} not found"))))
}

fn remove_from(records: &mut Vec<Value>, id: i64, label: &str) -> Result<Value, GatewayError> {
    match records
        .iter()
        .position(|record| record_id(record, &["id"]) == Some(id))
    {
        Some(index) => {
            records.remove(index);
            Ok(Value::Null)
        }
        None => Err(GatewayError::backend(Some(404), Some(&format!("{label} not found")))),
    }
}

fn record_id(record: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| record.get(*key).and_then(as_i64))
}

fn body_id(body: &Value) -> Result<i64, GatewayError> {
    body.get("id")
        .and_then(as_i64)
        .ok_or_else(|| GatewayError::backend(Some(400), Some("id is required")))
}

fn required_text(body: &Value, key: &str) -> Result<String, GatewayError> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| GatewayError::backend(Some(400), Some(&format!("{key} is required"))))
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn not_found(method: Method, path: &str) -> GatewayError {
    tracing::warn!(method = method.as_str(), path, "mock backend has no route");
    GatewayError::backend(Some(404), Some(&format!("no route for {} {path}", method.as_str())))
}

#[cfg(test)]
mod tests {
    use super::{MockBackend, SAMPLE_EXCEL};
    use regdesk_gateway::{Backend, GatewayError, Method, UploadFile};
    use serde_json::{Value, json};

    #[test]
    fn seeded_backend_serves_paged_document_list() -> Result<(), GatewayError> {
        let backend = MockBackend::seeded(1);
        let data = backend.request(
            Method::Get,
            "/documentMaster/getDocumentList",
            None,
            &[("id", "1".to_owned())],
        )?;
        assert_eq!(data.as_array().map(Vec::len), Some(23));
        assert_eq!(backend.calls().len(), 1);
        Ok(())
    }

    #[test]
    fn duplicate_state_is_rejected() {
        let backend = MockBackend::seeded(1);
        let body = json!({"edit": false, "name": "maharashtra", "short_name": "MH", "status": 1});
        let error = backend
            .request(Method::Post, "/stateMaster/createStateMaster", Some(&body), &[])
            .expect_err("duplicate name");
        assert_eq!(error.to_string(), "State already exists");
    }

    #[test]
    fn queued_failure_is_consumed_once() -> Result<(), GatewayError> {
        let backend = MockBackend::seeded(1);
        backend.fail_next(
            "/dashboard",
            GatewayError::Network {
                url: "mock://dashboard".to_owned(),
                detail: "connection refused".to_owned(),
            },
        );
        assert!(backend.request(Method::Get, "/dashboard", None, &[]).is_err());
        let counts = backend.request(Method::Get, "/dashboard", None, &[])?;
        assert_eq!(counts["states"], 12);
        Ok(())
    }

    #[test]
    fn canned_response_overrides_seeded_store() -> Result<(), GatewayError> {
        let backend = MockBackend::seeded(1);
        backend.respond_with("/stateMaster/getStateMasterList", json!([{"name": "Goa"}]));
        let data = backend.request(Method::Get, "/stateMaster/getStateMasterList", None, &[])?;
        assert_eq!(data, json!([{"name": "Goa"}]));
        Ok(())
    }

    #[test]
    fn unknown_route_is_a_backend_error() {
        let backend = MockBackend::new();
        let error = backend
            .request(Method::Get, "/nowhere", None, &[])
            .expect_err("no route");
        assert!(matches!(error, GatewayError::Backend { status: Some(404), .. }));
    }

    #[test]
    fn upload_and_download() -> Result<(), GatewayError> {
        let backend = MockBackend::new();
        let data = backend.upload(
            "/complianceMaster/addBulkCompliance",
            &[("from", "compliance".to_owned())],
            &UploadFile {
                file_name: "bulk.xlsx",
                data: b"rows",
            },
        )?;
        assert_eq!(data, Value::Null);
        assert_eq!(backend.uploads(), 1);
        assert_eq!(
            backend.calls()[0].query_value("from"),
            Some("compliance")
        );
        assert_eq!(
            backend.download("/complianceMaster/downloadSampleExcel")?,
            SAMPLE_EXCEL
        );
        Ok(())
    }

    #[test]
    fn copy_library_duplicates_documents_into_target_act() -> Result<(), GatewayError> {
        let backend = MockBackend::new();
        backend.set_acts(vec![
            json!({"id": 1, "name": "Factories Act"}),
            json!({"id": 2, "name": "Shops Act"}),
        ]);
        backend.set_documents(1, vec![json!({"sr": 1, "docname": "Register"})]);
        backend.request(
            Method::Post,
            "/documentMaster/copyLibrary",
            Some(&json!({"fromAct": 1, "toAct": 2})),
            &[],
        )?;
        let copied = backend.request(
            Method::Get,
            "/documentMaster/getDocumentList",
            None,
            &[("id", "2".to_owned())],
        )?;
        assert_eq!(copied[0]["docname"], "Register");
        assert_eq!(copied[0]["actName"], "Shops Act");
        Ok(())
    }
}
