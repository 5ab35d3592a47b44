// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use regdesk_app::{
    DashboardCounts, DetailRow, EntityKind, FormPayload, MutationRequest, OperationKind,
    OptionId, RowId, SelectableOption,
};
use serde_json::{Map, Value};

use crate::endpoints::{self, DetailKey, endpoints_for};
use crate::schema::{self, map_options, map_rows, map_single};
use crate::{Backend, GatewayError, Method, UploadFile};

pub fn fetch_options(
    backend: &dyn Backend,
    entity: EntityKind,
) -> Result<Vec<SelectableOption>, GatewayError> {
    let endpoints = endpoints_for(entity);
    let Some(path) = endpoints.options else {
        return Ok(Vec::new());
    };
    let data = backend.request(Method::Get, path, None, &[])?;
    map_options(path, &data, endpoints.option_schema)
}

/// Loads the detail rows of `entity`. Screens keyed by a selected option
/// return nothing until one is chosen.
pub fn fetch_details(
    backend: &dyn Backend,
    entity: EntityKind,
    option: Option<OptionId>,
) -> Result<Vec<DetailRow>, GatewayError> {
    let endpoints = endpoints_for(entity);
    let details = endpoints.details;
    let data = match (details.key, option) {
        (DetailKey::None, _) => backend.request(details.method, details.path, None, &[])?,
        (DetailKey::Query(name), Some(id)) => backend.request(
            details.method,
            details.path,
            None,
            &[(name, id.get().to_string())],
        )?,
        (DetailKey::Body(name), Some(id)) => {
            let mut body = Map::new();
            body.insert(name.to_owned(), Value::from(id.get()));
            backend.request(details.method, details.path, Some(&Value::Object(body)), &[])?
        }
        (DetailKey::Query(_) | DetailKey::Body(_), None) => return Ok(Vec::new()),
    };
    map_rows(details.path, &data, endpoints.record_schema)
}

pub fn fetch_state_prefill(backend: &dyn Backend, id: &RowId) -> Result<DetailRow, GatewayError> {
    let endpoints = endpoints_for(EntityKind::States);
    let path = endpoints.prefill.unwrap_or("/stateMaster/statePrefill");
    let data = backend.request(Method::Get, path, None, &[("id", id.to_string())])?;
    map_single(path, &data, endpoints.record_schema)
}

/// Sends a dialog mutation to the endpoint that owns it. Deletes go to the
/// entity's remove endpoint; bulk uploads travel as multipart.
pub fn submit_mutation(
    backend: &dyn Backend,
    entity: EntityKind,
    request: &MutationRequest,
    payload: Option<&FormPayload>,
) -> Result<Value, GatewayError> {
    if request.operation == OperationKind::Delete {
        let Some(path) = endpoints_for(entity).delete else {
            return Err(GatewayError::backend(
                None,
                Some(&format!("{} cannot be deleted from this client", entity.label())),
            ));
        };
        return backend.request(Method::Post, path, Some(&request.body()), &[]);
    }

    match payload {
        Some(FormPayload::BulkUpload(input)) => {
            let (key, value) = endpoints::BULK_COMPLIANCE_SOURCE;
            backend.upload(
                endpoints::BULK_COMPLIANCE_UPLOAD,
                &[(key, value.to_owned())],
                &UploadFile {
                    file_name: &input.file_name,
                    data: &input.data,
                },
            )
        }
        Some(payload) => backend.request(
            Method::Post,
            endpoints::save_path(payload.kind()),
            Some(&request.body()),
            &[],
        ),
        None => Err(GatewayError::backend(
            None,
            Some(&format!("nothing to {} -- open a form first", request.operation.as_str())),
        )),
    }
}

pub fn fetch_dashboard(backend: &dyn Backend) -> Result<DashboardCounts, GatewayError> {
    let data = backend.request(Method::Get, endpoints::DASHBOARD, None, &[])?;
    if data.is_null() {
        return Ok(DashboardCounts::default());
    }
    serde_json::from_value(data)
        .map_err(|error| GatewayError::malformed(endpoints::DASHBOARD, error.to_string()))
}

pub fn fetch_news(backend: &dyn Backend) -> Result<Vec<DetailRow>, GatewayError> {
    let data = backend.request(Method::Get, endpoints::ACT_NEWS_URLS, None, &[])?;
    map_rows(endpoints::ACT_NEWS_URLS, &data, &schema::NEWS)
}

pub fn download_sample_excel(backend: &dyn Backend) -> Result<Vec<u8>, GatewayError> {
    backend.download(endpoints::SAMPLE_EXCEL)
}
