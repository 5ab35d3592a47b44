// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use regdesk_app::{EntityKind, FormKind};

use crate::Method;
use crate::schema::{self, OptionSchema, RecordSchema};

pub const DASHBOARD: &str = "/dashboard";
pub const ACT_NEWS_URLS: &str = "/actMaster/newsUrl";
pub const BULK_COMPLIANCE_UPLOAD: &str = "/complianceMaster/addBulkCompliance";
pub const BULK_COMPLIANCE_SOURCE: (&str, &str) = ("from", "compliance");
pub const SAMPLE_EXCEL: &str = "/complianceMaster/downloadSampleExcel";

/// How the selected option id travels to the detail endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailKey {
    None,
    Query(&'static str),
    Body(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailEndpoint {
    pub method: Method,
    pub path: &'static str,
    pub key: DetailKey,
}

/// Backend contract for one master-data screen.
#[derive(Debug, Clone, Copy)]
pub struct EntityEndpoints {
    pub entity: EntityKind,
    pub options: Option<&'static str>,
    pub option_schema: &'static OptionSchema,
    pub details: DetailEndpoint,
    pub record_schema: &'static RecordSchema,
    pub delete: Option<&'static str>,
    pub prefill: Option<&'static str>,
}

impl EntityEndpoints {
    pub const fn has_option_step(&self) -> bool {
        self.options.is_some()
    }
}

pub fn endpoints_for(entity: EntityKind) -> EntityEndpoints {
    match entity {
        EntityKind::Acts => EntityEndpoints {
            entity,
            options: Some("/actMaster/getInternationalActDrop"),
            option_schema: &schema::ACT_OPTION,
            details: DetailEndpoint {
                method: Method::Get,
                path: "/actMaster/getInternationalAct",
                key: DetailKey::Query("id"),
            },
            record_schema: &schema::ACT_DETAIL,
            delete: None,
            prefill: None,
        },
        EntityKind::Documents => EntityEndpoints {
            entity,
            options: Some("/documentMaster/getDocumentActDrop"),
            option_schema: &schema::ACT_OPTION,
            details: DetailEndpoint {
                method: Method::Get,
                path: "/documentMaster/getDocumentList",
                key: DetailKey::Query("id"),
            },
            record_schema: &schema::DOCUMENT,
            delete: Some("/documentMaster/removeDocument"),
            prefill: None,
        },
        EntityKind::Forms => EntityEndpoints {
            entity,
            options: Some("/formMaster/getFormActDrop"),
            option_schema: &schema::ACT_OPTION,
            details: DetailEndpoint {
                method: Method::Get,
                path: "/formMaster/getFormList",
                key: DetailKey::Query("id"),
            },
            record_schema: &schema::FORM,
            delete: Some("/formMaster/removeForm"),
            prefill: None,
        },
        EntityKind::Events => EntityEndpoints {
            entity,
            options: Some("/eventMaster/getEventInfoDrop"),
            option_schema: &schema::EVENT_OPTION,
            details: DetailEndpoint {
                method: Method::Post,
                path: "/eventMaster/getCompanyEventList",
                key: DetailKey::Body("event"),
            },
            record_schema: &schema::EVENT,
            delete: None,
            prefill: None,
        },
        EntityKind::States => EntityEndpoints {
            entity,
            options: None,
            option_schema: &schema::ACT_OPTION,
            details: DetailEndpoint {
                method: Method::Get,
                path: "/stateMaster/getStateMasterList",
                key: DetailKey::None,
            },
            record_schema: &schema::STATE,
            delete: Some("/stateMaster/removeState"),
            prefill: Some("/stateMaster/statePrefill"),
        },
        EntityKind::Categories => EntityEndpoints {
            entity,
            options: None,
            option_schema: &schema::ACT_OPTION,
            details: DetailEndpoint {
                method: Method::Get,
                path: "/categoryMaster/getCategoryList",
                key: DetailKey::None,
            },
            record_schema: &schema::CATEGORY,
            delete: Some("/categoryMaster/removeCategory"),
            prefill: None,
        },
    }
}

/// Save endpoint for a dialog form. Bulk compliance goes through the
/// multipart upload path instead of a JSON body.
pub const fn save_path(form: FormKind) -> &'static str {
    match form {
        FormKind::State => "/stateMaster/createStateMaster",
        FormKind::Category => "/categoryMaster/createCategory",
        FormKind::ActCategory => "/actMaster/actCategory",
        FormKind::CopyLibrary => "/documentMaster/copyLibrary",
        FormKind::MergeActName => "/documentMaster/mergeActName",
        FormKind::BulkCompliance => BULK_COMPLIANCE_UPLOAD,
    }
}
