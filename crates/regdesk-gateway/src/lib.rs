// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod api;
pub mod endpoints;
mod envelope;
mod error;
pub mod schema;

pub use api::*;
pub use envelope::{clean_error_response, unwrap_envelope};
pub use error::{GENERIC_FAILURE, GatewayError};

use anyhow::{Context, Result, bail};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::{Duration, Instant};
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// One file part of a multipart upload.
#[derive(Debug, Clone, Copy)]
pub struct UploadFile<'a> {
    pub file_name: &'a str,
    pub data: &'a [u8],
}

/// Transport seam between controllers and the compliance backend. Every
/// call is blocking; callers that must stay responsive run it on a worker
/// thread.
pub trait Backend: Send + Sync {
    /// Sends a JSON request and returns the envelope's `data`.
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<Value, GatewayError>;

    /// Posts `file` as the multipart part named `file`.
    fn upload(
        &self,
        path: &str,
        query: &[(&str, String)],
        file: &UploadFile<'_>,
    ) -> Result<Value, GatewayError>;

    /// Fetches a non-JSON resource.
    fn download(&self, path: &str) -> Result<Vec<u8>, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOptions {
    pub base_url: String,
    pub timeout: Duration,
    /// The compliance backend is commonly deployed with a self-signed
    /// certificate.
    pub accept_invalid_certs: bool,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:8443/api".to_owned(),
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl HttpGateway {
    pub fn new(options: &GatewayOptions) -> Result<Self> {
        let raw = options.base_url.trim();
        if raw.is_empty() {
            bail!("backend.base_url must not be empty -- set it in the config file");
        }
        let mut base_url = Url::parse(raw).with_context(|| {
            format!("parse backend.base_url {raw:?} -- use a full URL such as https://host/api")
        })?;
        if base_url.cannot_be_a_base() {
            bail!("backend.base_url {raw:?} cannot hold endpoint paths -- use an http(s) URL");
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = HttpClient::builder()
            .default_headers(headers)
            .user_agent(concat!("regdesk/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .timeout(options.timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout: options.timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolves an endpoint path against the base URL. Absolute URLs pass
    /// through untouched.
    pub fn resolve(&self, path: &str, query: &[(&str, String)]) -> Result<Url, GatewayError> {
        let joined = if path.starts_with("http://") || path.starts_with("https://") {
            Url::parse(path)
        } else {
            self.base_url.join(path.trim_start_matches('/'))
        };
        let mut url = joined.map_err(|error| GatewayError::InvalidUrl {
            url: path.to_owned(),
            detail: error.to_string(),
        })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn execute(&self, method: Method, url: &Url, builder: RequestBuilder) -> Result<Value, GatewayError> {
        let started = Instant::now();
        let response = builder
            .send()
            .map_err(|error| self.connection_error(url, &error))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|error| self.connection_error(url, &error))?;

        let result = unwrap_envelope(url.as_str(), status, &body);
        match &result {
            Ok(_) => tracing::debug!(
                method = method.as_str(),
                %url,
                status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "backend request ok"
            ),
            Err(error) => tracing::warn!(
                method = method.as_str(),
                %url,
                status,
                %error,
                "backend request failed"
            ),
        }
        result
    }

    fn connection_error(&self, url: &Url, error: &reqwest::Error) -> GatewayError {
        let detail = if error.is_timeout() {
            format!("timed out after {}s", self.timeout.as_secs_f32())
        } else {
            error.to_string()
        };
        tracing::warn!(%url, %detail, "backend unreachable");
        GatewayError::Network {
            url: url.to_string(),
            detail,
        }
    }
}

impl Backend for HttpGateway {
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<Value, GatewayError> {
        let url = self.resolve(path, query)?;
        let builder = match method {
            Method::Get => self.http.get(url.clone()),
            Method::Post => self.http.post(url.clone()),
        };
        let builder = match body {
            Some(body) => builder.json(body),
            None => builder,
        };
        self.execute(method, &url, builder)
    }

    fn upload(
        &self,
        path: &str,
        query: &[(&str, String)],
        file: &UploadFile<'_>,
    ) -> Result<Value, GatewayError> {
        let url = self.resolve(path, query)?;
        let part = Part::bytes(file.data.to_vec()).file_name(file.file_name.to_owned());
        let form = Form::new().part("file", part);
        tracing::debug!(%url, file = file.file_name, bytes = file.data.len(), "uploading file");
        let builder = self.http.post(url.clone()).multipart(form);
        self.execute(Method::Post, &url, builder)
    }

    fn download(&self, path: &str) -> Result<Vec<u8>, GatewayError> {
        let url = self.resolve(path, &[])?;
        let response = self
            .http
            .get(url.clone())
            .header(ACCEPT, "*/*")
            .send()
            .map_err(|error| self.connection_error(&url, &error))?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            let error = clean_error_response(status, &body);
            tracing::warn!(%url, status, %error, "download failed");
            return Err(error);
        }
        let bytes = response
            .bytes()
            .map_err(|error| self.connection_error(&url, &error))?;
        tracing::debug!(%url, bytes = bytes.len(), "download ok");
        Ok(bytes.to_vec())
    }
}
