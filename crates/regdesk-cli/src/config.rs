// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use regdesk_app::{DEFAULT_PAGE_SIZE, PAGE_SIZES};
use regdesk_gateway::GatewayOptions;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const APP_NAME: &str = "regdesk";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_BASE_URL: &str = "https://localhost:8443/api";
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_NOTIFICATION_TTL: &str = "4s";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            backend: BackendSection::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendSection {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub accept_invalid_certs: Option<bool>,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
            accept_invalid_certs: Some(true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub page_size: Option<usize>,
    pub notification_ttl: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            page_size: Some(DEFAULT_PAGE_SIZE),
            notification_ttl: Some(DEFAULT_NOTIFICATION_TTL.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub filter: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("REGDESK_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set REGDESK_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    /// Log file under the platform data directory. The terminal UI owns
    /// stdout, so logs never go there.
    pub fn log_path() -> Result<PathBuf> {
        let data_root = dirs::data_dir()
            .ok_or_else(|| anyhow!("cannot resolve data directory for the log file"))?;
        let app_dir = data_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create data directory {}", app_dir.display()))?;
        Ok(app_dir.join(format!("{APP_NAME}.log")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [backend], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let base_url = self.base_url();
        if base_url.is_empty() {
            bail!(
                "backend.base_url in {} must not be empty -- point it at the API root, e.g. {DEFAULT_BASE_URL}",
                path.display()
            );
        }
        if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
            bail!(
                "backend.base_url in {} must start with http:// or https://, got {base_url:?}",
                path.display()
            );
        }

        if let Some(timeout) = &self.backend.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "backend.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(page_size) = self.ui.page_size
            && !PAGE_SIZES.contains(&page_size)
        {
            bail!(
                "ui.page_size in {} must be one of 10, 25, or 50, got {}",
                path.display(),
                page_size
            );
        }

        if let Some(ttl) = &self.ui.notification_ttl {
            let parsed = parse_duration(ttl)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "ui.notification_ttl in {} must be positive, got {}",
                    path.display(),
                    ttl
                );
            }
        }

        if let Some(filter) = &self.log.filter {
            EnvFilter::try_new(filter).with_context(|| {
                format!(
                    "log.filter in {} is not a valid filter, got {filter:?}; try \"info\" or \"regdesk_gateway=debug\"",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.backend
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim()
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.backend.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn accept_invalid_certs(&self) -> bool {
        self.backend.accept_invalid_certs.unwrap_or(true)
    }

    pub fn gateway_options(&self) -> Result<GatewayOptions> {
        Ok(GatewayOptions {
            base_url: self.base_url().to_owned(),
            timeout: self.timeout()?,
            accept_invalid_certs: self.accept_invalid_certs(),
        })
    }

    pub fn page_size(&self) -> usize {
        self.ui.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn notification_ttl(&self) -> Result<Duration> {
        parse_duration(
            self.ui
                .notification_ttl
                .as_deref()
                .unwrap_or(DEFAULT_NOTIFICATION_TTL),
        )
    }

    pub fn log_filter(&self) -> &str {
        self.log.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# regdesk config\n# Place this file at: {}\n\nversion = 1\n\n[backend]\nbase_url = \"{}\"\ntimeout = \"{}\"\n# Most deployments use a self-signed certificate.\naccept_invalid_certs = true\n\n[ui]\n# One of 10, 25, 50.\npage_size = {}\nnotification_ttl = \"{}\"\n\n[log]\n# RUST_LOG overrides this.\nfilter = \"{}\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_TIMEOUT,
            DEFAULT_PAGE_SIZE,
            DEFAULT_NOTIFICATION_TTL,
            DEFAULT_LOG_FILTER,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use regdesk_testkit::temp_config_path;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let (temp, path) = temp_config_path()?;
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn absent_file_falls_back_to_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.base_url(), "https://localhost:8443/api");
        assert_eq!(config.timeout()?, Duration::from_secs(10));
        assert_eq!(config.page_size(), 10);
        assert_eq!(config.notification_ttl()?, Duration::from_secs(4));
        assert!(config.accept_invalid_certs());
        assert_eq!(config.log_filter(), "info");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[backend]\nbase_url = \"https://api.example.com\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[backend], [ui], and [log]"));
        Ok(())
    }

    #[test]
    fn v1_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[backend]\nbase_url = \"https://compliance.example.com/api\"\ntimeout = \"1500ms\"\naccept_invalid_certs = false\n[ui]\npage_size = 25\nnotification_ttl = \"2s\"\n[log]\nfilter = \"regdesk_gateway=debug\"\n",
        )?;

        let config = Config::load(&path)?;
        let options = config.gateway_options()?;
        assert_eq!(options.base_url, "https://compliance.example.com/api");
        assert_eq!(options.timeout, Duration::from_millis(1500));
        assert!(!options.accept_invalid_certs);
        assert_eq!(config.page_size(), 25);
        assert_eq!(config.notification_ttl()?, Duration::from_secs(2));
        assert_eq!(config.log_filter(), "regdesk_gateway=debug");
        Ok(())
    }

    #[test]
    fn broken_toml_names_the_file() -> Result<()> {
        let (_temp, path) = write_config("[backend\nbase_url = ")?;
        let error = Config::load(&path).expect_err("unterminated table header");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn future_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn unsupported_page_size_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[ui]\npage_size = 15\n")?;
        let error = Config::load(&path).expect_err("page size 15 should fail");
        assert!(error.to_string().contains("ui.page_size"));
        Ok(())
    }

    #[test]
    fn base_url_must_be_http() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[backend]\nbase_url = \"ftp://files\"\n")?;
        let error = Config::load(&path).expect_err("ftp url should fail");
        assert!(error.to_string().contains("http:// or https://"));

        let (_temp, path) = write_config("version = 1\n[backend]\nbase_url = \"  \"\n")?;
        let error = Config::load(&path).expect_err("blank url should fail");
        assert!(error.to_string().contains("must not be empty"));
        Ok(())
    }

    #[test]
    fn non_positive_durations_are_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[backend]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("backend.timeout"));

        let (_temp, path) = write_config("version = 1\n[ui]\nnotification_ttl = \"0ms\"\n")?;
        let error = Config::load(&path).expect_err("zero ttl should fail");
        assert!(error.to_string().contains("ui.notification_ttl"));
        Ok(())
    }

    #[test]
    fn invalid_log_filter_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[log]\nfilter = \"regdesk=loud\"\n")?;
        let error = Config::load(&path).expect_err("bad filter should fail");
        assert!(error.to_string().contains("log.filter"));
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("250ms")?, Duration::from_millis(250));
        assert_eq!(parse_duration("10s")?, Duration::from_secs(10));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        let error = parse_duration("ten seconds").expect_err("words are not durations");
        assert!(error.to_string().contains("<N>ms, <N>s, <N>m"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("regdesk-override.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("REGDESK_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("REGDESK_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn example_config_loads_back() -> Result<()> {
        let (_temp, path) = temp_config_path()?;
        std::fs::write(&path, Config::example_config(&path))?;
        let config = Config::load(&path)?;
        assert_eq!(config.base_url(), "https://localhost:8443/api");
        assert_eq!(config.page_size(), 10);
        Ok(())
    }
}
