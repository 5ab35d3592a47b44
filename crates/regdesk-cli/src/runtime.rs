// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use regdesk_app::MAX_UPLOAD_BYTES;
use regdesk_gateway::{Backend, HttpGateway};
use regdesk_testkit::MockBackend;
use regdesk_tui::{AppRuntime, UploadSource};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;

const SAMPLE_FILE_STEM: &str = "compliance-sample";
const DEMO_SEED: u64 = 2026;
const DEMO_LATENCY: Duration = Duration::from_millis(250);

/// Backend for a session: the real service, or seeded in-memory data for
/// `--demo`.
pub fn connect(config: &Config, demo: bool) -> Result<Arc<dyn Backend>> {
    if demo {
        tracing::info!(seed = DEMO_SEED, "using demo backend");
        return Ok(Arc::new(MockBackend::seeded(DEMO_SEED).with_latency(DEMO_LATENCY)));
    }
    let options = config.gateway_options()?;
    let gateway = HttpGateway::new(&options).context(
        "build HTTP client -- check [backend].base_url and [backend].timeout in the config",
    )?;
    tracing::info!(base_url = %options.base_url, "using HTTP backend");
    Ok(Arc::new(gateway))
}

pub struct ClientRuntime {
    backend: Arc<dyn Backend>,
    page_size: usize,
    notification_ttl: Duration,
    download_dir: PathBuf,
}

impl ClientRuntime {
    pub fn new(backend: Arc<dyn Backend>, config: &Config, download_dir: PathBuf) -> Result<Self> {
        Ok(Self {
            backend,
            page_size: config.page_size(),
            notification_ttl: config.notification_ttl()?,
            download_dir,
        })
    }

    pub fn default_download_dir() -> PathBuf {
        dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl AppRuntime for ClientRuntime {
    fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn notification_ttl(&self) -> Duration {
        self.notification_ttl
    }

    fn read_upload(&mut self, path: &str) -> Result<UploadSource> {
        let path = expand_home(path.trim());
        if !path.is_file() {
            bail!("{} is not a file -- enter the path of an .xls or .xlsx sheet", path.display());
        }
        let size = fs::metadata(&path)
            .with_context(|| format!("inspect {}", path.display()))?
            .len();
        if size > MAX_UPLOAD_BYTES as u64 {
            bail!(
                "{} is {size} bytes, over the 10MB upload limit -- split the sheet into smaller files",
                path.display()
            );
        }
        let data = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_owned)
            .unwrap_or_else(|| path.display().to_string());
        tracing::debug!(file = %path.display(), bytes = data.len(), "read upload");
        Ok(UploadSource { file_name, data })
    }

    fn save_sample(&mut self, data: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.download_dir)
            .with_context(|| format!("create download directory {}", self.download_dir.display()))?;
        let path = unused_path(&self.download_dir, SAMPLE_FILE_STEM, "xlsx");
        fs::write(&path, data).with_context(|| format!("write {}", path.display()))?;
        tracing::info!(file = %path.display(), bytes = data.len(), "saved sample sheet");
        Ok(path)
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

/// `stem.ext`, or `stem-N.ext` for the first N that does not exist yet.
fn unused_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.{extension}"));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|index| dir.join(format!("{stem}-{index}.{extension}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}
