use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/api/";
pub const STORE_FILE: &str = "storage.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: Url,
    pub home: PathBuf,
    pub request_timeout: Duration,
    pub tick_interval: Duration,
}

impl Config {
    pub fn resolve(api_base: &str, home: Option<PathBuf>, timeout_secs: u64) -> Result<Self> {
        let home = match home {
            Some(dir) => dir,
            None => default_home(),
        };

        Ok(Config {
            api_base: parse_api_base(api_base)?,
            home,
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
            tick_interval: Duration::from_secs(1),
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.home.join(STORE_FILE)
    }

    pub fn ensure_home(&self) -> Result<PathBuf> {
        ensure_dir(&self.home)?;
        Ok(self.store_path())
    }
}

/// Parses the API base, forcing a trailing slash so relative joins keep the
/// last path segment (`.../api` + `monitor/` must give `.../api/monitor/`).
pub fn parse_api_base(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("API base URL is empty");
    }

    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    let url = Url::parse(&with_slash)
        .with_context(|| format!("Invalid API base URL '{}'", trimmed))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!("Unsupported API base scheme '{}' (expected http or https)", other),
    }
}

fn default_home() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("timepulse"))
        .unwrap_or_else(|| PathBuf::from(".timepulse"))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
}
