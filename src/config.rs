use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;

use crate::utils::dir::{create_application_default_path, ensure_dir};

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;

/// Optional `config.json` in the data directory. Every field may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
struct FileConfig {
    log_filter: Option<String>,
    log_console: Option<bool>,
    poll_interval_ms: Option<u64>,
    min_password_length: Option<usize>,
}

/// Values given on the command line. They win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dir: Option<PathBuf>,
    pub log_filter: Option<LevelFilter>,
    pub log_console: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// `None` leaves the level to `RUST_LOG`, then `info`.
    pub log_level: Option<LevelFilter>,
    pub log_console: bool,
    pub poll_interval: Duration,
    pub min_password_length: usize,
}

impl Config {
    /// Defaults, then `config.json`, then the environment (`CLOCKBOOK_DIR`, `RUST_LOG`), then
    /// `overrides`.
    pub fn load(overrides: Overrides) -> Result<Self> {
        let data_dir = match overrides.dir.clone() {
            Some(dir) => ensure_dir(dir)?,
            None => create_application_default_path()?,
        };
        Self::load_from(data_dir, overrides)
    }

    pub fn load_from(data_dir: PathBuf, overrides: Overrides) -> Result<Self> {
        let file = read_file_config(&data_dir.join(CONFIG_FILE))?;

        let file_level = file
            .log_filter
            .as_deref()
            .map(LevelFilter::from_str)
            .transpose()
            .with_context(|| format!("Invalid logFilter in {CONFIG_FILE}"))?;

        if file.poll_interval_ms == Some(0) {
            bail!("pollIntervalMs in {CONFIG_FILE} must be greater than zero");
        }

        Ok(Self {
            log_level: overrides.log_filter.or(file_level),
            log_console: overrides.log_console || file.log_console.unwrap_or(false),
            poll_interval: file
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            min_password_length: file
                .min_password_length
                .unwrap_or(DEFAULT_MIN_PASSWORD_LENGTH),
            data_dir,
        })
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Root of the per-user collections.
    pub fn users_dir(&self) -> PathBuf {
        self.data_dir.join("users")
    }

    pub fn identity_dir(&self) -> PathBuf {
        self.data_dir.join("identity")
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}
