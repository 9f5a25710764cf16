use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::session::DEFAULT_SCAN_TIMEOUT;

pub const DEFAULT_CONFIG_PATH: &str = "scanlog.toml";

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Wireless interface to scan with
    pub interface: String,
    // falls back to the XDG data directory
    pub data_dir: Option<PathBuf>,
    pub enable_radio: bool,
    pub scan_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: "wlan0".to_owned(),
            data_dir: None,
            enable_radio: true,
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Apply `SCANLOG_INTERFACE` and `SCANLOG_DATA_DIR` overrides.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(interface) = var("SCANLOG_INTERFACE") {
            self.interface = interface;
        }
        if let Some(dir) = var("SCANLOG_DATA_DIR") {
            self.data_dir = Some(dir.into());
        }
    }

    /// Directory holding the scan log.
    pub fn data_dir(&self, var: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        if let Some(xdg) = var("XDG_DATA_HOME").filter(|x| !x.is_empty()) {
            return Ok(PathBuf::from(xdg).join("scanlog"));
        }
        if let Some(home) = var("HOME").filter(|x| !x.is_empty()) {
            return Ok(PathBuf::from(home).join(".local/share/scanlog"));
        }
        bail!("No data_dir configured and neither XDG_DATA_HOME nor HOME is set")
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

pub fn load(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path).context("Failed to read config")?;
    let config = toml::from_str(&data).context("Failed to parse config")?;
    Ok(config)
}

/// Load an explicit config, else `scanlog.toml` if present, else defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load(path).with_context(|| format!("Config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load(Path::new(DEFAULT_CONFIG_PATH)),
        None => Ok(Config::default()),
    }
}
