//! Configuration management for the CLI

use agent_lib::TrendStore;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

/// CLI configuration, stored at `~/.config/opsight/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Metrics endpoint or exposition file used when `--metrics` is absent
    pub metrics: Option<String>,
    /// Log file investigated when `--log` is absent
    pub log_path: Option<String>,
    /// Default output format
    pub default_format: Option<String>,
    /// Gemini credential, below `--api-key` and `GEMINI_API_KEY`
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, defaulting when the file is absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Output format named in the file, if valid
    pub fn default_format(&self) -> Option<OutputFormat> {
        self.default_format
            .as_deref()
            .and_then(|f| OutputFormat::from_str(f, true).ok())
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("config.json"))
    }
}

fn config_dir() -> Result<PathBuf> {
    let home = dirs_next::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("opsight"))
}

/// Last signal values carried between runs so `signals` can report trends
pub struct TrendState {
    path: PathBuf,
}

impl TrendState {
    /// State file next to the configuration file
    pub fn locate() -> Result<Self> {
        Ok(Self::at(config_dir()?.join("trends.json")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store seeded from the previous run; an absent or corrupt file starts empty
    pub fn load(&self) -> TrendStore {
        let values = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str::<BTreeMap<String, f64>>(&content).ok())
            .unwrap_or_default();
        TrendStore::from_snapshot(values)
    }

    pub fn save(&self, store: &TrendStore) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(&store.snapshot())?;
        std::fs::write(&self.path, content).context("Failed to write trend state")
    }
}
