//! Service configuration

use agent_lib::ingest::{FetchConfig, DEFAULT_LOG_PATH, DEFAULT_METRICS_URL};
use agent_lib::synthesis::{
    ModelConfig, DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL, GEMINI_API_KEY_ENV,
};
use agent_lib::SupervisorConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Service configuration, read from `OPSIGHT_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Name attached to every structured log event
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// HTTP port for the API, health and self-metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Metrics endpoint used when a request names none
    #[serde(default = "default_metrics_url")]
    pub default_metrics_url: String,

    /// Log file investigated when a request names none
    #[serde(default = "default_log_path")]
    pub default_log_path: String,

    /// Substitute the fallback sample set when a fetch fails
    #[serde(default = "default_true")]
    pub fallback_on_fetch_error: bool,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Deadline for the alert and root-cause model calls
    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,

    /// Deadline for the supervisor synthesis call
    #[serde(default = "default_synthesis_timeout")]
    pub synthesis_timeout_secs: u64,

    #[serde(default = "default_log_read_timeout")]
    pub log_read_timeout_secs: u64,

    /// Falls back to `GEMINI_API_KEY` when unset
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_gemini_endpoint")]
    pub gemini_endpoint: String,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "opsight".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_metrics_url() -> String {
    DEFAULT_METRICS_URL.to_string()
}

fn default_log_path() -> String {
    DEFAULT_LOG_PATH.to_string()
}

fn default_true() -> bool {
    true
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_model_timeout() -> u64 {
    15
}

fn default_synthesis_timeout() -> u64 {
    20
}

fn default_log_read_timeout() -> u64 {
    5
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_gemini_endpoint() -> String {
    DEFAULT_GEMINI_ENDPOINT.to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            default_metrics_url: default_metrics_url(),
            default_log_path: default_log_path(),
            fallback_on_fetch_error: default_true(),
            fetch_timeout_secs: default_fetch_timeout(),
            model_timeout_secs: default_model_timeout(),
            synthesis_timeout_secs: default_synthesis_timeout(),
            log_read_timeout_secs: default_log_read_timeout(),
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
            gemini_endpoint: default_gemini_endpoint(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let mut config = Self::from_environment(config::Environment::with_prefix("OPSIGHT"))?;
        if config.gemini_api_key.is_none() {
            config.gemini_api_key = std::env::var(GEMINI_API_KEY_ENV).ok();
        }
        Ok(config)
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()
            .context("Invalid OPSIGHT_* configuration")
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            ..FetchConfig::default()
        }
    }

    pub fn model_config(&self) -> ModelConfig {
        // The client bound has to cover the longest caller deadline
        let client_timeout = self.model_timeout_secs.max(self.synthesis_timeout_secs);

        ModelConfig::default()
            .with_api_key(self.gemini_api_key.clone())
            .with_model(self.gemini_model.clone())
            .with_endpoint(self.gemini_endpoint.clone())
            .with_timeout(Duration::from_secs(client_timeout))
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            alert_deadline: self.model_deadline(),
            investigation_deadline: self.model_deadline(),
            synthesis_deadline: Duration::from_secs(self.synthesis_timeout_secs),
        }
    }

    pub fn model_deadline(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn log_read_timeout(&self) -> Duration {
        Duration::from_secs(self.log_read_timeout_secs)
    }
}
