//! CLI command implementations
//!
//! Every command runs the pipeline in-process against either a local
//! exposition file or a live metrics endpoint.

pub mod agents;
pub mod telemetry;

use agent_lib::{
    synthesis::{with_credential_override, ModelConfig, TextGenerator},
    CollectedMetrics, MetricsPipeline,
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::output::{print_json, print_warning, OutputFormat};

/// Where exposition text comes from
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsTarget {
    File(PathBuf),
    Endpoint(String),
}

impl MetricsTarget {
    /// Existing or path-shaped arguments are files, the rest are endpoints
    pub fn resolve(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return MetricsTarget::Endpoint(raw.to_string());
        }

        let path = PathBuf::from(raw);
        let path_shaped = raw.starts_with('/')
            || raw.starts_with('.')
            || raw.ends_with(".prom")
            || raw.ends_with(".txt");
        if path_shaped || path.is_file() {
            MetricsTarget::File(path)
        } else {
            MetricsTarget::Endpoint(raw.to_string())
        }
    }
}

/// Settings shared by every command
pub struct Session {
    pub target: MetricsTarget,
    pub pipeline: MetricsPipeline,
    pub generator: Arc<dyn TextGenerator>,
    pub model_config: ModelConfig,
    pub log_path: String,
    pub format: OutputFormat,
}

impl Session {
    /// Collect normalized metrics from the target
    ///
    /// Unreachable endpoints fall back to the built-in sample set, a
    /// missing file is an error.
    pub async fn collect(&self) -> Result<CollectedMetrics> {
        match &self.target {
            MetricsTarget::File(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read metrics file {}", path.display()))?;
                Ok(self.pipeline.collect_text(&text))
            }
            MetricsTarget::Endpoint(url) => Ok(self.pipeline.collect(url).await?),
        }
    }

    /// Generator honoring a command-line credential
    pub fn generator(&self, api_key: Option<&str>) -> Arc<dyn TextGenerator> {
        with_credential_override(&self.generator, &self.model_config, api_key)
    }

    /// Print `report` as JSON, or note a degraded collection before a table
    pub fn emit<T: Serialize>(
        &self,
        report: T,
        collected: &CollectedMetrics,
        print_table: impl FnOnce(&T),
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => print_json(&Report {
                report,
                degraded: collected.degraded,
                metrics_error: collected.error.clone(),
            }),
            OutputFormat::Table => {
                warn_if_degraded(collected);
                print_table(&report);
                Ok(())
            }
        }
    }
}

#[derive(Serialize)]
struct Report<T: Serialize> {
    #[serde(flatten)]
    report: T,
    degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_error: Option<String>,
}

fn warn_if_degraded(collected: &CollectedMetrics) {
    if collected.degraded {
        let reason = collected.error.as_deref().unwrap_or("unknown error");
        print_warning(&format!(
            "Metrics fetch failed ({}), showing fallback values",
            reason
        ));
        println!();
    }
}
