//! Opsight Agent - telemetry normalization and agent evaluation service
//!
//! Scrapes Prometheus endpoints on request, runs the rule-based and
//! model-assisted agents and serves their reports over HTTP.

use agent_lib::{
    ingest::HttpMetricsSource,
    liveness::{Component, ComponentRegistry, Outcome},
    observability::StructuredLogger,
    synthesis::generator_from_config,
};
use anyhow::Result;
use opsight_agent::{api, config};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting opsight-agent");

    let config = config::ServiceConfig::load()?;
    info!(
        instance = %config.instance_name,
        metrics_url = %config.default_metrics_url,
        "Agent configured"
    );

    let registry = ComponentRegistry::new();

    let source = Arc::new(HttpMetricsSource::new(config.fetch_config())?);

    let generator = generator_from_config(&config.model_config());
    if !generator.is_available() {
        warn!("No Gemini API key configured, AI synthesis disabled unless supplied per request");
        registry
            .update(Component::ModelAdapter, Outcome::unconfigured())
            .await;
    }

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(AGENT_VERSION, config.api_port);

    let app_state = Arc::new(api::AppState::new(&config, source, generator, registry.clone()));

    registry.set_ready(true);

    tokio::select! {
        result = api::serve(config.api_port, app_state) => {
            if let Err(e) = &result {
                error!(error = %e, "API server exited");
            }
            result?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            info!("Shutting down");
        }
    }

    Ok(())
}
