//! Opsight CLI
//!
//! Runs the telemetry pipeline and agents locally against a Prometheus
//! exposition file or a live metrics endpoint.

mod commands;
mod config;
mod output;

use agent_lib::{
    ingest::{HttpMetricsSource, DEFAULT_LOG_PATH, DEFAULT_METRICS_URL},
    synthesis::{generator_from_config, ModelConfig, GEMINI_API_KEY_ENV},
    MetricsPipeline,
};
use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{agents, telemetry, MetricsTarget, Session};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Opsight CLI
#[derive(Parser)]
#[command(name = "opsight")]
#[command(author, version, about = "Telemetry normalization and agent evaluation", long_about = None)]
pub struct Cli {
    /// Metrics endpoint (host:port or URL) or exposition file
    #[arg(long, short, env = "OPSIGHT_METRICS")]
    pub metrics: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse exposition text into samples
    Parse,

    /// Derive cpu, memory and disk signals
    Normalize,

    /// Show signals with their trends against the previous run
    Signals,

    /// Run the health agent
    Health,

    /// Run the reliability agent
    Reliability,

    /// Scan a log file for errors
    Investigate {
        /// Log file to scan
        #[arg(long, short, env = "OPSIGHT_LOG")]
        log: Option<String>,
    },

    /// Ask the model for an alert
    Alert {
        /// Gemini API key for this call
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Run several agents and synthesize their findings
    Supervise {
        /// Agents to run (health, reliability, investigator, alert)
        #[arg(long, short, value_delimiter = ',', required = true)]
        agents: Vec<String>,

        /// Log file for the investigator
        #[arg(long, short, env = "OPSIGHT_LOG")]
        log: Option<String>,

        /// Gemini API key for this run
        #[arg(long)]
        api_key: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;

    let raw_target = cli
        .metrics
        .or_else(|| config.metrics.clone())
        .unwrap_or_else(|| DEFAULT_METRICS_URL.to_string());

    let api_key = std::env::var(GEMINI_API_KEY_ENV)
        .ok()
        .or_else(|| config.gemini_api_key.clone());
    let mut model_config = ModelConfig::default().with_api_key(api_key);
    if let Some(model) = &config.gemini_model {
        model_config = model_config.with_model(model.clone());
    }

    let trend_state = config::TrendState::locate()?;
    let trends = Arc::new(trend_state.load());

    let source = Arc::new(HttpMetricsSource::new(Default::default())?);
    let session = Session {
        target: MetricsTarget::resolve(&raw_target),
        pipeline: MetricsPipeline::new(source, trends.clone()),
        generator: generator_from_config(&model_config),
        model_config,
        log_path: config
            .log_path
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_PATH.to_string()),
        format: cli
            .format
            .or_else(|| config.default_format())
            .unwrap_or_default(),
    };

    match cli.command {
        Commands::Parse => telemetry::parse(&session).await,
        Commands::Normalize => telemetry::normalize(&session).await,
        Commands::Signals => {
            telemetry::signals(&session).await?;
            trend_state.save(&trends)
        }
        Commands::Health => agents::health(&session).await,
        Commands::Reliability => agents::reliability(&session).await,
        Commands::Investigate { log } => agents::investigate(&session, log).await,
        Commands::Alert { api_key } => agents::alert(&session, api_key).await,
        Commands::Supervise {
            agents: names,
            log,
            api_key,
        } => agents::supervise(&session, names, log, api_key).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
