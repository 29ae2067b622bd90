//! Telemetry normalization and agent evaluation library
//!
//! This crate provides the core functionality for:
//! - Parsing Prometheus exposition text
//! - Reducing samples to normalized health signals with trend detection
//! - Rule-based health and reliability agents
//! - Log investigation and model-assisted alerting
//! - Supervising a selected set of agents with one synthesis pass

pub mod agents;
pub mod error;
pub mod ingest;
pub mod liveness;
pub mod models;
pub mod normalize;
pub mod observability;
pub mod supervisor;
pub mod synthesis;
pub mod thresholds;
pub mod trend;

pub use agents::{
    analyze_alert, analyze_reliability, evaluate_health, investigate, AgentKind, AgentReport,
    AlertReport, HealthReport, HealthStatus, InvestigationReport, Investigator, ModelStatus,
    ReliabilityReport, ReliabilityStatus,
};
pub use error::{FetchError, GenerationError, LogSourceError, ParseError, PipelineError};
pub use ingest::{
    parse_metrics, AgentInput, CollectedMetrics, FetchConfig, FileLogSource, HttpMetricsSource,
    LogSource, MetricsPipeline, MetricsSource,
};
pub use liveness::{
    Component, ComponentRegistry, ComponentState, LivenessReport, Outcome, ReadinessReport,
};
pub use models::*;
pub use normalize::{normalize_metrics, normalize_metrics_at, MissingInput};
pub use observability::{PipelineMetrics, StructuredLogger};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorReport, SynthesisResult};
pub use synthesis::{generator_from_config, ModelConfig, TextGenerator};
pub use trend::{build_agent_signals, TrendStore};
