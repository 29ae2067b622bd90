//! Metric and log ingestion
//!
//! Exposition text arrives through a [`MetricsSource`], is parsed into
//! samples and reduced to normalized signals by the [`MetricsPipeline`].
//! Log text for the investigator arrives through a [`LogSource`].

pub mod fetch;
pub mod logs;
pub mod parser;
pub mod pipeline;

pub use fetch::{
    fallback_samples, normalize_endpoint, FetchConfig, HttpMetricsSource, MetricsSource,
    DEFAULT_METRICS_URL,
};
pub use logs::{FileLogSource, LogSource, StaticLogSource, DEFAULT_LOG_PATH};
pub use parser::{parse_exposition, parse_metrics, parse_sample_line, ParseOutcome};
pub use pipeline::{AgentInput, CollectedMetrics, MetricsPipeline};
