//! Observability infrastructure for the telemetry pipeline
//!
//! Provides:
//! - Prometheus metrics (fetch latency, parse volume, agent latency, model calls)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_histogram_vec, register_int_counter,
    register_int_counter_vec, GaugeVec, Histogram, HistogramVec, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for network-bound latencies (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    fetch_latency_seconds: Histogram,
    fetch_errors: IntCounter,
    samples_parsed: IntCounter,
    lines_skipped: IntCounter,
    agent_latency_seconds: HistogramVec,
    agent_failures: IntCounterVec,
    model_calls: IntCounterVec,
    signal_value: GaugeVec,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            fetch_latency_seconds: register_histogram!(
                "opsight_fetch_latency_seconds",
                "Time spent fetching exposition text from the metrics source",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register fetch_latency_seconds"),

            fetch_errors: register_int_counter!(
                "opsight_fetch_errors_total",
                "Total number of failed metrics source fetches"
            )
            .expect("Failed to register fetch_errors"),

            samples_parsed: register_int_counter!(
                "opsight_samples_parsed_total",
                "Total number of samples parsed from exposition text"
            )
            .expect("Failed to register samples_parsed"),

            lines_skipped: register_int_counter!(
                "opsight_lines_skipped_total",
                "Total number of malformed exposition lines skipped"
            )
            .expect("Failed to register lines_skipped"),

            agent_latency_seconds: register_histogram_vec!(
                "opsight_agent_latency_seconds",
                "Time spent running a single agent",
                &["agent"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register agent_latency_seconds"),

            agent_failures: register_int_counter_vec!(
                "opsight_agent_failures_total",
                "Total number of agent runs that ended in failure",
                &["agent"]
            )
            .expect("Failed to register agent_failures"),

            model_calls: register_int_counter_vec!(
                "opsight_model_calls_total",
                "Calls to the text generation model by outcome",
                &["outcome"]
            )
            .expect("Failed to register model_calls"),

            signal_value: register_gauge_vec!(
                "opsight_signal_value",
                "Last normalized value of each health signal",
                &["metric"]
            )
            .expect("Failed to register signal_value"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    pub fn observe_fetch_latency(&self, duration_secs: f64) {
        self.inner().fetch_latency_seconds.observe(duration_secs);
    }

    pub fn inc_fetch_errors(&self) {
        self.inner().fetch_errors.inc();
    }

    /// Record the volume of one parse pass
    pub fn record_parse(&self, samples: usize, skipped_lines: usize) {
        self.inner().samples_parsed.inc_by(samples as u64);
        self.inner().lines_skipped.inc_by(skipped_lines as u64);
    }

    pub fn observe_agent_latency(&self, agent: &str, duration_secs: f64) {
        self.inner()
            .agent_latency_seconds
            .with_label_values(&[agent])
            .observe(duration_secs);
    }

    pub fn inc_agent_failures(&self, agent: &str) {
        self.inner().agent_failures.with_label_values(&[agent]).inc();
    }

    /// Count a model call; outcome is one of success, failed, skipped
    pub fn inc_model_calls(&self, outcome: &str) {
        self.inner().model_calls.with_label_values(&[outcome]).inc();
    }

    pub fn set_signal_value(&self, metric: &str, value: f64) {
        self.inner()
            .signal_value
            .with_label_values(&[metric])
            .set(value);
    }
}

/// Structured logger for pipeline events
///
/// Every event carries an `event` field so log pipelines can filter on it.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, port: u16) {
        info!(
            event = "service_started",
            instance = %self.instance,
            version = %version,
            port = port,
            "Telemetry service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Telemetry service shutting down"
        );
    }

    pub fn log_metrics_fetched(&self, url: &str, samples: usize, skipped_lines: usize, signals: usize) {
        info!(
            event = "metrics_fetched",
            instance = %self.instance,
            url = %url,
            samples = samples,
            skipped_lines = skipped_lines,
            signals = signals,
            "Fetched and normalized metrics"
        );
    }

    pub fn log_metrics_fetch_failed(&self, url: &str, error: &str, degraded: bool) {
        warn!(
            event = "metrics_fetch_failed",
            instance = %self.instance,
            url = %url,
            error = %error,
            degraded = degraded,
            "Metrics source fetch failed"
        );
    }

    pub fn log_agent_completed(&self, agent: &str, status: &str, duration_ms: u64) {
        info!(
            event = "agent_completed",
            instance = %self.instance,
            agent = %agent,
            status = %status,
            duration_ms = duration_ms,
            "Agent finished"
        );
    }

    pub fn log_agent_failed(&self, agent: &str, error: &str) {
        warn!(
            event = "agent_failed",
            instance = %self.instance,
            agent = %agent,
            error = %error,
            "Agent failed"
        );
    }

    pub fn log_synthesis(&self, agents: usize, outcome: SynthesisOutcome, detail: &str) {
        match outcome {
            SynthesisOutcome::Completed => info!(
                event = "synthesis_completed",
                instance = %self.instance,
                agents = agents,
                "Synthesized supervisor overview"
            ),
            SynthesisOutcome::Skipped => info!(
                event = "synthesis_skipped",
                instance = %self.instance,
                agents = agents,
                reason = %detail,
                "Skipped supervisor synthesis"
            ),
            SynthesisOutcome::Failed => warn!(
                event = "synthesis_failed",
                instance = %self.instance,
                agents = agents,
                error = %detail,
                "Supervisor synthesis failed"
            ),
        }
    }

    pub fn log_source_unavailable(&self, path: &str, error: &str) {
        warn!(
            event = "log_source_unavailable",
            instance = %self.instance,
            path = %path,
            error = %error,
            "Log source unavailable, continuing with metrics only"
        );
    }
}

/// Result of the single supervisor synthesis call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisOutcome {
    Completed,
    Skipped,
    Failed,
}

impl SynthesisOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SynthesisOutcome::Completed => "success",
            SynthesisOutcome::Skipped => "skipped",
            SynthesisOutcome::Failed => "failed",
        }
    }
}
