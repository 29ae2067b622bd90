//! Fetch, parse and normalize in one call

use super::fetch::{fallback_samples, MetricsSource};
use super::parser::parse_exposition;
use crate::error::{FetchError, PipelineError};
use crate::liveness::{Component, ComponentRegistry, Outcome};
use crate::models::{AgentSignals, NormalizedSignal, Sample};
use crate::normalize::normalize_metrics;
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::trend::{build_agent_signals, TrendStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Result of one collection pass
#[derive(Debug, Clone, Serialize)]
pub struct CollectedMetrics {
    pub samples: Vec<Sample>,
    pub normalized: Vec<NormalizedSignal>,
    pub skipped_lines: usize,
    /// True when the fetch failed and the fallback sample set was used
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Trend-annotated signals ready for the agents
#[derive(Debug, Clone, Serialize)]
pub struct AgentInput {
    #[serde(flatten)]
    pub signals: AgentSignals,
    #[serde(skip)]
    pub normalized: Vec<NormalizedSignal>,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Collection pipeline over a metrics source
pub struct MetricsPipeline {
    source: Arc<dyn MetricsSource>,
    trends: Arc<TrendStore>,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
    registry: Option<ComponentRegistry>,
    use_fallback: bool,
}

impl MetricsPipeline {
    pub fn new(source: Arc<dyn MetricsSource>, trends: Arc<TrendStore>) -> Self {
        Self {
            source,
            trends,
            metrics: PipelineMetrics::new(),
            logger: StructuredLogger::new("opsight"),
            registry: None,
            use_fallback: true,
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Fail fetches instead of substituting the fallback sample set
    pub fn without_fallback(mut self) -> Self {
        self.use_fallback = false;
        self
    }

    pub fn trends(&self) -> &Arc<TrendStore> {
        &self.trends
    }

    /// Fetch, parse and normalize the exposition served at `url`
    pub async fn collect(&self, url: &str) -> Result<CollectedMetrics, PipelineError> {
        let started = Instant::now();
        let fetched = self.source.fetch_text(url).await;
        self.metrics
            .observe_fetch_latency(started.elapsed().as_secs_f64());

        match fetched {
            Ok(text) => {
                self.set_source_up().await;
                let collected = self.collect_text(&text);
                self.logger.log_metrics_fetched(
                    url,
                    collected.samples.len(),
                    collected.skipped_lines,
                    collected.normalized.len(),
                );
                Ok(collected)
            }
            Err(err) => self.on_fetch_error(url, err).await,
        }
    }

    /// Parse and normalize exposition text already in hand
    pub fn collect_text(&self, text: &str) -> CollectedMetrics {
        let outcome = parse_exposition(text);
        self.metrics
            .record_parse(outcome.samples.len(), outcome.skipped_lines);

        let normalized = normalize_metrics(&outcome.samples);
        self.record_signals(&normalized);

        CollectedMetrics {
            samples: outcome.samples,
            normalized,
            skipped_lines: outcome.skipped_lines,
            degraded: false,
            error: None,
        }
    }

    /// Collect and run the trend detector over the derived signals
    pub async fn agent_input(&self, url: &str) -> Result<AgentInput, PipelineError> {
        let collected = self.collect(url).await?;
        Ok(self.to_agent_input(collected))
    }

    pub fn to_agent_input(&self, collected: CollectedMetrics) -> AgentInput {
        let signals = build_agent_signals(&self.trends, &collected.normalized);
        AgentInput {
            signals,
            normalized: collected.normalized,
            degraded: collected.degraded,
            error: collected.error,
        }
    }

    async fn on_fetch_error(
        &self,
        url: &str,
        err: FetchError,
    ) -> Result<CollectedMetrics, PipelineError> {
        self.metrics.inc_fetch_errors();
        let message = err.to_string();
        self.logger
            .log_metrics_fetch_failed(url, &message, self.use_fallback);

        if let Some(registry) = &self.registry {
            registry
                .update(
                    Component::MetricsSource,
                    Outcome::fetch_failed(&err, self.use_fallback),
                )
                .await;
        }

        if !self.use_fallback {
            return Err(PipelineError::Upstream(err));
        }

        let samples = fallback_samples();
        let normalized = normalize_metrics(&samples);
        Ok(CollectedMetrics {
            samples,
            normalized,
            skipped_lines: 0,
            degraded: true,
            error: Some(message),
        })
    }

    async fn set_source_up(&self) {
        if let Some(registry) = &self.registry {
            registry
                .update(Component::MetricsSource, Outcome::Succeeded)
                .await;
        }
    }

    fn record_signals(&self, normalized: &[NormalizedSignal]) {
        for signal in normalized {
            self.metrics
                .set_signal_value(signal.metric.as_str(), signal.value);
        }
    }
}
