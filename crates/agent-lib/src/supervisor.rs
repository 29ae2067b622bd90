//! Fan-out over the selected agents followed by one synthesis call
//!
//! Requested agents run concurrently as separate tasks. A task that dies is
//! reported as a failed entry for that agent only. Synthesis starts once
//! every task has finished and sees the complete result map.

use crate::agents::{
    analyze_alert, analyze_reliability, evaluate_health, AgentFailure, AgentKind, AgentReport,
    Investigator,
};
use crate::error::PipelineError;
use crate::ingest::LogSource;
use crate::liveness::{Component, ComponentRegistry, Outcome};
use crate::models::NormalizedSignal;
use crate::observability::{PipelineMetrics, StructuredLogger, SynthesisOutcome};
use crate::synthesis::prompts::{SynthesisPrompt, SYNTHESIS_SCHEMA};
use crate::synthesis::{generate_within, with_credential_override, ModelConfig, TextGenerator};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SKIPPED_OVERVIEW: &str = "Synthesis failed or key missing.";
const SKIPPED_WARNING: &str = "Gemini API Key missing. Skipping AI synthesis.";
const EMPTY_OVERVIEW: &str = "No overview generated.";

/// Deadlines for the model-backed steps
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub alert_deadline: Duration,
    pub investigation_deadline: Duration,
    pub synthesis_deadline: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            alert_deadline: Duration::from_secs(15),
            investigation_deadline: Duration::from_secs(15),
            synthesis_deadline: Duration::from_secs(20),
        }
    }
}

/// Merged overview written by the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisResult {
    pub overview_report: String,
    pub general_suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SynthesisResult {
    /// Placeholder used when no credential is available
    pub fn skipped() -> Self {
        Self {
            overview_report: SKIPPED_OVERVIEW.to_string(),
            general_suggestions: Vec::new(),
            warning: Some(SKIPPED_WARNING.to_string()),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            overview_report: SKIPPED_OVERVIEW.to_string(),
            general_suggestions: Vec::new(),
            warning: None,
            error: Some(error.into()),
        }
    }

    fn from_model(value: &serde_json::Value) -> Self {
        let overview_report = value
            .get("overview")
            .and_then(|v| v.as_str())
            .unwrap_or(EMPTY_OVERVIEW)
            .to_string();

        let general_suggestions = value
            .get("suggestions")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item.as_str() {
                        Some(text) => text.to_string(),
                        None => item.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            overview_report,
            general_suggestions,
            warning: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SupervisorReport {
    pub status: &'static str,
    pub timestamp: i64,
    pub agents_run: Vec<AgentKind>,
    pub agent_results: BTreeMap<String, AgentReport>,
    pub supervisor_analysis: SynthesisResult,
}

/// Shared inputs handed to every agent task
struct AgentContext {
    signals: Vec<NormalizedSignal>,
    generator: Arc<dyn TextGenerator>,
    log_source: Option<Arc<dyn LogSource>>,
    config: SupervisorConfig,
    logger: StructuredLogger,
    registry: Option<ComponentRegistry>,
}

pub struct Supervisor {
    generator: Arc<dyn TextGenerator>,
    model_config: ModelConfig,
    config: SupervisorConfig,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
    registry: Option<ComponentRegistry>,
}

impl Supervisor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            model_config: ModelConfig::default(),
            config: SupervisorConfig::default(),
            metrics: PipelineMetrics::new(),
            logger: StructuredLogger::new("opsight"),
            registry: None,
        }
    }

    /// Config used to build a generator when a request carries its own credential
    pub fn with_model_config(mut self, model_config: ModelConfig) -> Self {
        self.model_config = model_config;
        self
    }

    pub fn with_config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Parse agent names, collapsing duplicates in first-seen order
    pub fn parse_agents<S: AsRef<str>>(names: &[S]) -> Result<Vec<AgentKind>, PipelineError> {
        let mut kinds = Vec::with_capacity(names.len());
        for name in names {
            let kind: AgentKind = name.as_ref().parse()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }

    /// Run the named agents and synthesize their reports
    ///
    /// Fails only when an agent name is not recognized.
    pub async fn supervise<S: AsRef<str>>(
        &self,
        agent_names: &[S],
        signals: &[NormalizedSignal],
        log_source: Option<Arc<dyn LogSource>>,
        credential: Option<&str>,
    ) -> Result<SupervisorReport, PipelineError> {
        let kinds = Self::parse_agents(agent_names)?;
        let generator = with_credential_override(&self.generator, &self.model_config, credential);

        let context = Arc::new(AgentContext {
            signals: signals.to_vec(),
            generator: generator.clone(),
            log_source,
            config: self.config.clone(),
            logger: self.logger.clone(),
            registry: self.registry.clone(),
        });

        let handles: Vec<_> = kinds
            .iter()
            .map(|&kind| {
                let context = context.clone();
                let started = Instant::now();
                (
                    kind,
                    started,
                    tokio::spawn(async move { run_agent(kind, &context).await }),
                )
            })
            .collect();

        let mut agent_results = BTreeMap::new();
        for (kind, started, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => AgentReport::Failed(AgentFailure::new(format!("agent task failed: {}", e))),
            };
            self.record_agent(kind, &report, started);
            agent_results.insert(kind.result_key().to_string(), report);
        }

        let supervisor_analysis = self.synthesize(generator.as_ref(), &agent_results).await;

        Ok(SupervisorReport {
            status: "success",
            timestamp: chrono::Utc::now().timestamp(),
            agents_run: kinds,
            agent_results,
            supervisor_analysis,
        })
    }

    async fn synthesize(
        &self,
        generator: &dyn TextGenerator,
        agent_results: &BTreeMap<String, AgentReport>,
    ) -> SynthesisResult {
        let agents = agent_results.len();

        if !generator.is_available() {
            self.record_synthesis(agents, SynthesisOutcome::Skipped, "no model credential")
                .await;
            return SynthesisResult::skipped();
        }

        let prompt = SynthesisPrompt::build(agent_results);
        match generate_within(generator, &prompt, SYNTHESIS_SCHEMA, self.config.synthesis_deadline)
            .await
        {
            Ok(value) => {
                self.record_synthesis(agents, SynthesisOutcome::Completed, "")
                    .await;
                SynthesisResult::from_model(&value)
            }
            Err(e) if e.is_unavailable() => {
                self.record_synthesis(agents, SynthesisOutcome::Skipped, &e.to_string())
                    .await;
                SynthesisResult::skipped()
            }
            Err(e) => {
                let message = format!("Synthesis failed: {}", e);
                self.record_synthesis(agents, SynthesisOutcome::Failed, &message)
                    .await;
                SynthesisResult::failed(message)
            }
        }
    }

    fn record_agent(&self, kind: AgentKind, report: &AgentReport, started: Instant) {
        let elapsed = started.elapsed();
        self.metrics
            .observe_agent_latency(kind.as_str(), elapsed.as_secs_f64());

        match report {
            AgentReport::Failed(failure) => {
                self.metrics.inc_agent_failures(kind.as_str());
                self.logger.log_agent_failed(kind.as_str(), &failure.error);
            }
            _ => self.logger.log_agent_completed(
                kind.as_str(),
                report.status_label(),
                elapsed.as_millis() as u64,
            ),
        }
    }

    async fn record_synthesis(&self, agents: usize, outcome: SynthesisOutcome, detail: &str) {
        self.metrics.inc_model_calls(outcome.as_str());
        self.logger.log_synthesis(agents, outcome, detail);

        if let Some(registry) = &self.registry {
            registry
                .update(Component::ModelAdapter, Outcome::synthesis(outcome, detail))
                .await;
        }
    }
}

async fn run_agent(kind: AgentKind, context: &AgentContext) -> AgentReport {
    match kind {
        AgentKind::Health => AgentReport::Health(evaluate_health(&context.signals)),
        AgentKind::Reliability => AgentReport::Reliability(analyze_reliability(&context.signals)),
        AgentKind::Investigator => {
            let mut investigator = Investigator::new(context.generator.clone())
                .with_deadline(context.config.investigation_deadline)
                .with_logger(context.logger.clone());
            if let Some(registry) = &context.registry {
                investigator = investigator.with_registry(registry.clone());
            }
            AgentReport::Investigator(
                investigator
                    .run(context.log_source.as_deref(), &context.signals)
                    .await,
            )
        }
        AgentKind::Alert => AgentReport::Alert(
            analyze_alert(
                context.generator.as_ref(),
                &context.signals,
                context.config.alert_deadline,
            )
            .await,
        ),
    }
}
