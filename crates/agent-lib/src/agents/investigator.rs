//! Log investigator
//!
//! Scans log text for error and critical markers, cuts a context window
//! around each hit and cross-references the current metric signals. When a
//! model is available the snippets are also summarized into a root cause.

use super::ModelStatus;
use crate::ingest::LogSource;
use crate::liveness::{Component, ComponentRegistry, Outcome};
use crate::models::NormalizedSignal;
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::synthesis::prompts::{RootCausePrompt, ROOT_CAUSE_SCHEMA};
use crate::synthesis::{generate_within, TextGenerator};
use crate::thresholds::health_rules_for;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Snippets returned per investigation
pub const MAX_SNIPPETS: usize = 10;

/// Lines of context kept before a hit
const CONTEXT_BEFORE: usize = 2;

/// Lines of context kept after a hit
const CONTEXT_AFTER: usize = 10;

const ERROR_MARKERS: [&str; 3] = ["error", "exception", "traceback"];
const CRITICAL_MARKER: &str = "critical";
const UNKNOWN_LOCATION: &str = "Unknown location";
const NO_INPUT_MESSAGE: &str = "No input logs found or file is empty.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnippetKind {
    Error,
    Critical,
}

/// Context window around one marker line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSnippet {
    /// 1-based line number of the marker line
    pub line_number: usize,
    pub content: Vec<String>,
    pub error_type: SnippetKind,
    pub suspected_cause_location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationStatus {
    Success,
    NoInput,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestigationSummary {
    pub total_lines_scanned: usize,
    pub error_count: usize,
    pub critical_count: usize,
    pub metric_issues_count: usize,
}

/// Model-written explanation of the snippets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCause {
    pub status: ModelStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspected_cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_fix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RootCause {
    fn degraded(status: ModelStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            summary: None,
            suspected_cause: None,
            recommended_fix: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RootCauseFields {
    summary: String,
    suspected_cause: String,
    recommended_fix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationReport {
    pub status: InvestigationStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_source: Option<String>,
    /// Why log analysis was skipped, when it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_error: Option<String>,
    pub summary: InvestigationSummary,
    pub snippets: Vec<LogSnippet>,
    pub metric_issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<RootCause>,
}

/// Scan log text and signals without touching any external capability
pub fn investigate(log_text: Option<&str>, signals: Option<&[NormalizedSignal]>) -> InvestigationReport {
    let metric_issues = metric_issues(signals.unwrap_or(&[]));

    let text = match log_text {
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            return InvestigationReport {
                status: InvestigationStatus::NoInput,
                message: NO_INPUT_MESSAGE.to_string(),
                log_source: None,
                log_error: None,
                summary: InvestigationSummary {
                    metric_issues_count: metric_issues.len(),
                    ..Default::default()
                },
                snippets: Vec::new(),
                metric_issues,
                root_cause: None,
            }
        }
    };

    let lines: Vec<&str> = text.lines().collect();
    let scan = scan_lines(&lines);

    let message = if scan.snippets.is_empty() {
        "No errors found in logs.".to_string()
    } else {
        let at: Vec<String> = scan
            .snippets
            .iter()
            .map(|s| s.line_number.to_string())
            .collect();
        format!("Errors found at lines: {}", at.join(", "))
    };

    InvestigationReport {
        status: InvestigationStatus::Success,
        message,
        log_source: None,
        log_error: None,
        summary: InvestigationSummary {
            total_lines_scanned: lines.len(),
            error_count: scan.error_count,
            critical_count: scan.critical_count,
            metric_issues_count: metric_issues.len(),
        },
        snippets: scan.snippets,
        metric_issues,
        root_cause: None,
    }
}

struct Scan {
    snippets: Vec<LogSnippet>,
    error_count: usize,
    critical_count: usize,
}

fn scan_lines(lines: &[&str]) -> Scan {
    let mut scan = Scan {
        snippets: Vec::new(),
        error_count: 0,
        critical_count: 0,
    };
    let mut window_end = 0;
    let mut i = 0;

    while i < lines.len() {
        let lower = lines[i].to_lowercase();
        let is_error = ERROR_MARKERS.iter().any(|m| lower.contains(m));
        let is_critical = lower.contains(CRITICAL_MARKER);

        if !is_error && !is_critical {
            i += 1;
            continue;
        }

        if is_error {
            scan.error_count += 1;
        }
        if is_critical {
            scan.critical_count += 1;
        }

        let start = i.saturating_sub(CONTEXT_BEFORE).max(window_end);
        let end = (i + CONTEXT_AFTER + 1).min(lines.len());
        let content = &lines[start..end];

        if scan.snippets.len() < MAX_SNIPPETS {
            scan.snippets.push(LogSnippet {
                line_number: i + 1,
                content: content.iter().map(|l| l.to_string()).collect(),
                error_type: if is_critical {
                    SnippetKind::Critical
                } else {
                    SnippetKind::Error
                },
                suspected_cause_location: find_cause_location(content)
                    .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
            });
        }

        // Hits inside the window are absorbed into this snippet
        window_end = end;
        i = end;
    }

    scan
}

/// Last `File "<path>", line <n>` reference in the window
fn find_cause_location(lines: &[&str]) -> Option<String> {
    lines
        .iter()
        .flat_map(|line| file_references(line))
        .last()
}

fn file_references(line: &str) -> Vec<String> {
    const OPEN: &str = "File \"";
    const LINE: &str = "\", line ";

    let mut found = Vec::new();
    let mut rest = line;

    while let Some(open) = rest.find(OPEN) {
        let after_open = &rest[open + OPEN.len()..];
        let Some(close) = after_open.find(LINE) else {
            break;
        };
        let path = &after_open[..close];
        let after_line = &after_open[close + LINE.len()..];
        let digits: String = after_line.chars().take_while(|c| c.is_ascii_digit()).collect();

        if !path.is_empty() && !digits.is_empty() {
            found.push(format!("File \"{}\", line {}", path, digits));
        }
        rest = after_line;
    }

    found
}

fn metric_issues(signals: &[NormalizedSignal]) -> Vec<String> {
    signals
        .iter()
        .flat_map(|signal| {
            health_rules_for(signal.metric)
                .filter(move |rule| rule.fires(signal.value))
                .map(|rule| rule.detail.to_string())
        })
        .collect()
}

/// Investigator bound to its log source and model capability
pub struct Investigator {
    generator: Arc<dyn TextGenerator>,
    deadline: Duration,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
    registry: Option<ComponentRegistry>,
}

impl Investigator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            deadline: Duration::from_secs(15),
            metrics: PipelineMetrics::new(),
            logger: StructuredLogger::new("opsight"),
            registry: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
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

    /// Read the log source, scan it and attach a root-cause summary
    ///
    /// An unreadable log source degrades to metrics-only analysis.
    pub async fn run(
        &self,
        log_source: Option<&dyn LogSource>,
        signals: &[NormalizedSignal],
    ) -> InvestigationReport {
        let (text, location, log_error) = match log_source {
            Some(source) => {
                let location = source.location();
                let read = source.read_log_text().await;
                if let Some(registry) = &self.registry {
                    registry
                        .update(Component::LogSource, Outcome::log_read(&read))
                        .await;
                }
                match read {
                    Ok(text) => (Some(text), Some(location), None),
                    Err(err) => {
                        self.logger.log_source_unavailable(&location, &err.to_string());
                        (None, Some(location), Some(err.to_string()))
                    }
                }
            }
            None => (None, None, None),
        };

        let mut report = investigate(text.as_deref(), Some(signals));
        report.log_source = location;
        report.log_error = log_error;

        if !report.snippets.is_empty() {
            report.root_cause = Some(self.root_cause(&report).await);
        }

        report
    }

    async fn root_cause(&self, report: &InvestigationReport) -> RootCause {
        if !self.generator.is_available() {
            self.metrics.inc_model_calls("skipped");
            return RootCause::degraded(ModelStatus::Unavailable, "Gemini API key not configured.");
        }

        let prompt = RootCausePrompt::build(&report.snippets, &report.metric_issues);
        let generated =
            generate_within(self.generator.as_ref(), &prompt, ROOT_CAUSE_SCHEMA, self.deadline)
                .await;

        let fields = generated.map_err(|e| e.to_string()).and_then(|value| {
            serde_json::from_value::<RootCauseFields>(value)
                .map_err(|e| format!("Failed to parse model response: {}", e))
        });

        match fields {
            Ok(fields) => {
                self.metrics.inc_model_calls("success");
                RootCause {
                    status: ModelStatus::Success,
                    summary: Some(fields.summary),
                    suspected_cause: Some(fields.suspected_cause),
                    recommended_fix: Some(fields.recommended_fix),
                    error: None,
                }
            }
            Err(message) => {
                self.metrics.inc_model_calls("failed");
                RootCause::degraded(ModelStatus::Failed, message)
            }
        }
    }
}
