//! Agents that evaluate normalized signals and log text
//!
//! Health and reliability are pure rule engines over the shared threshold
//! table. The investigator scans logs and the alert agent asks the model.

pub mod alert;
pub mod health;
pub mod investigator;
pub mod reliability;

pub use alert::{analyze_alert, AlertAnalysis, AlertReport, ALERT_DEADLINE};
pub use health::{evaluate_health, HealthReport, HealthStatus};
pub use investigator::{
    investigate, InvestigationReport, InvestigationStatus, InvestigationSummary, Investigator,
    LogSnippet, RootCause, SnippetKind, MAX_SNIPPETS,
};
pub use reliability::{analyze_reliability, ReliabilityReport, ReliabilityStatus, Risk};

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of a model-backed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Success,
    /// No credential configured
    Unavailable,
    Failed,
}

/// Selectable agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Health,
    Reliability,
    Investigator,
    Alert,
}

impl AgentKind {
    pub const ALL: [AgentKind; 4] = [
        AgentKind::Health,
        AgentKind::Reliability,
        AgentKind::Investigator,
        AgentKind::Alert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Health => "health",
            AgentKind::Reliability => "reliability",
            AgentKind::Investigator => "investigator",
            AgentKind::Alert => "alert",
        }
    }

    /// Key of this agent's entry in a supervisor report
    pub fn result_key(&self) -> &'static str {
        match self {
            AgentKind::Health => "health_agent",
            AgentKind::Reliability => "reliability_agent",
            AgentKind::Investigator => "investigator_agent",
            AgentKind::Alert => "alert_agent",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "health" => Ok(AgentKind::Health),
            "reliability" => Ok(AgentKind::Reliability),
            "investigator" => Ok(AgentKind::Investigator),
            "alert" => Ok(AgentKind::Alert),
            _ => Err(PipelineError::UnknownAgent(s.to_string())),
        }
    }
}

/// Report produced by one agent run under the supervisor
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AgentReport {
    Health(HealthReport),
    Reliability(ReliabilityReport),
    Investigator(InvestigationReport),
    Alert(AlertReport),
    /// The agent task itself died
    Failed(AgentFailure),
}

impl AgentReport {
    /// Status label used in logs
    pub fn status_label(&self) -> &'static str {
        match self {
            AgentReport::Failed(_) => "failed",
            AgentReport::Alert(report) if report.status != ModelStatus::Success => "degraded",
            _ => "success",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentFailure {
    pub status: &'static str,
    pub error: String,
}

impl AgentFailure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            status: "failed",
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_kind_parsing() {
        assert_eq!("health".parse::<AgentKind>().unwrap(), AgentKind::Health);
        assert_eq!(" Alert ".parse::<AgentKind>().unwrap(), AgentKind::Alert);

        let err = "predictor".parse::<AgentKind>().unwrap_err();
        assert!(err.is_bad_request());
        assert!(err.to_string().contains("predictor"));
    }

    #[test]
    fn test_result_keys() {
        let keys: Vec<&str> = AgentKind::ALL.iter().map(|k| k.result_key()).collect();
        assert_eq!(
            keys,
            vec!["health_agent", "reliability_agent", "investigator_agent", "alert_agent"]
        );
    }

    #[test]
    fn test_failed_report_serialization() {
        let report = AgentReport::Failed(AgentFailure::new("task panicked"));
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "task panicked");
        assert_eq!(report.status_label(), "failed");
    }
}
