//! Model-written alert over the current signals

use super::ModelStatus;
use crate::models::NormalizedSignal;
use crate::observability::PipelineMetrics;
use crate::synthesis::prompts::{AlertPrompt, ALERT_SCHEMA};
use crate::synthesis::{generate_within, TextGenerator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Caller-side bound on one alert generation
pub const ALERT_DEADLINE: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertAnalysis {
    pub issue: String,
    pub why: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertReport {
    pub status: ModelStatus,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AlertAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AlertReport {
    fn degraded(status: ModelStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            timestamp: chrono::Utc::now().timestamp(),
            analysis: None,
            error: Some(error.into()),
        }
    }
}

/// Ask the model for an alert; adapter failures become a degraded report
pub async fn analyze_alert(
    generator: &dyn TextGenerator,
    signals: &[NormalizedSignal],
    deadline: Duration,
) -> AlertReport {
    let metrics = PipelineMetrics::new();

    if !generator.is_available() {
        metrics.inc_model_calls("skipped");
        return AlertReport::degraded(ModelStatus::Unavailable, "Gemini API key not configured.");
    }

    let prompt = AlertPrompt::build(signals);
    let analysis = match generate_within(generator, &prompt, ALERT_SCHEMA, deadline).await {
        Ok(value) => serde_json::from_value::<AlertAnalysis>(value)
            .map_err(|e| format!("Failed to parse model response: {}", e)),
        Err(e) if e.is_unavailable() => {
            metrics.inc_model_calls("skipped");
            return AlertReport::degraded(ModelStatus::Unavailable, e.to_string());
        }
        Err(e) => Err(e.to_string()),
    };

    match analysis {
        Ok(analysis) => {
            metrics.inc_model_calls("success");
            AlertReport {
                status: ModelStatus::Success,
                timestamp: chrono::Utc::now().timestamp(),
                analysis: Some(analysis),
                error: None,
            }
        }
        Err(message) => {
            metrics.inc_model_calls("failed");
            AlertReport::degraded(ModelStatus::Failed, message)
        }
    }
}
