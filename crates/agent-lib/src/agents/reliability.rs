//! Weighted risk scoring over the normalized signals
//!
//! Each risk rule contributes `probability * weight` to the total impact and
//! the reliability score is `1 - impact`, clamped at zero.

use crate::models::{round_to, NormalizedSignal};
use crate::thresholds::{risk_rules_for, RiskSeverity};
use serde::{Deserialize, Serialize};

/// Score above which the system is considered stable
const STABLE_ABOVE: f64 = 0.8;

/// Score above which the system is at risk rather than unreliable
const AT_RISK_ABOVE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReliabilityStatus {
    Stable,
    AtRisk,
    Unreliable,
}

impl ReliabilityStatus {
    fn from_score(score: f64) -> Self {
        if score > STABLE_ABOVE {
            ReliabilityStatus::Stable
        } else if score > AT_RISK_ABOVE {
            ReliabilityStatus::AtRisk
        } else {
            ReliabilityStatus::Unreliable
        }
    }
}

/// One predicted risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    #[serde(rename = "type")]
    pub risk_type: String,
    pub probability: f64,
    pub severity: RiskSeverity,
    pub prediction: String,
}

/// Reliability agent output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityReport {
    /// 0..1, two decimals
    pub reliability_score: f64,
    /// 0..10, one decimal
    pub risk_score: f64,
    pub reliability_status: ReliabilityStatus,
    pub predicted_risks: Vec<Risk>,
    pub timestamp: i64,
}

/// Score reliability and list predicted risks
pub fn analyze_reliability(signals: &[NormalizedSignal]) -> ReliabilityReport {
    let mut impact = 0.0;
    let mut predicted_risks = Vec::new();

    for signal in signals {
        for rule in risk_rules_for(signal.metric) {
            if let Some(probability) = rule.probability(signal.value) {
                impact += probability * rule.weight;
                predicted_risks.push(Risk {
                    risk_type: rule.risk_type.to_string(),
                    probability: round_to(probability, 2),
                    severity: rule.severity,
                    prediction: rule.prediction.to_string(),
                });
            }
        }
    }

    let score = (1.0 - impact).max(0.0);

    ReliabilityReport {
        reliability_score: round_to(score, 2),
        risk_score: round_to((1.0 - score) * 10.0, 1),
        reliability_status: ReliabilityStatus::from_score(score),
        predicted_risks,
        timestamp: chrono::Utc::now().timestamp(),
    }
}
