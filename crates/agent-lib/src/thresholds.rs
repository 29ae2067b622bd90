//! Signal threshold table shared by the rule-based agents
//!
//! Health, reliability and investigator rules all read their limits from
//! here. Comparison operators are strict (`>` / `<`) exactly as tuned.

use crate::models::SignalName;
use serde::{Deserialize, Serialize};

/// Which side of the limit is unhealthy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Fires when the value is strictly greater than the limit
    Above,
    /// Fires when the value is strictly less than the limit
    Below,
}

impl Direction {
    fn breaches(&self, value: f64, limit: f64) -> bool {
        match self {
            Direction::Above => value > limit,
            Direction::Below => value < limit,
        }
    }
}

/// Status impact of a fired health rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleImpact {
    Degrades,
    Critical,
}

/// Threshold rule used by the health agent and the investigator
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HealthRule {
    pub metric: SignalName,
    pub direction: Direction,
    pub limit: f64,
    pub impact: RuleImpact,
    /// Issue text reported by the health agent
    pub issue: &'static str,
    /// Issue text reported alongside log findings
    pub detail: &'static str,
}

impl HealthRule {
    pub fn fires(&self, value: f64) -> bool {
        self.direction.breaches(value, self.limit)
    }
}

/// Severity attached to a predicted risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskSeverity {
    High,
    Critical,
}

/// Linear risk rule used by the reliability agent
///
/// Probability grows linearly from 0 at `onset` to 1 at `onset ± span`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RiskRule {
    pub metric: SignalName,
    pub direction: Direction,
    pub onset: f64,
    pub span: f64,
    pub weight: f64,
    pub severity: RiskSeverity,
    pub risk_type: &'static str,
    pub prediction: &'static str,
}

impl RiskRule {
    /// Risk probability for a value, or `None` when the onset is not crossed
    pub fn probability(&self, value: f64) -> Option<f64> {
        if !self.direction.breaches(value, self.onset) {
            return None;
        }
        let distance = match self.direction {
            Direction::Above => value - self.onset,
            Direction::Below => self.onset - value,
        };
        Some((distance / self.span).min(1.0))
    }
}

pub const CPU_LOAD_HIGH: f64 = 0.8;
pub const MEMORY_USED_HIGH: f64 = 0.85;
pub const DISK_FREE_LOW: f64 = 0.15;

pub static HEALTH_RULES: [HealthRule; 3] = [
    HealthRule {
        metric: SignalName::CpuLoad1m,
        direction: Direction::Above,
        limit: CPU_LOAD_HIGH,
        impact: RuleImpact::Degrades,
        issue: "High CPU usage",
        detail: "High CPU usage (> 0.8 load)",
    },
    HealthRule {
        metric: SignalName::MemoryUsedPercent,
        direction: Direction::Above,
        limit: MEMORY_USED_HIGH,
        impact: RuleImpact::Degrades,
        issue: "High Memory usage",
        detail: "High Memory usage (> 85%)",
    },
    HealthRule {
        metric: SignalName::DiskFreePercent,
        direction: Direction::Below,
        limit: DISK_FREE_LOW,
        impact: RuleImpact::Critical,
        issue: "Low disk space",
        detail: "Low disk space (< 15% free)",
    },
];

pub static RISK_RULES: [RiskRule; 3] = [
    RiskRule {
        metric: SignalName::CpuLoad1m,
        direction: Direction::Above,
        onset: 0.7,
        span: 0.3,
        weight: 0.3,
        severity: RiskSeverity::High,
        risk_type: "CPU Saturation",
        prediction: "Potential service degradation within 10 minutes if load persists.",
    },
    RiskRule {
        metric: SignalName::MemoryUsedPercent,
        direction: Direction::Above,
        onset: 0.75,
        span: 0.25,
        weight: 0.4,
        severity: RiskSeverity::Critical,
        risk_type: "Memory Exhaustion (OOM)",
        prediction: "High likelihood of OOM Kill. Application stability at risk immediately.",
    },
    RiskRule {
        metric: SignalName::DiskFreePercent,
        direction: Direction::Below,
        onset: 0.20,
        span: 0.20,
        weight: 0.5,
        severity: RiskSeverity::Critical,
        risk_type: "Disk Exhaustion",
        prediction: "Disk writes will fail soon. Log loss and DB corruption possible.",
    },
];

/// Health rules that apply to a signal
pub fn health_rules_for(metric: SignalName) -> impl Iterator<Item = &'static HealthRule> {
    HEALTH_RULES.iter().filter(move |rule| rule.metric == metric)
}

/// Risk rules that apply to a signal
pub fn risk_rules_for(metric: SignalName) -> impl Iterator<Item = &'static RiskRule> {
    RISK_RULES.iter().filter(move |rule| rule.metric == metric)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_rules_are_strict() {
        let cpu = health_rules_for(SignalName::CpuLoad1m).next().unwrap();
        assert!(!cpu.fires(0.8));
        assert!(cpu.fires(0.8001));

        let disk = health_rules_for(SignalName::DiskFreePercent).next().unwrap();
        assert!(!disk.fires(0.15));
        assert!(disk.fires(0.1499));
    }

    #[test]
    fn test_risk_probability_linear_and_capped() {
        let memory = risk_rules_for(SignalName::MemoryUsedPercent).next().unwrap();
        assert_eq!(memory.probability(0.75), None);
        assert!((memory.probability(0.875).unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(memory.probability(1.5), Some(1.0));
    }

    #[test]
    fn test_inverse_disk_risk() {
        let disk = risk_rules_for(SignalName::DiskFreePercent).next().unwrap();
        assert_eq!(disk.probability(0.2), None);
        assert!((disk.probability(0.05).unwrap() - 0.75).abs() < 1e-9);
        assert_eq!(disk.probability(0.0), Some(1.0));
    }

    #[test]
    fn test_every_signal_has_one_rule_of_each_kind() {
        for metric in [
            SignalName::CpuLoad1m,
            SignalName::MemoryUsedPercent,
            SignalName::DiskFreePercent,
        ] {
            assert_eq!(health_rules_for(metric).count(), 1);
            assert_eq!(risk_rules_for(metric).count(), 1);
        }
    }
}
