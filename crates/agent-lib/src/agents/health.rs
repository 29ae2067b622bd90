//! Threshold-based health evaluation

use crate::models::NormalizedSignal;
use crate::thresholds::{health_rules_for, RuleImpact};
use serde::{Deserialize, Serialize};

/// Overall health of the observed system
///
/// Ordered by severity so a status can only be escalated within one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

impl HealthStatus {
    /// Move towards `other` if it is more severe, never back
    pub fn escalate(self, other: HealthStatus) -> HealthStatus {
        self.max(other)
    }
}

impl From<RuleImpact> for HealthStatus {
    fn from(impact: RuleImpact) -> Self {
        match impact {
            RuleImpact::Degrades => HealthStatus::Degraded,
            RuleImpact::Critical => HealthStatus::Critical,
        }
    }
}

/// Health agent output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub health_status: HealthStatus,
    pub issues: Vec<String>,
    pub message: String,
}

/// Evaluate every signal against the health rules
///
/// Rules fire independently; a signal set may produce several issues.
pub fn evaluate_health(signals: &[NormalizedSignal]) -> HealthReport {
    let mut status = HealthStatus::Healthy;
    let mut issues = Vec::new();

    for signal in signals {
        for rule in health_rules_for(signal.metric) {
            if rule.fires(signal.value) {
                issues.push(rule.issue.to_string());
                status = status.escalate(rule.impact.into());
            }
        }
    }

    let message = if issues.is_empty() {
        "System is healthy: No anomalies detected.".to_string()
    } else {
        format!("Issues detected: {}", issues.join(", "))
    };

    HealthReport {
        health_status: status,
        issues,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignalName;

    fn signal(metric: SignalName, value: f64) -> NormalizedSignal {
        NormalizedSignal::new(metric, value, 0)
    }

    #[test]
    fn test_empty_signals_are_healthy() {
        let report = evaluate_health(&[]);

        assert_eq!(report.health_status, HealthStatus::Healthy);
        assert!(report.issues.is_empty());
        assert_eq!(report.message, "System is healthy: No anomalies detected.");
    }

    #[test]
    fn test_high_cpu_degrades() {
        let report = evaluate_health(&[signal(SignalName::CpuLoad1m, 0.95)]);

        assert_eq!(report.health_status, HealthStatus::Degraded);
        assert_eq!(report.issues, vec!["High CPU usage"]);
        assert_eq!(report.message, "Issues detected: High CPU usage");
    }

    #[test]
    fn test_boundary_values_do_not_fire() {
        let report = evaluate_health(&[
            signal(SignalName::CpuLoad1m, 0.8),
            signal(SignalName::MemoryUsedPercent, 0.85),
            signal(SignalName::DiskFreePercent, 0.15),
        ]);
        assert_eq!(report.health_status, HealthStatus::Healthy);
    }

    #[test]
    fn test_low_disk_is_critical_regardless_of_order() {
        let disk_first = evaluate_health(&[
            signal(SignalName::DiskFreePercent, 0.05),
            signal(SignalName::CpuLoad1m, 0.95),
            signal(SignalName::MemoryUsedPercent, 0.9),
        ]);
        assert_eq!(disk_first.health_status, HealthStatus::Critical);
        assert_eq!(disk_first.issues.len(), 3);

        let disk_last = evaluate_health(&[
            signal(SignalName::MemoryUsedPercent, 0.9),
            signal(SignalName::DiskFreePercent, 0.05),
        ]);
        assert_eq!(disk_last.health_status, HealthStatus::Critical);
        assert_eq!(
            disk_last.message,
            "Issues detected: High Memory usage, Low disk space"
        );
    }

    #[test]
    fn test_escalate_never_downgrades() {
        assert_eq!(
            HealthStatus::Critical.escalate(HealthStatus::Degraded),
            HealthStatus::Critical
        );
        assert_eq!(
            HealthStatus::Healthy.escalate(HealthStatus::Degraded),
            HealthStatus::Degraded
        );
    }
}
