//! Core data models for the telemetry pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric type declared by a `# TYPE` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
    Untyped,
    /// No `# TYPE` line applied to the sample
    Unknown,
}

impl MetricType {
    /// Parse the type token of a `# TYPE` line.
    ///
    /// Tokens outside the classic exposition vocabulary map to `Untyped`.
    pub fn from_type_token(token: &str) -> Self {
        match token {
            "counter" => MetricType::Counter,
            "gauge" => MetricType::Gauge,
            "histogram" => MetricType::Histogram,
            "summary" => MetricType::Summary,
            _ => MetricType::Untyped,
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricType::Counter => write!(f, "counter"),
            MetricType::Gauge => write!(f, "gauge"),
            MetricType::Histogram => write!(f, "histogram"),
            MetricType::Summary => write!(f, "summary"),
            MetricType::Untyped => write!(f, "untyped"),
            MetricType::Unknown => write!(f, "unknown"),
        }
    }
}

/// One parsed exposition line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    /// Optional exposition timestamp in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
}

impl Sample {
    /// Build an unlabeled sample
    pub fn new(name: impl Into<String>, value: f64, metric_type: MetricType) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
            value,
            metric_type,
            timestamp_ms: None,
        }
    }

    /// Add a label to the sample
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Get a label value
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Category of a derived signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalCategory {
    Cpu,
    Memory,
    Disk,
}

/// Fixed vocabulary of derived signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalName {
    /// 1 minute load average, passed through as-is
    #[serde(rename = "cpu_load_1m")]
    CpuLoad1m,
    /// Fraction of memory in use, 0..1
    MemoryUsedPercent,
    /// Fraction of the root filesystem that is free, 0..1
    DiskFreePercent,
}

impl SignalName {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalName::CpuLoad1m => "cpu_load_1m",
            SignalName::MemoryUsedPercent => "memory_used_percent",
            SignalName::DiskFreePercent => "disk_free_percent",
        }
    }

    pub fn category(&self) -> SignalCategory {
        match self {
            SignalName::CpuLoad1m => SignalCategory::Cpu,
            SignalName::MemoryUsedPercent => SignalCategory::Memory,
            SignalName::DiskFreePercent => SignalCategory::Disk,
        }
    }
}

impl std::fmt::Display for SignalName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source tag attached to every normalized signal
pub const PROMETHEUS_SOURCE: &str = "prometheus";

/// A derived health signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSignal {
    pub source: String,
    pub category: SignalCategory,
    pub metric: SignalName,
    pub value: f64,
    /// Epoch seconds of the collection instant
    pub timestamp: i64,
}

impl NormalizedSignal {
    pub fn new(metric: SignalName, value: f64, timestamp: i64) -> Self {
        Self {
            source: PROMETHEUS_SOURCE.to_string(),
            category: metric.category(),
            metric,
            value,
            timestamp,
        }
    }
}

/// Direction of change against the last observed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

/// A signal enriched with its trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSignal {
    pub name: SignalName,
    pub value: f64,
    pub trend: Trend,
}

/// Trend-annotated agent input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSignals {
    pub source: String,
    pub signals: Vec<AgentSignal>,
    pub window: String,
}

/// Round to a fixed number of decimal places
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_name_serializes_to_vocabulary() {
        let json = serde_json::to_string(&SignalName::CpuLoad1m).unwrap();
        assert_eq!(json, "\"cpu_load_1m\"");
        let json = serde_json::to_string(&SignalName::MemoryUsedPercent).unwrap();
        assert_eq!(json, "\"memory_used_percent\"");
    }

    #[test]
    fn test_normalized_signal_shape() {
        let signal = NormalizedSignal::new(SignalName::DiskFreePercent, 0.42, 1_700_000_000);
        let json = serde_json::to_value(&signal).unwrap();

        assert_eq!(json["source"], "prometheus");
        assert_eq!(json["category"], "disk");
        assert_eq!(json["metric"], "disk_free_percent");
        assert_eq!(json["timestamp"], 1_700_000_000);
    }

    #[test]
    fn test_sample_type_field_name() {
        let sample = Sample::new("node_load1", 0.5, MetricType::Gauge);
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["type"], "gauge");
        assert!(json.get("timestamp_ms").is_none());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(0.5, 2), 0.5);
    }
}
