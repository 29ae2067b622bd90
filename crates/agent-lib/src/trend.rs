//! Trend detection against the last observed value per signal
//!
//! The store keeps exactly one value per signal name for the lifetime of the
//! process. Each observation is an atomic read-then-overwrite on that key, so
//! concurrent requests never lose an update.

use crate::models::{AgentSignal, AgentSignals, NormalizedSignal, Trend, PROMETHEUS_SOURCE};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// Changes smaller than this are reported as stable
pub const TREND_TOLERANCE: f64 = 1e-4;

/// Window label attached to agent input
pub const SIGNAL_WINDOW: &str = "5m";

/// Last-value table keyed by signal name
#[derive(Debug, Default)]
pub struct TrendStore {
    last_values: DashMap<String, f64>,
}

impl TrendStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value and classify it against the previous one
    pub fn observe(&self, name: &str, value: f64) -> Trend {
        match self.last_values.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                let previous = entry.insert(value);
                classify(value - previous)
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
                Trend::Stable
            }
        }
    }

    /// Last recorded value for a signal
    pub fn last_value(&self, name: &str) -> Option<f64> {
        self.last_values.get(name).map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.last_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_values.is_empty()
    }

    /// Copy of the finite last values, for persisting between runs
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.last_values
            .iter()
            .filter(|entry| entry.value().is_finite())
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Store seeded with values from an earlier run
    pub fn from_snapshot(values: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            last_values: values.into_iter().collect(),
        }
    }
}

/// NaN or infinite deltas carry no direction and read as stable
fn classify(delta: f64) -> Trend {
    if !delta.is_finite() || delta.abs() < TREND_TOLERANCE {
        Trend::Stable
    } else if delta > 0.0 {
        Trend::Increasing
    } else {
        Trend::Decreasing
    }
}

/// Annotate normalized signals with trends, updating the store in batch order
pub fn build_agent_signals(store: &TrendStore, normalized: &[NormalizedSignal]) -> AgentSignals {
    let signals = normalized
        .iter()
        .map(|signal| AgentSignal {
            name: signal.metric,
            value: signal.value,
            trend: store.observe(signal.metric.as_str(), signal.value),
        })
        .collect();

    AgentSignals {
        source: PROMETHEUS_SOURCE.to_string(),
        signals,
        window: SIGNAL_WINDOW.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignalName;
    use std::sync::Arc;

    #[test]
    fn test_first_observation_is_stable() {
        let store = TrendStore::new();
        assert_eq!(store.observe("cpu_load_1m", 5.0), Trend::Stable);
        assert_eq!(store.last_value("cpu_load_1m"), Some(5.0));
    }

    #[test]
    fn test_classification() {
        let store = TrendStore::new();
        store.observe("m", 0.5);

        assert_eq!(store.observe("m", 0.6), Trend::Increasing);
        assert_eq!(store.observe("m", 0.4), Trend::Decreasing);
        assert_eq!(store.observe("m", 0.40005), Trend::Stable);
    }

    #[test]
    fn test_non_finite_values_are_stable() {
        let store = TrendStore::new();
        store.observe("cpu_load_1m", 0.5);

        assert_eq!(store.observe("cpu_load_1m", f64::NAN), Trend::Stable);
        assert_eq!(store.observe("cpu_load_1m", 0.7), Trend::Stable);
        assert_eq!(store.observe("cpu_load_1m", f64::INFINITY), Trend::Stable);
        assert_eq!(store.observe("cpu_load_1m", f64::INFINITY), Trend::Stable);
        assert_eq!(store.observe("cpu_load_1m", 0.2), Trend::Stable);
        assert_eq!(store.observe("cpu_load_1m", 0.1), Trend::Decreasing);
    }

    #[test]
    fn test_snapshot_round_trip_skips_non_finite() {
        let store = TrendStore::new();
        store.observe("cpu_load_1m", 0.5);
        store.observe("disk_free_percent", f64::NAN);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);

        let restored = TrendStore::from_snapshot(snapshot);
        assert_eq!(restored.observe("cpu_load_1m", 0.9), Trend::Increasing);
        assert_eq!(restored.observe("disk_free_percent", 0.3), Trend::Stable);
    }

    #[test]
    fn test_names_are_independent() {
        let store = TrendStore::new();
        store.observe("a", 1.0);
        assert_eq!(store.observe("b", 2.0), Trend::Stable);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_build_agent_signals() {
        let store = TrendStore::new();
        let first = vec![NormalizedSignal::new(SignalName::CpuLoad1m, 0.5, 1)];
        let second = vec![NormalizedSignal::new(SignalName::CpuLoad1m, 0.9, 2)];

        let input = build_agent_signals(&store, &first);
        assert_eq!(input.source, "prometheus");
        assert_eq!(input.window, "5m");
        assert_eq!(input.signals[0].trend, Trend::Stable);

        let input = build_agent_signals(&store, &second);
        assert_eq!(input.signals[0].name, SignalName::CpuLoad1m);
        assert_eq!(input.signals[0].trend, Trend::Increasing);
    }

    #[test]
    fn test_duplicates_in_batch_see_earlier_value() {
        let store = TrendStore::new();
        let batch = vec![
            NormalizedSignal::new(SignalName::CpuLoad1m, 0.5, 1),
            NormalizedSignal::new(SignalName::CpuLoad1m, 0.3, 1),
        ];

        let input = build_agent_signals(&store, &batch);
        assert_eq!(input.signals[0].trend, Trend::Stable);
        assert_eq!(input.signals[1].trend, Trend::Decreasing);
        assert_eq!(store.last_value("cpu_load_1m"), Some(0.3));
    }

    #[tokio::test]
    async fn test_concurrent_observations_are_not_lost() {
        let store = Arc::new(TrendStore::new());
        let mut handles = Vec::new();

        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.observe("shared", i as f64);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), 1);
        let last = store.last_value("shared").unwrap();
        assert!((0.0..32.0).contains(&last));
    }
}
