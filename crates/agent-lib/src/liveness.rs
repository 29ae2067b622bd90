//! Liveness tracking for the pipeline's external collaborators
//!
//! Each collaborator's state is derived from the outcome of its most recent
//! call: a fetch that fell back to the built-in samples, a missing log file or
//! a skipped synthesis all read as degraded rather than down.

use crate::error::{FetchError, LogSourceError};
use crate::observability::SynthesisOutcome;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// External collaborator whose calls can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    MetricsSource,
    ModelAdapter,
    LogSource,
}

impl Component {
    pub const ALL: [Component; 3] = [
        Component::MetricsSource,
        Component::ModelAdapter,
        Component::LogSource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::MetricsSource => "metrics_source",
            Component::ModelAdapter => "model_adapter",
            Component::LogSource => "log_source",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one collaborator, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Up,
    Degraded,
    Down,
}

impl ComponentState {
    pub fn is_operational(&self) -> bool {
        *self != ComponentState::Down
    }
}

/// What happened on the most recent call to a collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded,
    /// The call failed but the caller carried on with a substitute
    Substituted(String),
    Failed(String),
}

impl Outcome {
    /// A failed scrape, degraded when the fallback samples were served
    pub fn fetch_failed(err: &FetchError, fell_back: bool) -> Self {
        if fell_back {
            Outcome::Substituted(err.to_string())
        } else {
            Outcome::Failed(err.to_string())
        }
    }

    /// A log read; an absent file only narrows the analysis to metrics
    pub fn log_read<T>(result: &Result<T, LogSourceError>) -> Self {
        match result {
            Ok(_) => Outcome::Succeeded,
            Err(e @ LogSourceError::NotFound(_)) => Outcome::Substituted(e.to_string()),
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }

    /// A synthesis step; anything short of a model answer falls back to the placeholder
    pub fn synthesis(outcome: SynthesisOutcome, detail: &str) -> Self {
        match outcome {
            SynthesisOutcome::Completed => Outcome::Succeeded,
            _ => Outcome::Substituted(detail.to_string()),
        }
    }

    /// No credential configured for the model adapter
    pub fn unconfigured() -> Self {
        Outcome::Substituted("no credential configured".to_string())
    }

    pub fn state(&self) -> ComponentState {
        match self {
            Outcome::Succeeded => ComponentState::Up,
            Outcome::Substituted(_) => ComponentState::Degraded,
            Outcome::Failed(_) => ComponentState::Down,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentLiveness {
    pub state: ComponentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl From<Outcome> for ComponentLiveness {
    fn from(outcome: Outcome) -> Self {
        let state = outcome.state();
        let message = match outcome {
            Outcome::Succeeded => None,
            Outcome::Substituted(m) | Outcome::Failed(m) => Some(m),
        };
        Self {
            state,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessReport {
    /// Worst state across all components
    pub status: ComponentState,
    pub components: BTreeMap<Component, ComponentLiveness>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Latest liveness of every collaborator, shared across handlers
///
/// Every component starts up until its first recorded call.
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    slots: Arc<RwLock<[ComponentLiveness; 3]>>,
    ready: Arc<AtomicBool>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        let up = || ComponentLiveness::from(Outcome::Succeeded);
        Self {
            slots: Arc::new(RwLock::new([up(), up(), up()])),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record the outcome of the latest call to `component`
    pub async fn update(&self, component: Component, outcome: Outcome) {
        let mut slots = self.slots.write().await;
        slots[component.index()] = outcome.into();
    }

    pub async fn state(&self, component: Component) -> ComponentState {
        self.slots.read().await[component.index()].state
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub async fn liveness(&self) -> LivenessReport {
        let slots = self.slots.read().await;
        let components: BTreeMap<_, _> = Component::ALL
            .iter()
            .map(|c| (*c, slots[c.index()].clone()))
            .collect();
        let status = components
            .values()
            .map(|c| c.state)
            .max()
            .unwrap_or(ComponentState::Up);

        LivenessReport { status, components }
    }

    pub async fn readiness(&self) -> ReadinessReport {
        if !self.ready.load(Ordering::SeqCst) {
            return ReadinessReport {
                ready: false,
                reason: Some("Service not yet initialized".to_string()),
            };
        }

        let down: Vec<&str> = self
            .liveness()
            .await
            .components
            .iter()
            .filter(|(_, c)| !c.state.is_operational())
            .map(|(name, _)| name.as_str())
            .collect();

        if down.is_empty() {
            ReadinessReport {
                ready: true,
                reason: None,
            }
        } else {
            ReadinessReport {
                ready: false,
                reason: Some(format!("Down: {}", down.join(", "))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_registry_starts_up() {
        let registry = ComponentRegistry::new();
        let liveness = registry.liveness().await;

        assert_eq!(liveness.status, ComponentState::Up);
        assert_eq!(liveness.components.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_fallback_degrades_and_no_fallback_is_down() {
        let registry = ComponentRegistry::new();
        let err = FetchError::HttpStatus {
            url: "http://node:9100/metrics".to_string(),
            status: 502,
        };

        registry
            .update(Component::MetricsSource, Outcome::fetch_failed(&err, true))
            .await;
        assert_eq!(
            registry.state(Component::MetricsSource).await,
            ComponentState::Degraded
        );

        registry
            .update(Component::MetricsSource, Outcome::fetch_failed(&err, false))
            .await;
        let liveness = registry.liveness().await;
        assert_eq!(liveness.status, ComponentState::Down);
        assert!(liveness.components[&Component::MetricsSource]
            .message
            .as_deref()
            .unwrap()
            .contains("502"));
    }

    #[tokio::test]
    async fn test_log_read_outcomes() {
        let registry = ComponentRegistry::new();

        let missing: Result<String, _> =
            Err(LogSourceError::NotFound("/var/log/app.log".to_string()));
        registry
            .update(Component::LogSource, Outcome::log_read(&missing))
            .await;
        assert_eq!(
            registry.state(Component::LogSource).await,
            ComponentState::Degraded
        );

        let timed_out: Result<String, _> = Err(LogSourceError::Timeout {
            path: "/var/log/app.log".to_string(),
            timeout: Duration::from_secs(5),
        });
        registry
            .update(Component::LogSource, Outcome::log_read(&timed_out))
            .await;
        assert_eq!(
            registry.state(Component::LogSource).await,
            ComponentState::Down
        );

        // Recovery follows the latest call
        let read: Result<String, LogSourceError> = Ok("ERROR boom".to_string());
        registry
            .update(Component::LogSource, Outcome::log_read(&read))
            .await;
        assert_eq!(registry.liveness().await.status, ComponentState::Up);
    }

    #[tokio::test]
    async fn test_synthesis_outcomes() {
        assert_eq!(
            Outcome::synthesis(SynthesisOutcome::Completed, "").state(),
            ComponentState::Up
        );
        assert_eq!(
            Outcome::synthesis(SynthesisOutcome::Failed, "timeout").state(),
            ComponentState::Degraded
        );
        assert_eq!(Outcome::unconfigured().state(), ComponentState::Degraded);
    }

    #[tokio::test]
    async fn test_readiness() {
        let registry = ComponentRegistry::new();
        assert!(!registry.readiness().await.ready);

        registry.set_ready(true);
        registry
            .update(Component::ModelAdapter, Outcome::unconfigured())
            .await;
        assert!(registry.readiness().await.ready);

        registry
            .update(Component::LogSource, Outcome::Failed("io error".to_string()))
            .await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Down: log_source"));
    }

    #[test]
    fn test_liveness_serializes_component_keys() {
        let report = LivenessReport {
            status: ComponentState::Degraded,
            components: BTreeMap::from([(
                Component::ModelAdapter,
                ComponentLiveness::from(Outcome::unconfigured()),
            )]),
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["components"]["model_adapter"]["state"], "degraded");
    }
}
