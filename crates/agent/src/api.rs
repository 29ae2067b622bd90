//! HTTP API for telemetry, agents, health checks and Prometheus metrics

use crate::config::ServiceConfig;
use agent_lib::{
    agents::{analyze_alert, analyze_reliability, evaluate_health, Investigator},
    ingest::{FileLogSource, LogSource, MetricsSource},
    liveness::{ComponentRegistry, ComponentState},
    observability::StructuredLogger,
    synthesis::{with_credential_override, ModelConfig, TextGenerator},
    MetricsPipeline, PipelineError, Supervisor, TrendStore,
};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Header carrying a per-request model credential
pub const MODEL_KEY_HEADER: &str = "x-model-key";

/// Shared application state
pub struct AppState {
    pub registry: ComponentRegistry,
    pub pipeline: MetricsPipeline,
    pub supervisor: Supervisor,
    pub generator: Arc<dyn TextGenerator>,
    pub model_config: ModelConfig,
    pub logger: StructuredLogger,
    default_metrics_url: String,
    default_log_path: String,
    model_deadline: Duration,
    log_read_timeout: Duration,
}

impl AppState {
    pub fn new(
        config: &ServiceConfig,
        source: Arc<dyn MetricsSource>,
        generator: Arc<dyn TextGenerator>,
        registry: ComponentRegistry,
    ) -> Self {
        let logger = StructuredLogger::new(&config.instance_name);
        let model_config = config.model_config();

        let mut pipeline = MetricsPipeline::new(source, Arc::new(TrendStore::new()))
            .with_logger(logger.clone())
            .with_registry(registry.clone());
        if !config.fallback_on_fetch_error {
            pipeline = pipeline.without_fallback();
        }

        let supervisor = Supervisor::new(generator.clone())
            .with_model_config(model_config.clone())
            .with_config(config.supervisor_config())
            .with_logger(logger.clone())
            .with_registry(registry.clone());

        Self {
            registry,
            pipeline,
            supervisor,
            generator,
            model_config,
            logger,
            default_metrics_url: config.default_metrics_url.clone(),
            default_log_path: config.default_log_path.clone(),
            model_deadline: config.model_deadline(),
            log_read_timeout: config.log_read_timeout(),
        }
    }

    fn metrics_url<'a>(&'a self, requested: &'a Option<String>) -> &'a str {
        requested
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(&self.default_metrics_url)
    }

    fn log_source(&self, requested: Option<&str>) -> Arc<dyn LogSource> {
        let path = requested
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.default_log_path);
        Arc::new(FileLogSource::new(path).with_timeout(self.log_read_timeout))
    }
}

/// Pipeline failure mapped onto an HTTP status
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_bad_request() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        };
        warn!(status = status.as_u16(), error = %self.0, "Request failed");

        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TelemetryQuery {
    pub url: Option<String>,
    pub log_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuperviseRequest {
    #[serde(default)]
    pub agents: Vec<String>,
    pub url: Option<String>,
    pub log_path: Option<String>,
    pub api_key: Option<String>,
}

/// Agent report plus the collection state it was computed from
#[derive(Serialize)]
struct AgentResponse<T: Serialize> {
    #[serde(flatten)]
    report: T,
    degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_error: Option<String>,
}

#[derive(Serialize)]
struct TelemetryResponse<T: Serialize> {
    count: usize,
    data: Vec<T>,
    skipped_lines: usize,
    degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Liveness response - returns 200 while operational, 503 once a component is down
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let liveness = state.registry.liveness().await;

    let status_code = match liveness.status {
        ComponentState::Up | ComponentState::Degraded => StatusCode::OK,
        ComponentState::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(liveness))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode self-metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn raw_telemetry(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TelemetryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let collected = state
        .pipeline
        .collect(state.metrics_url(&query.url))
        .await?;

    Ok(Json(TelemetryResponse {
        count: collected.samples.len(),
        data: collected.samples,
        skipped_lines: collected.skipped_lines,
        degraded: collected.degraded,
        error: collected.error,
    }))
}

async fn normalized_telemetry(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TelemetryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let collected = state
        .pipeline
        .collect(state.metrics_url(&query.url))
        .await?;

    Ok(Json(TelemetryResponse {
        count: collected.normalized.len(),
        data: collected.normalized,
        skipped_lines: collected.skipped_lines,
        degraded: collected.degraded,
        error: collected.error,
    }))
}

async fn agent_input(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TelemetryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let input = state
        .pipeline
        .agent_input(state.metrics_url(&query.url))
        .await?;
    Ok(Json(input))
}

async fn health_agent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TelemetryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let collected = state
        .pipeline
        .collect(state.metrics_url(&query.url))
        .await?;

    Ok(Json(AgentResponse {
        report: evaluate_health(&collected.normalized),
        degraded: collected.degraded,
        metrics_error: collected.error,
    }))
}

async fn reliability_agent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TelemetryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let collected = state
        .pipeline
        .collect(state.metrics_url(&query.url))
        .await?;

    Ok(Json(AgentResponse {
        report: analyze_reliability(&collected.normalized),
        degraded: collected.degraded,
        metrics_error: collected.error,
    }))
}

async fn investigate_agent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TelemetryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let collected = state
        .pipeline
        .collect(state.metrics_url(&query.url))
        .await?;

    let log_source = state.log_source(query.log_path.as_deref());
    let report = Investigator::new(state.generator.clone())
        .with_deadline(state.model_deadline)
        .with_logger(state.logger.clone())
        .with_registry(state.registry.clone())
        .run(Some(log_source.as_ref()), &collected.normalized)
        .await;

    Ok(Json(AgentResponse {
        report,
        degraded: collected.degraded,
        metrics_error: collected.error,
    }))
}

async fn alert_agent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TelemetryQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let collected = state
        .pipeline
        .collect(state.metrics_url(&query.url))
        .await?;

    let credential = headers
        .get(MODEL_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    let generator = with_credential_override(&state.generator, &state.model_config, credential);

    let report = analyze_alert(generator.as_ref(), &collected.normalized, state.model_deadline).await;

    Ok(Json(AgentResponse {
        report,
        degraded: collected.degraded,
        metrics_error: collected.error,
    }))
}

async fn supervise(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SuperviseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Reject unknown agents before touching the metrics endpoint
    let kinds = Supervisor::parse_agents(request.agents.as_slice())?;
    info!(agents = ?kinds, "Supervising agents");

    let collected = state
        .pipeline
        .collect(state.metrics_url(&request.url))
        .await?;

    let report = state
        .supervisor
        .supervise(
            request.agents.as_slice(),
            &collected.normalized,
            Some(state.log_source(request.log_path.as_deref())),
            request.api_key.as_deref(),
        )
        .await?;

    Ok(Json(AgentResponse {
        report,
        degraded: collected.degraded,
        metrics_error: collected.error,
    }))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/telemetry/prometheus/raw", get(raw_telemetry))
        .route("/telemetry/prometheus/normalized", get(normalized_telemetry))
        .route("/agents/input/prometheus", get(agent_input))
        .route("/agents/health", get(health_agent))
        .route("/agents/reliability", get(reliability_agent))
        .route("/agents/investigate", get(investigate_agent))
        .route("/agents/alert", get(alert_agent))
        .route("/agents/supervise", post(supervise))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
