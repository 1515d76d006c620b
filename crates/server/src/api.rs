//! HTTP API for training, prediction, health checks and Prometheus metrics

use crate::health::{components, ComponentStatus, HealthRegistry};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use digits_lib::{
    commands::names, CommandRegistry, CommandResult, DataSource, ErrorKind, Repository,
    ServiceMetrics, StructuredLogger,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Shared application state
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
    registry: Arc<CommandRegistry>,
    /// Held by the blocking task for the whole of a command, so train and
    /// predict never interleave even when the request is dropped
    command_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        source: Arc<dyn DataSource>,
        repository: Arc<dyn Repository>,
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            registry: Arc::new(CommandRegistry::standard(source, repository, logger)),
            command_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Run a registered command on the blocking pool
    async fn dispatch(&self, name: &'static str, input: Value) -> CommandResult<Value> {
        let guard = self.command_lock.clone().lock_owned().await;
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            registry.dispatch(name, input)
        })
            .await
            .unwrap_or_else(|e| {
                error!(command = name, error = %e, "Command task failed");
                CommandResult::failure(ErrorKind::Internal, format!("command task failed: {}", e))
            })
    }
}

/// HTTP status for a command outcome
pub fn status_for(result: &CommandResult<Value>) -> StatusCode {
    match result.error_kind {
        None => StatusCode::OK,
        Some(ErrorKind::InvalidParameter | ErrorKind::InvalidShape | ErrorKind::InvalidInput) => {
            StatusCode::BAD_REQUEST
        }
        Some(ErrorKind::NotLoaded | ErrorKind::NotTrained) => StatusCode::CONFLICT,
        Some(ErrorKind::NotFound | ErrorKind::UnknownCommand) => StatusCode::NOT_FOUND,
        Some(ErrorKind::Persistence | ErrorKind::DataSource | ErrorKind::Internal) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn respond(result: CommandResult<Value>) -> Response {
    (status_for(&result), Json(result)).into_response()
}

/// Parse a JSON request body; an empty body is `null`
fn parse_body(body: &Bytes) -> Result<Value, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| {
        respond(CommandResult::failure(
            ErrorKind::InvalidInput,
            format!("invalid JSON body: {}", e),
        ))
    })
}

async fn record_failure(state: &AppState, command: &str, result: &CommandResult<Value>) {
    let Some(kind) = result.error_kind else {
        return;
    };
    state.metrics.inc_errors(command, kind.as_str());
    match kind {
        ErrorKind::Persistence => {
            state
                .health_registry
                .set_degraded(components::REPOSITORY, result.message.clone())
                .await
        }
        ErrorKind::DataSource => {
            state
                .health_registry
                .set_degraded(components::DATASET, result.message.clone())
                .await
        }
        _ => {}
    }
}

async fn train(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let input = match parse_body(&body) {
        Ok(input) => input,
        Err(rejection) => return rejection,
    };

    let start = Instant::now();
    let result = state.dispatch(names::TRAIN, input).await;

    if result.success {
        let accuracy = result
            .data
            .as_ref()
            .and_then(|data| data["accuracy"].as_f64());
        state.metrics.observe_train(start.elapsed(), accuracy);
        state.health_registry.set_healthy(components::DATASET).await;
        state.health_registry.set_healthy(components::REPOSITORY).await;
        state.health_registry.set_model_available(true).await;
    } else {
        record_failure(&state, names::TRAIN, &result).await;
    }
    respond(result)
}

async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let input = match parse_body(&body) {
        Ok(input) => input,
        Err(rejection) => return rejection,
    };

    let start = Instant::now();
    let result = state.dispatch(names::PREDICT, input).await;
    state.metrics.observe_predict(start.elapsed());
    record_failure(&state, names::PREDICT, &result).await;
    respond(result)
}

async fn stored_result(State(state): State<Arc<AppState>>) -> Response {
    respond(state.dispatch(names::RESULT, Value::Null).await)
}

async fn stored_params(State(state): State<Arc<AppState>>) -> Response {
    respond(state.dispatch(names::PARAMS, Value::Null).await)
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once a trained model is stored
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/train", post(train))
        .route("/api/v1/predict", post(predict))
        .route("/api/v1/result", get(stored_result))
        .route("/api/v1/params", get(stored_params))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
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
