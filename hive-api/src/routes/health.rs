use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use hive_core::store::Store;
use hive_shared::types::api::{HealthCheck, HealthResponse, HealthStatus};

use crate::state::AppState;

pub async fn health_check<S: Store>(State(state): State<AppState<S>>) -> Json<HealthResponse> {
    let mut checks = Vec::new();

    if let Some(redis) = &state.redis {
        checks.push(match redis.ping().await {
            Ok(()) => check("redis", HealthStatus::Healthy, None),
            Err(e) => check("redis", HealthStatus::Degraded, Some(e.to_string())),
        });
    }
    if let Some(rabbitmq) = &state.rabbitmq {
        checks.push(if rabbitmq.is_connected() {
            check("rabbitmq", HealthStatus::Healthy, None)
        } else {
            check("rabbitmq", HealthStatus::Degraded, Some("channel closed".into()))
        });
    }

    let response = HealthResponse::healthy("hive-api", env!("CARGO_PKG_VERSION"));
    Json(if checks.is_empty() { response } else { response.with_checks(checks) })
}

fn check(name: &str, status: HealthStatus, message: Option<String>) -> HealthCheck {
    HealthCheck { name: name.to_string(), status, message }
}

pub async fn metrics<S: Store>(State(state): State<AppState<S>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}
