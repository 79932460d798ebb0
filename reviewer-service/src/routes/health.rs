use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use reviewer_shared::{HealthCheck, HealthResponse, HealthStatus};

use crate::store::{run_blocking, Store};
use crate::AppState;

/// Health check that pings the store.
pub async fn health_check<S: Store>(State(state): State<Arc<AppState<S>>>) -> Response {
    let store = state.store.clone();
    let ping = run_blocking(move || store.transaction(|repo| Ok(repo.ping()?))).await;

    let check = match ping {
        Ok(()) => HealthCheck {
            name: "store".to_string(),
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => {
            tracing::warn!(error = ?e, "store health check failed");
            HealthCheck {
                name: "store".to_string(),
                status: HealthStatus::Unhealthy,
                message: Some("store unavailable".to_string()),
            }
        }
    };

    let response = HealthResponse::healthy("reviewer-service", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![check]);

    let status = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Returns Prometheus metrics.
pub async fn metrics<S: Store>(State(state): State<Arc<AppState<S>>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
