use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use reviewer_shared::middleware::metrics_middleware;

pub mod config;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

use config::AppConfig;
use store::Store;

pub struct AppState<S> {
    pub store: Arc<S>,
    pub config: AppConfig,
    /// `None` when no Prometheus recorder is installed, as in tests.
    pub metrics_handle: Option<PrometheusHandle>,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, config: AppConfig, metrics_handle: Option<PrometheusHandle>) -> Self {
        Self {
            store: Arc::new(store),
            config,
            metrics_handle,
        }
    }
}

pub fn router<S: Store>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check::<S>))
        .route("/metrics", get(routes::health::metrics::<S>))
        .route("/team/add", post(routes::team::add_team::<S>))
        .route("/team/get", get(routes::team::get_team::<S>))
        .route("/users/setIsActive", post(routes::users::set_is_active::<S>))
        .route("/users/getReview", get(routes::users::get_review::<S>))
        .route("/users/deactivate", post(routes::users::deactivate::<S>))
        .route("/pullRequest/create", post(routes::pull_requests::create::<S>))
        .route("/pullRequest/merge", post(routes::pull_requests::merge::<S>))
        .route("/pullRequest/reassign", post(routes::pull_requests::reassign::<S>))
        .route("/stats/assignments", get(routes::stats::assignments::<S>))
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
