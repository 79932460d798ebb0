use reviewer_service::config::AppConfig;
use reviewer_service::services::assignment;
use reviewer_service::store::PgStore;
use reviewer_service::{router, AppState};
use reviewer_shared::clients::db::create_pool;
use reviewer_shared::middleware::{init_metrics, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("reviewer-service");

    let config = AppConfig::load()?;
    let addr = format!("0.0.0.0:{}", config.port);

    let pool = create_pool(&config.database_url, config.pool_settings())?;
    let store = PgStore::new(pool, config.statement_timeout(), config.transaction_timeout());
    let metrics_handle = init_metrics()?;
    assignment::describe_metrics();

    let app = router(AppState::new(store, config, Some(metrics_handle)));

    tracing::info!(addr = %addr, "reviewer-service starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("reviewer-service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
