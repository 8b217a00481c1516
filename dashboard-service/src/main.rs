use dashboard_service::config::get_configuration;
use dashboard_service::services::{HttpIdentityProvider, RestProjectStore};
use dashboard_service::startup::build_router;
use dashboard_service::AppState;
use dotenvy::dotenv;
use service_core::observability::{init_tracing, install_recorder};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "dashboard-service",
        &configuration.server.log_level,
        configuration.server.otlp_endpoint.as_deref(),
    )?;

    let metrics_handle = install_recorder()?;

    let identity = Arc::new(HttpIdentityProvider::new(configuration.identity.clone())?);
    let store = Arc::new(RestProjectStore::new(configuration.identity.clone())?);

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );

    let state = AppState::new(configuration, identity, store).with_metrics(metrics_handle);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting dashboard-service on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
