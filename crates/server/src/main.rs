//! Digit classifier server
//!
//! Serves KNN training and prediction over HTTP, persisting the trained
//! model to a local directory.

use anyhow::Result;
use digits_lib::{FileRepository, Repository, ServiceMetrics, StructuredLogger};
use digits_server::{
    api,
    config::ServerConfig,
    health::{components, HealthRegistry},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = ServerConfig::load()?;
    info!(
        port = config.port,
        model_dir = %config.model_dir.display(),
        "Server configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::DATASET).await;
    health_registry.register(components::REPOSITORY).await;

    match &config.dataset_path {
        Some(path) if !path.exists() => {
            health_registry
                .set_unhealthy(
                    components::DATASET,
                    format!("Dataset file not found: {}", path.display()),
                )
                .await;
        }
        Some(_) => {}
        None => {
            warn!("DIGITS_DATASET_PATH not set, training is unavailable");
            health_registry
                .set_degraded(components::DATASET, "DIGITS_DATASET_PATH not set")
                .await;
        }
    }
    let source = config.data_source();

    let repository = Arc::new(FileRepository::new(&config.model_dir));
    health_registry
        .set_model_available(repository.exists())
        .await;

    let metrics = ServiceMetrics::new();
    let logger = StructuredLogger::new("server");
    logger.log_startup(SERVER_VERSION, &format!("0.0.0.0:{}", config.port));

    let app_state = Arc::new(api::AppState::new(
        source,
        repository,
        health_registry,
        metrics,
        logger.clone(),
    ));

    let api_handle = tokio::spawn(api::serve(config.port, app_state));

    tokio::select! {
        result = api_handle => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            logger.log_shutdown("SIGINT received");
        }
    }

    Ok(())
}
