pub mod api; // HTTP surface
pub mod audit;
pub mod auth; // Back-office accounts and sessions
pub mod booking; // Public booking workflow
pub mod config;
pub mod core_state; // Transport-agnostic state
pub mod dashboard;
pub mod db;
pub mod error;
pub mod integrations; // Mail relay, attachment store, PayPal
pub mod models;
pub mod patients;
pub mod payments;
pub mod report; // Visit reports and PDF rendering
pub mod results;
pub mod status;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Core(#[from] core_state::CoreError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
}

/// Load configuration, wire adapters and serve the API until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    let config = config::AppConfig::from_env()?;
    tracing::info!(
        "{} starting v{} (data dir {})",
        config::APP_NAME,
        config::APP_VERSION,
        config.data_dir.display()
    );

    let bind_addr = config.bind_addr;
    let core = tokio::task::spawn_blocking(move || core_state::CoreState::from_config(config))
        .await
        .map_err(|e| api::ServerError::Task(e.to_string()))??;

    api::serve_until_ctrl_c(Arc::new(core), bind_addr).await?;
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
