//! Application setup and initialization
//!
//! Wires configuration into the persistor, the conversion stack, and the
//! router. All selection (backend, kill-switch, timeouts) happens here,
//! once, at startup.

pub mod routes;
pub mod server;

use crate::file_handler::FileHandler;
use crate::state::AppState;
use anyhow::{Context, Result};
use filestore_convert::{CommandRunner, ImageConverter, ImageOptimiser, SafeExec};
use filestore_core::Config;
use filestore_storage::LocalFileWriter;
use std::sync::Arc;
use std::time::Duration;

/// Initialize the entire application
pub async fn initialize_app(config: &Config) -> Result<(Arc<AppState>, axum::Router)> {
    config.validate().context("Configuration validation failed")?;

    let persistor = filestore_storage::create_persistor(config)
        .await
        .context("Failed to create storage backend")?;

    let runner: Arc<dyn CommandRunner> = Arc::new(SafeExec::new(
        config.conversions_enabled(),
        Duration::from_secs(config.conversion_timeout_secs()),
        config.conversion_kill_signal().to_string(),
    ));
    let converter = Arc::new(ImageConverter::new(
        runner.clone(),
        config.convert_command_prefix().to_vec(),
    ));
    let optimiser = Arc::new(ImageOptimiser::new(runner, config.optimise_pngs()));

    let writer = LocalFileWriter::new(config.staging_path().map(std::path::PathBuf::from))
        .await
        .context("Failed to create staging directory")?;

    let handler = FileHandler::new(persistor, converter, optimiser, writer);

    let state = Arc::new(AppState { handler });

    tracing::info!(
        backend = %config.storage_backend(),
        conversions_enabled = config.conversions_enabled(),
        "Filestore initialized"
    );

    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
