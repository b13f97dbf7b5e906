use filestore_api::setup;
use filestore_api::telemetry;
use filestore_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    telemetry::init_telemetry().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Initialize the application (storage, conversion stack, routes)
    let (_state, router) = setup::initialize_app(&config).await?;

    // Start the server
    setup::server::start_server(&config, router).await?;

    Ok(())
}
