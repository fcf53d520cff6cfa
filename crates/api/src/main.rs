use std::time::Duration;

use anyhow::Result;
use tracing::info;

use catalog_api::app::build_app;
use catalog_api::config::Config;
use catalog_api::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    init_logging(&config.logging);

    info!("Starting catalog worker v{}", env!("CARGO_PKG_VERSION"));

    let mut app = build_app(&config).await?;
    app.scheduler.start();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    app.scheduler.shutdown();
    app.scheduler.wait_for_shutdown(Duration::from_secs(10)).await;

    Ok(())
}
