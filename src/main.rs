//! Daemon: registers the daily scraping task and runs it until Ctrl-C

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use opportunity_harvester::bootstrap::Harvester;
use opportunity_harvester::infrastructure::ConfigManager;
use opportunity_harvester::infrastructure::logging::{init_logging_with_config, log_system_info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigManager::new().load()?;
    init_logging_with_config(&config.logging)?;
    log_system_info();

    let harvester = Harvester::build(config).await?;
    harvester.scheduler.register().await?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!("Could not listen for Ctrl-C: {}", e),
        }
        signal_token.cancel();
    });

    harvester.scheduler.run(shutdown).await?;
    Ok(())
}
