//! Runs one scraping cycle immediately and prints what each source did.
//!
//! Takes the same lock as the daemon, so it refuses to run while a scheduled
//! cycle is in progress. The schedule itself is left untouched.
//!
//! Run with: cargo run --bin run-cycle [-- --json]

use anyhow::Result;

use opportunity_harvester::application::SchedulerError;
use opportunity_harvester::bootstrap::Harvester;
use opportunity_harvester::domain::{PageRequest, PostingKind};
use opportunity_harvester::infrastructure::ConfigManager;
use opportunity_harvester::infrastructure::logging::init_logging_with_config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigManager::new().load()?;
    init_logging_with_config(&config.logging)?;

    let harvester = Harvester::build(config).await?;
    harvester.scheduler.register().await?;

    let report = match harvester.scheduler.run_now().await {
        Ok(report) => report,
        Err(SchedulerError::Busy(task)) => {
            println!("'{task}' is running elsewhere; try again later");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if std::env::args().any(|arg| arg == "--json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{:<20} {:<12} {:>9} {:>7} {:>7} {:>7} {:>7}", "source", "kind", "extracted", "created", "updated", "dropped", "failed");
    println!("{}", "-".repeat(76));
    for source in &report.sources {
        match &source.fetch_error {
            None => println!(
                "{:<20} {:<12} {:>9} {:>7} {:>7} {:>7} {:>7}",
                source.source,
                source.kind.as_str(),
                source.extracted,
                source.created,
                source.updated,
                source.dropped,
                source.failed
            ),
            Some(e) => println!("{:<20} {:<12} unavailable: {}", source.source, source.kind.as_str(), e),
        }
    }
    println!("{}", "-".repeat(76));
    println!(
        "{} created, {} updated in {}s",
        report.created(),
        report.updated(),
        (report.finished_at - report.started_at).num_seconds()
    );

    for kind in PostingKind::ALL {
        let page = harvester.listing.page(kind, PageRequest::default()).await?;
        println!("{} {} postings stored", page.count, kind);
    }
    Ok(())
}
