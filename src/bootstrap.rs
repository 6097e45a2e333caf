//! Wires configuration, storage, HTTP and the use cases together

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::application::{OpportunityCycle, PostingListing, Reconciler, Scheduler, SourceRunner};
use crate::infrastructure::{AppConfig, DatabaseConnection, HttpClient, SqlitePostingRepository, SqliteTaskRegistry};

pub struct Harvester {
    pub config: AppConfig,
    pub scheduler: Scheduler,
    pub listing: PostingListing,
}

impl Harvester {
    /// Opens and migrates the database, then builds the pipeline for the
    /// configured sources
    pub async fn build(config: AppConfig) -> Result<Self> {
        let db = DatabaseConnection::from_config(&config.database)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.url))?;
        db.migrate().await.context("Failed to migrate database")?;
        let pool = Arc::new(db.into_pool());

        let postings = Arc::new(SqlitePostingRepository::from_arc(Arc::clone(&pool)));
        let registry = Arc::new(SqliteTaskRegistry::from_arc(pool));
        let fetcher = Arc::new(HttpClient::new(config.http.clone())?);

        let runner = SourceRunner::new(fetcher, Reconciler::new(postings.clone()), config.http.detail_concurrency)?;
        let cycle = Arc::new(OpportunityCycle::new(runner, config.sources.clone()));
        info!("Pipeline ready with {} sources", cycle.planned_sources().len());

        Ok(Self {
            scheduler: Scheduler::new(registry, cycle, config.scheduler.clone()),
            listing: PostingListing::new(postings),
            config,
        })
    }
}
