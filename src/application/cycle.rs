//! One pass over every configured source

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use super::source_runner::{SourceReport, SourceRunner};
use crate::domain::{PostingKind, SourceConfig};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    #[error("A scraping cycle is already running in this process")]
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
}

impl CycleReport {
    pub fn created(&self) -> usize {
        self.sources.iter().map(|s| s.created).sum()
    }

    pub fn updated(&self) -> usize {
        self.sources.iter().map(|s| s.updated).sum()
    }

    pub fn failed_sources(&self) -> Vec<&SourceReport> {
        self.sources.iter().filter(|s| !s.is_success()).collect()
    }
}

pub struct OpportunityCycle {
    runner: SourceRunner,
    sources: Vec<SourceConfig>,
    running: Mutex<()>,
}

impl OpportunityCycle {
    pub fn new(runner: SourceRunner, sources: Vec<SourceConfig>) -> Self {
        Self {
            runner,
            sources,
            running: Mutex::new(()),
        }
    }

    /// Enabled sources in run order: every job source, then every
    /// scholarship source, each in configuration order
    pub fn planned_sources(&self) -> Vec<&SourceConfig> {
        PostingKind::ALL
            .iter()
            .flat_map(|kind| {
                self.sources
                    .iter()
                    .filter(move |source| source.enabled && source.kind == *kind)
            })
            .collect()
    }

    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let _guard = self.running.try_lock().map_err(|_| CycleError::AlreadyRunning)?;

        let started_at = Utc::now();
        let planned = self.planned_sources();
        info!("Scraping cycle started ({} sources)", planned.len());

        let mut sources = Vec::with_capacity(planned.len());
        for source in planned {
            sources.push(self.runner.run(source).await);
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            sources,
        };
        info!(
            "Scraping cycle finished: {} created, {} updated, {} sources failed",
            report.created(),
            report.updated(),
            report.failed_sources().len()
        );
        Ok(report)
    }
}
