//! Persisted daily schedule for the scraping cycle.
//!
//! Registration is idempotent and keyed by task name. Runs are serialized by a
//! lock column in the registry, so several processes can share one database
//! without overlapping cycles. A lock older than `stale_lock_seconds` is
//! treated as abandoned.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cycle::{CycleError, CycleReport, OpportunityCycle};
use crate::domain::{Registration, RunOutcome, ScheduledTask, StoreError, TaskRegistry};
use crate::infrastructure::config::SchedulerConfig;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Task '{0}' is not registered")]
    NotRegistered(String),

    #[error("Task '{0}' is already running")]
    Busy(String),

    #[error("Cycle for task '{task}' failed: {reason}")]
    CycleFailed { task: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// First slot `run_at + k * period` (k >= 1) strictly after `now`
pub fn next_run_after(run_at: DateTime<Utc>, period: Duration, now: DateTime<Utc>) -> DateTime<Utc> {
    let period_secs = i64::try_from(period.as_secs()).unwrap_or(i64::MAX).max(1);
    let elapsed = (now - run_at).num_seconds();
    let k = if elapsed < 0 { 1 } else { elapsed / period_secs + 1 };

    k.checked_mul(period_secs)
        .and_then(TimeDelta::try_seconds)
        .and_then(|offset| run_at.checked_add_signed(offset))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub struct Scheduler {
    registry: Arc<dyn TaskRegistry>,
    cycle: Arc<OpportunityCycle>,
    config: SchedulerConfig,
    /// Identifies this process in the lock column
    owner: String,
}

impl Scheduler {
    pub fn new(registry: Arc<dyn TaskRegistry>, cycle: Arc<OpportunityCycle>, config: SchedulerConfig) -> Self {
        Self {
            registry,
            cycle,
            config,
            owner: format!("harvester-{}", uuid::Uuid::new_v4()),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn task_name(&self) -> &str {
        &self.config.task_name
    }

    fn stale_after(&self) -> Duration {
        Duration::from_secs(self.config.stale_lock_seconds)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.poll_interval_seconds.max(1))
    }

    /// Registers the recurring task unless it already exists; calling it again
    /// changes nothing
    pub async fn register(&self) -> Result<Registration, SchedulerError> {
        let first_run_at = Utc::now()
            + TimeDelta::try_seconds(i64::try_from(self.config.initial_delay_seconds).unwrap_or(0))
                .unwrap_or_default();
        let registration = self
            .registry
            .register_if_absent(
                &self.config.task_name,
                first_run_at,
                Duration::from_secs(self.config.repeat_every_seconds),
            )
            .await?;

        match &registration {
            Registration::Created(task) => {
                info!("Scheduled '{}' first run at {}", task.task_name, task.run_at);
            }
            Registration::AlreadyRegistered(task) => {
                info!("'{}' already scheduled; next run at {}", task.task_name, task.run_at);
            }
        }
        Ok(registration)
    }

    async fn load_task(&self) -> Result<ScheduledTask, SchedulerError> {
        self.registry
            .find(&self.config.task_name)
            .await?
            .ok_or_else(|| SchedulerError::NotRegistered(self.config.task_name.clone()))
    }

    /// Runs one cycle now under the shared lock without moving the schedule
    pub async fn run_now(&self) -> Result<CycleReport, SchedulerError> {
        self.load_task().await?;
        self.execute(false).await
    }

    /// Waits for due slots and runs them until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), SchedulerError> {
        info!("Scheduler started as {}", self.owner);

        while !shutdown.is_cancelled() {
            let task = match self.load_task().await {
                Ok(task) => task,
                Err(SchedulerError::NotRegistered(name)) => return Err(SchedulerError::NotRegistered(name)),
                Err(e) => {
                    error!("Could not read schedule: {}", e);
                    self.sleep_or_cancel(self.poll_interval(), &shutdown).await;
                    continue;
                }
            };

            let now = Utc::now();
            if task.run_at > now {
                let until_due = (task.run_at - now).to_std().unwrap_or_default();
                let wait = until_due.min(self.poll_interval());
                debug!("Next run at {}; sleeping {:?}", task.run_at, wait);
                self.sleep_or_cancel(wait, &shutdown).await;
                continue;
            }

            match self.execute(true).await {
                Ok(report) => info!(
                    "Scheduled cycle done: {} created, {} updated",
                    report.created(),
                    report.updated()
                ),
                Err(SchedulerError::Busy(name)) => {
                    debug!("'{}' is locked by another runner", name);
                    self.sleep_or_cancel(self.poll_interval(), &shutdown).await;
                }
                Err(e) => {
                    error!("Scheduled run failed: {}", e);
                    self.sleep_or_cancel(self.poll_interval(), &shutdown).await;
                }
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }

    async fn sleep_or_cancel(&self, duration: Duration, shutdown: &CancellationToken) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = shutdown.cancelled() => {}
        }
    }

    /// How often a running cycle refreshes `locked_at`
    fn heartbeat_interval(&self) -> Duration {
        (self.stale_after() / 3).max(Duration::from_secs(1))
    }

    /// Waits for the cycle task, refreshing the lock so a long run never
    /// looks abandoned to other runners
    async fn hold_lock_until(
        &self,
        mut handle: JoinHandle<Result<CycleReport, CycleError>>,
    ) -> Result<Result<CycleReport, CycleError>, JoinError> {
        let period = self.heartbeat_interval();
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                outcome = &mut handle => return outcome,
                _ = heartbeat.tick() => {
                    match self.registry.heartbeat(&self.config.task_name, &self.owner, Utc::now()).await {
                        Ok(true) => {}
                        Ok(false) => warn!("Lock on '{}' was taken over while the cycle ran", self.config.task_name),
                        Err(e) => warn!("Could not refresh lock on '{}': {}", self.config.task_name, e),
                    }
                }
            }
        }
    }

    /// Takes the lock, runs the cycle in its own task and releases the lock.
    /// With `advance`, the run only happens if the slot is still due and
    /// `run_at` moves to the next slot afterwards.
    async fn execute(&self, advance: bool) -> Result<CycleReport, SchedulerError> {
        let name = self.config.task_name.clone();
        let now = Utc::now();

        if !self.registry.try_lock(&name, &self.owner, now, self.stale_after()).await? {
            return Err(SchedulerError::Busy(name));
        }

        // Another runner may have finished this slot between our read and the lock
        let task = match self.load_task().await {
            Ok(task) => task,
            Err(e) => {
                self.registry.abandon(&name, &self.owner).await?;
                return Err(e);
            }
        };
        if advance && task.run_at > now {
            self.registry.abandon(&name, &self.owner).await?;
            return Err(SchedulerError::Busy(name));
        }

        let cycle = Arc::clone(&self.cycle);
        let outcome = self
            .hold_lock_until(tokio::spawn(async move { cycle.run_cycle().await }))
            .await;

        let finished_at = Utc::now();
        let (result, error) = match outcome {
            Ok(Ok(report)) => {
                let error = (!report.failed_sources().is_empty()).then(|| {
                    report
                        .failed_sources()
                        .iter()
                        .map(|s| format!("{}: {}", s.source, s.fetch_error.as_deref().unwrap_or_default()))
                        .collect::<Vec<_>>()
                        .join("; ")
                });
                (Ok(report), error)
            }
            Ok(Err(e)) => {
                warn!("Cycle not started: {}", e);
                let reason = e.to_string();
                (
                    Err(SchedulerError::CycleFailed {
                        task: name.clone(),
                        reason: reason.clone(),
                    }),
                    Some(reason),
                )
            }
            Err(join_error) => {
                error!("Scraping cycle panicked: {}", join_error);
                let reason = format!("cycle task failed: {join_error}");
                (
                    Err(SchedulerError::CycleFailed {
                        task: name.clone(),
                        reason: reason.clone(),
                    }),
                    Some(reason),
                )
            }
        };

        let period = match task.period() {
            p if p.is_zero() => Duration::from_secs(self.config.repeat_every_seconds),
            p => p,
        };
        let outcome = RunOutcome {
            finished_at,
            error,
            next_run_at: advance.then(|| next_run_after(task.run_at, period, finished_at)),
        };
        self.registry.release(&name, &self.owner, &outcome).await?;

        if let Some(next) = outcome.next_run_at {
            info!("Next run of '{}' at {}", name, next);
        }
        result
    }
}
