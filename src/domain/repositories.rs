//! Repository interfaces for postings and the persisted schedule.
//!
//! The pipeline only needs these contracts; the SQLite implementations live in
//! `infrastructure`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::posting::{NewPosting, Posting, PostingFilter, PostingKind, PostingQuery};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid link '{link}': {reason}")]
    InvalidLink { link: String, reason: String },

    #[error("No {kind} posting stored for link '{link}'")]
    NotFound { kind: PostingKind, link: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait PostingRepository: Send + Sync {
    async fn find_by_link(&self, kind: PostingKind, link: &str) -> StoreResult<Option<Posting>>;
    async fn create(&self, kind: PostingKind, posting: &NewPosting) -> StoreResult<Posting>;
    /// Overwrites every field except the link and the first-seen timestamp
    async fn update(&self, kind: PostingKind, posting: &NewPosting) -> StoreResult<Posting>;
    /// Atomic find-or-create followed by a full overwrite. The flag is true
    /// when the link had not been stored before.
    async fn upsert(&self, kind: PostingKind, posting: &NewPosting) -> StoreResult<(Posting, bool)>;
    async fn list(&self, kind: PostingKind, query: &PostingQuery) -> StoreResult<Vec<Posting>>;
    async fn count(&self, kind: PostingKind, filter: &PostingFilter) -> StoreResult<u64>;
}

/// A named recurring task persisted across restarts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub task_name: String,
    /// Next slot of the fixed cadence
    pub run_at: DateTime<Utc>,
    pub repeat_every_seconds: i64,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: i64,
    pub created_at: DateTime<Utc>,
}

impl ScheduledTask {
    pub fn is_locked(&self) -> bool {
        self.locked_by.is_some()
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.repeat_every_seconds).unwrap_or(0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Created(ScheduledTask),
    AlreadyRegistered(ScheduledTask),
}

impl Registration {
    pub const fn task(&self) -> &ScheduledTask {
        match self {
            Self::Created(task) | Self::AlreadyRegistered(task) => task,
        }
    }

    pub const fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Outcome written back when a run releases its lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub finished_at: DateTime<Utc>,
    pub error: Option<String>,
    /// `None` keeps the current `run_at` (manual runs)
    pub next_run_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait TaskRegistry: Send + Sync {
    async fn find(&self, task_name: &str) -> StoreResult<Option<ScheduledTask>>;
    /// Inserts the task unless one with the same name exists
    async fn register_if_absent(
        &self,
        task_name: &str,
        first_run_at: DateTime<Utc>,
        repeat_every: Duration,
    ) -> StoreResult<Registration>;
    /// Compare-and-swap on the lock columns. A lock older than `stale_after`
    /// counts as free.
    async fn try_lock(
        &self,
        task_name: &str,
        owner: &str,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> StoreResult<bool>;
    /// Moves `locked_at` to `now` while `owner` still holds the lock; false if it does not
    async fn heartbeat(&self, task_name: &str, owner: &str, now: DateTime<Utc>) -> StoreResult<bool>;
    async fn release(&self, task_name: &str, owner: &str, outcome: &RunOutcome) -> StoreResult<()>;
    /// Drops the lock without recording a run
    async fn abandon(&self, task_name: &str, owner: &str) -> StoreResult<()>;
    async fn list(&self) -> StoreResult<Vec<ScheduledTask>>;
}
