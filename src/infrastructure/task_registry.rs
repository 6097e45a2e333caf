//! SQLite implementation of `TaskRegistry`

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::{Registration, RunOutcome, ScheduledTask, StoreResult, TaskRegistry};

const TASK_COLUMNS: &str = "task_name, run_at, repeat_every_seconds, locked_by, locked_at, \
                            last_run_at, last_error, run_count, created_at";

#[derive(Clone)]
pub struct SqliteTaskRegistry {
    pool: Arc<SqlitePool>,
}

fn map_task(row: &SqliteRow) -> Result<ScheduledTask, sqlx::Error> {
    Ok(ScheduledTask {
        task_name: row.try_get("task_name")?,
        run_at: row.try_get("run_at")?,
        repeat_every_seconds: row.try_get("repeat_every_seconds")?,
        locked_by: row.try_get("locked_by")?,
        locked_at: row.try_get("locked_at")?,
        last_run_at: row.try_get("last_run_at")?,
        last_error: row.try_get("last_error")?,
        run_count: row.try_get("run_count")?,
        created_at: row.try_get("created_at")?,
    })
}

/// `now - stale_after`, saturating at the earliest representable time
pub fn stale_cutoff(now: DateTime<Utc>, stale_after: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(stale_after)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl SqliteTaskRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub fn from_arc(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRegistry for SqliteTaskRegistry {
    async fn find(&self, task_name: &str) -> StoreResult<Option<ScheduledTask>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM scheduled_tasks WHERE task_name = ?");
        let row = sqlx::query(&sql)
            .bind(task_name)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.map(|row| map_task(&row)).transpose()?)
    }

    async fn register_if_absent(
        &self,
        task_name: &str,
        first_run_at: DateTime<Utc>,
        repeat_every: Duration,
    ) -> StoreResult<Registration> {
        let period = i64::try_from(repeat_every.as_secs()).unwrap_or(i64::MAX);

        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO scheduled_tasks (task_name, run_at, repeat_every_seconds, run_count, created_at)
            VALUES (?, ?, ?, 0, ?)
            ON CONFLICT(task_name) DO NOTHING
            "#,
        )
        .bind(task_name)
        .bind(first_run_at)
        .bind(period)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let sql = format!("SELECT {TASK_COLUMNS} FROM scheduled_tasks WHERE task_name = ?");
        let row = sqlx::query(&sql).bind(task_name).fetch_one(&mut *tx).await?;
        let task = map_task(&row)?;
        tx.commit().await?;

        if inserted == 1 {
            debug!("Registered task '{}' first due at {}", task_name, task.run_at);
            Ok(Registration::Created(task))
        } else {
            Ok(Registration::AlreadyRegistered(task))
        }
    }

    async fn try_lock(
        &self,
        task_name: &str,
        owner: &str,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> StoreResult<bool> {
        let acquired = sqlx::query(
            r#"
            UPDATE scheduled_tasks
            SET locked_by = ?, locked_at = ?
            WHERE task_name = ?
              AND (locked_by IS NULL OR locked_at IS NULL OR locked_at < ?)
            "#,
        )
        .bind(owner)
        .bind(now)
        .bind(task_name)
        .bind(stale_cutoff(now, stale_after))
        .execute(&*self.pool)
        .await?
        .rows_affected();

        Ok(acquired == 1)
    }

    async fn heartbeat(&self, task_name: &str, owner: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let refreshed = sqlx::query(
            "UPDATE scheduled_tasks SET locked_at = ? WHERE task_name = ? AND locked_by = ?",
        )
        .bind(now)
        .bind(task_name)
        .bind(owner)
        .execute(&*self.pool)
        .await?
        .rows_affected();

        debug!("Heartbeat for '{}' by {} (held: {})", task_name, owner, refreshed == 1);
        Ok(refreshed == 1)
    }

    async fn release(&self, task_name: &str, owner: &str, outcome: &RunOutcome) -> StoreResult<()> {
        let released = sqlx::query(
            r#"
            UPDATE scheduled_tasks
            SET locked_by = NULL,
                locked_at = NULL,
                last_run_at = ?,
                last_error = ?,
                run_count = run_count + 1,
                run_at = COALESCE(?, run_at)
            WHERE task_name = ? AND locked_by = ?
            "#,
        )
        .bind(outcome.finished_at)
        .bind(&outcome.error)
        .bind(outcome.next_run_at)
        .bind(task_name)
        .bind(owner)
        .execute(&*self.pool)
        .await?
        .rows_affected();

        if released == 0 {
            warn!(
                "Lock on '{}' was no longer held by {}; run outcome not recorded",
                task_name, owner
            );
        }
        Ok(())
    }

    async fn abandon(&self, task_name: &str, owner: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE scheduled_tasks SET locked_by = NULL, locked_at = NULL WHERE task_name = ? AND locked_by = ?",
        )
        .bind(task_name)
        .bind(owner)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<ScheduledTask>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM scheduled_tasks ORDER BY task_name");
        let rows = sqlx::query(&sql).fetch_all(&*self.pool).await?;
        Ok(rows.iter().map(map_task).collect::<Result<Vec<_>, _>>()?)
    }
}
