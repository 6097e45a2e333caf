// Database connection and pool management
// SQLite through sqlx; the schema is created in place by `migrate`.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::infrastructure::config::DatabaseConfig;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

/// True for URLs whose database lives only inside one connection
fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn file_path_of(database_url: &str) -> &str {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    path.split('?').next().unwrap_or(path)
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_max_connections(database_url, 10).await
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::with_max_connections(&config.url, config.max_connections).await
    }

    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        let memory = is_memory_url(database_url);

        let mut options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if memory {
            // Every connection to :memory: is a separate database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            if let Some(parent) = Path::new(file_path_of(database_url)).parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
            }
            options = options.journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to {database_url}"))?;

        debug!("Opened database pool for {}", database_url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn into_pool(self) -> SqlitePool {
        self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_job_posts_sql = r#"
            CREATE TABLE IF NOT EXISTS job_posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                summary TEXT NOT NULL,
                date_posted TEXT NOT NULL,
                image_url TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL,
                scraped_at TEXT NOT NULL
            )
        "#;

        let create_scholarship_posts_sql = r#"
            CREATE TABLE IF NOT EXISTS scholarship_posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                summary TEXT NOT NULL,
                date_posted TEXT NOT NULL,
                image_url TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#;

        let create_scheduled_tasks_sql = r#"
            CREATE TABLE IF NOT EXISTS scheduled_tasks (
                task_name TEXT PRIMARY KEY,
                run_at TEXT NOT NULL,
                repeat_every_seconds INTEGER NOT NULL,
                locked_by TEXT,
                locked_at TEXT,
                last_run_at TEXT,
                last_error TEXT,
                run_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
        "#;

        let create_indexes_sql = [
            "CREATE INDEX IF NOT EXISTS idx_job_posts_scraped_at ON job_posts (scraped_at)",
            "CREATE INDEX IF NOT EXISTS idx_job_posts_source ON job_posts (source)",
            "CREATE INDEX IF NOT EXISTS idx_scholarship_posts_created_at ON scholarship_posts (created_at)",
            "CREATE INDEX IF NOT EXISTS idx_scholarship_posts_source ON scholarship_posts (source)",
        ];

        sqlx::query(create_job_posts_sql).execute(&self.pool).await?;
        sqlx::query(create_scholarship_posts_sql).execute(&self.pool).await?;
        sqlx::query(create_scheduled_tasks_sql).execute(&self.pool).await?;
        for sql in create_indexes_sql {
            sqlx::query(sql).execute(&self.pool).await?;
        }

        info!("Database schema is up to date");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_urls_are_detected() {
        assert!(is_memory_url("sqlite::memory:"));
        assert!(is_memory_url("sqlite:file:test?mode=memory&cache=shared"));
        assert!(!is_memory_url("sqlite:/var/lib/opportunities.db"));
    }

    #[test]
    fn file_path_strips_scheme_and_query() {
        assert_eq!(file_path_of("sqlite:///tmp/a.db"), "/tmp/a.db");
        assert_eq!(file_path_of("sqlite:data/a.db?mode=rwc"), "data/a.db");
    }

    #[tokio::test]
    async fn creates_missing_directories() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("test.db");
        let database_url = format!("sqlite:{}", db_path.display());

        let db = DatabaseConnection::new(&database_url).await?;

        assert!(!db.pool().is_closed());
        assert!(db_path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn migration_is_idempotent() -> Result<()> {
        let temp_dir = tempdir()?;
        let database_url = format!("sqlite:{}", temp_dir.path().join("migrate.db").display());

        let db = DatabaseConnection::new(&database_url).await?;
        db.migrate().await?;
        db.migrate().await?;

        for table in ["job_posts", "scholarship_posts", "scheduled_tasks"] {
            let found = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
                .bind(table)
                .fetch_optional(db.pool())
                .await?;
            assert!(found.is_some(), "missing table {table}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn memory_database_survives_across_queries() -> Result<()> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.migrate().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_posts")
            .fetch_one(db.pool())
            .await?;
        assert_eq!(count, 0);
        Ok(())
    }
}
