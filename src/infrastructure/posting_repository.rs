//! SQLite implementation of `PostingRepository`
//!
//! Jobs and scholarships share one code path; the kind selects the table and
//! its timestamp columns.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::sync::Arc;
use tracing::debug;

use crate::domain::{
    NewPosting, Posting, PostingFilter, PostingKind, PostingOrder, PostingQuery,
    PostingRepository, StoreError, StoreResult,
};

#[derive(Clone)]
pub struct SqlitePostingRepository {
    pool: Arc<SqlitePool>,
}

/// Links are stored as absolute http(s) URLs
pub fn validate_link(link: &str) -> StoreResult<()> {
    let invalid = |reason: String| StoreError::InvalidLink {
        link: link.to_string(),
        reason,
    };

    let parsed = url::Url::parse(link).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}

fn select_columns(kind: PostingKind) -> String {
    let updated = if kind.tracks_updates() {
        "updated_at"
    } else {
        "NULL"
    };
    format!(
        "id, link, title, summary, date_posted, image_url, source, {} AS first_seen, {} AS updated_at",
        kind.first_seen_column(),
        updated
    )
}

fn map_row(kind: PostingKind, row: &SqliteRow) -> Result<Posting, sqlx::Error> {
    Ok(Posting {
        id: row.try_get("id")?,
        kind,
        link: row.try_get("link")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        date_posted: row.try_get("date_posted")?,
        image_url: row.try_get("image_url")?,
        source: row.try_get("source")?,
        created_at: row.try_get("first_seen")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// WHERE clause plus its bind values, in order
fn filter_clause(filter: &PostingFilter) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut bind_values = Vec::new();

    if let Some(source) = &filter.source {
        conditions.push("source = ?");
        bind_values.push(source.clone());
    }

    if let Some(needle) = filter.title_contains.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        conditions.push("instr(lower(title), lower(?)) > 0");
        bind_values.push(needle.to_string());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (where_clause, bind_values)
}

impl SqlitePostingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub fn from_arc(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    async fn fetch_in(
        tx: &mut Transaction<'_, Sqlite>,
        kind: PostingKind,
        link: &str,
    ) -> StoreResult<Option<Posting>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE link = ?",
            select_columns(kind),
            kind.table()
        );
        let row = sqlx::query(&sql).bind(link).fetch_optional(&mut **tx).await?;
        Ok(row.map(|row| map_row(kind, &row)).transpose()?)
    }

    /// `INSERT` that leaves an existing row alone; returns rows inserted
    async fn insert_in(
        tx: &mut Transaction<'_, Sqlite>,
        kind: PostingKind,
        posting: &NewPosting,
        on_conflict_ignore: bool,
    ) -> StoreResult<u64> {
        let now = Utc::now();
        let conflict = if on_conflict_ignore {
            " ON CONFLICT(link) DO NOTHING"
        } else {
            ""
        };

        let result = match kind {
            PostingKind::Job => {
                let sql = format!(
                    "INSERT INTO job_posts (link, title, summary, date_posted, image_url, source, scraped_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?){conflict}"
                );
                sqlx::query(&sql)
                    .bind(&posting.link)
                    .bind(&posting.title)
                    .bind(&posting.summary)
                    .bind(&posting.date_posted)
                    .bind(&posting.image_url)
                    .bind(&posting.source)
                    .bind(now)
                    .execute(&mut **tx)
                    .await?
            }
            PostingKind::Scholarship => {
                let sql = format!(
                    "INSERT INTO scholarship_posts \
                     (link, title, summary, date_posted, image_url, source, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?){conflict}"
                );
                sqlx::query(&sql)
                    .bind(&posting.link)
                    .bind(&posting.title)
                    .bind(&posting.summary)
                    .bind(&posting.date_posted)
                    .bind(&posting.image_url)
                    .bind(&posting.source)
                    .bind(now)
                    .bind(now)
                    .execute(&mut **tx)
                    .await?
            }
        };
        Ok(result.rows_affected())
    }

    /// Overwrites everything but the link and first-seen time; returns rows updated
    async fn update_in(
        tx: &mut Transaction<'_, Sqlite>,
        kind: PostingKind,
        posting: &NewPosting,
    ) -> StoreResult<u64> {
        let result = match kind {
            PostingKind::Job => {
                sqlx::query(
                    r#"
                    UPDATE job_posts
                    SET title = ?, summary = ?, date_posted = ?, image_url = ?, source = ?
                    WHERE link = ?
                    "#,
                )
                .bind(&posting.title)
                .bind(&posting.summary)
                .bind(&posting.date_posted)
                .bind(&posting.image_url)
                .bind(&posting.source)
                .bind(&posting.link)
                .execute(&mut **tx)
                .await?
            }
            PostingKind::Scholarship => {
                sqlx::query(
                    r#"
                    UPDATE scholarship_posts
                    SET title = ?, summary = ?, date_posted = ?, image_url = ?, source = ?, updated_at = ?
                    WHERE link = ?
                    "#,
                )
                .bind(&posting.title)
                .bind(&posting.summary)
                .bind(&posting.date_posted)
                .bind(&posting.image_url)
                .bind(&posting.source)
                .bind(Utc::now())
                .bind(&posting.link)
                .execute(&mut **tx)
                .await?
            }
        };
        Ok(result.rows_affected())
    }

    async fn stored(
        tx: &mut Transaction<'_, Sqlite>,
        kind: PostingKind,
        link: &str,
    ) -> StoreResult<Posting> {
        Self::fetch_in(tx, kind, link)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                kind,
                link: link.to_string(),
            })
    }
}

#[async_trait]
impl PostingRepository for SqlitePostingRepository {
    async fn find_by_link(&self, kind: PostingKind, link: &str) -> StoreResult<Option<Posting>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE link = ?",
            select_columns(kind),
            kind.table()
        );
        let row = sqlx::query(&sql).bind(link).fetch_optional(&*self.pool).await?;
        Ok(row.map(|row| map_row(kind, &row)).transpose()?)
    }

    async fn create(&self, kind: PostingKind, posting: &NewPosting) -> StoreResult<Posting> {
        validate_link(&posting.link)?;

        let mut tx = self.pool.begin().await?;
        Self::insert_in(&mut tx, kind, posting, false).await?;
        let created = Self::stored(&mut tx, kind, &posting.link).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update(&self, kind: PostingKind, posting: &NewPosting) -> StoreResult<Posting> {
        let mut tx = self.pool.begin().await?;
        if Self::update_in(&mut tx, kind, posting).await? == 0 {
            return Err(StoreError::NotFound {
                kind,
                link: posting.link.clone(),
            });
        }
        let updated = Self::stored(&mut tx, kind, &posting.link).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn upsert(&self, kind: PostingKind, posting: &NewPosting) -> StoreResult<(Posting, bool)> {
        validate_link(&posting.link)?;

        let mut tx = self.pool.begin().await?;
        let created = Self::insert_in(&mut tx, kind, posting, true).await? == 1;
        if !created {
            Self::update_in(&mut tx, kind, posting).await?;
        }
        let stored = Self::stored(&mut tx, kind, &posting.link).await?;
        tx.commit().await?;

        debug!("Upserted {} posting {} (created: {})", kind, posting.link, created);
        Ok((stored, created))
    }

    async fn list(&self, kind: PostingKind, query: &PostingQuery) -> StoreResult<Vec<Posting>> {
        let (where_clause, bind_values) = filter_clause(&query.filter);
        let direction = match query.order {
            PostingOrder::NewestFirst => "DESC",
            PostingOrder::OldestFirst => "ASC",
        };
        let sql = format!(
            "SELECT {} FROM {} {} ORDER BY {} {dir}, id {dir} LIMIT ? OFFSET ?",
            select_columns(kind),
            kind.table(),
            where_clause,
            kind.first_seen_column(),
            dir = direction
        );

        let mut statement = sqlx::query(&sql);
        for value in &bind_values {
            statement = statement.bind(value);
        }
        // SQLite treats a negative LIMIT as "no limit"
        let limit = query.limit.map_or(-1, i64::from);
        let rows = statement
            .bind(limit)
            .bind(i64::try_from(query.offset).unwrap_or(i64::MAX))
            .fetch_all(&*self.pool)
            .await?;

        rows.iter()
            .map(|row| map_row(kind, row).map_err(StoreError::from))
            .collect()
    }

    async fn count(&self, kind: PostingKind, filter: &PostingFilter) -> StoreResult<u64> {
        let (where_clause, bind_values) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM {} {}", kind.table(), where_clause);

        let mut statement = sqlx::query_scalar::<_, i64>(&sql);
        for value in &bind_values {
            statement = statement.bind(value);
        }
        let total = statement.fetch_one(&*self.pool).await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }
}
