use async_trait::async_trait;
use jiff::Timestamp;
use portal_core::repository::{ReadRepository, Repository, Result};
use portal_core::{ShortCode, ShortLink, StorageError};
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::{MySqlPool, Row};
use tracing::debug;

/// DDL for the `short_links` table.
pub const SCHEMA: &str = include_str!("../ddl/mysql/short_links.sql");

/// MySQL implementation of the repository contract.
///
/// Soft delete is implemented with `deleted_at`. The primary key on `code`
/// is the authoritative uniqueness guard: inserts never reuse an existing
/// code, including soft-deleted rows, to preserve redirect history with a
/// single-row-per-code model. Timestamps are stored as unix seconds.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the `short_links` table if it does not exist yet.
    pub async fn create_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn to_timestamp(column: &str, seconds: i64) -> Result<Timestamp> {
    Timestamp::from_second(seconds).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{seconds}': {e}"))
    })
}

fn row_to_link(row: &MySqlRow) -> Result<ShortLink> {
    let code: String = row.try_get("code").map_err(map_sqlx_error)?;
    let long_url: String = row.try_get("long_url").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;
    let expires_at: Option<i64> = row.try_get("expires_at").map_err(map_sqlx_error)?;
    let hit_count: u64 = row.try_get("hit_count").map_err(map_sqlx_error)?;
    let deleted_at: Option<i64> = row.try_get("deleted_at").map_err(map_sqlx_error)?;

    Ok(ShortLink {
        code: ShortCode::new_unchecked(code),
        long_url,
        created_at: to_timestamp("created_at", created_at)?,
        expires_at: expires_at
            .map(|s| to_timestamp("expires_at", s))
            .transpose()?,
        hit_count,
        deleted_at: deleted_at
            .map(|s| to_timestamp("deleted_at", s))
            .transpose()?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadRepository for MySqlRepository {
    async fn find(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        let row = sqlx::query(
            r#"
            SELECT code, long_url, created_at, expires_at, hit_count, deleted_at
            FROM short_links
            WHERE code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_link).transpose()
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        let exists = sqlx::query(
            r#"
            SELECT 1
            FROM short_links
            WHERE code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .is_some();

        Ok(exists)
    }
}

#[async_trait]
impl Repository for MySqlRepository {
    async fn insert(&self, link: &ShortLink) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO short_links (code, long_url, created_at, expires_at, hit_count, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(link.code.as_str())
        .bind(link.long_url.as_str())
        .bind(link.created_at.as_second())
        .bind(link.expires_at.map(|ts| ts.as_second()))
        .bind(link.hit_count)
        .bind(link.deleted_at.map(|ts| ts.as_second()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StorageError::Conflict(link.code.to_string()))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn mark_deleted(&self, code: &ShortCode, at: Timestamp) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE short_links
            SET deleted_at = ?
            WHERE code = ?
              AND deleted_at IS NULL
            "#,
        )
        .bind(at.as_second())
        .bind(code.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_hits(&self, code: &ShortCode, by: u64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE short_links
            SET hit_count = hit_count + ?
            WHERE code = ?
            "#,
        )
        .bind(by)
        .bind(code.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn sweep_expired(&self, now: Timestamp, limit: usize) -> Result<Vec<ShortCode>> {
        let now = now.as_second();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let rows = sqlx::query(
            r#"
            SELECT code
            FROM short_links
            WHERE deleted_at IS NULL
              AND expires_at IS NOT NULL
              AND expires_at <= ?
            ORDER BY expires_at
            LIMIT ?
            FOR UPDATE
            "#,
        )
        .bind(now)
        .bind(limit as u64)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let mut swept = Vec::with_capacity(rows.len());
        for row in rows {
            let code: String = row.try_get("code").map_err(map_sqlx_error)?;

            sqlx::query(
                r#"
                UPDATE short_links
                SET deleted_at = ?
                WHERE code = ?
                  AND deleted_at IS NULL
                "#,
            )
            .bind(now)
            .bind(code.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            swept.push(ShortCode::new_unchecked(code));
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(count = swept.len(), "soft-deleted expired links");

        Ok(swept)
    }

    async fn purge_deleted(&self, before: Timestamp) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM short_links
            WHERE deleted_at IS NOT NULL
              AND deleted_at < ?
            "#,
        )
        .bind(before.as_second())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
