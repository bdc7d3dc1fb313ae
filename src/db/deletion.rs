use sqlx::{Pool, Sqlite};

use crate::db::models::DeletionStatus;
use crate::db::now_millis;
use crate::error::AppError;

/// Grace period between a deletion request and the purge.
pub const DEFAULT_GRACE_DAYS: i64 = 30;

const DAY_MILLIS: i64 = 24 * 3_600_000;

pub struct DeletionStatusRepository;

impl DeletionStatusRepository {
    pub async fn get(
        pool: &Pool<Sqlite>,
        user_id: &str,
    ) -> Result<Option<DeletionStatus>, AppError> {
        let status = sqlx::query_as::<_, DeletionStatus>(
            "SELECT * FROM deletion_status WHERE user_id = ?"
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(status)
    }

    /// Lazily create the (non-pending) status row.
    pub async fn get_or_create(
        pool: &Pool<Sqlite>,
        user_id: &str,
    ) -> Result<DeletionStatus, AppError> {
        sqlx::query("INSERT OR IGNORE INTO deletion_status (user_id) VALUES (?)")
            .bind(user_id)
            .execute(pool)
            .await?;

        Self::get(pool, user_id)
            .await?
            .ok_or_else(|| AppError::Internal("Failed to fetch deletion status".to_string()))
    }

    pub async fn start_pending(
        pool: &Pool<Sqlite>,
        user_id: &str,
        days: i64,
    ) -> Result<DeletionStatus, AppError> {
        let now = now_millis();
        let until = now + days * DAY_MILLIS;

        let status = sqlx::query_as::<_, DeletionStatus>(
            r#"
INSERT INTO deletion_status (user_id, pending_since, pending_until)
VALUES (?, ?, ?)
ON CONFLICT(user_id) DO UPDATE SET
    pending_since = excluded.pending_since,
    pending_until = excluded.pending_until
RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(until)
        .fetch_one(pool)
        .await?;

        tracing::info!(user_id, pending_until = until, "Account deletion pending");
        Ok(status)
    }

    /// Restore: both timestamps back to null.
    pub async fn clear(pool: &Pool<Sqlite>, user_id: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE deletion_status SET pending_since = NULL, pending_until = NULL WHERE user_id = ?"
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn is_pending(pool: &Pool<Sqlite>, user_id: &str) -> Result<bool, AppError> {
        let now = now_millis();
        Ok(Self::get(pool, user_id)
            .await?
            .map_or(false, |status| status.is_pending_at(now)))
    }

    /// Rows whose grace period ended strictly before `now`.
    pub async fn expired(
        pool: &Pool<Sqlite>,
        now: i64,
    ) -> Result<Vec<DeletionStatus>, AppError> {
        let statuses = sqlx::query_as::<_, DeletionStatus>(
            r#"
SELECT * FROM deletion_status
WHERE pending_until IS NOT NULL AND pending_until < ?
ORDER BY pending_until ASC
            "#
        )
        .bind(now)
        .fetch_all(pool)
        .await?;

        Ok(statuses)
    }

    pub async fn delete(pool: &Pool<Sqlite>, user_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM deletion_status WHERE user_id = ?")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
