//! Purging accounts whose deletion grace period has run out.

use sqlx::{Pool, Sqlite};

use crate::db::{ConversationRepository, DeletionStatusRepository, UserRepository};
use crate::error::AppError;

pub struct RetentionSweeper;

impl RetentionSweeper {
    /// Purge every account whose `pending_until` is before `now` (millis) and
    /// return how many were purged.
    ///
    /// Accounts are handled one at a time. A failure is logged and the account
    /// is left for the next run; the rest of the batch still goes ahead.
    pub async fn sweep(pool: &Pool<Sqlite>, now: i64) -> Result<usize, AppError> {
        let expired = DeletionStatusRepository::expired(pool, now).await?;
        if expired.is_empty() {
            tracing::debug!("No expired account deletions");
            return Ok(0);
        }

        let mut purged = 0;
        for status in expired {
            match Self::purge_account(pool, &status.user_id).await {
                Ok(conversations) => {
                    tracing::info!(user_id = %status.user_id, conversations, "Account purged");
                    purged += 1;
                }
                Err(e) => {
                    tracing::error!(user_id = %status.user_id, "Account purge failed: {}", e);
                }
            }
        }

        Ok(purged)
    }

    async fn purge_account(pool: &Pool<Sqlite>, user_id: &str) -> Result<u64, AppError> {
        let conversations = ConversationRepository::delete_all_for_owner(pool, user_id).await?;
        UserRepository::delete(pool, user_id).await?;
        DeletionStatusRepository::delete(pool, user_id).await?;
        Ok(conversations)
    }
}
