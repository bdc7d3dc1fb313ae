use sqlx::{Pool, Sqlite};
use uuid::Uuid;
use crate::db::models::User;
use crate::db::now_millis;
use crate::error::AppError;

pub struct UserRepository;

impl UserRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        username: String,
        email: String,
    ) -> Result<User, AppError> {
        let id = Uuid::new_v4().to_string();
        let created_at = now_millis();

        let user = sqlx::query_as::<_, User>(
            r#"
INSERT INTO users (id, username, email, created_at)
VALUES (?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&username)
        .bind(&email)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Returns whether a row was removed. Sessions and deletion status cascade;
    /// conversations keep their rows with a null owner.
    pub async fn delete(pool: &Pool<Sqlite>, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
