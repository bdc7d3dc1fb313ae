pub mod models;
pub mod users;
pub mod sessions;
pub mod conversations;
pub mod messages;
pub mod deletion;

pub use models::{
    AttachmentState, Conversation, ConversationSummary, DeletionStatus, Message, MessageRole,
    Session, User,
};
pub use users::UserRepository;
pub use sessions::SessionRepository;
pub use conversations::ConversationRepository;
pub use messages::MessageRepository;
pub use deletion::DeletionStatusRepository;

use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::config::DatabaseConfig;
use crate::error::AppError;

/// Title shown for conversations that never received one.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Characters kept when a title is derived from a message or filename.
pub const TITLE_DISPLAY_CHARS: usize = 10;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Open the pool and apply migrations.
pub async fn connect(config: &DatabaseConfig) -> Result<Pool<Sqlite>, AppError> {
    let options: SqliteConnectOptions = config
        .url
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Single-connection in-memory database, migrated. Each call is isolated.
pub async fn connect_in_memory() -> Result<Pool<Sqlite>, AppError> {
    let options = "sqlite::memory:"
        .parse::<SqliteConnectOptions>()?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}
