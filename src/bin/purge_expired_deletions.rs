//! Permanently removes accounts whose deletion grace period has ended.
//!
//! Takes no arguments and always exits 0; failures are logged.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf_chat::{
    config::DatabaseConfig,
    db::{self, now_millis},
    error::AppError,
    retention::RetentionSweeper,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pdf_chat=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let purged = match run().await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("❌ Purge failed: {}", e);
            0
        }
    };

    println!("Purged {} accounts", purged);
}

async fn run() -> Result<usize, AppError> {
    let config = DatabaseConfig::from_env()?;
    let pool = db::connect(&config).await?;
    RetentionSweeper::sweep(&pool, now_millis()).await
}
