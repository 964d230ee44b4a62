//! Seed-data binary
//!
//! Populates the configured database with generated users, posts, and
//! comments for local development.

use palaver::{config, data};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "palaver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();

    let config = config::AppConfig::load()?;
    let db = data::Database::connect(
        &config.database.path,
        config.database.max_connections,
        std::time::Duration::from_secs(config.database.query_timeout_seconds),
    )
    .await?;

    if let Err(error) = data::seed::seed(&db).await {
        tracing::error!(%error, "Seeding failed");
        std::process::exit(1);
    }

    Ok(())
}
