use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use yelpcamp::{
    AppConfig,
    repository::{PostgresRepository, RepositoryState},
    seed::{self, DEMO_PASSWORD, DEMO_USERNAME},
};

/// Campgrounds inserted when no count is given on the command line.
const DEFAULT_COUNT: usize = 50;

/// seed
///
/// Resets the configured database to a batch of sample campgrounds.
/// Usage: `cargo run --bin seed [count]`
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yelpcamp=info".into()),
        )
        .init();

    let count = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<usize>()
            .expect("FATAL: count must be a non-negative integer."),
        None => DEFAULT_COUNT,
    };

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to run database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool.clone())) as RepositoryState;

    let report = seed::seed_campgrounds(&repo, count)
        .await
        .expect("FATAL: Seeding failed.");

    tracing::info!(
        "Removed {} campgrounds, inserted {}. Sign in as {} / {}.",
        report.removed,
        report.inserted,
        DEMO_USERNAME,
        DEMO_PASSWORD
    );

    pool.close().await;
}
