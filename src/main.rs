use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_sessions::ExpiredDeletion;
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yelpcamp::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    geocoding::{GeocoderState, MapboxGeocoder},
    repository::{PostgresRepository, RepositoryState},
    storage::{S3StorageClient, StorageService, StorageState},
};

/// How often expired session rows are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// main
///
/// Initializes configuration, logging, the database (with migrations), the
/// session store, storage and geocoding, then serves HTTP until killed.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise verbose for this crate, quieter for the stack.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "yelpcamp=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            // LOCAL: Pretty print output for human readability.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to run database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool.clone())) as RepositoryState;

    // 5. Session Store (Postgres, own schema) with a background sweep of expired rows.
    let session_store = PostgresStore::new(pool);
    session_store
        .migrate()
        .await
        .expect("FATAL: Failed to migrate the session store.");

    tokio::spawn(
        session_store
            .clone()
            .continuously_delete_expired(SESSION_SWEEP_INTERVAL),
    );

    // 6. Storage Initialization (S3/MinIO)
    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
        &config.s3_public_url,
    )
    .await;

    // LOCAL-ONLY: provision the MinIO bucket from docker-compose.
    if config.env == Env::Local {
        s3_client.ensure_bucket_exists().await;
    }

    let storage = Arc::new(s3_client) as StorageState;

    // 7. Geocoding (Mapbox)
    let geocoder = Arc::new(MapboxGeocoder::new(&config.mapbox_token)) as GeocoderState;

    // 8. Unified State Assembly
    let port = config.port;
    let app_state = AppState {
        repo,
        storage,
        geocoder,
        config,
    };

    // 9. Router and Server Startup
    let app = create_router(app_state, session_store);

    let address = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&address)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", address);
    tracing::info!(
        "API Documentation (Swagger UI) available at: http://localhost:{}/swagger-ui",
        port
    );

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
