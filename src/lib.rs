use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, header},
    routing::get,
};
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod forms;
pub mod geocoding;
pub mod guards;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod services;
pub mod session;
pub mod storage;
pub mod validation;

// Local development data (see `src/bin/seed.rs`).
pub mod seed;

// Module for routing segregation (one module per resource).
pub mod routes;
use routes::{campgrounds, reviews, users};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point (main.rs).
pub use config::AppConfig;
pub use error::AppError;
pub use geocoding::{GeocoderState, MapboxGeocoder, MockGeocoder};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; img-src 'self' data: https:; \
     script-src 'self' https://api.mapbox.com; style-src 'self' 'unsafe-inline' https://api.mapbox.com; \
     connect-src 'self' https://api.mapbox.com https://events.mapbox.com; worker-src blob:";

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` view model into the
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::home, handlers::health, handlers::index_campgrounds,
        handlers::new_campground_form, handlers::create_campground, handlers::show_campground,
        handlers::edit_campground_form, handlers::update_campground, handlers::delete_campground,
        handlers::create_review, handlers::delete_review, handlers::register_form,
        handlers::register, handlers::login_form, handlers::login, handlers::logout
    ),
    components(
        schemas(
            models::Campground, models::CampgroundImage, models::Geometry, models::Review,
            models::CampgroundDetails, models::ReviewDetails, models::UserSummary,
            models::CurrentUser, models::Notices, models::SessionView,
            models::CampgroundIndexPage, models::CampgroundPage, models::EditCampgroundPage,
            models::FormPage, models::ErrorPage,
            forms::ReviewForm, forms::RegisterForm, forms::LoginForm,
        )
    ),
    tags(
        (name = "yelpcamp", description = "YelpCamp campground listings")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container for every collaborator and the configuration.
/// Cloned per request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Persistence (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// Object storage for campground images.
    pub storage: StorageState,
    /// Forward geocoding of campground locations.
    pub geocoder: GeocoderState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for GeocoderState {
    fn from_ref(app_state: &AppState) -> GeocoderState {
        app_state.geocoder.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every route, the session layer and the observability stack.
/// `store` backs the session cookie: `PostgresStore` in production,
/// `MemoryStore` in tests.
pub fn create_router<Store>(state: AppState, store: Store) -> Router
where
    Store: SessionStore + Clone,
{
    // 1. Sessions: sliding expiry, Secure only when served over TLS.
    let sessions = SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE)
        .with_secure(state.config.secure_cookies())
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(
            config::SESSION_INACTIVITY_DAYS,
        )));

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health))
        .merge(campgrounds::campground_routes())
        .merge(reviews::review_routes())
        .merge(users::user_routes())
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(sessions);

    // 3. Observability, correlation and response hardening (outermost).
    base_router.layer(
        ServiceBuilder::new()
            // 3a. Request ID Generation: a UUID for every incoming request.
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            // 3b. Request Tracing, with the request id on the span.
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            // 3c. Request ID Propagation back to the client.
            .layer(PropagateRequestIdLayer::new(x_request_id))
            // 3d. Security headers on every response, errors included.
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::REFERRER_POLICY,
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static(CONTENT_SECURITY_POLICY),
            )),
    )
}

/// trace_span_logger
///
/// Builds the `TraceLayer` span so every log line for one request carries its
/// `x-request-id` alongside the method and URI.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
