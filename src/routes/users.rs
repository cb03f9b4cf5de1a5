use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Account Router Module
///
/// Forms are served on GET and submitted as urlencoded POSTs to the same path.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(handlers::register_form).post(handlers::register))
        .route("/login", get(handlers::login_form).post(handlers::login))
        .route("/logout", get(handlers::logout))
}
