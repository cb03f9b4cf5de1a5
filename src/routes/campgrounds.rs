use crate::{AppState, handlers};
use axum::{Router, extract::DefaultBodyLimit, routing::get};

/// Largest campground form accepted, images included.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Campground Router Module
///
/// Reads are public. Create requires a signed-in user; edit, update and delete
/// additionally require that user to be the campground's author.
pub fn campground_routes() -> Router<AppState> {
    Router::new()
        // GET  /campgrounds  -> index, newest first
        // POST /campgrounds  -> multipart create
        .route(
            "/campgrounds",
            get(handlers::index_campgrounds).post(handlers::create_campground),
        )
        // GET /campgrounds/new
        .route("/campgrounds/new", get(handlers::new_campground_form))
        // GET    /campgrounds/{id}  -> detail with reviews expanded
        // PUT    /campgrounds/{id}  -> multipart update, author only
        // DELETE /campgrounds/{id}  -> cascade delete, author only
        .route(
            "/campgrounds/{id}",
            get(handlers::show_campground)
                .put(handlers::update_campground)
                .delete(handlers::delete_campground),
        )
        .route("/campgrounds/{id}/edit", get(handlers::edit_campground_form))
        // Image uploads exceed axum's 2MB default.
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
