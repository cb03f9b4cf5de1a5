use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, post},
};

/// Review Router Module
///
/// Both routes require a signed-in user. Deleting also requires being the
/// review's author, and the review must belong to the campground in the path.
pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/campgrounds/{id}/reviews", post(handlers::create_review))
        .route(
            "/campgrounds/{id}/reviews/{review_id}",
            delete(handlers::delete_review),
        )
}
