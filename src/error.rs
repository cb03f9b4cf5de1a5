use axum::{
    Json,
    extract::rejection::{FormRejection, MultipartRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::{models::ErrorPage, repository::RepositoryError, validation::ValidationFailure};

/// Message shown on the error page when the failure carries nothing safe to display.
pub const GENERIC_ERROR_MESSAGE: &str = "Oh no, something went wrong!";

/// Shown when a urlencoded or multipart body cannot be read at all.
pub const UNREADABLE_FORM_MESSAGE: &str = "The submitted form could not be read";

/// AppError
///
/// Every way a request can stop short of its happy path.
///
/// Client-caused variants (`LoginRequired`, `Forbidden`, `NotFound`) resolve to a
/// redirect; the guard that raised them has already written the flash notice to
/// the session. `Validation` renders the error page with a 400. Everything else
/// is an internal failure: the detail is logged for operators and the client only
/// sees the generic message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("login required")]
    LoginRequired,

    #[error("not authorized, redirecting to {redirect_to}")]
    Forbidden { redirect_to: String },

    #[error("resource not found, redirecting to {redirect_to}")]
    NotFound { redirect_to: String },

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("repository failure: {0}")]
    Repository(#[from] RepositoryError),

    #[error("session failure: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("page not found")]
    RouteNotFound,
}

impl From<ValidationFailure> for AppError {
    fn from(failure: ValidationFailure) -> Self {
        AppError::Validation(failure.message())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!("path rejected: {}", rejection.body_text());
        AppError::RouteNotFound
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        tracing::debug!("form body rejected: {}", rejection.body_text());
        AppError::Validation(UNREADABLE_FORM_MESSAGE.to_string())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        tracing::debug!("multipart body rejected: {}", rejection.body_text());
        AppError::Validation(UNREADABLE_FORM_MESSAGE.to_string())
    }
}

impl AppError {
    /// The status code the error page is served with. Redirecting variants report 303.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::LoginRequired | AppError::Forbidden { .. } | AppError::NotFound { .. } => {
                StatusCode::SEE_OTHER
            }
            AppError::RouteNotFound => StatusCode::NOT_FOUND,
            AppError::Upstream(_) | AppError::Repository(_) | AppError::Session(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::LoginRequired => return Redirect::to("/login").into_response(),
            AppError::Forbidden { redirect_to } | AppError::NotFound { redirect_to } => {
                return Redirect::to(redirect_to).into_response();
            }
            AppError::Validation(msg) => {
                tracing::debug!("validation rejected request: {}", msg);
                msg.clone()
            }
            AppError::RouteNotFound => "Page Not Found".to_string(),
            AppError::Upstream(_) | AppError::Repository(_) | AppError::Session(_) => {
                tracing::error!(error = %self, "request failed");
                GENERIC_ERROR_MESSAGE.to_string()
            }
        };

        let status = self.status();
        let page = ErrorPage {
            status: status.as_u16(),
            message,
        };
        (status, Json(page)).into_response()
    }
}
