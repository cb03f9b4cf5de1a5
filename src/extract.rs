//! Extractors whose rejections go through [`AppError`] instead of axum's
//! plain-text defaults.

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// ResourcePath
///
/// `Path<T>` for resource ids. A segment that does not parse names no resource,
/// so it is answered like an unmatched route.
#[derive(Debug)]
pub struct ResourcePath<T>(pub T);

impl<S, T> FromRequestParts<S> for ResourcePath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// FormBody
///
/// `Form<T>` with an unreadable body reported as a validation failure.
#[derive(Debug)]
pub struct FormBody<T>(pub T);

impl<S, T> FromRequest<S> for FormBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Form(value) = axum::Form::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}
