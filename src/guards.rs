//! Identity and ownership guards.
//!
//! Each guard either hands back what the handler needs next or writes a flash
//! notice and fails with a redirecting [`AppError`]. Handlers chain them with
//! `?` in a fixed order: validation, identity, ownership, then the service call.

use axum::http::{Method, Uri};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Campground, CurrentUser, Review},
    repository::RepositoryState,
    session::{Notice, RequestContext},
};

pub const LOGIN_REQUIRED_NOTICE: &str = "You must be signed in first!";
pub const FORBIDDEN_NOTICE: &str = "You do not have permission to do that!";
pub const CAMPGROUND_NOT_FOUND_NOTICE: &str = "Cannot find that campground!";
pub const REVIEW_NOT_FOUND_NOTICE: &str = "Cannot find that review!";

/// require_login
///
/// Passes the current identity through, or remembers where the visitor was
/// headed and sends them to the login page. A session whose account has since
/// been removed counts as signed out.
pub async fn require_login(
    ctx: &mut RequestContext,
    repo: &RepositoryState,
    method: &Method,
    uri: &Uri,
) -> Result<CurrentUser, AppError> {
    if let Some(user) = ctx.user.clone() {
        if repo.get_user(user.id).await?.is_some() {
            return Ok(user);
        }
        tracing::debug!(user_id = %user.id, "dropping session for deleted user");
        ctx.forget_user().await?;
    }

    ctx.set_return_to(&return_path(method, uri)).await?;
    ctx.flash(Notice::Error, LOGIN_REQUIRED_NOTICE).await?;
    Err(AppError::LoginRequired)
}

/// require_campground_author
///
/// Loads the campground and checks that `user` created it.
pub async fn require_campground_author(
    ctx: &RequestContext,
    repo: &RepositoryState,
    campground_id: Uuid,
    user: &CurrentUser,
) -> Result<Campground, AppError> {
    let Some(campground) = repo.get_campground(campground_id).await? else {
        ctx.flash(Notice::Error, CAMPGROUND_NOT_FOUND_NOTICE).await?;
        return Err(AppError::NotFound {
            redirect_to: "/campgrounds".to_string(),
        });
    };

    if campground.author != user.id {
        ctx.flash(Notice::Error, FORBIDDEN_NOTICE).await?;
        return Err(AppError::Forbidden {
            redirect_to: format!("/campgrounds/{}", campground_id),
        });
    }

    Ok(campground)
}

/// require_review_author
///
/// Loads the review and checks that it belongs to `campground_id` and that
/// `user` wrote it.
pub async fn require_review_author(
    ctx: &RequestContext,
    repo: &RepositoryState,
    campground_id: Uuid,
    review_id: Uuid,
    user: &CurrentUser,
) -> Result<Review, AppError> {
    let review = repo
        .get_review(review_id)
        .await?
        .filter(|review| review.campground == campground_id);

    let Some(review) = review else {
        ctx.flash(Notice::Error, REVIEW_NOT_FOUND_NOTICE).await?;
        return Err(AppError::NotFound {
            redirect_to: format!("/campgrounds/{}", campground_id),
        });
    };

    if review.author != user.id {
        ctx.flash(Notice::Error, FORBIDDEN_NOTICE).await?;
        return Err(AppError::Forbidden {
            redirect_to: format!("/campgrounds/{}", campground_id),
        });
    }

    Ok(review)
}

/// Where to send the visitor after login. A GET is replayed as is; for anything
/// else the visitor lands on the owning resource page (`/campgrounds/{id}`),
/// since the form submission itself cannot be replayed.
fn return_path(method: &Method, uri: &Uri) -> String {
    let path = uri.path();
    if method == Method::GET {
        return uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| path.to_string());
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).take(2).collect();
    if segments.is_empty() {
        "/campgrounds".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::User,
        repository::{MemoryRepository, Repository},
    };
    use std::sync::Arc;
    use tower_sessions::{MemoryStore, Session};

    fn context(user: Option<CurrentUser>) -> RequestContext {
        let store = Arc::new(MemoryStore::default());
        RequestContext::new(Session::new(None, store, None), user)
    }

    #[tokio::test]
    async fn test_signed_in_user_passes_the_identity_guard() {
        let memory = MemoryRepository::new();
        let user = memory
            .create_user(User {
                id: uuid::Uuid::new_v4(),
                username: "colt".to_string(),
                email: "colt@example.com".to_string(),
                password_hash: "$argon2id$test".to_string(),
            })
            .await
            .unwrap();
        let repo: RepositoryState = Arc::new(memory);
        let mut ctx = context(Some(CurrentUser::from(&user)));
        let uri: Uri = "/campgrounds/new".parse().unwrap();

        let current = require_login(&mut ctx, &repo, &Method::GET, &uri)
            .await
            .unwrap();
        assert_eq!(current.id, user.id);
    }

    #[tokio::test]
    async fn test_session_of_a_removed_account_is_sent_to_login() {
        let repo: RepositoryState = Arc::new(MemoryRepository::new());
        let ghost = CurrentUser {
            id: uuid::Uuid::new_v4(),
            username: "ghost".to_string(),
        };
        let mut ctx = context(Some(ghost));
        let uri: Uri = "/campgrounds/new".parse().unwrap();

        let result = require_login(&mut ctx, &repo, &Method::GET, &uri).await;

        assert!(matches!(result, Err(AppError::LoginRequired)));
        assert!(ctx.user.is_none());
        assert_eq!(
            ctx.take_return_to().await.unwrap().as_deref(),
            Some("/campgrounds/new")
        );
        let view = ctx.view().await.unwrap();
        assert!(view.current_user.is_none());
        assert_eq!(view.notices.error, vec![LOGIN_REQUIRED_NOTICE.to_string()]);
    }

    #[test]
    fn test_get_requests_return_to_the_same_path() {
        let uri: Uri = "/campgrounds/new".parse().unwrap();
        assert_eq!(return_path(&Method::GET, &uri), "/campgrounds/new");
    }

    #[test]
    fn test_form_submissions_return_to_the_resource_page() {
        let uri: Uri = "/campgrounds/abc/reviews".parse().unwrap();
        assert_eq!(return_path(&Method::POST, &uri), "/campgrounds/abc");

        let uri: Uri = "/campgrounds".parse().unwrap();
        assert_eq!(return_path(&Method::POST, &uri), "/campgrounds");
    }
}
