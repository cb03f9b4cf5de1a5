use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::{
    error::AppError,
    models::{CurrentUser, Notices, SessionView, User},
};

const USER_KEY: &str = "user";
const NOTICES_KEY: &str = "_flash";
const RETURN_TO_KEY: &str = "return_to";

/// Flash notice category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Success,
    Error,
}

/// RequestContext
///
/// Per-request view of the visitor: the cookie session plus the identity
/// stored in it. Extraction only reads the session; whether that identity still
/// names an existing account is the identity guard's call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    session: Session,
    pub user: Option<CurrentUser>,
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::Upstream(msg.to_string()))?;

        let user = session.get::<CurrentUser>(USER_KEY).await?;
        Ok(Self { session, user })
    }
}

impl RequestContext {
    pub fn new(session: Session, user: Option<CurrentUser>) -> Self {
        Self { session, user }
    }

    /// Queues a one-shot notice for the next page produced for this visitor.
    pub async fn flash(&self, kind: Notice, message: &str) -> Result<(), AppError> {
        let mut notices = self
            .session
            .get::<Notices>(NOTICES_KEY)
            .await?
            .unwrap_or_default();
        match kind {
            Notice::Success => notices.success.push(message.to_string()),
            Notice::Error => notices.error.push(message.to_string()),
        }
        self.session.insert(NOTICES_KEY, notices).await?;
        Ok(())
    }

    /// Removes and returns every queued notice.
    pub async fn take_notices(&self) -> Result<Notices, AppError> {
        Ok(self
            .session
            .remove::<Notices>(NOTICES_KEY)
            .await?
            .unwrap_or_default())
    }

    /// The session part of a page payload. Draining the notices here is what
    /// makes them one-shot.
    pub async fn view(&self) -> Result<SessionView, AppError> {
        Ok(SessionView {
            current_user: self.user.clone(),
            notices: self.take_notices().await?,
        })
    }

    pub async fn set_return_to(&self, path: &str) -> Result<(), AppError> {
        self.session.insert(RETURN_TO_KEY, path.to_string()).await?;
        Ok(())
    }

    pub async fn take_return_to(&self) -> Result<Option<String>, AppError> {
        Ok(self.session.remove::<String>(RETURN_TO_KEY).await?)
    }

    /// Binds `user` to the session. The id is cycled first so a pre-login
    /// session id never becomes an authenticated one.
    pub async fn login(&mut self, user: &User) -> Result<(), AppError> {
        let current = CurrentUser::from(user);
        self.session.cycle_id().await?;
        self.session.insert(USER_KEY, current.clone()).await?;
        self.user = Some(current);
        Ok(())
    }

    /// Drops an identity whose account no longer exists.
    pub async fn forget_user(&mut self) -> Result<(), AppError> {
        self.session.remove::<CurrentUser>(USER_KEY).await?;
        self.user = None;
        Ok(())
    }

    /// Clears the identity but keeps the session, so a goodbye notice survives.
    pub async fn logout(&mut self) -> Result<(), AppError> {
        self.session.remove::<CurrentUser>(USER_KEY).await?;
        self.session.cycle_id().await?;
        self.user = None;
        Ok(())
    }
}
