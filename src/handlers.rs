use crate::{
    AppState,
    error::AppError,
    extract::{FormBody, ResourcePath},
    forms::{CampgroundForm, LoginForm, RegisterForm, ReviewForm},
    guards::{
        CAMPGROUND_NOT_FOUND_NOTICE, REVIEW_NOT_FOUND_NOTICE, require_campground_author,
        require_login, require_review_author,
    },
    models::{CampgroundIndexPage, CampgroundPage, EditCampgroundPage, FormPage},
    repository::RepositoryError,
    services,
    session::{Notice, RequestContext},
    validation,
};
use axum::{
    Json,
    extract::State,
    http::{Method, Uri},
    response::Redirect,
};
use uuid::Uuid;

// Every mutating handler below runs the same chain, and bails out at the first `?`:
// validation gate -> identity guard -> ownership guard -> service -> notice + redirect.

// --- Pages ---

/// home
///
/// [Public Route] Landing page.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Home page", body = FormPage))
)]
pub async fn home(ctx: RequestContext) -> Result<Json<FormPage>, AppError> {
    Ok(Json(FormPage {
        session: ctx.view().await?,
        form: "home".to_string(),
    }))
}

/// health
///
/// Liveness probe. Touches no collaborator.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "OK"
}

/// not_found
///
/// Fallback for every unmatched route.
pub async fn not_found() -> AppError {
    AppError::RouteNotFound
}

// --- Campgrounds ---

/// index_campgrounds
///
/// [Public Route] Every campground, newest first.
#[utoipa::path(
    get,
    path = "/campgrounds",
    responses((status = 200, description = "Campground index", body = CampgroundIndexPage))
)]
pub async fn index_campgrounds(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> Result<Json<CampgroundIndexPage>, AppError> {
    let campgrounds = state.repo.list_campgrounds().await?;
    Ok(Json(CampgroundIndexPage {
        session: ctx.view().await?,
        campgrounds,
    }))
}

/// new_campground_form
///
/// [Authenticated Route] Blank campground form.
#[utoipa::path(
    get,
    path = "/campgrounds/new",
    responses(
        (status = 200, description = "New campground form", body = FormPage),
        (status = 303, description = "Not signed in, redirected to /login")
    )
)]
pub async fn new_campground_form(
    mut ctx: RequestContext,
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Result<Json<FormPage>, AppError> {
    require_login(&mut ctx, &state.repo, &method, &uri).await?;
    Ok(Json(FormPage {
        session: ctx.view().await?,
        form: "campgrounds/new".to_string(),
    }))
}

/// create_campground
///
/// [Authenticated Route] Multipart body: `title`, `price`, `location`,
/// `description` and one or more `image` file parts. The author is always the
/// signed-in user; an `author` part in the body is ignored.
#[utoipa::path(
    post,
    path = "/campgrounds",
    responses(
        (status = 303, description = "Created, redirected to the new campground"),
        (status = 400, description = "Validation failed", body = crate::models::ErrorPage)
    )
)]
pub async fn create_campground(
    State(state): State<AppState>,
    mut ctx: RequestContext,
    method: Method,
    uri: Uri,
    form: CampgroundForm,
) -> Result<Redirect, AppError> {
    let payload = validation::check(form.into_new())?;
    let user = require_login(&mut ctx, &state.repo, &method, &uri).await?;

    let campground = services::create_campground(
        &state.repo,
        &state.storage,
        &state.geocoder,
        payload,
        &user,
    )
    .await?;

    ctx.flash(Notice::Success, "Successfully made a new campground!").await?;
    Ok(Redirect::to(&format!("/campgrounds/{}", campground.id)))
}

/// show_campground
///
/// [Public Route] One campground with its reviews and authors expanded.
#[utoipa::path(
    get,
    path = "/campgrounds/{id}",
    params(("id" = Uuid, Path, description = "Campground id")),
    responses(
        (status = 200, description = "Campground page", body = CampgroundPage),
        (status = 303, description = "Unknown campground, redirected to /campgrounds")
    )
)]
pub async fn show_campground(
    ctx: RequestContext,
    State(state): State<AppState>,
    ResourcePath(id): ResourcePath<Uuid>,
) -> Result<Json<CampgroundPage>, AppError> {
    let Some(campground) = services::campground_details(&state.repo, id).await? else {
        ctx.flash(Notice::Error, CAMPGROUND_NOT_FOUND_NOTICE).await?;
        return Err(AppError::NotFound {
            redirect_to: "/campgrounds".to_string(),
        });
    };

    Ok(Json(CampgroundPage {
        session: ctx.view().await?,
        campground,
    }))
}

/// edit_campground_form
///
/// [Authenticated Route] Edit form pre-filled with the stored campground. Author only.
#[utoipa::path(
    get,
    path = "/campgrounds/{id}/edit",
    params(("id" = Uuid, Path, description = "Campground id")),
    responses(
        (status = 200, description = "Edit form", body = EditCampgroundPage),
        (status = 303, description = "Not signed in, not the author, or unknown campground")
    )
)]
pub async fn edit_campground_form(
    mut ctx: RequestContext,
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    ResourcePath(id): ResourcePath<Uuid>,
) -> Result<Json<EditCampgroundPage>, AppError> {
    let user = require_login(&mut ctx, &state.repo, &method, &uri).await?;
    let campground = require_campground_author(&ctx, &state.repo, id, &user).await?;

    Ok(Json(EditCampgroundPage {
        session: ctx.view().await?,
        campground,
    }))
}

/// update_campground
///
/// [Authenticated Route] Multipart body like `create_campground`, plus repeated
/// `deleteImages` parts naming storage keys to remove. Author only.
#[utoipa::path(
    put,
    path = "/campgrounds/{id}",
    params(("id" = Uuid, Path, description = "Campground id")),
    responses(
        (status = 303, description = "Updated, or rejected by a guard; see the flash notice"),
        (status = 400, description = "Validation failed", body = crate::models::ErrorPage)
    )
)]
pub async fn update_campground(
    State(state): State<AppState>,
    mut ctx: RequestContext,
    method: Method,
    uri: Uri,
    ResourcePath(id): ResourcePath<Uuid>,
    form: CampgroundForm,
) -> Result<Redirect, AppError> {
    let payload = validation::check(form.into_update())?;
    let user = require_login(&mut ctx, &state.repo, &method, &uri).await?;
    let existing = require_campground_author(&ctx, &state.repo, id, &user).await?;

    let updated = services::update_campground(
        &state.repo,
        &state.storage,
        &state.geocoder,
        &existing,
        payload,
    )
    .await?;

    if updated.is_none() {
        ctx.flash(Notice::Error, CAMPGROUND_NOT_FOUND_NOTICE).await?;
        return Err(AppError::NotFound {
            redirect_to: "/campgrounds".to_string(),
        });
    }

    ctx.flash(Notice::Success, "Successfully updated campground!").await?;
    Ok(Redirect::to(&format!("/campgrounds/{}", id)))
}

/// delete_campground
///
/// [Authenticated Route] Deletes the campground and every review under it. Author only.
#[utoipa::path(
    delete,
    path = "/campgrounds/{id}",
    params(("id" = Uuid, Path, description = "Campground id")),
    responses((status = 303, description = "Deleted, or rejected by a guard; see the flash notice"))
)]
pub async fn delete_campground(
    State(state): State<AppState>,
    mut ctx: RequestContext,
    method: Method,
    uri: Uri,
    ResourcePath(id): ResourcePath<Uuid>,
) -> Result<Redirect, AppError> {
    let user = require_login(&mut ctx, &state.repo, &method, &uri).await?;
    require_campground_author(&ctx, &state.repo, id, &user).await?;

    // A concurrent delete between the guard and here leaves nothing to remove;
    // the outcome for the client is the same.
    services::delete_campground(&state.repo, &state.storage, id).await?;

    ctx.flash(Notice::Success, "Successfully deleted campground").await?;
    Ok(Redirect::to("/campgrounds"))
}

// --- Reviews ---

/// create_review
///
/// [Authenticated Route] Urlencoded `body` and `rating` (1 to 5). Nested field
/// names (`review[body]`) are accepted too.
#[utoipa::path(
    post,
    path = "/campgrounds/{id}/reviews",
    params(("id" = Uuid, Path, description = "Campground id")),
    request_body(content = ReviewForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Created, redirected to the campground"),
        (status = 400, description = "Validation failed", body = crate::models::ErrorPage)
    )
)]
pub async fn create_review(
    State(state): State<AppState>,
    mut ctx: RequestContext,
    method: Method,
    uri: Uri,
    ResourcePath(id): ResourcePath<Uuid>,
    FormBody(form): FormBody<ReviewForm>,
) -> Result<Redirect, AppError> {
    let payload = validation::check(form)?;
    let user = require_login(&mut ctx, &state.repo, &method, &uri).await?;

    let Some(review) = services::add_review(&state.repo, id, payload, &user).await? else {
        ctx.flash(Notice::Error, CAMPGROUND_NOT_FOUND_NOTICE).await?;
        return Err(AppError::NotFound {
            redirect_to: "/campgrounds".to_string(),
        });
    };

    tracing::debug!(review_id = %review.id, campground_id = %id, "review created");
    ctx.flash(Notice::Success, "Created new review!").await?;
    Ok(Redirect::to(&format!("/campgrounds/{}", id)))
}

/// delete_review
///
/// [Authenticated Route] Removes the review from the campground and deletes it. Review author only.
#[utoipa::path(
    delete,
    path = "/campgrounds/{id}/reviews/{review_id}",
    params(
        ("id" = Uuid, Path, description = "Campground id"),
        ("review_id" = Uuid, Path, description = "Review id")
    ),
    responses((status = 303, description = "Deleted, or rejected by a guard; see the flash notice"))
)]
pub async fn delete_review(
    State(state): State<AppState>,
    mut ctx: RequestContext,
    method: Method,
    uri: Uri,
    ResourcePath((id, review_id)): ResourcePath<(Uuid, Uuid)>,
) -> Result<Redirect, AppError> {
    let user = require_login(&mut ctx, &state.repo, &method, &uri).await?;
    require_review_author(&ctx, &state.repo, id, review_id, &user).await?;

    if !services::delete_review(&state.repo, id, review_id).await? {
        ctx.flash(Notice::Error, REVIEW_NOT_FOUND_NOTICE).await?;
        return Err(AppError::NotFound {
            redirect_to: format!("/campgrounds/{}", id),
        });
    }

    ctx.flash(Notice::Success, "Successfully deleted review").await?;
    Ok(Redirect::to(&format!("/campgrounds/{}", id)))
}

// --- Accounts ---

/// register_form
#[utoipa::path(
    get,
    path = "/register",
    responses((status = 200, description = "Registration form", body = FormPage))
)]
pub async fn register_form(ctx: RequestContext) -> Result<Json<FormPage>, AppError> {
    Ok(Json(FormPage {
        session: ctx.view().await?,
        form: "users/register".to_string(),
    }))
}

/// register
///
/// [Public Route] Creates the account and signs it in. A taken username or
/// email sends the visitor back to the form with the reason as a notice.
#[utoipa::path(
    post,
    path = "/register",
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Registered and signed in, or sent back to /register"),
        (status = 400, description = "Validation failed", body = crate::models::ErrorPage)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    mut ctx: RequestContext,
    FormBody(form): FormBody<RegisterForm>,
) -> Result<Redirect, AppError> {
    let form = validation::check(form)?;

    let user = match services::register_user(&state.repo, form).await {
        Ok(user) => user,
        Err(AppError::Repository(RepositoryError::Conflict(reason))) => {
            ctx.flash(Notice::Error, &reason).await?;
            return Ok(Redirect::to("/register"));
        }
        Err(e) => return Err(e),
    };

    ctx.login(&user).await?;
    tracing::info!(user_id = %user.id, "user registered");
    ctx.flash(Notice::Success, "Welcome to Yelp Camp!").await?;
    Ok(Redirect::to("/campgrounds"))
}

/// login_form
#[utoipa::path(
    get,
    path = "/login",
    responses((status = 200, description = "Login form", body = FormPage))
)]
pub async fn login_form(ctx: RequestContext) -> Result<Json<FormPage>, AppError> {
    Ok(Json(FormPage {
        session: ctx.view().await?,
        form: "users/login".to_string(),
    }))
}

/// login
///
/// [Public Route] On success the visitor is sent to the page they were stopped
/// at by the identity guard, or to the index.
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Signed in, or sent back to /login"))
)]
pub async fn login(
    State(state): State<AppState>,
    mut ctx: RequestContext,
    FormBody(form): FormBody<LoginForm>,
) -> Result<Redirect, AppError> {
    let user = match validation::check(form) {
        Ok(form) => services::authenticate(&state.repo, &form).await?,
        Err(_) => None,
    };

    let Some(user) = user else {
        ctx.flash(Notice::Error, "Password or username is incorrect").await?;
        return Ok(Redirect::to("/login"));
    };

    let return_to = ctx.take_return_to().await?;
    ctx.login(&user).await?;
    ctx.flash(Notice::Success, "Welcome back!").await?;

    Ok(Redirect::to(return_to.as_deref().unwrap_or("/campgrounds")))
}

/// logout
#[utoipa::path(
    get,
    path = "/logout",
    responses((status = 303, description = "Signed out, redirected to /campgrounds"))
)]
pub async fn logout(mut ctx: RequestContext) -> Result<Redirect, AppError> {
    ctx.logout().await?;
    ctx.flash(Notice::Success, "Goodbye!").await?;
    Ok(Redirect::to("/campgrounds"))
}
