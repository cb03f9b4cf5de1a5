//! Resource service: the only code that mutates campgrounds, reviews and users.
//!
//! Callers are expected to have run the validation gate and the guards first;
//! nothing here re-checks identity or ownership.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::{hash_password, verify_password},
    error::AppError,
    forms::{CampgroundUpdate, ImageUpload, LoginForm, NewCampground, RegisterForm, ReviewForm},
    geocoding::GeocoderState,
    models::{
        Campground, CampgroundChanges, CampgroundDetails, CampgroundImage, CurrentUser, Geometry,
        Review, ReviewDetails, User, UserSummary,
    },
    repository::RepositoryState,
    storage::{IMAGE_FOLDER, StorageState},
};

// --- Campgrounds ---

/// create_campground
///
/// Geocodes the location, uploads every image, then persists the campground
/// with `author` as its owner. Uploaded objects are removed again if a later
/// step fails.
pub async fn create_campground(
    repo: &RepositoryState,
    storage: &StorageState,
    geocoder: &GeocoderState,
    payload: NewCampground,
    author: &CurrentUser,
) -> Result<Campground, AppError> {
    let price = payload.campground.price_value()?;
    let geometry = geocode(geocoder, &payload.campground.location).await?;
    let images = upload_images(storage, payload.images).await?;

    let campground = Campground {
        id: Uuid::new_v4(),
        title: payload.campground.title,
        price,
        description: payload.campground.description,
        location: payload.campground.location,
        geometry,
        images: images.clone(),
        author: author.id,
        reviews: Vec::new(),
        created_at: Utc::now(),
    };

    match repo.insert_campground(campground).await {
        Ok(saved) => {
            tracing::info!(campground_id = %saved.id, author = %author.id, "campground created");
            Ok(saved)
        }
        Err(e) => {
            discard_images(storage, &images).await;
            Err(e.into())
        }
    }
}

/// campground_details
///
/// Reads a campground with its author, its reviews and every review author
/// expanded. `None` when the id is unknown.
pub async fn campground_details(
    repo: &RepositoryState,
    id: Uuid,
) -> Result<Option<CampgroundDetails>, AppError> {
    let Some(campground) = repo.get_campground(id).await? else {
        return Ok(None);
    };

    let reviews = repo.get_reviews(&campground.reviews).await?;

    let mut author_ids: Vec<Uuid> = reviews.iter().map(|review| review.author).collect();
    author_ids.push(campground.author);
    author_ids.sort();
    author_ids.dedup();

    let authors: HashMap<Uuid, UserSummary> = repo
        .get_users(&author_ids)
        .await?
        .iter()
        .map(|user| (user.id, UserSummary::from(user)))
        .collect();

    let reviews = reviews
        .into_iter()
        .map(|review| ReviewDetails {
            author: authors.get(&review.author).cloned(),
            id: review.id,
            body: review.body,
            rating: review.rating,
            created_at: review.created_at,
        })
        .collect();

    Ok(Some(CampgroundDetails {
        author: authors.get(&campground.author).cloned(),
        id: campground.id,
        title: campground.title,
        price: campground.price,
        description: campground.description,
        location: campground.location,
        geometry: campground.geometry,
        images: campground.images,
        reviews,
        created_at: campground.created_at,
    }))
}

/// update_campground
///
/// Applies the submitted fields to `existing`. New images are appended; images
/// named in `delete_images` are removed from object storage first and then
/// pulled from the campground. Keys that do not belong to this campground are
/// ignored. `None` if the campground disappeared in the meantime.
pub async fn update_campground(
    repo: &RepositoryState,
    storage: &StorageState,
    geocoder: &GeocoderState,
    existing: &Campground,
    payload: CampgroundUpdate,
) -> Result<Option<Campground>, AppError> {
    let price = payload.campground.price_value()?;

    let geometry = if payload.campground.location != existing.location {
        Some(geocode(geocoder, &payload.campground.location).await?)
    } else {
        None
    };

    let added = upload_images(storage, payload.images).await?;

    let removed: Vec<String> = payload
        .delete_images
        .into_iter()
        .filter(|key| existing.images.iter().any(|image| image.filename == *key))
        .collect();

    for key in &removed {
        if let Err(e) = storage.delete(key).await {
            discard_images(storage, &added).await;
            return Err(AppError::Upstream(format!(
                "failed to delete image {}: {}",
                key, e
            )));
        }
    }

    let changes = CampgroundChanges {
        title: Some(payload.campground.title),
        price: Some(price),
        description: Some(payload.campground.description),
        location: Some(payload.campground.location),
        geometry,
        add_images: added.clone(),
        remove_images: removed,
    };

    match repo.update_campground(existing.id, changes).await {
        Ok(Some(updated)) => Ok(Some(updated)),
        Ok(None) => {
            discard_images(storage, &added).await;
            Ok(None)
        }
        Err(e) => {
            discard_images(storage, &added).await;
            Err(e.into())
        }
    }
}

/// delete_campground
///
/// Removes the campground and every review it references in one repository
/// call, then deletes its stored images. Image deletion is best-effort: the
/// records are already gone, so a storage failure is logged and not returned.
pub async fn delete_campground(
    repo: &RepositoryState,
    storage: &StorageState,
    id: Uuid,
) -> Result<Option<Campground>, AppError> {
    let Some(deleted) = repo.delete_campground(id).await? else {
        return Ok(None);
    };

    tracing::info!(
        campground_id = %deleted.id,
        reviews = deleted.reviews.len(),
        "campground deleted with its reviews"
    );
    discard_images(storage, &deleted.images).await;

    Ok(Some(deleted))
}

// --- Reviews ---

/// add_review
///
/// Stores a review under `campground_id`. `None` when the campground does not exist.
pub async fn add_review(
    repo: &RepositoryState,
    campground_id: Uuid,
    payload: ReviewForm,
    author: &CurrentUser,
) -> Result<Option<Review>, AppError> {
    let review = Review {
        id: Uuid::new_v4(),
        rating: payload.rating_value()?,
        body: payload.body,
        author: author.id,
        campground: campground_id,
        created_at: Utc::now(),
    };

    Ok(repo.insert_review(review).await?)
}

/// delete_review
///
/// `false` when no such review exists under `campground_id`.
pub async fn delete_review(
    repo: &RepositoryState,
    campground_id: Uuid,
    review_id: Uuid,
) -> Result<bool, AppError> {
    Ok(repo.delete_review(campground_id, review_id).await?)
}

// --- Accounts ---

/// register_user
///
/// Hashes the password and stores the account. A taken username or email comes
/// back as `AppError::Repository(RepositoryError::Conflict(..))`.
pub async fn register_user(repo: &RepositoryState, form: RegisterForm) -> Result<User, AppError> {
    let user = User {
        id: Uuid::new_v4(),
        username: form.username,
        email: form.email,
        password_hash: hash_password(form.password).await?,
    };
    Ok(repo.create_user(user).await?)
}

/// authenticate
///
/// `None` for an unknown username or a wrong password; the two are not
/// distinguished.
pub async fn authenticate(repo: &RepositoryState, form: &LoginForm) -> Result<Option<User>, AppError> {
    let user = repo.find_user_by_username(&form.username).await?;
    let Some(user) = user else {
        return Ok(None);
    };
    let verified = verify_password(form.password.clone(), user.password_hash.clone()).await?;
    Ok(verified.then_some(user))
}

// --- Collaborator helpers ---

async fn geocode(geocoder: &GeocoderState, location: &str) -> Result<Option<Geometry>, AppError> {
    let geometry = geocoder
        .forward(location)
        .await
        .map_err(|e| AppError::Upstream(format!("geocoding failed: {}", e)))?;
    if geometry.is_none() {
        tracing::debug!("no geocoding match for {:?}", location);
    }
    Ok(geometry)
}

async fn upload_images(
    storage: &StorageState,
    uploads: Vec<ImageUpload>,
) -> Result<Vec<CampgroundImage>, AppError> {
    let mut stored = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let key = format!("{}/{}.{}", IMAGE_FOLDER, Uuid::new_v4(), upload.extension());
        match storage.upload(&key, upload.bytes, &upload.content_type).await {
            Ok(image) => stored.push(image),
            Err(e) => {
                discard_images(storage, &stored).await;
                return Err(AppError::Upstream(format!(
                    "failed to upload {}: {}",
                    upload.file_name, e
                )));
            }
        }
    }
    Ok(stored)
}

async fn discard_images(storage: &StorageState, images: &[CampgroundImage]) {
    for image in images {
        if let Err(e) = storage.delete(&image.filename).await {
            tracing::warn!(key = %image.filename, "failed to delete stored image: {}", e);
        }
    }
}
