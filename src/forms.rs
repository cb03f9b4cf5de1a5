use std::borrow::Cow;

use axum::{
    body::Bytes,
    extract::{
        FromRequest, Multipart, Request,
        multipart::{Field, MultipartError},
    },
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::error::{AppError, UNREADABLE_FORM_MESSAGE};

/// Upload content types accepted for campground images.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

// --- Request Payloads (Input Schemas) ---

/// CampgroundFields
///
/// The text part of the campground form. Everything is kept as submitted
/// (trimmed) so the validation gate can report a non-numeric price as a field
/// error instead of an extractor rejection.
#[derive(Debug, Clone, Default, Validate)]
pub struct CampgroundFields {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(
        length(min = 1, message = "Price is required"),
        custom(function = "non_negative_price")
    )]
    pub price: String,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
}

impl CampgroundFields {
    /// The price as a number. Only meaningful once the gate has passed the payload.
    pub fn price_value(&self) -> Result<f64, AppError> {
        self.price
            .parse::<f64>()
            .map_err(|_| AppError::Validation("Price must be a number".to_string()))
    }
}

/// ImageUpload
///
/// A file part pulled out of the multipart body, held in memory until the
/// gate and guards have passed.
#[derive(Debug, Clone, Serialize)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    #[serde(skip_serializing)]
    pub bytes: Bytes,
}

impl ImageUpload {
    /// File extension used for the storage key, derived from the content type.
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/png" => "png",
            _ => "jpg",
        }
    }
}

/// NewCampground
///
/// Schema for `POST /campgrounds`: all text fields plus at least one image.
#[derive(Debug, Clone, Validate)]
pub struct NewCampground {
    #[validate(nested)]
    pub campground: CampgroundFields,
    #[validate(
        length(min = 1, message = "At least one image is required"),
        custom(function = "supported_images")
    )]
    pub images: Vec<ImageUpload>,
}

/// CampgroundUpdate
///
/// Schema for `PUT /campgrounds/{id}`. New images are appended; `delete_images`
/// lists storage keys of existing images to remove.
#[derive(Debug, Clone, Validate)]
pub struct CampgroundUpdate {
    #[validate(nested)]
    pub campground: CampgroundFields,
    #[validate(custom(function = "supported_images"))]
    pub images: Vec<ImageUpload>,
    pub delete_images: Vec<String>,
}

/// CampgroundForm
///
/// Raw multipart body shared by the create and update routes. Field names are
/// accepted either flat (`title`) or nested the way HTML forms usually post them
/// (`campground[title]`). Unknown parts, including any attempt to post an
/// `author`, are ignored.
#[derive(Debug, Clone, Default)]
pub struct CampgroundForm {
    pub fields: CampgroundFields,
    pub images: Vec<ImageUpload>,
    pub delete_images: Vec<String>,
}

impl CampgroundForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(unreadable)?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field_key(&name) {
                "image" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(unreadable)?;
                    // Browsers post an empty part when the file input is left blank.
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.images.push(ImageUpload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                "deleteImages" | "deleteImages[]" => {
                    let filename = text(field).await?;
                    if !filename.is_empty() {
                        form.delete_images.push(filename);
                    }
                }
                "title" => form.fields.title = text(field).await?,
                "price" => form.fields.price = text(field).await?,
                "location" => form.fields.location = text(field).await?,
                "description" => form.fields.description = text(field).await?,
                _ => {}
            }
        }

        Ok(form)
    }

    pub fn into_new(self) -> NewCampground {
        NewCampground {
            campground: self.fields,
            images: self.images,
        }
    }

    pub fn into_update(self) -> CampgroundUpdate {
        CampgroundUpdate {
            campground: self.fields,
            images: self.images,
            delete_images: self.delete_images,
        }
    }
}

/// ReviewForm
///
/// Schema for `POST /campgrounds/{id}/reviews`.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ReviewForm {
    #[serde(default, alias = "review[body]")]
    #[validate(length(min = 1, message = "Review body is required"))]
    pub body: String,
    #[serde(default, alias = "review[rating]")]
    #[validate(
        length(min = 1, message = "Rating is required"),
        custom(function = "rating_in_range")
    )]
    pub rating: String,
}

impl ReviewForm {
    pub fn rating_value(&self) -> Result<i32, AppError> {
        self.rating
            .trim()
            .parse::<i32>()
            .map_err(|_| AppError::Validation("Rating must be a whole number".to_string()))
    }
}

/// RegisterForm
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct RegisterForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// LoginForm
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct LoginForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl<S> FromRequest<S> for CampgroundForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state).await?;
        Self::from_multipart(multipart).await
    }
}

// --- Field Rules ---

fn non_negative_price(value: &str) -> Result<(), ValidationError> {
    // An empty price is reported by the `length` rule.
    if value.is_empty() {
        return Ok(());
    }
    match value.parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Ok(()),
        Ok(price) if price.is_finite() => Err(ValidationError::new("range")
            .with_message(Cow::from("Price must be greater than or equal to 0"))),
        _ => Err(ValidationError::new("number").with_message(Cow::from("Price must be a number"))),
    }
}

fn rating_in_range(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Ok(());
    }
    match value.trim().parse::<i32>() {
        Ok(rating) if (1..=5).contains(&rating) => Ok(()),
        _ => Err(ValidationError::new("range")
            .with_message(Cow::from("Rating must be a whole number from 1 to 5"))),
    }
}

fn supported_images(images: &[ImageUpload]) -> Result<(), ValidationError> {
    if images
        .iter()
        .all(|image| ALLOWED_IMAGE_TYPES.contains(&image.content_type.as_str()))
    {
        Ok(())
    } else {
        Err(ValidationError::new("content_type")
            .with_message(Cow::from("Images must be JPEG or PNG files")))
    }
}

fn field_key(name: &str) -> &str {
    name.strip_prefix("campground[")
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(name)
}

async fn text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map(|value| value.trim().to_string())
        .map_err(unreadable)
}

fn unreadable(err: MultipartError) -> AppError {
    tracing::debug!("multipart field rejected: {}", err.body_text());
    AppError::Validation(UNREADABLE_FORM_MESSAGE.to_string())
}
