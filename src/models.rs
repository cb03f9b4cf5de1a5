use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Storage) ---

/// User
///
/// A registered account. Resources reference users by id and never embed them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    // Argon2 PHC string. Never leaves the server.
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// UserSummary
///
/// The public face of a `User`, used wherever an author reference is expanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// Geometry
///
/// GeoJSON point, `[longitude, latitude]`, as returned by the geocoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    #[schema(value_type = Vec<f64>)]
    pub coordinates: [f64; 2],
}

impl Geometry {
    pub fn point(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [longitude, latitude],
        }
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }
}

/// CampgroundImage
///
/// A stored image reference: the public url plus the object-storage key
/// (`filename`) needed to delete it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CampgroundImage {
    pub url: String,
    pub filename: String,
}

/// Campground
///
/// A listing. `reviews` holds review ids in the order they were posted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Campground {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub description: String,
    pub location: String,
    pub geometry: Option<Geometry>,
    pub images: Vec<CampgroundImage>,
    // FK to users.id (Owner).
    pub author: Uuid,
    pub reviews: Vec<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Review
///
/// A rating left on exactly one campground.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Review {
    pub id: Uuid,
    pub body: String,
    pub rating: i32,
    pub author: Uuid,
    // Back-reference to the owning campground.
    pub campground: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// CampgroundChanges
///
/// Partial update applied by the repository. `None` leaves a field untouched.
/// For `geometry` the outer `None` means "unchanged" and `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct CampgroundChanges {
    pub title: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub geometry: Option<Option<Geometry>>,
    // Appended after the existing images.
    pub add_images: Vec<CampgroundImage>,
    // Storage keys of images to pull from the collection.
    pub remove_images: Vec<String>,
}

// --- Expanded (populated) Views ---

/// ReviewDetails
///
/// A review with its author reference expanded.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ReviewDetails {
    pub id: Uuid,
    pub body: String,
    pub rating: i32,
    pub author: Option<UserSummary>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// CampgroundDetails
///
/// A campground with its author and every review (and review author) expanded.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CampgroundDetails {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub description: String,
    pub location: String,
    pub geometry: Option<Geometry>,
    pub images: Vec<CampgroundImage>,
    pub author: Option<UserSummary>,
    pub reviews: Vec<ReviewDetails>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Session Views ---

/// CurrentUser
///
/// The identity stored in the session after login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// Notices
///
/// One-shot flash messages, drained the first time a page is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Notices {
    pub success: Vec<String>,
    pub error: Vec<String>,
}

impl Notices {
    pub fn is_empty(&self) -> bool {
        self.success.is_empty() && self.error.is_empty()
    }
}

/// SessionView
///
/// What every page gets to know about the visitor.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SessionView {
    pub current_user: Option<CurrentUser>,
    pub notices: Notices,
}

// --- Page Payloads (Output Schemas) ---

/// CampgroundIndexPage
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CampgroundIndexPage {
    pub session: SessionView,
    pub campgrounds: Vec<Campground>,
}

/// CampgroundPage
///
/// Show page: the fully expanded campground.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CampgroundPage {
    pub session: SessionView,
    pub campground: CampgroundDetails,
}

/// EditCampgroundPage
///
/// Edit form, pre-filled with the stored campground.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EditCampgroundPage {
    pub session: SessionView,
    pub campground: Campground,
}

/// FormPage
///
/// Pages that are nothing but a form (home, new campground, login, register).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FormPage {
    pub session: SessionView,
    pub form: String,
}

/// ErrorPage
///
/// Body of the generic error page.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorPage {
    pub status: u16,
    pub message: String,
}
