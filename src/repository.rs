use crate::models::{Campground, CampgroundChanges, CampgroundImage, Geometry, Review, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// RepositoryError
///
/// Failures surfaced by a repository. `Conflict` is the only client-caused one
/// (a unique username or email already taken).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The persistence contract the handlers and services rely on. Lookups that can
/// miss return `Option`; only infrastructure failures are errors.
///
/// Multi-row writes (`delete_campground`, `insert_review`, `delete_review`,
/// `update_campground`) are all-or-nothing: both sides of a campground/review
/// reference change together or not at all.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    // Fails with `Conflict` when the username or email is taken.
    async fn create_user(&self, user: User) -> RepoResult<User>;
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    // Missing ids are skipped.
    async fn get_users(&self, ids: &[Uuid]) -> RepoResult<Vec<User>>;

    // --- Campgrounds ---
    // Newest first.
    async fn list_campgrounds(&self) -> RepoResult<Vec<Campground>>;
    async fn get_campground(&self, id: Uuid) -> RepoResult<Option<Campground>>;
    async fn insert_campground(&self, campground: Campground) -> RepoResult<Campground>;
    async fn update_campground(
        &self,
        id: Uuid,
        changes: CampgroundChanges,
    ) -> RepoResult<Option<Campground>>;
    /// Deletes the campground together with every review it references and its
    /// image rows, in one unit. Returns the deleted document.
    async fn delete_campground(&self, id: Uuid) -> RepoResult<Option<Campground>>;

    // --- Reviews ---
    async fn get_review(&self, id: Uuid) -> RepoResult<Option<Review>>;
    // Returned in the order of `ids`; missing ids are skipped.
    async fn get_reviews(&self, ids: &[Uuid]) -> RepoResult<Vec<Review>>;
    /// Stores the review and appends it to its campground. `None` when the
    /// campground does not exist.
    async fn insert_review(&self, review: Review) -> RepoResult<Option<Review>>;
    /// Deletes the review and pulls it from the campground. `false` when no
    /// review with that id belongs to that campground.
    async fn delete_review(&self, campground_id: Uuid, review_id: Uuid) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
        }
    }
}

#[derive(FromRow)]
struct CampgroundRow {
    id: Uuid,
    title: String,
    price: f64,
    description: String,
    location: String,
    longitude: Option<f64>,
    latitude: Option<f64>,
    author_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ImageRow {
    campground_id: Uuid,
    url: String,
    filename: String,
}

#[derive(FromRow)]
struct ReviewRow {
    id: Uuid,
    body: String,
    rating: i32,
    author_id: Uuid,
    campground_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            body: row.body,
            rating: row.rating,
            author: row.author_id,
            campground: row.campground_id,
            created_at: row.created_at,
        }
    }
}

const CAMPGROUND_COLUMNS: &str = "id, title, price, description, location, longitude, latitude, author_id, created_at";
const REVIEW_COLUMNS: &str = "id, body, rating, author_id, campground_id, created_at";

/// PostgresRepository
///
/// The production implementation of `Repository`, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads images and review ids for the given rows and assembles documents,
    /// preserving row order.
    async fn assemble(
        executor: &mut sqlx::PgConnection,
        rows: Vec<CampgroundRow>,
    ) -> RepoResult<Vec<Campground>> {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();

        let images = sqlx::query_as::<_, ImageRow>(
            "SELECT campground_id, url, filename FROM campground_images \
             WHERE campground_id = ANY($1) ORDER BY campground_id, position",
        )
        .bind(&ids)
        .fetch_all(&mut *executor)
        .await?;

        let review_refs: Vec<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT campground_id, id FROM reviews \
             WHERE campground_id = ANY($1) ORDER BY created_at, id",
        )
        .bind(&ids)
        .fetch_all(&mut *executor)
        .await?;

        let mut images_by_campground: HashMap<Uuid, Vec<CampgroundImage>> = HashMap::new();
        for image in images {
            images_by_campground
                .entry(image.campground_id)
                .or_default()
                .push(CampgroundImage {
                    url: image.url,
                    filename: image.filename,
                });
        }

        let mut reviews_by_campground: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for (campground_id, review_id) in review_refs {
            reviews_by_campground
                .entry(campground_id)
                .or_default()
                .push(review_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let geometry = match (row.longitude, row.latitude) {
                    (Some(longitude), Some(latitude)) => Some(Geometry::point(longitude, latitude)),
                    _ => None,
                };
                Campground {
                    images: images_by_campground.remove(&row.id).unwrap_or_default(),
                    reviews: reviews_by_campground.remove(&row.id).unwrap_or_default(),
                    id: row.id,
                    title: row.title,
                    price: row.price,
                    description: row.description,
                    location: row.location,
                    geometry,
                    author: row.author_id,
                    created_at: row.created_at,
                }
            })
            .collect())
    }

    async fn load_campground(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        lock: bool,
    ) -> RepoResult<Option<Campground>> {
        let query = format!(
            "SELECT {} FROM campgrounds WHERE id = $1{}",
            CAMPGROUND_COLUMNS,
            if lock { " FOR UPDATE" } else { "" }
        );
        let Some(row) = sqlx::query_as::<_, CampgroundRow>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
        else {
            return Ok(None);
        };
        Ok(Self::assemble(&mut **tx, vec![row]).await?.pop())
    }

    async fn insert_images(
        tx: &mut Transaction<'_, Postgres>,
        campground_id: Uuid,
        images: &[CampgroundImage],
    ) -> RepoResult<()> {
        if images.is_empty() {
            return Ok(());
        }
        let next: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM campground_images WHERE campground_id = $1",
        )
        .bind(campground_id)
        .fetch_one(&mut **tx)
        .await?;

        for (offset, image) in (0_i32..).zip(images) {
            sqlx::query(
                "INSERT INTO campground_images (campground_id, position, url, filename) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(campground_id)
            .bind(next + offset)
            .bind(&image.url)
            .bind(&image.filename)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

/// Maps unique-constraint violations on `users` to a readable conflict.
fn user_conflict(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let message = match db_err.constraint() {
                Some(constraint) if constraint.contains("email") => {
                    "A user with the given email is already registered"
                }
                _ => "A user with the given username is already registered",
            };
            return RepositoryError::Conflict(message.to_string());
        }
    }
    RepositoryError::Database(err)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_user(&self, user: User) -> RepoResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, $4) \
             RETURNING id, username, email, password_hash",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(user_conflict)?;
        Ok(row.into())
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, password_hash FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn get_users(&self, ids: &[Uuid]) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, password_hash FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn list_campgrounds(&self) -> RepoResult<Vec<Campground>> {
        let mut conn = self.pool.acquire().await?;
        let query = format!(
            "SELECT {} FROM campgrounds ORDER BY created_at DESC",
            CAMPGROUND_COLUMNS
        );
        let rows = sqlx::query_as::<_, CampgroundRow>(&query)
            .fetch_all(&mut *conn)
            .await?;
        Self::assemble(&mut *conn, rows).await
    }

    async fn get_campground(&self, id: Uuid) -> RepoResult<Option<Campground>> {
        let mut tx = self.pool.begin().await?;
        let campground = Self::load_campground(&mut tx, id, false).await?;
        tx.commit().await?;
        Ok(campground)
    }

    async fn insert_campground(&self, campground: Campground) -> RepoResult<Campground> {
        let mut tx = self.pool.begin().await?;
        let (longitude, latitude) = match &campground.geometry {
            Some(geometry) => (Some(geometry.longitude()), Some(geometry.latitude())),
            None => (None, None),
        };

        sqlx::query(
            "INSERT INTO campgrounds \
             (id, title, price, description, location, longitude, latitude, author_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(campground.id)
        .bind(&campground.title)
        .bind(campground.price)
        .bind(&campground.description)
        .bind(&campground.location)
        .bind(longitude)
        .bind(latitude)
        .bind(campground.author)
        .bind(campground.created_at)
        .execute(&mut *tx)
        .await?;

        Self::insert_images(&mut tx, campground.id, &campground.images).await?;
        tx.commit().await?;

        Ok(Campground {
            reviews: Vec::new(),
            ..campground
        })
    }

    /// Uses `COALESCE` so only the provided fields change, then appends and pulls
    /// images inside the same transaction.
    async fn update_campground(
        &self,
        id: Uuid,
        changes: CampgroundChanges,
    ) -> RepoResult<Option<Campground>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE campgrounds \
             SET title = COALESCE($2, title), \
                 price = COALESCE($3, price), \
                 description = COALESCE($4, description), \
                 location = COALESCE($5, location) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&changes.title)
        .bind(changes.price)
        .bind(&changes.description)
        .bind(&changes.location)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(geometry) = &changes.geometry {
            sqlx::query("UPDATE campgrounds SET longitude = $2, latitude = $3 WHERE id = $1")
                .bind(id)
                .bind(geometry.as_ref().map(Geometry::longitude))
                .bind(geometry.as_ref().map(Geometry::latitude))
                .execute(&mut *tx)
                .await?;
        }

        Self::insert_images(&mut tx, id, &changes.add_images).await?;

        if !changes.remove_images.is_empty() {
            sqlx::query(
                "DELETE FROM campground_images WHERE campground_id = $1 AND filename = ANY($2)",
            )
            .bind(id)
            .bind(&changes.remove_images)
            .execute(&mut *tx)
            .await?;
        }

        let campground = Self::load_campground(&mut tx, id, false).await?;
        tx.commit().await?;
        Ok(campground)
    }

    /// The cascade runs in one transaction: the campground row is locked, its
    /// reviews and image rows are deleted, then the campground itself. A crash at
    /// any point rolls the whole unit back, so no orphaned review can survive.
    async fn delete_campground(&self, id: Uuid) -> RepoResult<Option<Campground>> {
        let mut tx = self.pool.begin().await?;

        let Some(campground) = Self::load_campground(&mut tx, id, true).await? else {
            return Ok(None);
        };

        let deleted_reviews = sqlx::query("DELETE FROM reviews WHERE campground_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM campground_images WHERE campground_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM campgrounds WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(campground_id = %id, deleted_reviews, "campground cascade committed");
        Ok(Some(campground))
    }

    async fn get_review(&self, id: Uuid) -> RepoResult<Option<Review>> {
        let query = format!("SELECT {} FROM reviews WHERE id = $1", REVIEW_COLUMNS);
        let row = sqlx::query_as::<_, ReviewRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Review::from))
    }

    async fn get_reviews(&self, ids: &[Uuid]) -> RepoResult<Vec<Review>> {
        let query = format!("SELECT {} FROM reviews WHERE id = ANY($1)", REVIEW_COLUMNS);
        let rows = sqlx::query_as::<_, ReviewRow>(&query)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        let mut by_id: HashMap<Uuid, Review> = rows
            .into_iter()
            .map(|row| (row.id, Review::from(row)))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn insert_review(&self, review: Review) -> RepoResult<Option<Review>> {
        let mut tx = self.pool.begin().await?;

        // Lock the parent so a concurrent cascade delete cannot slip in between.
        let parent: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM campgrounds WHERE id = $1 FOR UPDATE")
                .bind(review.campground)
                .fetch_optional(&mut *tx)
                .await?;
        if parent.is_none() {
            return Ok(None);
        }

        let query = format!(
            "INSERT INTO reviews ({}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            REVIEW_COLUMNS, REVIEW_COLUMNS
        );
        let row = sqlx::query_as::<_, ReviewRow>(&query)
            .bind(review.id)
            .bind(&review.body)
            .bind(review.rating)
            .bind(review.author)
            .bind(review.campground)
            .bind(review.created_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(row.into()))
    }

    async fn delete_review(&self, campground_id: Uuid, review_id: Uuid) -> RepoResult<bool> {
        // The back-reference lives on the review row, so removing the row also
        // pulls it from the campground's collection.
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1 AND campground_id = $2")
            .bind(review_id)
            .bind(campground_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// --- In-Memory ---

#[derive(Default)]
struct Documents {
    users: HashMap<Uuid, User>,
    campgrounds: HashMap<Uuid, Campground>,
    reviews: HashMap<Uuid, Review>,
}

/// MemoryRepository
///
/// A document store kept behind a single lock, used by the test-suite and for
/// running the router without a database. Every method takes the lock once, so
/// multi-document writes are atomic with respect to other callers.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    documents: Arc<RwLock<Documents>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored reviews, across every campground.
    pub async fn review_count(&self) -> usize {
        self.documents.read().await.reviews.len()
    }

    /// Number of stored campgrounds.
    pub async fn campground_count(&self) -> usize {
        self.documents.read().await.campgrounds.len()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, user: User) -> RepoResult<User> {
        let mut documents = self.documents.write().await;
        if documents
            .users
            .values()
            .any(|existing| existing.username == user.username)
        {
            return Err(RepositoryError::Conflict(
                "A user with the given username is already registered".to_string(),
            ));
        }
        if documents
            .users
            .values()
            .any(|existing| existing.email == user.email)
        {
            return Err(RepositoryError::Conflict(
                "A user with the given email is already registered".to_string(),
            ));
        }
        documents.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.documents.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        Ok(self
            .documents
            .read()
            .await
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn get_users(&self, ids: &[Uuid]) -> RepoResult<Vec<User>> {
        let documents = self.documents.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| documents.users.get(id).cloned())
            .collect())
    }

    async fn list_campgrounds(&self) -> RepoResult<Vec<Campground>> {
        let mut campgrounds: Vec<Campground> = self
            .documents
            .read()
            .await
            .campgrounds
            .values()
            .cloned()
            .collect();
        campgrounds.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(campgrounds)
    }

    async fn get_campground(&self, id: Uuid) -> RepoResult<Option<Campground>> {
        Ok(self.documents.read().await.campgrounds.get(&id).cloned())
    }

    async fn insert_campground(&self, campground: Campground) -> RepoResult<Campground> {
        let campground = Campground {
            reviews: Vec::new(),
            ..campground
        };
        self.documents
            .write()
            .await
            .campgrounds
            .insert(campground.id, campground.clone());
        Ok(campground)
    }

    async fn update_campground(
        &self,
        id: Uuid,
        changes: CampgroundChanges,
    ) -> RepoResult<Option<Campground>> {
        let mut documents = self.documents.write().await;
        let Some(campground) = documents.campgrounds.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            campground.title = title;
        }
        if let Some(price) = changes.price {
            campground.price = price;
        }
        if let Some(description) = changes.description {
            campground.description = description;
        }
        if let Some(location) = changes.location {
            campground.location = location;
        }
        if let Some(geometry) = changes.geometry {
            campground.geometry = geometry;
        }
        campground.images.extend(changes.add_images);
        campground
            .images
            .retain(|image| !changes.remove_images.contains(&image.filename));

        Ok(Some(campground.clone()))
    }

    async fn delete_campground(&self, id: Uuid) -> RepoResult<Option<Campground>> {
        let mut documents = self.documents.write().await;
        let Some(campground) = documents.campgrounds.remove(&id) else {
            return Ok(None);
        };
        for review_id in &campground.reviews {
            documents.reviews.remove(review_id);
        }
        Ok(Some(campground))
    }

    async fn get_review(&self, id: Uuid) -> RepoResult<Option<Review>> {
        Ok(self.documents.read().await.reviews.get(&id).cloned())
    }

    async fn get_reviews(&self, ids: &[Uuid]) -> RepoResult<Vec<Review>> {
        let documents = self.documents.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| documents.reviews.get(id).cloned())
            .collect())
    }

    async fn insert_review(&self, review: Review) -> RepoResult<Option<Review>> {
        let mut documents = self.documents.write().await;
        let Some(campground) = documents.campgrounds.get_mut(&review.campground) else {
            return Ok(None);
        };
        campground.reviews.push(review.id);
        documents.reviews.insert(review.id, review.clone());
        Ok(Some(review))
    }

    async fn delete_review(&self, campground_id: Uuid, review_id: Uuid) -> RepoResult<bool> {
        let mut documents = self.documents.write().await;
        let belongs = documents
            .reviews
            .get(&review_id)
            .is_some_and(|review| review.campground == campground_id);
        if !belongs {
            return Ok(false);
        }
        documents.reviews.remove(&review_id);
        if let Some(campground) = documents.campgrounds.get_mut(&campground_id) {
            campground.reviews.retain(|id| *id != review_id);
        }
        Ok(true)
    }
}
