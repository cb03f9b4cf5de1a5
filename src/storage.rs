use async_trait::async_trait;
use aws_sdk_s3 as s3;
use axum::body::Bytes;
use s3::primitives::ByteStream;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::CampgroundImage;

/// Folder every campground image is stored under.
pub const IMAGE_FOLDER: &str = "YelpCamp";

// 1. StorageService Contract
/// StorageService
///
/// The object-storage collaborator. Uploads return a stable reference (public
/// url + key); the key is what `delete` takes to remove the object again. The
/// real S3 client and the in-memory mock are interchangeable behind this trait.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Only called in `Env::Local` to
    /// provision the MinIO bucket.
    async fn ensure_bucket_exists(&self);

    /// Stores `bytes` under `key` and returns the reference to persist.
    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<CampgroundImage, String>;

    /// Deletes the object stored under `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), String>;
}

// 2. The Real Implementation (S3/MinIO)
/// S3StorageClient
///
/// S3 implementation. `force_path_style(true)` keeps it compatible with MinIO.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_url: String,
}

impl S3StorageClient {
    /// new
    ///
    /// Constructs the S3 client using credentials and configuration from AppConfig.
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_url: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        let client = s3::Client::from_conf(config);

        Self {
            client,
            bucket_name: bucket.to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// ensure_bucket_exists
    ///
    /// CreateBucket is idempotent enough for startup: an "already owned" error is ignored.
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!("create_bucket skipped: {:?}", e);
        }
    }

    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<CampgroundImage, String> {
        let key = sanitize_key(key);

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        Ok(CampgroundImage {
            url: format!("{}/{}/{}", self.public_url, self.bucket_name, key),
            filename: key,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), String> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// sanitize_key
///
/// Removes directory navigation components (`..`, `.`) and empty segments from
/// a key so it can never escape the bucket prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory `StorageService` that records what was stored and deleted. Clones
/// share the same record, so a test can keep a handle after moving one clone
/// into the application state.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    stored: Arc<Mutex<Vec<String>>>,
    deleted: Arc<Mutex<Vec<String>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Keys currently held.
    pub async fn stored_keys(&self) -> Vec<String> {
        self.stored.lock().await.clone()
    }

    /// Keys deleted so far, in call order.
    pub async fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().await.clone()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {
        // No-op in mock environment.
    }

    async fn upload(
        &self,
        key: &str,
        _bytes: Bytes,
        _content_type: &str,
    ) -> Result<CampgroundImage, String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }

        let key = sanitize_key(key);
        self.stored.lock().await.push(key.clone());

        Ok(CampgroundImage {
            url: format!("http://localhost:9000/mock-bucket/{}", key),
            filename: key,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }

        let key = sanitize_key(key);
        self.stored.lock().await.retain(|stored| *stored != key);
        self.deleted.lock().await.push(key);
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
