#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use tower_sessions::MemoryStore;
use uuid::Uuid;
use yelpcamp::{
    AppConfig, AppState, MemoryRepository, MockGeocoder, MockStorageService, create_router,
    geocoding::GeocoderState, repository::RepositoryState, storage::StorageState,
};

pub const BOUNDARY: &str = "yelpcamp-test-boundary";

// --- Application Harness ---

/// The full router wired to in-memory collaborators. The repository and
/// storage handles share state with the router, so tests can inspect them.
pub struct TestApp {
    pub router: Router,
    pub repo: MemoryRepository,
    pub storage: MockStorageService,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(MockGeocoder::new(), MockStorageService::new())
    }

    pub fn with(geocoder: MockGeocoder, storage: MockStorageService) -> Self {
        let repo = MemoryRepository::new();
        let state = AppState {
            repo: Arc::new(repo.clone()) as RepositoryState,
            storage: Arc::new(storage.clone()) as StorageState,
            geocoder: Arc::new(geocoder) as GeocoderState,
            config: AppConfig::default(),
        };
        let router = create_router(state, MemoryStore::default());
        Self {
            router,
            repo,
            storage,
        }
    }

    /// A browser with its own cookie jar.
    pub fn client(&self) -> Client {
        Client {
            router: self.router.clone(),
            cookie: None,
        }
    }

    /// A client that has registered (and is therefore signed in) as `username`,
    /// with the welcome notice already shown.
    pub async fn signed_in(&self, username: &str) -> Client {
        let mut client = self.register(username).await;
        client.page("/campgrounds").await;
        client
    }

    /// Registers `username` (password `monkey`) and leaves the redirect unfollowed.
    pub async fn register(&self, username: &str) -> Client {
        let mut client = self.client();
        let response = client
            .send(form_request(
                "POST",
                "/register",
                &format!(
                    "username={}&email={}%40example.com&password=monkey",
                    username, username
                ),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/campgrounds");
        client
    }
}

/// Client
///
/// Replays the `session` cookie the way a browser would.
pub struct Client {
    router: Router,
    pub cookie: Option<String>,
}

impl Client {
    pub async fn send(&mut self, mut request: Request<Body>) -> Response<Body> {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap().trim();
            if let Some(id) = pair.strip_prefix("session=") {
                self.cookie = if id.is_empty() {
                    None
                } else {
                    Some(pair.to_string())
                };
            }
        }

        response
    }

    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&mut self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// GETs a page and returns its JSON payload, asserting a 200.
    pub async fn page(&mut self, uri: &str) -> Value {
        let response = self.get(uri).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
        json(response).await
    }

    /// Creates a campground, follows the redirect and returns its id.
    pub async fn create_campground(&mut self, title: &str) -> Uuid {
        let response = self
            .send(multipart_request(
                "POST",
                "/campgrounds",
                &campground_fields(title),
                &[jpeg("creek.jpg")],
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let target = location(&response);
        self.page(&target).await;
        campground_id_from(&target)
    }

    /// Posts a review, asserts it was accepted and follows the redirect.
    pub async fn post_review(&mut self, campground_id: Uuid, body: &str, rating: u8) {
        let response = self
            .send(form_request(
                "POST",
                &format!("/campgrounds/{}/reviews", campground_id),
                &format!("body={}&rating={}", body, rating),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let target = location(&response);
        assert_eq!(target, format!("/campgrounds/{}", campground_id));
        self.page(&target).await;
    }
}

// --- Request Builders ---

pub fn form_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// An in-memory file part: (field name, file name, content type, bytes).
pub type FilePart = (&'static str, &'static str, &'static str, &'static [u8]);

pub fn jpeg(file_name: &'static str) -> FilePart {
    ("image", file_name, "image/jpeg", b"\xff\xd8\xff\xe0fake-jpeg")
}

pub fn png(file_name: &'static str) -> FilePart {
    ("image", file_name, "image/png", b"\x89PNG\r\n\x1a\nfake-png")
}

pub fn campground_fields(title: &str) -> Vec<(String, String)> {
    vec![
        ("title".to_string(), title.to_string()),
        ("price".to_string(), "9.99".to_string()),
        ("description".to_string(), "trail".to_string()),
        ("location".to_string(), "Lynchburg".to_string()),
    ]
}

pub fn multipart_request(
    method: &str,
    uri: &str,
    fields: &[(String, String)],
    files: &[FilePart],
) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name, content_type, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

// --- Response Helpers ---

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("response has no Location header")
        .to_str()
        .unwrap()
        .to_string()
}

pub fn campground_id_from(location: &str) -> Uuid {
    let id = location
        .strip_prefix("/campgrounds/")
        .expect("not a campground location");
    Uuid::parse_str(id).unwrap()
}

pub async fn json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn success_notices(page: &Value) -> Vec<String> {
    notices(page, "success")
}

pub fn error_notices(page: &Value) -> Vec<String> {
    notices(page, "error")
}

fn notices(page: &Value, kind: &str) -> Vec<String> {
    page["session"]["notices"][kind]
        .as_array()
        .unwrap()
        .iter()
        .map(|notice| notice.as_str().unwrap().to_string())
        .collect()
}
