mod common;

use axum::http::StatusCode;
use common::{
    TestApp, campground_fields, error_notices, form_request, jpeg, json, location,
    multipart_request, png, success_notices,
};
use uuid::Uuid;
use yelpcamp::{MockGeocoder, MockStorageService, repository::Repository};

// --- Public Pages ---

#[tokio::test]
async fn test_health_and_response_headers() {
    let app = TestApp::new();
    let mut client = app.client();

    let response = client.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("referrer-policy"));
    assert!(headers.contains_key("content-security-policy"));
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_unmatched_route_is_a_generic_404() {
    let app = TestApp::new();
    let mut client = app.client();

    let response = client.get("/no/such/page").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let page = json(response).await;
    assert_eq!(page["status"], 404);
    assert_eq!(page["message"], "Page Not Found");
}

#[tokio::test]
async fn test_malformed_ids_get_the_generic_404_page() {
    let app = TestApp::new();
    let mut client = app.signed_in("colt").await;

    for response in [
        client.get("/campgrounds/not-a-uuid").await,
        client.get("/campgrounds/not-a-uuid/edit").await,
        client.delete("/campgrounds/not-a-uuid").await,
        client
            .delete(&format!("/campgrounds/{}/reviews/42", Uuid::new_v4()))
            .await,
    ] {
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["content-type"], "application/json");

        let page = json(response).await;
        assert_eq!(page["message"], "Page Not Found");
    }
}

#[tokio::test]
async fn test_non_multipart_create_gets_the_error_page() {
    let app = TestApp::new();
    let mut client = app.signed_in("colt").await;

    let response = client
        .send(form_request(
            "POST",
            "/campgrounds",
            "title=Blackwater+Creek&price=9.99",
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let page = json(response).await;
    assert_eq!(page["message"], "The submitted form could not be read");
    assert_eq!(app.repo.campground_count().await, 0);
}

#[tokio::test]
async fn test_index_is_public_and_newest_first() {
    let app = TestApp::new();
    let mut owner = app.signed_in("colt").await;
    owner.create_campground("First Camp").await;
    owner.create_campground("Second Camp").await;

    let mut visitor = app.client();
    let page = visitor.page("/campgrounds").await;

    assert!(page["session"]["current_user"].is_null());
    let titles: Vec<&str> = page["campgrounds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Second Camp", "First Camp"]);
}

// --- Create ---

#[tokio::test]
async fn test_create_stamps_the_signed_in_author() {
    let app = TestApp::new();
    let mut client = app.signed_in("colt").await;
    let user = app.repo.find_user_by_username("colt").await.unwrap().unwrap();

    // A forged author part in the body must be ignored.
    let mut fields = campground_fields("Blackwater Creek");
    fields.push(("author".to_string(), Uuid::new_v4().to_string()));

    let response = client
        .send(multipart_request(
            "POST",
            "/campgrounds",
            &fields,
            &[jpeg("creek.jpg")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let id = common::campground_id_from(&location(&response));

    let stored = app.repo.get_campground(id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Blackwater Creek");
    assert_eq!(stored.price, 9.99);
    assert_eq!(stored.description, "trail");
    assert_eq!(stored.location, "Lynchburg");
    assert_eq!(stored.author, user.id);
    assert!(stored.reviews.is_empty());
    assert!(stored.geometry.is_some());
    assert_eq!(stored.images.len(), 1);
    assert_eq!(app.storage.stored_keys().await.len(), 1);

    let page = client.page(&format!("/campgrounds/{}", id)).await;
    assert_eq!(
        success_notices(&page),
        vec!["Successfully made a new campground!"]
    );
    assert_eq!(page["campground"]["author"]["username"], "colt");
    assert_eq!(page["campground"]["geometry"]["type"], "Point");
}

#[tokio::test]
async fn test_create_with_missing_fields_is_rejected_before_storage() {
    let app = TestApp::new();
    let mut client = app.signed_in("colt").await;

    let fields = vec![
        ("price".to_string(), "9.99".to_string()),
        ("location".to_string(), "Lynchburg".to_string()),
    ];
    let response = client
        .send(multipart_request("POST", "/campgrounds", &fields, &[]))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let page = json(response).await;
    let message = page["message"].as_str().unwrap();
    assert!(message.contains("Title is required"));
    assert!(message.contains("Description is required"));
    assert!(message.contains("At least one image is required"));

    assert_eq!(app.repo.campground_count().await, 0);
    assert!(app.storage.stored_keys().await.is_empty());
}

#[tokio::test]
async fn test_create_with_negative_price_is_rejected() {
    let app = TestApp::new();
    let mut client = app.signed_in("colt").await;

    let mut fields = campground_fields("Cheap Camp");
    fields[1].1 = "-5".to_string();
    let response = client
        .send(multipart_request(
            "POST",
            "/campgrounds",
            &fields,
            &[jpeg("creek.jpg")],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.repo.campground_count().await, 0);
}

#[tokio::test]
async fn test_anonymous_create_redirects_to_login() {
    let app = TestApp::new();
    let mut client = app.client();

    let response = client
        .send(multipart_request(
            "POST",
            "/campgrounds",
            &campground_fields("Sneaky Camp"),
            &[jpeg("creek.jpg")],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(app.repo.campground_count().await, 0);

    let page = client.page("/login").await;
    assert_eq!(error_notices(&page), vec!["You must be signed in first!"]);
}

#[tokio::test]
async fn test_geocoder_failure_is_a_generic_500() {
    let app = TestApp::with(MockGeocoder::new_failing(), MockStorageService::new());
    let mut client = app.signed_in("colt").await;

    let response = client
        .send(multipart_request(
            "POST",
            "/campgrounds",
            &campground_fields("Offline Camp"),
            &[jpeg("creek.jpg")],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let page = json(response).await;
    assert_eq!(page["message"], "Oh no, something went wrong!");
    assert_eq!(app.repo.campground_count().await, 0);
}

#[tokio::test]
async fn test_unknown_location_is_stored_without_geometry() {
    let app = TestApp::with(MockGeocoder::no_match(), MockStorageService::new());
    let mut client = app.signed_in("colt").await;

    let id = client.create_campground("Lost Camp").await;

    let stored = app.repo.get_campground(id).await.unwrap().unwrap();
    assert!(stored.geometry.is_none());
}

// --- Show ---

#[tokio::test]
async fn test_show_unknown_campground_redirects_with_notice() {
    let app = TestApp::new();
    let mut client = app.client();

    let response = client
        .get(&format!("/campgrounds/{}", Uuid::new_v4()))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/campgrounds");

    let page = client.page("/campgrounds").await;
    assert_eq!(error_notices(&page), vec!["Cannot find that campground!"]);

    // Notices are one-shot.
    let page = client.page("/campgrounds").await;
    assert!(error_notices(&page).is_empty());
}

// --- Update ---

#[tokio::test]
async fn test_author_can_update_and_remove_images() {
    let app = TestApp::new();
    let mut client = app.signed_in("colt").await;

    let response = client
        .send(multipart_request(
            "POST",
            "/campgrounds",
            &campground_fields("Blackwater Creek"),
            &[jpeg("one.jpg"), jpeg("two.jpg")],
        ))
        .await;
    let target = location(&response);
    client.page(&target).await;
    let id = common::campground_id_from(&target);
    let original = app.repo.get_campground(id).await.unwrap().unwrap();
    let doomed = original.images[0].filename.clone();

    let mut fields = campground_fields("Blackwater Creek Revisited");
    fields.push(("deleteImages[]".to_string(), doomed.clone()));
    let response = client
        .send(multipart_request(
            "PUT",
            &format!("/campgrounds/{}", id),
            &fields,
            &[png("three.png")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/campgrounds/{}", id));

    let updated = app.repo.get_campground(id).await.unwrap().unwrap();
    assert_eq!(updated.title, "Blackwater Creek Revisited");
    assert_eq!(updated.author, original.author);
    assert_eq!(updated.images.len(), 2);
    assert_eq!(updated.images[0], original.images[1]);
    assert!(updated.images[1].filename.ends_with(".png"));
    assert_eq!(app.storage.deleted_keys().await, vec![doomed]);

    let page = client.page(&format!("/campgrounds/{}", id)).await;
    assert_eq!(success_notices(&page), vec!["Successfully updated campground!"]);
}

#[tokio::test]
async fn test_non_author_update_is_rejected_and_leaves_campground_unchanged() {
    let app = TestApp::new();
    let mut owner = app.signed_in("colt").await;
    let id = owner.create_campground("Blackwater Creek").await;

    let mut intruder = app.signed_in("vandal").await;
    let response = intruder
        .send(multipart_request(
            "PUT",
            &format!("/campgrounds/{}", id),
            &campground_fields("Defaced"),
            &[],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/campgrounds/{}", id));

    let stored = app.repo.get_campground(id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Blackwater Creek");

    let page = intruder.page(&format!("/campgrounds/{}", id)).await;
    assert_eq!(
        error_notices(&page),
        vec!["You do not have permission to do that!"]
    );
}

#[tokio::test]
async fn test_edit_form_is_author_only() {
    let app = TestApp::new();
    let mut owner = app.signed_in("colt").await;
    let id = owner.create_campground("Blackwater Creek").await;

    let page = owner.page(&format!("/campgrounds/{}/edit", id)).await;
    assert_eq!(page["campground"]["title"], "Blackwater Creek");

    let mut intruder = app.signed_in("vandal").await;
    let response = intruder.get(&format!("/campgrounds/{}/edit", id)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/campgrounds/{}", id));
}

// --- Delete ---

#[tokio::test]
async fn test_non_author_delete_is_rejected() {
    let app = TestApp::new();
    let mut owner = app.signed_in("colt").await;
    let id = owner.create_campground("Blackwater Creek").await;

    let mut intruder = app.signed_in("vandal").await;
    let response = intruder.delete(&format!("/campgrounds/{}", id)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/campgrounds/{}", id));
    assert!(app.repo.get_campground(id).await.unwrap().is_some());
    assert!(app.storage.deleted_keys().await.is_empty());
}

#[tokio::test]
async fn test_delete_cascades_to_reviews_and_images() {
    let app = TestApp::new();
    let mut owner = app.signed_in("colt").await;
    let id = owner.create_campground("Blackwater Creek").await;
    owner.post_review(id, "Great", 5).await;

    let mut guest = app.signed_in("guest").await;
    guest.post_review(id, "Muddy", 2).await;
    assert_eq!(app.repo.review_count().await, 2);

    let response = owner.delete(&format!("/campgrounds/{}", id)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/campgrounds");

    assert!(app.repo.get_campground(id).await.unwrap().is_none());
    assert_eq!(app.repo.review_count().await, 0);
    assert!(app.storage.stored_keys().await.is_empty());

    let page = owner.page("/campgrounds").await;
    assert_eq!(success_notices(&page), vec!["Successfully deleted campground"]);
}

#[tokio::test]
async fn test_deleting_a_missing_campground_is_safe_to_retry() {
    let app = TestApp::new();
    let mut client = app.signed_in("colt").await;
    let missing = Uuid::new_v4();

    for _ in 0..2 {
        let response = client.delete(&format!("/campgrounds/{}", missing)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/campgrounds");

        let page = client.page("/campgrounds").await;
        assert_eq!(error_notices(&page), vec!["Cannot find that campground!"]);
    }
}
