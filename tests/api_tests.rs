//! API tests, driving the router in-process against in-memory stores

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use bookshelf_server::{
    api,
    config::AppConfig,
    repository::{memory::InMemoryBookStore, Repository},
    services::Services,
    AppState,
};

async fn app() -> Router {
    let config = AppConfig::default();
    let store = Arc::new(InMemoryBookStore::with_books([
        ("Dune", "Herbert"),
        ("Emma", "Austen"),
    ]));
    let services = Services::new(
        Repository::with_books(store),
        config.auth.clone(),
        Duration::from_secs(1),
    )
    .await
    .expect("Failed to create services");

    api::create_router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    })
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = app.clone().oneshot(request).await.expect("Failed to send request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Failed to parse response")
    };
    (status, body)
}

/// Helper to get an authenticated token
async fn get_auth_token(app: &Router) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({ "username": "librarian", "password": "secret-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().expect("No token in response").to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/api/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, "GET", "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_register_and_login() {
    let app = app().await;
    get_auth_token(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": "librarian", "password": "secret-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": "librarian", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validates_credentials() {
    let app = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({ "username": "", "password": "123" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_checkout_requires_token() {
    let app = app().await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/books/1/checkout",
        None,
        Some(json!({ "username": "alice" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_checkout_and_return() {
    let app = app().await;
    let token = get_auth_token(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/books/1/checkout",
        Some(&token),
        Some(json!({ "username": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["borrower"], "alice");
    assert_eq!(body["book"]["checked_out"], true);
    assert_eq!(body["book"]["take_count"], 1);

    let (status, body) = send(&app, "GET", "/api/v1/borrowers/alice/books", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/books/1/checkout",
        Some(&token),
        Some(json!({ "username": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "BookNotAvailable");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/books/1/return",
        Some(&token),
        Some(json!({ "username": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "NotHeldByBorrower");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/books/1/return",
        Some(&token),
        Some(json!({ "username": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"]["checked_out"], false);

    let (_, body) = send(&app, "GET", "/api/v1/borrowers", None, None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_checkout_defaults_to_token_subject() {
    let app = app().await;
    let token = get_auth_token(&app).await;

    let (status, body) = send(&app, "POST", "/api/v1/books/2/checkout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["borrower"], "librarian");
}

#[tokio::test]
async fn test_bad_index_is_validation_error() {
    let app = app().await;
    let token = get_auth_token(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/books/abc/checkout",
        Some(&token),
        Some(json!({ "username": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/books/99/checkout",
        Some(&token),
        Some(json!({ "username": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_book_and_authors() {
    let app = app().await;
    let token = get_auth_token(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/books",
        Some(&token),
        Some(json!({ "title": "Dune Messiah", "author": "Herbert" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["index"], 3);
    assert_eq!(body["sequence"], 2);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/books",
        Some(&token),
        Some(json!({ "title": "Dune Messiah", "author": "Herbert" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/authors",
        Some(&token),
        Some(json!({ "name": "Tolkien" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/authors",
        Some(&token),
        Some(json!({ "name": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", "/api/v1/authors", None, None).await;
    assert_eq!(body, json!(["Herbert", "Austen", "Tolkien"]));

    let (_, body) = send(&app, "GET", "/api/v1/authors/distinct", None, None).await;
    assert_eq!(body, json!(["Austen", "Herbert"]));

    let (_, body) = send(&app, "GET", "/api/v1/authors/Herbert/books", None, None).await;
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Dune", "Dune Messiah"]);
}

#[tokio::test]
async fn test_update_book() {
    let app = app().await;
    let token = get_auth_token(&app).await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/v1/books/2",
        Some(&token),
        Some(json!({ "title": "Emma", "author": "Jane Austen" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["author"], "Jane Austen");

    let (_, body) = send(&app, "GET", "/api/v1/books", None, None).await;
    assert_eq!(body[1]["author"], "Jane Austen");
}

#[tokio::test]
async fn test_unknown_borrower_has_empty_list() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/api/v1/borrowers/nobody/books", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_list_users_requires_token() {
    let app = app().await;
    let (status, _) = send(&app, "GET", "/api/v1/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = get_auth_token(&app).await;
    let (status, body) = send(&app, "GET", "/api/v1/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["username"], "librarian");
}

#[tokio::test]
async fn test_user_management() {
    let app = app().await;
    let token = get_auth_token(&app).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/users",
        None,
        Some(json!({ "username": "reader", "password": "reader-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/users",
        Some(&token),
        Some(json!({ "username": "reader", "password": "reader-pass", "email": "reader@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "reader@example.com");
    let id = body["id"].as_i64().expect("No id in response");

    let (status, body) = send(&app, "GET", &format!("/api/v1/users/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "reader");

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/v1/users/{}", id),
        Some(&token),
        Some(json!({ "email": "not-an-address" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/v1/users/{}", id),
        Some(&token),
        Some(json!({ "username": "librarian" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/v1/users/{}", id),
        Some(&token),
        Some(json!({ "username": "reader2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "reader2");
    assert_eq!(body["email"], "reader@example.com");

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/users/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/api/v1/users/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &format!("/api/v1/users/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": "reader2", "password": "reader-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = send(&app, "GET", "/api/v1/users?page=1&per_page=10", Some(&token), None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["per_page"], 10);
}

#[tokio::test]
async fn test_openapi_document() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/api-docs/openapi.json", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/books/{index}/checkout"].is_object());
}
