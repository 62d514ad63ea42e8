use axum::{
    Router,
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use std::net::SocketAddr;
use tower::ServiceExt;

use userbase::config::Config;
use userbase::db::Store;

async fn spawn_app() -> Router {
    spawn_app_with_config(test_config()).await
}

fn test_config() -> Config {
    let mut config = Config::default();
    // Cheap hashing keeps the test suite fast
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.general.avatars_path = std::env::temp_dir()
        .join("userbase_test_avatars")
        .to_string_lossy()
        .into_owned();
    config
}

async fn spawn_app_with_config(config: Config) -> Router {
    // A single connection keeps every query on the same in-memory database
    let store = Store::with_pool_options("sqlite::memory:", 1, 1)
        .await
        .expect("Failed to create in-memory store");

    let state = userbase::api::create_app_state(store, config).expect("Failed to create app state");

    userbase::api::router(state).layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 3000))))
}

fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn registration_payload(username: &str, email: &str) -> serde_json::Value {
    serde_json::json!({
        "username": username,
        "email": email,
        "password": "test_password",
        "password2": "test_password",
    })
}

async fn register(app: &Router, username: &str, email: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/register/",
            &registration_payload(username, email),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn test_register_returns_profile_and_tokens() {
    let app = spawn_app().await;

    let body = register(&app, "alice", "alice@example.com").await;

    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert!(body["user"]["id"].is_i64());
    assert!(body["access"].is_string());
    assert!(body["refresh"].is_string());
    assert_ne!(body["access"], body["refresh"]);

    // The response never exposes password material
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let app = spawn_app().await;

    register(&app, "alice", "alice@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/register/",
            &registration_payload("bob", "alice@example.com"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["email"][0], "The email address is already in use");
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let app = spawn_app().await;

    register(&app, "alice", "alice@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/register/",
            &registration_payload("alice", "other@example.com"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["username"][0], "The username is already in use");
}

#[tokio::test]
async fn test_register_password_mismatch_persists_nothing() {
    let app = spawn_app().await;

    let mut payload = registration_payload("alice", "alice@example.com");
    payload["password2"] = serde_json::json!("does_not_match");

    let response = app
        .clone()
        .oneshot(json_request("POST", "/v1/register/", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["non_field_errors"][0], "Passwords do not match");

    // The username is still free, so the failed attempt stored nothing
    register(&app, "alice", "alice@example.com").await;
}

#[tokio::test]
async fn test_register_missing_field_is_field_error() {
    let app = spawn_app().await;

    let mut payload = registration_payload("alice", "alice@example.com");
    payload.as_object_mut().unwrap().remove("password2");

    let response = app
        .clone()
        .oneshot(json_request("POST", "/v1/register/", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["password2"][0], "The password2 field is required");
}

#[tokio::test]
async fn test_login_missing_field_is_field_error() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/login/",
            &serde_json::json!({ "username": "alice" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["password"][0], "The password field is required");
}

#[tokio::test]
async fn test_register_invalid_email() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/register/",
            &registration_payload("alice", "not-an-email"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["email"][0].is_string());
}

#[tokio::test]
async fn test_register_throttled() {
    let mut config = test_config();
    config.security.register_throttle.max_attempts = 2;
    let app = spawn_app_with_config(config).await;

    register(&app, "user1", "user1@example.com").await;
    register(&app, "user2", "user2@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/register/",
            &registration_payload("user3", "user3@example.com"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_login_round_trip() {
    let app = spawn_app().await;

    register(&app, "alice", "alice@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/login/",
            &serde_json::json!({ "username": "alice", "password": "test_password" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["access"].is_string());
    assert!(body["refresh"].is_string());
}

#[tokio::test]
async fn test_login_failures_share_one_body() {
    let app = spawn_app().await;

    register(&app, "alice", "alice@example.com").await;

    // Unknown username and wrong password must be indistinguishable
    let unknown = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/login/",
            &serde_json::json!({ "username": "nobody", "password": "test_password" }),
        ))
        .await
        .unwrap();

    let wrong = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/login/",
            &serde_json::json!({ "username": "alice", "password": "wrong" }),
        ))
        .await
        .unwrap();

    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);

    let unknown_body = body_json(unknown).await;
    let wrong_body = body_json(wrong).await;
    assert_eq!(unknown_body, wrong_body);
    assert_eq!(unknown_body["non_field_errors"][0], "Invalid username or password");
}

#[tokio::test]
async fn test_profile_requires_token() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/profile/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/profile/")
                .header("Authorization", "Bearer not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_with_access_token() {
    let app = spawn_app().await;

    let registered = register(&app, "alice", "alice@example.com").await;
    let access = registered["access"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/profile/")
                .header("Authorization", format!("Bearer {access}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert!(body["avatar"].is_null());
    assert!(body["bio"].is_null());

    // Exactly the public fields, nothing else
    let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 5);
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_profile_rejects_refresh_token() {
    let app = spawn_app().await;

    let registered = register(&app, "alice", "alice@example.com").await;
    let refresh = registered["refresh"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/profile/")
                .header("Authorization", format!("Bearer {refresh}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// 1x1 transparent PNG
const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x62, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[tokio::test]
async fn test_avatar_upload() {
    let app = spawn_app().await;

    let registered = register(&app, "alice", "alice@example.com").await;
    let access = registered["access"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/v1/profile/avatar")
                .header("Authorization", format!("Bearer {access}"))
                .body(Body::from(TINY_PNG))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let avatar = body["avatar"].as_str().unwrap();
    assert!(avatar.ends_with(".png"));
}

#[tokio::test]
async fn test_avatar_rejects_non_image() {
    let app = spawn_app().await;

    let registered = register(&app, "alice", "alice@example.com").await;
    let access = registered["access"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/v1/profile/avatar")
                .header("Authorization", format!("Bearer {access}"))
                .body(Body::from("not an image"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["avatar"][0], "Invalid image file");
}
