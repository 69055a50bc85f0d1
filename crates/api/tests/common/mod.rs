#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use meowl_api::auth::jwt::{generate_access_token, JwtConfig};
use meowl_api::auth::password::hash_password;
use meowl_api::config::ServerConfig;
use meowl_api::router::build_app_router;
use meowl_api::state::AppState;
use meowl_core::policy::Policy;
use meowl_core::roles::Role;
use meowl_db::models::user::{CreateUser, User};
use meowl_db::repositories::UserRepo;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "purr-purr-purr";
pub const SIGNING_SECRET: &str = "test-signing-secret";

/// Safe defaults; SMTP stays unset so mail is only logged.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-jwt-secret-that-is-long-enough".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 14,
        },
        signing_secret: SIGNING_SECRET.to_string(),
        site_url: "http://meowl.test".to_string(),
        qr_token_minutes: 15,
        email_token_hours: 72,
        password_min_length: 8,
        policy: Policy::default(),
        email: None,
    }
}

/// The production router and middleware stack over the given pool.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_router(AppState::new(pool, test_config()))
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub async fn create_user(pool: &PgPool, username: &str, role: Role) -> User {
    let input = CreateUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash: hash_password(TEST_PASSWORD).expect("hashing should succeed"),
        role,
    };
    UserRepo::create(pool, &input)
        .await
        .expect("user creation should succeed")
}

/// A valid bearer token for `user`, skipping the login round trip.
pub fn token_for(user: &User) -> String {
    let role: Role = user.role.parse().expect("seeded role");
    generate_access_token(user.id, role, &test_config().jwt, Utc::now())
        .expect("token generation should succeed")
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("request should complete")
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// GET with an access pass header and optional bearer token.
pub async fn get_with_pass(app: Router, uri: &str, token: Option<&str>, pass: &str) -> Response<Body> {
    let mut builder = Request::builder().uri(uri).header("x-meowl-pass", pass);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, json_request("POST", uri, None, &body)).await
}

pub async fn post_json_auth(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, json_request("POST", uri, Some(token), &body)).await
}

pub async fn put_json_auth(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, json_request("PUT", uri, Some(token), &body)).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Assert the status and return the `data` member of the envelope.
pub async fn expect_data(response: Response<Body>, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    let mut json = body_json(response).await;
    json["data"].take()
}

// ---------------------------------------------------------------------------
// Meowl helpers
// ---------------------------------------------------------------------------

/// Create a Meowl as `token`'s user and return its slug.
pub async fn create_meowl(app: Router, token: &str, name: &str, location: Option<(f64, f64)>) -> String {
    let mut body = serde_json::json!({ "name": name });
    if let Some((lat, lng)) = location {
        body["location"] = serde_json::json!({ "lat": lat, "lng": lng, "address": "By the fountain" });
    }
    let data = expect_data(post_json_auth(app, "/api/v1/meowls", token, body).await, StatusCode::CREATED).await;
    data["meowl"]["slug"].as_str().expect("slug").to_string()
}

/// Fetch a fresh QR token for `slug` through the owner-only endpoint.
pub async fn qr_token(app: Router, owner_token: &str, slug: &str) -> String {
    let uri = format!("/api/v1/meowls/{slug}/qr-link");
    let data = expect_data(get_auth(app, &uri, owner_token).await, StatusCode::OK).await;
    data["token"].as_str().expect("token").to_string()
}
