//! HTTP-level tests for signup, login, lockout, refresh rotation, logout,
//! email verification and the profile endpoint.

mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{
    body_json, create_user, expect_data, get, get_auth, post_json, post_json_auth, token_for,
    SIGNING_SECRET, TEST_PASSWORD,
};
use meowl_core::email_link::issue_email_token;
use meowl_core::roles::Role;
use meowl_core::token_gate::TokenGate;
use meowl_db::repositories::UserRepo;
use serde_json::json;
use sqlx::PgPool;

async fn login(pool: &PgPool, login: &str, password: &str) -> axum::response::Response {
    let app = common::build_test_app(pool.clone());
    post_json(app, "/api/v1/auth/login", json!({ "login": login, "password": password })).await
}

// ---------------------------------------------------------------------------
// Signup
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_signup_creates_member_and_logs_in(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let body = json!({ "username": "tabby", "email": "Tabby@Example.com", "password": "long-enough-pw" });

    let data = expect_data(post_json(app, "/api/v1/auth/signup", body).await, StatusCode::CREATED).await;

    assert!(data["access_token"].is_string());
    assert!(data["refresh_token"].is_string());
    assert_eq!(data["user"]["username"], "tabby");
    assert_eq!(data["user"]["email"], "tabby@example.com");
    assert_eq!(data["user"]["role"], "member");
    assert_eq!(data["user"]["email_verified"], false);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_signup_rejects_bad_input(pool: PgPool) {
    let cases = [
        json!({ "username": "ab", "email": "ab@example.com", "password": "long-enough-pw" }),
        json!({ "username": "tabby", "email": "not-an-email", "password": "long-enough-pw" }),
        json!({ "username": "tabby", "email": "tabby@example.com", "password": "short" }),
    ];
    for body in cases {
        let app = common::build_test_app(pool.clone());
        let response = post_json(app, "/api/v1/auth/signup", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_signup_duplicate_username_conflicts(pool: PgPool) {
    create_user(&pool, "tabby", Role::Member).await;
    let app = common::build_test_app(pool);

    let body = json!({ "username": "tabby", "email": "other@example.com", "password": "long-enough-pw" });
    let response = post_json(app, "/api/v1/auth/signup", body).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Login and lockout
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_login_by_username_or_email(pool: PgPool) {
    let user = create_user(&pool, "calico", Role::Member).await;

    for login_name in ["calico", "CALICO@example.com"] {
        let data = expect_data(login(&pool, login_name, TEST_PASSWORD).await, StatusCode::OK).await;
        assert_eq!(data["user"]["id"], user.id);
        assert!(data["expires_in"].is_number());
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_login_wrong_password_and_unknown_user(pool: PgPool) {
    create_user(&pool, "calico", Role::Member).await;

    assert_eq!(login(&pool, "calico", "wrong-password").await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(login(&pool, "ghost", TEST_PASSWORD).await.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_account_locks_after_five_failures(pool: PgPool) {
    create_user(&pool, "calico", Role::Member).await;

    for _ in 0..5 {
        assert_eq!(login(&pool, "calico", "wrong-password").await.status(), StatusCode::UNAUTHORIZED);
    }

    // Even the right password is refused while locked.
    assert_eq!(login(&pool, "calico", TEST_PASSWORD).await.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_refresh_rotates_and_reuse_revokes_chain(pool: PgPool) {
    create_user(&pool, "calico", Role::Member).await;
    let first = expect_data(login(&pool, "calico", TEST_PASSWORD).await, StatusCode::OK).await;
    let old_token = first["refresh_token"].as_str().unwrap().to_string();

    let app = common::build_test_app(pool.clone());
    let rotated = expect_data(
        post_json(app, "/api/v1/auth/refresh", json!({ "refresh_token": old_token })).await,
        StatusCode::OK,
    )
    .await;
    let new_token = rotated["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(new_token, old_token);

    let app = common::build_test_app(pool.clone());
    let replay = post_json(app, "/api/v1/auth/refresh", json!({ "refresh_token": old_token })).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    // Reuse of a rotated token takes the successor down with it.
    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/auth/refresh", json!({ "refresh_token": new_token })).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let chained: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM user_sessions WHERE rotated_from IS NOT NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(chained, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_logout_revokes_refresh_tokens(pool: PgPool) {
    create_user(&pool, "calico", Role::Member).await;
    let session = expect_data(login(&pool, "calico", TEST_PASSWORD).await, StatusCode::OK).await;
    let access = session["access_token"].as_str().unwrap();
    let refresh = session["refresh_token"].as_str().unwrap();

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(app, "/api/v1/auth/logout", access, json!({})).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/auth/refresh", json!({ "refresh_token": refresh })).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_protected_route_requires_valid_token(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    assert_eq!(get(app, "/api/v1/auth/me").await.status(), StatusCode::UNAUTHORIZED);

    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/v1/auth/me", "not-a-jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Email verification and profile
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_verify_email_link(pool: PgPool) {
    let user = create_user(&pool, "calico", Role::Member).await;
    assert!(user.email_verified_at.is_none());

    let gate = TokenGate::new(SIGNING_SECRET, 15);
    let token = issue_email_token(&gate, user.id, &user.email, Utc::now());

    let app = common::build_test_app(pool.clone());
    let bad = get(app, &format!("/api/v1/auth/verify-email/{}/garbage", user.id)).await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let app = common::build_test_app(pool.clone());
    let uri = format!("/api/v1/auth/verify-email/{}/{token}", user.id);
    let data = expect_data(get(app, &uri).await, StatusCode::OK).await;
    assert_eq!(data["email_verified"], true);

    let stored = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert!(stored.email_verified_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_resend_verification(pool: PgPool) {
    let user = create_user(&pool, "calico", Role::Member).await;
    let token = token_for(&user);

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(app, "/api/v1/auth/resend-verification", &token, json!({})).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    UserRepo::mark_email_verified(&pool, user.id, Utc::now()).await.unwrap();
    let app = common::build_test_app(pool);
    let response = post_json_auth(app, "/api/v1/auth/resend-verification", &token, json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_me_includes_points_total(pool: PgPool) {
    let user = create_user(&pool, "calico", Role::Member).await;
    let token = token_for(&user);

    let app = common::build_test_app(pool.clone());
    common::create_meowl(app, &token, "Mittens", None).await;

    let app = common::build_test_app(pool);
    let data = expect_data(get_auth(app, "/api/v1/auth/me", &token).await, StatusCode::OK).await;
    assert_eq!(data["user"]["username"], "calico");
    assert_eq!(data["points"], 20);
}
