//! Error envelope, authentication and validation failures at the HTTP level.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get, get_auth, post_json_auth, user_with_token};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_token_returns_401_envelope(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let response = get(app, "/api/v1/skills").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert!(json["error"].is_string());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn garbage_token_returns_401(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let response = get_auth(app, "/api/v1/skills", "not-a-jwt").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_entity_returns_404_envelope(pool: PgPool) {
    let (_user, token) = user_with_token(&pool, "reader").await;
    let app = common::build_test_app(pool).await;

    let response = get_auth(app, "/api/v1/skills/999999", &token).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Skill with id 999999 not found");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn non_numeric_path_id_is_rejected(pool: PgPool) {
    let (_user, token) = user_with_token(&pool, "reader").await;
    let app = common::build_test_app(pool).await;

    let response = get_auth(app, "/api/v1/skill-trees/abc", &token).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn manager_route_forbidden_for_plain_user(pool: PgPool) {
    let (_user, token) = user_with_token(&pool, "plain").await;
    let app = common::build_test_app(pool).await;

    let body = json!({ "name": "Rust", "category": "programming" });
    let response = post_json_auth(app, "/api/v1/skills", body, &token).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "FORBIDDEN");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn malformed_json_body_is_rejected(pool: PgPool) {
    let (_user, token) = common::admin_with_token(&pool, "admin").await;
    let app = common::build_test_app(pool).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/skills")
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn out_of_range_page_size_is_clamped(pool: PgPool) {
    let (_user, token) = user_with_token(&pool, "reader").await;
    let app = common::build_test_app(pool).await;

    let response = get_auth(app, "/api/v1/skills?page=0&limit=100000", &token).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["pagination"]["page"], 1);
    assert!(json["pagination"]["limit"].as_i64().unwrap() <= 100);
    assert_eq!(json["pagination"]["total"], 0);
}
