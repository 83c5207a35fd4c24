#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

use skillforge_api::auth::jwt::{generate_access_token, JwtConfig};
use skillforge_api::auth::password::hash_password;
use skillforge_api::config::ServerConfig;
use skillforge_api::registry::RoleRegistryHandle;
use skillforge_api::router::build_app_router;
use skillforge_api::state::AppState;
use skillforge_core::roles::SUPER_ADMIN_ROLE;
use skillforge_core::types::DbId;
use skillforge_db::models::user::{CreateUser, User};
use skillforge_db::repositories::{RoleRepo, UserRepo};
use skillforge_events::EventBus;

pub const TEST_PASSWORD: &str = "test_password_123!";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-do-not-use-in-production".to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

/// Build the full application router over the given pool.
///
/// Goes through the same `build_app_router` as `main.rs`, so tests exercise
/// the production middleware stack. The role registry is loaded from the
/// freshly migrated database.
pub async fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let roles = RoleRegistryHandle::load(&pool)
        .await
        .expect("role registry should load");

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        roles: Arc::new(roles),
        event_bus: Arc::new(EventBus::default()),
    };

    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Users and tokens
// ---------------------------------------------------------------------------

/// Insert a user with [`TEST_PASSWORD`].
pub async fn create_user(pool: &PgPool, username: &str) -> User {
    let input = CreateUser {
        username: username.to_string(),
        email: format!("{username}@test.com"),
        name: Some(format!("Test {username}")),
        password_hash: hash_password(TEST_PASSWORD).expect("hashing should succeed"),
    };
    UserRepo::create(pool, &input)
        .await
        .expect("user creation should succeed")
}

/// Insert a user holding the seeded super-admin role.
pub async fn create_admin(pool: &PgPool, username: &str) -> User {
    let user = create_user(pool, username).await;
    let role = RoleRepo::find_role_by_name(pool, SUPER_ADMIN_ROLE)
        .await
        .expect("role lookup should succeed")
        .expect("super-admin role is seeded");
    RoleRepo::assign_to_user(pool, user.id, role.id)
        .await
        .expect("role assignment should succeed");
    user
}

/// Issue an access token carrying the user's current roles.
pub async fn token_for(pool: &PgPool, user_id: DbId) -> String {
    let role_ids = RoleRepo::role_ids_for_user(pool, user_id)
        .await
        .expect("role lookup should succeed");
    let permissions = RoleRepo::direct_permissions_for_user(pool, user_id)
        .await
        .expect("permission lookup should succeed");
    generate_access_token(user_id, &role_ids, &permissions, &test_config().jwt)
        .expect("token generation should succeed")
}

/// Shorthand for creating a user and issuing a token for them.
pub async fn user_with_token(pool: &PgPool, username: &str) -> (User, String) {
    let user = create_user(pool, username).await;
    let token = token_for(pool, user.id).await;
    (user, token)
}

/// Shorthand for creating a super-admin and issuing a token for them.
pub async fn admin_with_token(pool: &PgPool, username: &str) -> (User, String) {
    let user = create_admin(pool, username).await;
    let token = token_for(pool, user.id).await;
    (user, token)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, Method::GET, uri, None, Some(token)).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    send(app, Method::POST, uri, Some(body), None).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response {
    send(app, Method::POST, uri, Some(body), Some(token)).await
}

pub async fn put_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response {
    send(app, Method::PUT, uri, Some(body), Some(token)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, Method::DELETE, uri, None, Some(token)).await
}

/// Collect a response body into JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the status and return the JSON body.
pub async fn expect_json(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Create a skill through the API and return its id.
pub async fn create_skill(app: Router, token: &str, name: &str) -> DbId {
    let body = serde_json::json!({ "name": name, "category": "programming" });
    let json = expect_json(
        post_json_auth(app, "/api/v1/skills", body, token).await,
        StatusCode::CREATED,
    )
    .await;
    json["data"]["id"].as_i64().unwrap()
}

/// Create a skill tree through the API and return its id.
pub async fn create_tree(app: Router, token: &str, name: &str) -> DbId {
    let body = serde_json::json!({ "name": name });
    let json = expect_json(
        post_json_auth(app, "/api/v1/skill-trees", body, token).await,
        StatusCode::CREATED,
    )
    .await;
    json["data"]["id"].as_i64().unwrap()
}

/// Create a class through the API and return its id.
pub async fn create_class(app: Router, token: &str, code: &str) -> DbId {
    let body = serde_json::json!({ "name": format!("Class {code}"), "code": code });
    let json = expect_json(
        post_json_auth(app, "/api/v1/classes", body, token).await,
        StatusCode::CREATED,
    )
    .await;
    json["data"]["id"].as_i64().unwrap()
}
