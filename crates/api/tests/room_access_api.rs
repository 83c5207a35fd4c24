//! HTTP-level tests for rooms: ownership rules and the class gate.

mod common;

use axum::http::StatusCode;
use common::{
    admin_with_token, create_class, delete_auth, expect_json, get_auth, post_json_auth,
    put_json_auth, user_with_token,
};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn unlinked_room_is_open_to_any_user(pool: PgPool) {
    let (_owner, owner_token) = user_with_token(&pool, "owner").await;
    let (_guest, guest_token) = user_with_token(&pool, "guest").await;
    let app = common::build_test_app(pool).await;

    let room = expect_json(
        post_json_auth(app.clone(), "/api/v1/rooms", json!({ "name": "Lobby" }), &owner_token).await,
        StatusCode::CREATED,
    )
    .await;
    let room_id = room["data"]["id"].as_i64().unwrap();
    let messages = format!("/api/v1/rooms/{room_id}/messages");

    let sent = expect_json(
        post_json_auth(app.clone(), &messages, json!({ "content": "  hello  " }), &guest_token)
            .await,
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(sent["data"]["content"], "hello");

    let listed = expect_json(get_auth(app, &messages, &owner_token).await, StatusCode::OK).await;
    assert_eq!(listed["pagination"]["total"], 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn class_room_admits_only_enrolled_students(pool: PgPool) {
    let (_admin, admin_token) = admin_with_token(&pool, "boss").await;
    let (_student, student_token) = user_with_token(&pool, "student").await;
    let (_outsider, outsider_token) = user_with_token(&pool, "outsider").await;
    let app = common::build_test_app(pool).await;

    let class = create_class(app.clone(), &admin_token, "GATE-1").await;
    post_json_auth(
        app.clone(),
        &format!("/api/v1/classes/{class}/enroll"),
        json!({}),
        &student_token,
    )
    .await;

    let room = expect_json(
        post_json_auth(
            app.clone(),
            "/api/v1/rooms",
            json!({ "name": "Class chat", "class_id": class }),
            &admin_token,
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let room_id = room["data"]["id"].as_i64().unwrap();

    let outsider = get_auth(app.clone(), &format!("/api/v1/rooms/{room_id}"), &outsider_token).await;
    assert_eq!(outsider.status(), StatusCode::FORBIDDEN);

    let student = get_auth(app.clone(), &format!("/api/v1/rooms/{room_id}"), &student_token).await;
    assert_eq!(student.status(), StatusCode::OK);

    // Super-admins pass without being on the roster.
    let admin = post_json_auth(
        app,
        &format!("/api/v1/rooms/{room_id}/messages"),
        json!({ "content": "Welcome" }),
        &admin_token,
    )
    .await;
    assert_eq!(admin.status(), StatusCode::CREATED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn pending_student_is_kept_out(pool: PgPool) {
    let (_admin, admin_token) = admin_with_token(&pool, "boss").await;
    let (student, student_token) = user_with_token(&pool, "waiting").await;
    let app = common::build_test_app(pool).await;

    let class = create_class(app.clone(), &admin_token, "GATE-2").await;
    post_json_auth(
        app.clone(),
        &format!("/api/v1/classes/{class}/enroll"),
        json!({ "user_id": student.id, "status": "pending" }),
        &admin_token,
    )
    .await;

    let room = expect_json(
        post_json_auth(
            app.clone(),
            "/api/v1/rooms",
            json!({ "name": "Waiting room", "class_id": class }),
            &admin_token,
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let room_id = room["data"]["id"].as_i64().unwrap();

    let response = get_auth(app, &format!("/api/v1/rooms/{room_id}/messages"), &student_token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn linking_a_class_at_creation_requires_manager(pool: PgPool) {
    let (_admin, admin_token) = admin_with_token(&pool, "boss").await;
    let (_user, user_token) = user_with_token(&pool, "plain").await;
    let app = common::build_test_app(pool).await;
    let class = create_class(app.clone(), &admin_token, "GATE-3").await;

    let response = post_json_auth(
        app,
        "/api/v1/rooms",
        json!({ "name": "Sneaky", "class_id": class }),
        &user_token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn class_can_be_assigned_only_once(pool: PgPool) {
    let (_admin, admin_token) = admin_with_token(&pool, "boss").await;
    let app = common::build_test_app(pool).await;
    let first = create_class(app.clone(), &admin_token, "ONCE-1").await;
    let second = create_class(app.clone(), &admin_token, "ONCE-2").await;

    let room = expect_json(
        post_json_auth(app.clone(), "/api/v1/rooms", json!({ "name": "Flex" }), &admin_token).await,
        StatusCode::CREATED,
    )
    .await;
    let uri = format!("/api/v1/rooms/{}/class", room["data"]["id"]);

    let linked = expect_json(
        post_json_auth(app.clone(), &uri, json!({ "class_id": first }), &admin_token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(linked["data"]["class_id"], first);

    let relink = post_json_auth(app, &uri, json!({ "class_id": second }), &admin_token).await;
    assert_eq!(relink.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn only_owner_updates_and_admin_may_delete(pool: PgPool) {
    let (_admin, admin_token) = admin_with_token(&pool, "boss").await;
    let (_owner, owner_token) = user_with_token(&pool, "owner").await;
    let (_other, other_token) = user_with_token(&pool, "other").await;
    let app = common::build_test_app(pool).await;

    let room = expect_json(
        post_json_auth(app.clone(), "/api/v1/rooms", json!({ "name": "Mine" }), &owner_token).await,
        StatusCode::CREATED,
    )
    .await;
    let uri = format!("/api/v1/rooms/{}", room["data"]["id"]);

    let stranger = put_json_auth(app.clone(), &uri, json!({ "name": "Ours" }), &other_token).await;
    assert_eq!(stranger.status(), StatusCode::FORBIDDEN);

    // Super-admins may delete but not edit.
    let admin_edit = put_json_auth(app.clone(), &uri, json!({ "name": "Admin's" }), &admin_token).await;
    assert_eq!(admin_edit.status(), StatusCode::FORBIDDEN);

    let renamed = expect_json(
        put_json_auth(app.clone(), &uri, json!({ "name": "Still mine" }), &owner_token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(renamed["data"]["name"], "Still mine");

    let stranger_delete = delete_auth(app.clone(), &uri, &other_token).await;
    assert_eq!(stranger_delete.status(), StatusCode::FORBIDDEN);

    let deleted = delete_auth(app, &uri, &admin_token).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn blank_message_is_rejected(pool: PgPool) {
    let (_user, token) = user_with_token(&pool, "talker").await;
    let app = common::build_test_app(pool).await;

    let room = expect_json(
        post_json_auth(app.clone(), "/api/v1/rooms", json!({ "name": "Quiet" }), &token).await,
        StatusCode::CREATED,
    )
    .await;

    let response = post_json_auth(
        app,
        &format!("/api/v1/rooms/{}/messages", room["data"]["id"]),
        json!({ "content": "   " }),
        &token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
