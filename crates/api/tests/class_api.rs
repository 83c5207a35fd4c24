//! HTTP-level tests for classes: creation, roster and progress.

mod common;

use axum::http::StatusCode;
use common::{
    admin_with_token, create_class, create_tree, delete_auth, expect_json, get, get_auth,
    post_json_auth, put_json_auth, user_with_token,
};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn creator_becomes_teacher_when_none_given(pool: PgPool) {
    let (admin, token) = admin_with_token(&pool, "boss").await;
    let app = common::build_test_app(pool).await;

    let json = expect_json(
        post_json_auth(
            app,
            "/api/v1/classes",
            json!({ "name": "Intro", "code": "INTRO-1" }),
            &token,
        )
        .await,
        StatusCode::CREATED,
    )
    .await;

    let teachers = json["data"]["teachers"].as_array().unwrap();
    assert_eq!(teachers.len(), 1);
    assert_eq!(teachers[0]["id"], admin.id);
    assert_eq!(json["data"]["enrolled_students"], 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_code_and_unknown_tree_are_rejected(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let app = common::build_test_app(pool).await;
    create_class(app.clone(), &token, "DUP-1").await;

    let duplicate = post_json_auth(
        app.clone(),
        "/api/v1/classes",
        json!({ "name": "Again", "code": "DUP-1" }),
        &token,
    )
    .await;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let unknown_tree = post_json_auth(
        app,
        "/api/v1/classes",
        json!({ "name": "Linked", "code": "LINK-1", "skill_trees": [{ "skill_tree_id": 999999 }] }),
        &token,
    )
    .await;
    assert_eq!(unknown_tree.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn classes_by_tree_needs_no_token(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let app = common::build_test_app(pool).await;
    let tree = create_tree(app.clone(), &token, "Open Track").await;

    let linked = post_json_auth(
        app.clone(),
        "/api/v1/classes",
        json!({ "name": "Linked", "code": "OPEN-1", "skill_trees": [{ "skill_tree_id": tree }] }),
        &token,
    )
    .await;
    assert_eq!(linked.status(), StatusCode::CREATED);
    create_class(app.clone(), &token, "OPEN-2").await;

    let listed = expect_json(
        get(app, &format!("/api/v1/classes/skill-tree/{tree}")).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(listed["pagination"]["total"], 1);
    assert_eq!(listed["data"][0]["code"], "OPEN-1");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn self_enrollment_cannot_pick_a_status(pool: PgPool) {
    let (_admin, admin_token) = admin_with_token(&pool, "boss").await;
    let (_student, student_token) = user_with_token(&pool, "learner").await;
    let app = common::build_test_app(pool).await;
    let class = create_class(app.clone(), &admin_token, "SELF-2").await;
    let uri = format!("/api/v1/classes/{class}/enroll");

    let completed =
        post_json_auth(app.clone(), &uri, json!({ "status": "completed" }), &student_token).await;
    assert_eq!(completed.status(), StatusCode::FORBIDDEN);

    let explicit = expect_json(
        post_json_auth(app, &uri, json!({ "status": "enrolled" }), &student_token).await,
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(explicit["data"]["status"], "enrolled");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn student_can_enroll_and_leave(pool: PgPool) {
    let (_admin, admin_token) = admin_with_token(&pool, "boss").await;
    let (student, student_token) = user_with_token(&pool, "learner").await;
    let app = common::build_test_app(pool).await;
    let class = create_class(app.clone(), &admin_token, "SELF-1").await;

    let entry = expect_json(
        post_json_auth(
            app.clone(),
            &format!("/api/v1/classes/{class}/enroll"),
            json!({}),
            &student_token,
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(entry["data"]["user_id"], student.id);
    assert_eq!(entry["data"]["status"], "enrolled");
    assert_eq!(entry["data"]["user"]["username"], "learner");

    let detail = expect_json(
        get_auth(app.clone(), &format!("/api/v1/classes/{class}"), &student_token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(detail["data"]["enrolled_students"], 1);

    let by_student = expect_json(
        get_auth(
            app.clone(),
            &format!("/api/v1/classes/student/{}", student.id),
            &student_token,
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(by_student["data"].as_array().unwrap().len(), 1);

    let left = delete_auth(
        app.clone(),
        &format!("/api/v1/classes/{class}/students/{}", student.id),
        &student_token,
    )
    .await;
    assert_eq!(left.status(), StatusCode::NO_CONTENT);

    let again = delete_auth(
        app,
        &format!("/api/v1/classes/{class}/students/{}", student.id),
        &student_token,
    )
    .await;
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn enrolling_someone_else_requires_manager(pool: PgPool) {
    let (_admin, admin_token) = admin_with_token(&pool, "boss").await;
    let (_mallory, mallory_token) = user_with_token(&pool, "mallory").await;
    let (victim, _) = user_with_token(&pool, "victim").await;
    let app = common::build_test_app(pool).await;
    let class = create_class(app.clone(), &admin_token, "OTHER-1").await;
    let uri = format!("/api/v1/classes/{class}/enroll");

    let forbidden = post_json_auth(
        app.clone(),
        &uri,
        json!({ "user_id": victim.id }),
        &mallory_token,
    )
    .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let allowed = post_json_auth(app, &uri, json!({ "user_id": victim.id }), &admin_token).await;
    assert_eq!(allowed.status(), StatusCode::CREATED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn full_class_rejects_enrollment(pool: PgPool) {
    let (_admin, admin_token) = admin_with_token(&pool, "boss").await;
    let (_first, first_token) = user_with_token(&pool, "first").await;
    let (_second, second_token) = user_with_token(&pool, "second").await;
    let app = common::build_test_app(pool).await;

    let class = expect_json(
        post_json_auth(
            app.clone(),
            "/api/v1/classes",
            json!({ "name": "Tiny", "code": "TINY-1", "max_students": 1 }),
            &admin_token,
        )
        .await,
        StatusCode::CREATED,
    )
    .await["data"]["id"]
        .as_i64()
        .unwrap();
    let uri = format!("/api/v1/classes/{class}/enroll");

    let ok = post_json_auth(app.clone(), &uri, json!({}), &first_token).await;
    assert_eq!(ok.status(), StatusCode::CREATED);

    let full = post_json_auth(app, &uri, json!({}), &second_token).await;
    assert_eq!(full.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn progress_update_records_completed_trees(pool: PgPool) {
    let (_admin, admin_token) = admin_with_token(&pool, "boss").await;
    let (student, student_token) = user_with_token(&pool, "learner").await;
    let app = common::build_test_app(pool).await;
    let class = create_class(app.clone(), &admin_token, "PROG-1").await;
    let tree = create_tree(app.clone(), &admin_token, "Track").await;

    post_json_auth(
        app.clone(),
        &format!("/api/v1/classes/{class}/enroll"),
        json!({}),
        &student_token,
    )
    .await;

    let uri = format!("/api/v1/classes/{class}/students/{}/progress", student.id);
    let body = json!({
        "progress": 150.0,
        "completed_skill_trees": [{ "skill_tree_id": tree, "score": 88.0 }],
    });

    let forbidden = put_json_auth(app.clone(), &uri, body.clone(), &student_token).await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let json = expect_json(
        put_json_auth(app.clone(), &uri, body, &admin_token).await,
        StatusCode::OK,
    )
    .await;
    // Progress is clamped to 100.
    assert_eq!(json["data"]["progress"], 100.0);
    assert_eq!(json["data"]["completed_skill_trees"][0]["skill_tree_id"], tree);
    assert!(json["data"]["completed_skill_trees"][0]["completed_at"].is_string());

    let bad_score = put_json_auth(
        app,
        &uri,
        json!({
            "progress": 10.0,
            "completed_skill_trees": [{ "skill_tree_id": tree, "score": 120.0 }],
        }),
        &admin_token,
    )
    .await;
    assert_eq!(bad_score.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn class_with_linked_room_cannot_be_deleted(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let app = common::build_test_app(pool).await;
    let class = create_class(app.clone(), &token, "ROOM-1").await;

    let room = post_json_auth(
        app.clone(),
        "/api/v1/rooms",
        json!({ "name": "Study hall", "class_id": class }),
        &token,
    )
    .await;
    assert_eq!(room.status(), StatusCode::CREATED);

    let response = delete_auth(app, &format!("/api/v1/classes/{class}"), &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
