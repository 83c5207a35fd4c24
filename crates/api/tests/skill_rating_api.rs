//! HTTP-level tests for skill ratings and their lifecycle.

mod common;

use axum::http::StatusCode;
use axum::Router;
use common::{
    admin_with_token, create_class, create_skill, expect_json, get_auth, post_json_auth,
    put_json_auth, user_with_token,
};
use serde_json::{json, Value};
use skillforge_core::types::DbId;
use sqlx::PgPool;

/// Rate `user_id` on `skill_id` within `class_id` as the admin.
async fn rate(
    app: Router,
    token: &str,
    user_id: DbId,
    skill_id: DbId,
    class_id: DbId,
    rating: i32,
) -> Value {
    expect_json(
        post_json_auth(
            app,
            "/api/v1/skill-ratings/rate",
            json!({ "user_id": user_id, "skill_id": skill_id, "class_id": class_id, "rating": rating }),
            token,
        )
        .await,
        StatusCode::OK,
    )
    .await
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn rating_is_upserted_per_class(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let (student, _) = user_with_token(&pool, "learner").await;
    let app = common::build_test_app(pool).await;
    let skill = create_skill(app.clone(), &token, "Rust").await;
    let class = create_class(app.clone(), &token, "RATE-1").await;

    let first = rate(app.clone(), &token, student.id, skill, class, 4).await;
    assert_eq!(first["data"]["rating"], 4);
    assert_eq!(first["data"]["status"], "active");
    assert_eq!(first["data"]["mastery_level"], "beginner");

    let second = rate(app, &token, student.id, skill, class, 8).await;
    assert_eq!(second["data"]["id"], first["data"]["id"]);
    assert_eq!(second["data"]["rating"], 8);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn out_of_range_rating_is_rejected(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let (student, _) = user_with_token(&pool, "learner").await;
    let app = common::build_test_app(pool).await;
    let skill = create_skill(app.clone(), &token, "Rust").await;
    let class = create_class(app.clone(), &token, "RATE-2").await;

    let response = post_json_auth(
        app,
        "/api/v1/skill-ratings/rate",
        json!({ "user_id": student.id, "skill_id": skill, "class_id": class, "rating": 11 }),
        &token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn progress_to_100_completes_the_rating(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let (student, student_token) = user_with_token(&pool, "learner").await;
    let app = common::build_test_app(pool).await;
    let skill = create_skill(app.clone(), &token, "Rust").await;
    let class = create_class(app.clone(), &token, "RATE-3").await;
    rate(app.clone(), &token, student.id, skill, class, 9).await;

    let uri = format!("/api/v1/skill-ratings/user/{}/skill/{skill}/progress", student.id);
    let json = expect_json(
        put_json_auth(
            app.clone(),
            &uri,
            json!({ "progress": 120.0, "time_spent": 30 }),
            &student_token,
        )
        .await,
        StatusCode::OK,
    )
    .await;

    assert_eq!(json["data"]["progress"], 100.0);
    assert_eq!(json["data"]["status"], "completed");
    assert_eq!(json["data"]["mastery_level"], "expert");
    assert_eq!(json["data"]["time_spent"], 30);
    assert!(json["data"]["completed_at"].is_string());

    let completed = expect_json(
        get_auth(app, "/api/v1/skill-ratings/completed/all", &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(completed["pagination"]["total"], 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn negative_time_spent_is_rejected(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let (student, student_token) = user_with_token(&pool, "learner").await;
    let app = common::build_test_app(pool).await;
    let skill = create_skill(app.clone(), &token, "Rust").await;
    let class = create_class(app.clone(), &token, "RATE-NEG").await;
    rate(app.clone(), &token, student.id, skill, class, 5).await;

    let base = format!("/api/v1/skill-ratings/user/{}/skill/{skill}", student.id);
    let response = put_json_auth(
        app.clone(),
        &format!("{base}/progress"),
        json!({ "progress": 40.0, "time_spent": -15 }),
        &student_token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let rating = expect_json(get_auth(app, &base, &student_token).await, StatusCode::OK).await;
    assert_eq!(rating["data"]["progress"], 0.0);
    assert_eq!(rating["data"]["time_spent"], 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn archive_and_unarchive_round_trip(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let (student, student_token) = user_with_token(&pool, "learner").await;
    let app = common::build_test_app(pool).await;
    let skill = create_skill(app.clone(), &token, "Rust").await;
    let class = create_class(app.clone(), &token, "RATE-4").await;
    rate(app.clone(), &token, student.id, skill, class, 5).await;

    let base = format!("/api/v1/skill-ratings/user/{}/skill/{skill}", student.id);

    let archived = expect_json(
        post_json_auth(
            app.clone(),
            &format!("{base}/archive"),
            json!({ "reason": "too_difficult", "notes": "later" }),
            &student_token,
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(archived["data"]["is_archived"], true);
    assert_eq!(archived["data"]["status"], "archived");
    assert_eq!(archived["data"]["archive_reason"], "too_difficult");

    // Archived ratings leave the default list and show up in the archive.
    let active = expect_json(
        get_auth(
            app.clone(),
            &format!("/api/v1/skill-ratings/user/{}", student.id),
            &student_token,
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(active["pagination"]["total"], 0);

    let archive = expect_json(
        get_auth(
            app.clone(),
            &format!("/api/v1/skill-ratings/user/{}/archived", student.id),
            &student_token,
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(archive["pagination"]["total"], 1);

    let restored = expect_json(
        post_json_auth(app.clone(), &format!("{base}/unarchive"), json!({}), &student_token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(restored["data"]["is_archived"], false);
    assert_eq!(restored["data"]["status"], "active");
    assert!(restored["data"]["archive_reason"].is_null());

    let twice = post_json_auth(app, &format!("{base}/unarchive"), json!({}), &student_token).await;
    assert_eq!(twice.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn ambiguous_rating_needs_class_id(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let (student, student_token) = user_with_token(&pool, "learner").await;
    let app = common::build_test_app(pool).await;
    let skill = create_skill(app.clone(), &token, "Rust").await;
    let class_a = create_class(app.clone(), &token, "AMB-A").await;
    let class_b = create_class(app.clone(), &token, "AMB-B").await;
    rate(app.clone(), &token, student.id, skill, class_a, 3).await;
    rate(app.clone(), &token, student.id, skill, class_b, 6).await;

    let base = format!("/api/v1/skill-ratings/user/{}/skill/{skill}", student.id);

    let ambiguous = get_auth(app.clone(), &base, &student_token).await;
    assert_eq!(ambiguous.status(), StatusCode::BAD_REQUEST);

    let scoped = expect_json(
        get_auth(app, &format!("{base}?class_id={class_b}"), &student_token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(scoped["data"]["rating"], 6);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn other_users_ratings_require_manager(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let (student, _) = user_with_token(&pool, "learner").await;
    let (_peer, peer_token) = user_with_token(&pool, "peer").await;
    let app = common::build_test_app(pool).await;
    let skill = create_skill(app.clone(), &token, "Rust").await;
    let class = create_class(app.clone(), &token, "PEER-1").await;
    rate(app.clone(), &token, student.id, skill, class, 7).await;

    let response = get_auth(
        app,
        &format!("/api/v1/skill-ratings/user/{}", student.id),
        &peer_token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stats_report_completion_rate(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let (student, student_token) = user_with_token(&pool, "learner").await;
    let app = common::build_test_app(pool).await;
    let done = create_skill(app.clone(), &token, "Done").await;
    let open = create_skill(app.clone(), &token, "Open").await;
    let class = create_class(app.clone(), &token, "STAT-1").await;
    rate(app.clone(), &token, student.id, done, class, 6).await;
    rate(app.clone(), &token, student.id, open, class, 6).await;

    let complete = post_json_auth(
        app.clone(),
        &format!("/api/v1/skill-ratings/user/{}/skill/{done}/complete", student.id),
        json!({}),
        &student_token,
    )
    .await;
    assert_eq!(complete.status(), StatusCode::OK);

    let stats = expect_json(
        get_auth(
            app.clone(),
            &format!("/api/v1/skill-ratings/user/{}/stats", student.id),
            &student_token,
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(stats["data"]["stats"]["total_skills"], 2);
    assert_eq!(stats["data"]["stats"]["completed_skills"], 1);
    assert_eq!(stats["data"]["completion_rate"], 50.0);

    let skill_stats = expect_json(
        get_auth(app, &format!("/api/v1/skill-ratings/skill/{done}/stats"), &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(skill_stats["data"]["stats"]["completed_users"], 1);
    assert_eq!(skill_stats["data"]["completion_rate"], 100.0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn assessment_raises_progress(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let (student, student_token) = user_with_token(&pool, "learner").await;
    let app = common::build_test_app(pool).await;
    let skill = create_skill(app.clone(), &token, "Rust").await;
    let class = create_class(app.clone(), &token, "ASSESS-1").await;
    let rating = rate(app.clone(), &token, student.id, skill, class, 5).await;
    let rating_id = rating["data"]["id"].as_i64().unwrap();

    let uri = format!("/api/v1/skill-ratings/rating/{rating_id}/assessment");
    let body = json!({ "title": "Quiz 1", "score": 60.0, "assessment_type": "quiz" });

    let forbidden = post_json_auth(app.clone(), &uri, body.clone(), &student_token).await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let created = post_json_auth(app.clone(), &uri, body, &token).await;
    assert_eq!(created.status(), StatusCode::CREATED);

    let detail = expect_json(
        get_auth(app, &format!("/api/v1/skill-ratings/rating/{rating_id}"), &student_token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(detail["data"]["progress"], 60.0);
    assert_eq!(detail["data"]["assessments"].as_array().unwrap().len(), 1);
}
