//! HTTP-level tests for the skill catalog: creation, lookups, listing and
//! cascading deletes.

mod common;

use axum::http::StatusCode;
use axum::Router;
use common::{
    admin_with_token, create_class, create_skill, create_tree, delete_auth, expect_json,
    get_auth, post_json_auth, user_with_token,
};
use serde_json::{json, Value};
use skillforge_core::types::DbId;
use sqlx::PgPool;

async fn create_custom_skill(app: Router, token: &str, body: Value) -> DbId {
    let json = expect_json(
        post_json_auth(app, "/api/v1/skills", body, token).await,
        StatusCode::CREATED,
    )
    .await;
    json["data"]["id"].as_i64().unwrap()
}

fn names(list: &Value) -> Vec<&str> {
    list["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_applies_defaults_and_rejects_duplicate_names(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let app = common::build_test_app(pool).await;

    let created = expect_json(
        post_json_auth(
            app.clone(),
            "/api/v1/skills",
            json!({ "name": "Rust", "category": "programming" }),
            &token,
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(created["data"]["name"], "Rust");
    assert_eq!(created["data"]["level"], "beginner");
    assert_eq!(created["data"]["status"], "active");

    let duplicate = post_json_auth(
        app.clone(),
        "/api/v1/skills",
        json!({ "name": "Rust", "category": "systems" }),
        &token,
    )
    .await;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(duplicate).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let bad_level = post_json_auth(
        app,
        "/api/v1/skills",
        json!({ "name": "Go", "category": "programming", "level": "wizard" }),
        &token,
    )
    .await;
    assert_eq!(bad_level.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn plain_users_read_but_cannot_write(pool: PgPool) {
    let (_admin, admin_token) = admin_with_token(&pool, "boss").await;
    let (_user, user_token) = user_with_token(&pool, "reader").await;
    let app = common::build_test_app(pool).await;
    let skill = create_skill(app.clone(), &admin_token, "Rust").await;

    let read = get_auth(app.clone(), &format!("/api/v1/skills/{skill}"), &user_token).await;
    assert_eq!(read.status(), StatusCode::OK);

    let write = post_json_auth(
        app,
        "/api/v1/skills",
        json!({ "name": "Go", "category": "programming" }),
        &user_token,
    )
    .await;
    assert_eq!(write.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_skill_returns_404(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let app = common::build_test_app(pool).await;

    let response = get_auth(app.clone(), "/api/v1/skills/999999", &token).await;
    let body = expect_json(response, StatusCode::NOT_FOUND).await;
    assert_eq!(body["error"], "Skill with id 999999 not found");

    let delete = delete_auth(app, "/api/v1/skills/999999", &token).await;
    assert_eq!(delete.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn prerequisites_reject_self_edges(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let app = common::build_test_app(pool).await;
    let basics = create_skill(app.clone(), &token, "Basics").await;
    let advanced = create_skill(app.clone(), &token, "Advanced").await;
    let uri = format!("/api/v1/skills/{advanced}/prerequisites");

    let own = post_json_auth(app.clone(), &uri, json!({ "prerequisite_id": advanced }), &token).await;
    assert_eq!(own.status(), StatusCode::BAD_REQUEST);

    let detail = expect_json(
        post_json_auth(app.clone(), &uri, json!({ "prerequisite_id": basics }), &token).await,
        StatusCode::OK,
    )
    .await;
    let prerequisites = detail["data"]["prerequisites"].as_array().unwrap();
    assert_eq!(prerequisites.len(), 1);
    assert_eq!(prerequisites[0]["id"], basics);

    let related_self = post_json_auth(
        app.clone(),
        &format!("/api/v1/skills/{basics}/related"),
        json!({ "related_id": basics }),
        &token,
    )
    .await;
    assert_eq!(related_self.status(), StatusCode::BAD_REQUEST);

    let removed = expect_json(
        delete_auth(app.clone(), &format!("{uri}/{basics}"), &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(removed["data"]["prerequisites"], json!([]));

    let again = delete_auth(app, &format!("{uri}/{basics}"), &token).await;
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_filters_and_sorts(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let app = common::build_test_app(pool).await;

    create_custom_skill(
        app.clone(),
        &token,
        json!({ "name": "Rust", "category": "programming", "level": "advanced", "difficulty": 8 }),
    )
    .await;
    create_custom_skill(
        app.clone(),
        &token,
        json!({ "name": "Go", "category": "programming", "difficulty": 4 }),
    )
    .await;
    create_custom_skill(
        app.clone(),
        &token,
        json!({ "name": "Figma", "category": "design", "level": "advanced", "difficulty": 2 }),
    )
    .await;

    let by_category = expect_json(
        get_auth(app.clone(), "/api/v1/skills?category=programming", &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(by_category["pagination"]["total"], 2);
    assert_eq!(names(&by_category), vec!["Go", "Rust"]);

    let advanced_programming = expect_json(
        get_auth(
            app.clone(),
            "/api/v1/skills?category=programming&level=advanced",
            &token,
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(names(&advanced_programming), vec!["Rust"]);

    let hardest_first = expect_json(
        get_auth(
            app.clone(),
            "/api/v1/skills?sort_by=difficulty&sort_order=desc",
            &token,
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(names(&hardest_first), vec!["Rust", "Go", "Figma"]);

    // Unknown sort keys fall back to the name order.
    let fallback = expect_json(
        get_auth(app.clone(), "/api/v1/skills?sort_by=shoe_size", &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(names(&fallback), vec!["Figma", "Go", "Rust"]);

    let bad_level = get_auth(app.clone(), "/api/v1/skills?level=wizard", &token).await;
    assert_eq!(bad_level.status(), StatusCode::BAD_REQUEST);

    let paged = expect_json(
        get_auth(app, "/api/v1/skills?page=2&limit=2", &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(names(&paged), vec!["Rust"]);
    assert_eq!(paged["pagination"]["pages"], 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deleting_a_skill_cascades_through_trees_paths_and_ratings(pool: PgPool) {
    let (_admin, token) = admin_with_token(&pool, "boss").await;
    let (student, _) = user_with_token(&pool, "learner").await;
    let app = common::build_test_app(pool).await;

    let doomed = create_skill(app.clone(), &token, "Doomed").await;
    let kept = create_skill(app.clone(), &token, "Kept").await;
    let tree = create_tree(app.clone(), &token, "Cascade Track").await;
    let class = create_class(app.clone(), &token, "CASCADE-1").await;

    let tree_skills = format!("/api/v1/skill-trees/{tree}/skills");
    for skill in [doomed, kept] {
        let added = post_json_auth(app.clone(), &tree_skills, json!({ "skill_id": skill }), &token).await;
        assert_eq!(added.status(), StatusCode::CREATED);
    }

    let paths = format!("/api/v1/skill-trees/{tree}/paths");
    let path = post_json_auth(
        app.clone(),
        &paths,
        json!({
            "name": "Main",
            "sequence": [
                { "skill_id": doomed, "order": 1 },
                { "skill_id": kept, "order": 2 },
            ],
        }),
        &token,
    )
    .await;
    assert_eq!(path.status(), StatusCode::CREATED);

    let rated = post_json_auth(
        app.clone(),
        "/api/v1/skill-ratings/rate",
        json!({ "user_id": student.id, "skill_id": doomed, "class_id": class, "rating": 6 }),
        &token,
    )
    .await;
    assert_eq!(rated.status(), StatusCode::OK);

    let deleted = delete_auth(app.clone(), &format!("/api/v1/skills/{doomed}"), &token).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = get_auth(app.clone(), &format!("/api/v1/skills/{doomed}"), &token).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    let detail = expect_json(
        get_auth(app.clone(), &format!("/api/v1/skill-trees/{tree}"), &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(detail["data"]["total_skills"], 1);
    let roots = detail["data"]["roots"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["skill_id"], kept);

    let listed = expect_json(get_auth(app.clone(), &paths, &token).await, StatusCode::OK).await;
    let sequence = listed["data"][0]["sequence"].as_array().unwrap();
    assert_eq!(sequence.len(), 1);
    assert_eq!(sequence[0]["skill_id"], kept);

    let ratings = expect_json(
        get_auth(app, &format!("/api/v1/skill-ratings/user/{}", student.id), &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(ratings["pagination"]["total"], 0);
}
