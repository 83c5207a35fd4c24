//! Integration tests for skill tree structure mutations.
//!
//! - Root and child insertion, duplicates
//! - Cascading removal of descendants
//! - Depth limit
//! - Bulk assignment in one transaction
//! - Skill deletion cascading into trees and learning paths

use assert_matches::assert_matches;
use skillforge_core::error::CoreError;
use skillforge_core::skill_tree::NodeProperties;
use skillforge_db::models::skill::CreateSkill;
use skillforge_db::models::skill_tree::{CreateLearningPath, CreateSkillTree, TreeSkillAssignment};
use skillforge_db::models::user::CreateUser;
use skillforge_db::repositories::{SkillRepo, SkillTreeRepo, UserRepo};
use skillforge_db::DbError;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_user(pool: &PgPool) -> i64 {
    UserRepo::create(
        pool,
        &CreateUser {
            username: "author".to_string(),
            email: "author@example.com".to_string(),
            name: None,
            password_hash: "hash".to_string(),
        },
    )
    .await
    .unwrap()
    .id
}

async fn seed_skill(pool: &PgPool, user_id: i64, name: &str) -> i64 {
    SkillRepo::create(
        pool,
        &CreateSkill {
            name: name.to_string(),
            description: None,
            short_description: None,
            category: "programming".to_string(),
            subcategory: None,
            level: None,
            skill_type: None,
            status: None,
            icon: None,
            color: None,
            learning_objectives: vec![],
            key_concepts: vec![],
            estimated_time: None,
            difficulty: None,
            market_demand: None,
            salary_impact: None,
            tags: vec![],
        },
        user_id,
    )
    .await
    .unwrap()
    .id
}

async fn seed_tree(pool: &PgPool, user_id: i64, name: &str) -> i64 {
    SkillTreeRepo::create(
        pool,
        &CreateSkillTree {
            name: name.to_string(),
            description: None,
            short_description: None,
            tree_type: None,
            status: None,
            icon: None,
            color: None,
            tags: vec![],
            settings: None,
            structure: vec![],
        },
        user_id,
    )
    .await
    .unwrap()
    .id
}

fn assign(skill_id: i64, parent_id: Option<i64>) -> TreeSkillAssignment {
    TreeSkillAssignment {
        skill_id,
        parent_id,
        properties: NodeProperties::default(),
    }
}

async fn total_skills(pool: &PgPool, tree_id: i64) -> i32 {
    SkillTreeRepo::find_by_id(pool, tree_id)
        .await
        .unwrap()
        .unwrap()
        .total_skills
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_add_root_then_child(pool: PgPool) {
    let user = seed_user(&pool).await;
    let a = seed_skill(&pool, user, "A").await;
    let b = seed_skill(&pool, user, "B").await;
    let tree = seed_tree(&pool, user, "Backend").await;

    SkillTreeRepo::add_skill(&pool, tree, &assign(a, None)).await.unwrap();
    SkillTreeRepo::add_skill(&pool, tree, &assign(b, Some(a))).await.unwrap();

    let arena = SkillTreeRepo::load_arena(&pool, tree).await.unwrap();
    assert_eq!(arena.roots().len(), 1);
    let root = arena.node(arena.roots()[0]).unwrap();
    assert_eq!(root.skill_id, a);
    let children = arena.children_of(root.id);
    assert_eq!(children.len(), 1);
    assert_eq!(arena.node(children[0]).unwrap().skill_id, b);
    assert_eq!(total_skills(&pool, tree).await, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicates_are_kept(pool: PgPool) {
    let user = seed_user(&pool).await;
    let a = seed_skill(&pool, user, "A").await;
    let tree = seed_tree(&pool, user, "Dupes").await;

    SkillTreeRepo::add_skill(&pool, tree, &assign(a, None)).await.unwrap();
    SkillTreeRepo::add_skill(&pool, tree, &assign(a, None)).await.unwrap();

    let arena = SkillTreeRepo::load_arena(&pool, tree).await.unwrap();
    assert_eq!(arena.all_skills(), vec![a, a]);
    assert_eq!(total_skills(&pool, tree).await, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_missing_parent_is_rejected(pool: PgPool) {
    let user = seed_user(&pool).await;
    let a = seed_skill(&pool, user, "A").await;
    let b = seed_skill(&pool, user, "B").await;
    let tree = seed_tree(&pool, user, "Orphans").await;

    let result = SkillTreeRepo::add_skill(&pool, tree, &assign(b, Some(a))).await;
    assert_matches!(result, Err(DbError::Core(CoreError::Validation(_))));
    assert_eq!(total_skills(&pool, tree).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_depth_is_capped_at_three(pool: PgPool) {
    let user = seed_user(&pool).await;
    let ids = [
        seed_skill(&pool, user, "L1").await,
        seed_skill(&pool, user, "L2").await,
        seed_skill(&pool, user, "L3").await,
        seed_skill(&pool, user, "L4").await,
    ];
    let tree = seed_tree(&pool, user, "Deep").await;

    SkillTreeRepo::add_skill(&pool, tree, &assign(ids[0], None)).await.unwrap();
    SkillTreeRepo::add_skill(&pool, tree, &assign(ids[1], Some(ids[0]))).await.unwrap();
    SkillTreeRepo::add_skill(&pool, tree, &assign(ids[2], Some(ids[1]))).await.unwrap();

    let result = SkillTreeRepo::add_skill(&pool, tree, &assign(ids[3], Some(ids[2]))).await;
    assert_matches!(result, Err(DbError::Core(CoreError::Validation(_))));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_remove_cascades_to_descendants(pool: PgPool) {
    let user = seed_user(&pool).await;
    let a = seed_skill(&pool, user, "A").await;
    let b = seed_skill(&pool, user, "B").await;
    let c = seed_skill(&pool, user, "C").await;
    let d = seed_skill(&pool, user, "D").await;
    let tree = seed_tree(&pool, user, "Cascade").await;

    SkillTreeRepo::bulk_assign(
        &pool,
        tree,
        &[assign(a, None), assign(b, Some(a)), assign(c, Some(b)), assign(d, None)],
    )
    .await
    .unwrap();
    assert_eq!(total_skills(&pool, tree).await, 4);

    let removed = SkillTreeRepo::remove_skill(&pool, tree, a).await.unwrap().unwrap();
    assert_eq!(removed.skills, vec![a, b, c]);

    let arena = SkillTreeRepo::load_arena(&pool, tree).await.unwrap();
    assert_eq!(arena.all_skills(), vec![d]);
    assert_eq!(total_skills(&pool, tree).await, 1);

    let rows: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM skill_tree_nodes WHERE skill_tree_id = $1")
            .bind(tree)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(rows.0, 1);

    assert!(SkillTreeRepo::remove_skill(&pool, tree, a).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bulk_assign_skips_missing_skills(pool: PgPool) {
    let user = seed_user(&pool).await;
    let a = seed_skill(&pool, user, "A").await;
    let tree = seed_tree(&pool, user, "Bulk").await;

    let outcome = SkillTreeRepo::bulk_assign(&pool, tree, &[assign(a, None), assign(9999, None)])
        .await
        .unwrap();
    assert_eq!(outcome.added, vec![a]);
    assert_eq!(outcome.skipped, vec![9999]);
    assert_eq!(total_skills(&pool, tree).await, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bulk_assign_aborts_on_structural_error(pool: PgPool) {
    let user = seed_user(&pool).await;
    let a = seed_skill(&pool, user, "A").await;
    let b = seed_skill(&pool, user, "B").await;
    let tree = seed_tree(&pool, user, "Atomic").await;

    let result =
        SkillTreeRepo::bulk_assign(&pool, tree, &[assign(a, None), assign(b, Some(12345))]).await;
    assert!(result.is_err());
    assert_eq!(total_skills(&pool, tree).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_skill_delete_cascades_into_trees(pool: PgPool) {
    let user = seed_user(&pool).await;
    let a = seed_skill(&pool, user, "A").await;
    let b = seed_skill(&pool, user, "B").await;
    let c = seed_skill(&pool, user, "C").await;
    let tree = seed_tree(&pool, user, "Career").await;

    SkillTreeRepo::bulk_assign(&pool, tree, &[assign(a, None), assign(b, Some(a)), assign(c, None)])
        .await
        .unwrap();
    SkillTreeRepo::add_learning_path(
        &pool,
        tree,
        &CreateLearningPath {
            name: "Fast track".to_string(),
            description: String::new(),
            difficulty: None,
            estimated_duration: 0.0,
            sequence: vec![],
            prerequisites: vec![a, c],
            outcomes: vec![],
            status: None,
        },
    )
    .await
    .unwrap();

    assert!(SkillRepo::delete(&pool, a).await.unwrap());

    let arena = SkillTreeRepo::load_arena(&pool, tree).await.unwrap();
    assert_eq!(arena.all_skills(), vec![c]);
    assert_eq!(total_skills(&pool, tree).await, 1);

    let paths = SkillTreeRepo::learning_paths(&pool, tree).await.unwrap();
    assert_eq!(paths[0].path.prerequisites, vec![c]);

    assert!(!SkillRepo::delete(&pool, a).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_learning_path_names_unique_per_tree(pool: PgPool) {
    let user = seed_user(&pool).await;
    let a = seed_skill(&pool, user, "A").await;
    let tree = seed_tree(&pool, user, "Paths").await;

    let path = CreateLearningPath {
        name: "Intro".to_string(),
        description: String::new(),
        difficulty: None,
        estimated_duration: 2.0,
        sequence: serde_json::from_value(serde_json::json!([{ "skill_id": a, "order": 1 }]))
            .unwrap(),
        prerequisites: vec![],
        outcomes: vec![],
        status: None,
    };
    let created = SkillTreeRepo::add_learning_path(&pool, tree, &path).await.unwrap();
    assert_eq!(created.sequence.len(), 1);

    let duplicate = SkillTreeRepo::add_learning_path(&pool, tree, &path).await;
    assert_matches!(duplicate, Err(DbError::Core(CoreError::Validation(_))));

    let tree_row = SkillTreeRepo::find_by_id(&pool, tree).await.unwrap().unwrap();
    assert_eq!(tree_row.total_paths, 1);

    assert!(SkillTreeRepo::remove_learning_path(&pool, tree, "Intro").await.unwrap());
    let tree_row = SkillTreeRepo::find_by_id(&pool, tree).await.unwrap().unwrap();
    assert_eq!(tree_row.total_paths, 0);
}
