//! Integration tests for class enrollment and roster consistency.

use assert_matches::assert_matches;
use chrono::Utc;
use skillforge_core::class::{CompletedSkillTree, StudentStatus};
use skillforge_core::error::CoreError;
use skillforge_db::models::class::CreateClass;
use skillforge_db::models::room::CreateRoom;
use skillforge_db::models::user::CreateUser;
use skillforge_db::repositories::{ClassRepo, RoomRepo, UserRepo};
use skillforge_db::DbError;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_user(pool: &PgPool, username: &str) -> i64 {
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            name: None,
            password_hash: "hash".to_string(),
        },
    )
    .await
    .unwrap()
    .id
}

fn new_class(code: &str, max_students: i32) -> CreateClass {
    CreateClass {
        name: format!("Class {code}"),
        description: None,
        code: code.to_string(),
        class_type: None,
        level: None,
        status: None,
        objectives: vec![],
        duration: None,
        max_students: Some(max_students),
        schedule: None,
        settings: None,
        tags: vec![],
        skill_trees: vec![],
        teachers: vec![],
    }
}

async fn enrolled_students(pool: &PgPool, class_id: i64) -> i32 {
    ClassRepo::find_by_id(pool, class_id)
        .await
        .unwrap()
        .unwrap()
        .enrolled_students
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_code_is_uppercased(pool: PgPool) {
    let owner = seed_user(&pool, "owner").await;
    let class = ClassRepo::create(&pool, &new_class(" cs101 ", 10), owner)
        .await
        .unwrap();
    assert_eq!(class.code, "CS101");
    assert!(ClassRepo::code_taken(&pool, "CS101", None).await.unwrap());
    assert!(!ClassRepo::code_taken(&pool, "CS101", Some(class.id)).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_capacity_is_enforced(pool: PgPool) {
    let owner = seed_user(&pool, "owner").await;
    let user1 = seed_user(&pool, "user1").await;
    let user2 = seed_user(&pool, "user2").await;
    let class = ClassRepo::create(&pool, &new_class("SOLO", 1), owner)
        .await
        .unwrap();

    ClassRepo::enroll_student(&pool, class.id, user1, StudentStatus::Enrolled)
        .await
        .unwrap();
    assert_eq!(enrolled_students(&pool, class.id).await, 1);

    let result = ClassRepo::enroll_student(&pool, class.id, user2, StudentStatus::Enrolled).await;
    assert_matches!(result, Err(DbError::Core(CoreError::Validation(msg))) if msg == "Class is full");
    assert_eq!(enrolled_students(&pool, class.id).await, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_enrollment_never_exceeds_capacity(pool: PgPool) {
    let owner = seed_user(&pool, "owner").await;
    let class = ClassRepo::create(&pool, &new_class("RACE", 3), owner)
        .await
        .unwrap();

    let mut users = Vec::new();
    for i in 0..8 {
        users.push(seed_user(&pool, &format!("student{i}")).await);
    }

    let handles: Vec<_> = users
        .into_iter()
        .map(|user| {
            let pool = pool.clone();
            tokio::spawn(async move {
                ClassRepo::enroll_student(&pool, class.id, user, StudentStatus::Enrolled).await
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(enrolled_students(&pool, class.id).await, 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_enrolled_count_is_recomputed(pool: PgPool) {
    let owner = seed_user(&pool, "owner").await;
    let a = seed_user(&pool, "a").await;
    let b = seed_user(&pool, "b").await;
    let class = ClassRepo::create(&pool, &new_class("COUNT", 10), owner)
        .await
        .unwrap();

    ClassRepo::enroll_student(&pool, class.id, a, StudentStatus::Enrolled)
        .await
        .unwrap();
    ClassRepo::enroll_student(&pool, class.id, b, StudentStatus::Pending)
        .await
        .unwrap();
    assert_eq!(enrolled_students(&pool, class.id).await, 1);

    // Re-enrolling refreshes the status without a second roster entry.
    ClassRepo::enroll_student(&pool, class.id, b, StudentStatus::Completed)
        .await
        .unwrap();
    assert_eq!(enrolled_students(&pool, class.id).await, 2);

    assert!(ClassRepo::remove_student(&pool, class.id, a).await.unwrap());
    assert!(!ClassRepo::remove_student(&pool, class.id, a).await.unwrap());
    assert_eq!(enrolled_students(&pool, class.id).await, 1);

    let detail = ClassRepo::find_detail(&pool, class.id).await.unwrap().unwrap();
    assert_eq!(detail.students.len(), 1);
    assert_eq!(detail.students[0].status, StudentStatus::Completed);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_progress_is_clamped_and_empty_list_keeps_trees(pool: PgPool) {
    let owner = seed_user(&pool, "owner").await;
    let student = seed_user(&pool, "student").await;
    let class = ClassRepo::create(&pool, &new_class("PROG", 10), owner)
        .await
        .unwrap();
    ClassRepo::enroll_student(&pool, class.id, student, StudentStatus::Enrolled)
        .await
        .unwrap();

    let tree_id: i64 = sqlx::query_scalar(
        "INSERT INTO skill_trees (name, created_by) VALUES ('T', $1) RETURNING id",
    )
    .bind(owner)
    .fetch_one(&pool)
    .await
    .unwrap();

    let completed = vec![CompletedSkillTree {
        skill_tree_id: tree_id,
        completed_at: Utc::now(),
        score: Some(88.0),
        feedback: None,
    }];
    let entry = ClassRepo::update_student_progress(&pool, class.id, student, 150.0, completed)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.progress, 100.0);

    let entry = ClassRepo::update_student_progress(&pool, class.id, student, -10.0, vec![])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.progress, 0.0);
    assert_eq!(entry.completed_skill_trees.len(), 1);

    let missing = ClassRepo::update_student_progress(&pool, class.id, owner, 50.0, vec![])
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_teacher_assignment_rules(pool: PgPool) {
    let owner = seed_user(&pool, "owner").await;
    let teacher = seed_user(&pool, "teacher").await;
    let class = ClassRepo::create(&pool, &new_class("TEACH", 10), owner)
        .await
        .unwrap();

    ClassRepo::assign_teacher(&pool, class.id, teacher).await.unwrap();
    assert_matches!(
        ClassRepo::assign_teacher(&pool, class.id, teacher).await,
        Err(DbError::Core(CoreError::Validation(_)))
    );

    ClassRepo::remove_teacher(&pool, class.id, teacher).await.unwrap();
    assert_matches!(
        ClassRepo::remove_teacher(&pool, class.id, teacher).await,
        Err(DbError::Core(CoreError::Validation(_)))
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_class_with_room_cannot_be_deleted(pool: PgPool) {
    let owner = seed_user(&pool, "owner").await;
    let class = ClassRepo::create(&pool, &new_class("ROOMED", 10), owner)
        .await
        .unwrap();
    RoomRepo::create(
        &pool,
        &CreateRoom {
            name: "Study group".to_string(),
            description: None,
            class_id: Some(class.id),
        },
        owner,
    )
    .await
    .unwrap();

    assert_matches!(
        ClassRepo::delete(&pool, class.id).await,
        Err(DbError::Core(CoreError::Validation(_)))
    );
    assert!(ClassRepo::exists(&pool, class.id).await.unwrap());
}
