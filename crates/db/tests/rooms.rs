//! Integration tests for rooms and their one-time class link.

use skillforge_db::models::room::{CreateRoom, UpdateRoom};
use skillforge_db::repositories::{MessageRepo, RoomRepo};
use sqlx::PgPool;

async fn seed_user_and_classes(pool: &PgPool) -> (i64, i64, i64) {
    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, email, password_hash)
         VALUES ('host', 'host@example.com', 'hash') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap();
    let mut classes = Vec::new();
    for code in ["ROOM1", "ROOM2"] {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO classes (name, code, created_by) VALUES ($1, $1, $2) RETURNING id",
        )
        .bind(code)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap();
        classes.push(id);
    }
    (user_id, classes[0], classes[1])
}

fn new_room(class_id: Option<i64>) -> CreateRoom {
    CreateRoom {
        name: "Lounge".to_string(),
        description: None,
        class_id,
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_class_can_be_assigned_once(pool: PgPool) {
    let (user, first, second) = seed_user_and_classes(&pool).await;
    let room = RoomRepo::create(&pool, &new_room(None), user).await.unwrap();

    let linked = RoomRepo::assign_class(&pool, room.id, first).await.unwrap().unwrap();
    assert_eq!(linked.class_id, Some(first));

    assert!(RoomRepo::assign_class(&pool, room.id, second).await.unwrap().is_none());
    let reloaded = RoomRepo::find_by_id(&pool, room.id).await.unwrap().unwrap();
    assert_eq!(reloaded.class_id, Some(first));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_schema_rejects_class_change(pool: PgPool) {
    let (user, first, second) = seed_user_and_classes(&pool).await;
    let room = RoomRepo::create(&pool, &new_room(Some(first)), user).await.unwrap();

    let result = sqlx::query("UPDATE rooms SET class_id = $2 WHERE id = $1")
        .bind(room.id)
        .bind(second)
        .execute(&pool)
        .await;
    assert!(result.is_err(), "changing a set class_id must fail");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_keeps_class_and_messages_cascade(pool: PgPool) {
    let (user, first, _) = seed_user_and_classes(&pool).await;
    let room = RoomRepo::create(&pool, &new_room(Some(first)), user).await.unwrap();

    let updated = RoomRepo::update(
        &pool,
        room.id,
        &UpdateRoom {
            name: Some("Renamed".to_string()),
            description: None,
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.class_id, Some(first));

    let message = MessageRepo::create(&pool, room.id, user, "hello").await.unwrap();
    assert_eq!(message.username.as_deref(), Some("host"));
    let (messages, total) = MessageRepo::list_by_room(&pool, room.id, 50, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(messages[0].content, "hello");

    assert!(RoomRepo::delete(&pool, room.id).await.unwrap());
    let (_, total) = MessageRepo::list_by_room(&pool, room.id, 50, 0).await.unwrap();
    assert_eq!(total, 0);
}
