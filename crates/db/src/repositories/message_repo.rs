//! Repository for room messages.

use skillforge_core::types::DbId;
use sqlx::PgPool;

use crate::models::message::Message;

/// Provides message operations.
pub struct MessageRepo;

impl MessageRepo {
    /// Post a message. The author's username is resolved in the same query.
    pub async fn create(
        pool: &PgPool,
        room_id: DbId,
        user_id: DbId,
        content: &str,
    ) -> Result<Message, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            "WITH inserted AS (
                 INSERT INTO messages (room_id, user_id, content)
                 VALUES ($1, $2, $3)
                 RETURNING id, room_id, user_id, content, created_at
             )
             SELECT i.id, i.room_id, i.user_id, u.username, i.content, i.created_at
             FROM inserted i
             LEFT JOIN users u ON u.id = i.user_id",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(pool)
        .await
    }

    /// Page of a room's messages, oldest first, plus the total count.
    pub async fn list_by_room(
        pool: &PgPool,
        room_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Message>, i64), sqlx::Error> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT m.id, m.room_id, m.user_id, u.username, m.content, m.created_at
             FROM messages m
             LEFT JOIN users u ON u.id = m.user_id
             WHERE m.room_id = $1
             ORDER BY m.created_at, m.id
             LIMIT $2 OFFSET $3",
        )
        .bind(room_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE room_id = $1")
            .bind(room_id)
            .fetch_one(pool)
            .await?;
        Ok((messages, total))
    }
}
