//! Repository for chat rooms.

use skillforge_core::types::DbId;
use sqlx::PgPool;

use crate::models::room::{CreateRoom, Room, UpdateRoom};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, description, created_by, class_id, created_at, updated_at";

/// Provides CRUD operations for rooms.
pub struct RoomRepo;

impl RoomRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateRoom,
        created_by: DbId,
    ) -> Result<Room, sqlx::Error> {
        let query = format!(
            "INSERT INTO rooms (name, description, class_id, created_by)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Room>(&query)
            .bind(input.name.trim())
            .bind(&input.description)
            .bind(input.class_id)
            .bind(created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Room>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM rooms WHERE id = $1");
        sqlx::query_as::<_, Room>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Page of rooms, newest first, plus the total count.
    pub async fn list(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Room>, i64), sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM rooms ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        );
        let rooms = sqlx::query_as::<_, Room>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM rooms")
            .fetch_one(pool)
            .await?;
        Ok((rooms, total))
    }

    /// Update name and description. Only non-`None` fields are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateRoom,
    ) -> Result<Option<Room>, sqlx::Error> {
        let query = format!(
            "UPDATE rooms SET
                name = COALESCE($2, name),
                description = COALESCE($3, description)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Room>(&query)
            .bind(id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(&input.description)
            .fetch_optional(pool)
            .await
    }

    /// Link a room to a class. The update only matches a room without a
    /// class, so a link can be set once and never changed.
    ///
    /// Returns `None` when the room is missing or already linked.
    pub async fn assign_class(
        pool: &PgPool,
        id: DbId,
        class_id: DbId,
    ) -> Result<Option<Room>, sqlx::Error> {
        let query = format!(
            "UPDATE rooms SET class_id = $2
             WHERE id = $1 AND class_id IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Room>(&query)
            .bind(id)
            .bind(class_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a room and its messages.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
