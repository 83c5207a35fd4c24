//! Chat message model.

use serde::Serialize;
use skillforge_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `messages` table with the author's username.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Message {
    pub id: DbId,
    pub room_id: DbId,
    pub user_id: Option<DbId>,
    pub username: Option<String>,
    pub content: String,
    pub created_at: Timestamp,
}
