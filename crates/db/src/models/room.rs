//! Chat room models.

use serde::{Deserialize, Serialize};
use skillforge_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `rooms` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Room {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<DbId>,
    /// Set at most once.
    pub class_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoom {
    pub name: String,
    pub description: Option<String>,
    pub class_id: Option<DbId>,
}

/// Name and description only. The class link has its own endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoom {
    pub name: Option<String>,
    pub description: Option<String>,
}
