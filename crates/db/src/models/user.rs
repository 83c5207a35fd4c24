//! User entity model and DTOs.

use serde::{Deserialize, Serialize};
use skillforge_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// Full user row from the `users` table.
///
/// Contains the password hash. Use [`UserResponse`] for API output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Safe user representation for API responses (no password hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub is_active: bool,
    /// Resolved role names.
    pub roles: Vec<String>,
    pub created_at: Timestamp,
}

impl UserResponse {
    pub fn from_user(user: &User, roles: Vec<String>) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            is_active: user.is_active,
            roles,
            created_at: user.created_at,
        }
    }
}

/// Compact user reference embedded in other payloads.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserSummary {
    pub id: DbId,
    pub username: String,
    pub name: Option<String>,
    pub email: String,
}

/// DTO for creating a new user. The password is already hashed.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
}
