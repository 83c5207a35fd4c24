//! Role and permission models.

use serde::{Deserialize, Serialize};
use skillforge_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `roles` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Role {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `permissions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Permission {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One `(role, permission)` pair used to build the role registry.
/// `permission_name` is `None` for roles without permissions.
#[derive(Debug, Clone, FromRow)]
pub struct RoleGrant {
    pub role_id: DbId,
    pub role_name: String,
    pub permission_name: Option<String>,
}

/// A role together with the names of its permissions.
#[derive(Debug, Clone, Serialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRole {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<DbId>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePermission {
    pub name: String,
    pub description: Option<String>,
}
