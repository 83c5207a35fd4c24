//! Repository for roles, permissions and their assignments.

use skillforge_core::types::DbId;
use sqlx::PgPool;

use crate::models::role::{CreatePermission, CreateRole, Permission, Role, RoleGrant};

const ROLE_COLUMNS: &str = "id, name, description, created_by, created_at, updated_at";
const PERMISSION_COLUMNS: &str = "id, name, description, created_by, created_at, updated_at";

/// Provides role and permission management.
pub struct RoleRepo;

impl RoleRepo {
    /// Every role joined with its permission names, one row per grant.
    ///
    /// Roles without permissions appear once with `permission_name = NULL`.
    pub async fn list_grants(pool: &PgPool) -> Result<Vec<RoleGrant>, sqlx::Error> {
        sqlx::query_as::<_, RoleGrant>(
            "SELECT r.id AS role_id, r.name AS role_name, p.name AS permission_name
             FROM roles r
             LEFT JOIN role_permissions rp ON rp.role_id = r.id
             LEFT JOIN permissions p ON p.id = rp.permission_id
             ORDER BY r.id, p.name",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn list_roles(pool: &PgPool) -> Result<Vec<Role>, sqlx::Error> {
        let query = format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY id");
        sqlx::query_as::<_, Role>(&query).fetch_all(pool).await
    }

    pub async fn list_permissions(pool: &PgPool) -> Result<Vec<Permission>, sqlx::Error> {
        let query = format!("SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY id");
        sqlx::query_as::<_, Permission>(&query).fetch_all(pool).await
    }

    pub async fn find_role(pool: &PgPool, id: DbId) -> Result<Option<Role>, sqlx::Error> {
        let query = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1");
        sqlx::query_as::<_, Role>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_role_by_name(pool: &PgPool, name: &str) -> Result<Option<Role>, sqlx::Error> {
        let query = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1");
        sqlx::query_as::<_, Role>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    pub async fn permission_exists(pool: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM permissions WHERE name = $1)")
            .bind(name)
            .fetch_one(pool)
            .await
    }

    pub async fn create_permission(
        pool: &PgPool,
        input: &CreatePermission,
        created_by: DbId,
    ) -> Result<Permission, sqlx::Error> {
        let query = format!(
            "INSERT INTO permissions (name, description, created_by)
             VALUES ($1, $2, $3)
             RETURNING {PERMISSION_COLUMNS}"
        );
        sqlx::query_as::<_, Permission>(&query)
            .bind(&input.name)
            .bind(&input.description)
            .bind(created_by)
            .fetch_one(pool)
            .await
    }

    /// Delete a permission. Returns `true` if a row was deleted.
    pub async fn delete_permission(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert a role and grant it the listed permissions. Unknown
    /// permission ids are ignored.
    pub async fn create_role(
        pool: &PgPool,
        input: &CreateRole,
        created_by: DbId,
    ) -> Result<Role, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO roles (name, description, created_by)
             VALUES ($1, $2, $3)
             RETURNING {ROLE_COLUMNS}"
        );
        let role = sqlx::query_as::<_, Role>(&query)
            .bind(&input.name)
            .bind(&input.description)
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id)
             SELECT $1, p.id FROM permissions p WHERE p.id = ANY($2)
             ON CONFLICT DO NOTHING",
        )
        .bind(role.id)
        .bind(&input.permission_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(role)
    }

    /// Replace the permission set of a role. Unknown permission ids are
    /// ignored. Returns the names now granted.
    pub async fn set_role_permissions(
        pool: &PgPool,
        role_id: DbId,
        permission_ids: &[DbId],
    ) -> Result<Vec<String>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        let names: Vec<String> = sqlx::query_scalar(
            "WITH granted AS (
                 INSERT INTO role_permissions (role_id, permission_id)
                 SELECT $1, p.id FROM permissions p WHERE p.id = ANY($2)
                 RETURNING permission_id
             )
             SELECT p.name FROM permissions p JOIN granted g ON g.permission_id = p.id
             ORDER BY p.name",
        )
        .bind(role_id)
        .bind(permission_ids)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(names)
    }

    /// Delete a role. Returns `true` if a row was deleted.
    pub async fn delete_role(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Give a user a role. Assigning twice is a no-op.
    pub async fn assign_to_user(
        pool: &PgPool,
        user_id: DbId,
        role_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Take a role away from a user. Returns `true` if the user had it.
    pub async fn revoke_from_user(
        pool: &PgPool,
        user_id: DbId,
        role_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Role ids held by a user.
    pub async fn role_ids_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT role_id FROM user_roles WHERE user_id = $1 ORDER BY role_id")
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Names of permissions granted to a user directly, not through a role.
    pub async fn direct_permissions_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT p.name FROM user_permissions up
             JOIN permissions p ON p.id = up.permission_id
             WHERE up.user_id = $1
             ORDER BY p.name",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
