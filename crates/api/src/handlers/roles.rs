//! Handlers for roles and permissions.
//!
//! Every mutation rebuilds the in-memory role registry so later requests
//! see the new grants. Tokens carry role ids, so a user's own role list only
//! changes at their next login.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use skillforge_core::error::CoreError;
use skillforge_core::roles::SUPER_ADMIN_ROLE;
use skillforge_core::types::DbId;
use skillforge_db::models::role::{CreatePermission, CreateRole, Permission, RoleWithPermissions};
use skillforge_db::repositories::{RoleRepo, UserRepo};
use skillforge_events::{names, PlatformEvent};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireManager;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::validation::validate_input;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Roles with their permission names, plus the full permission catalog.
#[derive(Debug, Serialize)]
pub struct PermissionOverview {
    pub roles: Vec<RoleWithPermissions>,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PermissionRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoleRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<DbId>,
}

#[derive(Debug, Deserialize)]
pub struct RolePermissionsRequest {
    pub permission_ids: Vec<DbId>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssignAction {
    Assign,
    Revoke,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub user_id: DbId,
    pub role_id: DbId,
    pub action: AssignAction,
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// GET /api/v1/permissions
pub async fn list_permissions(
    RequireManager(_user): RequireManager,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let overview = load_overview(&state).await?;
    Ok(Json(DataResponse { data: overview }))
}

/// GET /api/v1/permissions/owned
///
/// Permission names the caller holds through roles or direct grants.
pub async fn owned_permissions(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let registry = state.roles.snapshot().await;

    let mut owned: Vec<String> = auth
        .role_ids
        .iter()
        .filter_map(|id| registry.get(*id))
        .flat_map(|role| role.permissions.iter().cloned())
        .chain(auth.permissions.iter().cloned())
        .collect();
    owned.sort();
    owned.dedup();

    Ok(Json(DataResponse {
        data: json!({
            "roles": registry.role_names(&auth.role_ids),
            "permissions": owned,
            "is_super_admin": auth.is_super_admin(&registry),
        }),
    }))
}

/// POST /api/v1/permissions
pub async fn create_permission(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Json(input): Json<PermissionRequest>,
) -> AppResult<impl IntoResponse> {
    validate_input(&input)?;

    let name = input.name.trim();
    if RoleRepo::permission_exists(&state.pool, name).await? {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Permission '{name}' already exists"
        ))));
    }

    let permission = RoleRepo::create_permission(
        &state.pool,
        &CreatePermission {
            name: name.to_string(),
            description: input.description.clone(),
        },
        user.user_id,
    )
    .await?;

    tracing::info!(
        permission_id = permission.id,
        name = %permission.name,
        user_id = user.user_id,
        "Permission created"
    );
    refresh_registry(&state, user.user_id).await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: permission })))
}

/// DELETE /api/v1/permissions/{id}
pub async fn delete_permission(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(permission_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !RoleRepo::delete_permission(&state.pool, permission_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Permission",
            id: permission_id,
        }));
    }

    tracing::info!(permission_id, user_id = user.user_id, "Permission deleted");
    refresh_registry(&state, user.user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// POST /api/v1/roles
pub async fn create_role(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Json(input): Json<RoleRequest>,
) -> AppResult<impl IntoResponse> {
    validate_input(&input)?;

    let name = input.name.trim();
    if RoleRepo::find_role_by_name(&state.pool, name).await?.is_some() {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Role '{name}' already exists"
        ))));
    }

    let role = RoleRepo::create_role(
        &state.pool,
        &CreateRole {
            name: name.to_string(),
            description: input.description.clone(),
            permission_ids: input.permission_ids.clone(),
        },
        user.user_id,
    )
    .await?;

    tracing::info!(role_id = role.id, name = %role.name, user_id = user.user_id, "Role created");
    refresh_registry(&state, user.user_id).await?;

    let permissions = state
        .roles
        .snapshot()
        .await
        .get(role.id)
        .map(|entry| {
            let mut names: Vec<String> = entry.permissions.iter().cloned().collect();
            names.sort();
            names
        })
        .unwrap_or_default();

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: RoleWithPermissions { role, permissions },
        }),
    ))
}

/// PUT /api/v1/roles/{id}/permissions
///
/// Replace the permission set of a role.
pub async fn set_role_permissions(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(role_id): Path<DbId>,
    Json(input): Json<RolePermissionsRequest>,
) -> AppResult<impl IntoResponse> {
    let role = RoleRepo::find_role(&state.pool, role_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Role",
            id: role_id,
        }))?;

    let permissions =
        RoleRepo::set_role_permissions(&state.pool, role_id, &input.permission_ids).await?;

    tracing::info!(
        role_id,
        granted = permissions.len(),
        user_id = user.user_id,
        "Role permissions replaced"
    );
    refresh_registry(&state, user.user_id).await?;

    Ok(Json(DataResponse {
        data: RoleWithPermissions { role, permissions },
    }))
}

/// DELETE /api/v1/roles/{id}
///
/// The super-admin role cannot be deleted.
pub async fn delete_role(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(role_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let role = RoleRepo::find_role(&state.pool, role_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Role",
            id: role_id,
        }))?;

    if role.name == SUPER_ADMIN_ROLE {
        return Err(AppError::Core(CoreError::Forbidden(format!(
            "The {SUPER_ADMIN_ROLE} role cannot be deleted"
        ))));
    }

    RoleRepo::delete_role(&state.pool, role_id).await?;

    tracing::info!(role_id, user_id = user.user_id, "Role deleted");
    refresh_registry(&state, user.user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/roles/assign
///
/// Assign a role to a user or revoke it. Takes effect at the user's next login.
pub async fn assign_role(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Json(input): Json<AssignRoleRequest>,
) -> AppResult<impl IntoResponse> {
    if !UserRepo::exists(&state.pool, input.user_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: input.user_id,
        }));
    }
    let role = RoleRepo::find_role(&state.pool, input.role_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Role",
            id: input.role_id,
        }))?;

    match input.action {
        AssignAction::Assign => {
            RoleRepo::assign_to_user(&state.pool, input.user_id, role.id).await?;
        }
        AssignAction::Revoke => {
            if !RoleRepo::revoke_from_user(&state.pool, input.user_id, role.id).await? {
                return Err(AppError::Core(CoreError::Validation(format!(
                    "User does not hold the role '{}'",
                    role.name
                ))));
            }
        }
    }

    tracing::info!(
        target_user_id = input.user_id,
        role_id = role.id,
        action = ?input.action,
        user_id = user.user_id,
        "User role changed"
    );

    let role_ids = RoleRepo::role_ids_for_user(&state.pool, input.user_id).await?;
    let roles = state.roles.snapshot().await.role_names(&role_ids);

    Ok(Json(DataResponse {
        data: json!({ "user_id": input.user_id, "roles": roles }),
    }))
}

/// POST /api/v1/roles/refresh
///
/// Rebuild the role registry from the database.
pub async fn refresh_roles(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let count = refresh_registry(&state, user.user_id).await?;
    Ok(Json(DataResponse {
        data: json!({ "roles": count }),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load_overview(state: &AppState) -> AppResult<PermissionOverview> {
    let roles = RoleRepo::list_roles(&state.pool).await?;
    let permissions = RoleRepo::list_permissions(&state.pool).await?;
    let registry = state.roles.snapshot().await;

    let roles = roles
        .into_iter()
        .map(|role| {
            let mut names: Vec<String> = registry
                .get(role.id)
                .map(|entry| entry.permissions.iter().cloned().collect())
                .unwrap_or_default();
            names.sort();
            RoleWithPermissions {
                role,
                permissions: names,
            }
        })
        .collect();

    Ok(PermissionOverview { roles, permissions })
}

async fn refresh_registry(state: &AppState, user_id: DbId) -> AppResult<usize> {
    let count = state.roles.refresh(&state.pool).await?;
    state.event_bus.publish(
        PlatformEvent::new(names::ROLES_REFRESHED)
            .by(user_id)
            .with_data(json!({ "roles": count })),
    );
    Ok(count)
}
