//! Role-based access control (RBAC) extractors.
//!
//! Each extractor wraps [`AuthUser`] and checks it against the role registry
//! held in application state.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use skillforge_core::error::CoreError;
use skillforge_core::roles::MANAGE_PERMISSION;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires the management permission, through a role or a direct grant.
/// Super-admins always pass. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn create_skill(RequireManager(user): RequireManager) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireManager(pub AuthUser);

impl FromRequestParts<AppState> for RequireManager {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let registry = state.roles.snapshot().await;
        if !user.has_permission(&registry, MANAGE_PERMISSION) {
            return Err(AppError::Core(CoreError::Forbidden(format!(
                "Permission '{MANAGE_PERMISSION}' required"
            ))));
        }
        Ok(RequireManager(user))
    }
}

/// Requires the super-admin role. Rejects with 403 Forbidden otherwise.
pub struct RequireSuperAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let registry = state.roles.snapshot().await;
        if !user.is_super_admin(&registry) {
            return Err(AppError::Core(CoreError::Forbidden(
                "Super admin role required".into(),
            )));
        }
        Ok(RequireSuperAdmin(user))
    }
}

/// Requires any authenticated user.
///
/// Equivalent to [`AuthUser`], named for route definitions where "this route
/// requires authentication" should read explicitly.
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        Ok(RequireAuth(user))
    }
}
