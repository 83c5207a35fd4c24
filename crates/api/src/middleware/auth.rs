//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use skillforge_core::error::CoreError;
use skillforge_core::roles::RoleRegistry;
use skillforge_core::room::RoomActor;
use skillforge_core::types::DbId;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// The caller's session, decoded once from the `Authorization: Bearer` token.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.sub`).
    pub user_id: DbId,
    /// Role ids, resolved against the role registry when needed.
    pub role_ids: Vec<DbId>,
    /// Permission names granted to the user directly.
    pub permissions: Vec<String>,
}

impl AuthUser {
    pub fn is_super_admin(&self, registry: &RoleRegistry) -> bool {
        registry.is_super_admin(&self.role_ids)
    }

    pub fn has_permission(&self, registry: &RoleRegistry, permission: &str) -> bool {
        registry.has_permission(&self.role_ids, &self.permissions, permission)
    }

    pub fn room_actor(&self, registry: &RoleRegistry) -> RoomActor {
        RoomActor {
            user_id: self.user_id,
            is_super_admin: self.is_super_admin(registry),
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
            role_ids: claims.roles,
            permissions: claims.permissions,
        })
    }
}
