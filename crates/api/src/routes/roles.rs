//! Route definitions for roles and permissions.
//!
//! Two routers are provided:
//! - `permissions_router()` mounted at `/permissions`
//! - `roles_router()` mounted at `/roles`

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::roles;
use crate::state::AppState;

/// Routes mounted at `/permissions`.
///
/// ```text
/// GET    /          -> list_permissions (manager)
/// POST   /          -> create_permission (manager)
/// GET    /owned     -> owned_permissions
/// DELETE /{id}      -> delete_permission (manager)
/// ```
pub fn permissions_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(roles::list_permissions).post(roles::create_permission),
        )
        .route("/owned", get(roles::owned_permissions))
        .route("/{id}", delete(roles::delete_permission))
}

/// Routes mounted at `/roles`. All require the management permission.
///
/// ```text
/// POST   /                  -> create_role
/// PUT    /assign            -> assign_role
/// POST   /refresh           -> refresh_roles
/// DELETE /{id}              -> delete_role
/// PUT    /{id}/permissions  -> set_role_permissions
/// ```
pub fn roles_router() -> Router<AppState> {
    Router::new()
        .route("/", post(roles::create_role))
        .route("/assign", put(roles::assign_role))
        .route("/refresh", post(roles::refresh_roles))
        .route("/{id}", delete(roles::delete_role))
        .route("/{id}/permissions", put(roles::set_role_permissions))
}
