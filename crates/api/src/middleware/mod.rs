//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- the session decoded from a JWT Bearer token.
//! - [`rbac::RequireAuth`] -- any authenticated user.
//! - [`rbac::RequireManager`] -- holds the management permission.
//! - [`rbac::RequireSuperAdmin`] -- holds the super-admin role.
//! - [`room_access::RoomAccess`] -- passes the class gate of a room.

pub mod auth;
pub mod rbac;
pub mod room_access;
