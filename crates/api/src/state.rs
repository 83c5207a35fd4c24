use std::sync::Arc;

use crate::config::ServerConfig;
use crate::registry::RoleRegistryHandle;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: inner data is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: skillforge_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Role registry, loaded at startup and swapped on refresh.
    pub roles: Arc<RoleRegistryHandle>,
    /// Event bus for fire-and-forget side effects.
    pub event_bus: Arc<skillforge_events::EventBus>,
}
