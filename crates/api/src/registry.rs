//! Shared, refreshable role registry.
//!
//! Loaded once at startup and handed to handlers through `AppState`. Readers
//! take a cheap `Arc` snapshot; a refresh swaps in a freshly built registry.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use skillforge_core::roles::{RoleEntry, RoleRegistry};
use skillforge_core::types::DbId;
use skillforge_db::models::role::RoleGrant;
use skillforge_db::repositories::RoleRepo;
use skillforge_db::DbPool;
use tokio::sync::RwLock;

pub struct RoleRegistryHandle {
    current: RwLock<Arc<RoleRegistry>>,
}

impl RoleRegistryHandle {
    pub fn new(registry: RoleRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// Build the registry from the database.
    pub async fn load(pool: &DbPool) -> Result<Self, sqlx::Error> {
        let grants = RoleRepo::list_grants(pool).await?;
        Ok(Self::new(build_registry(grants)))
    }

    /// The registry as of the last load or refresh.
    pub async fn snapshot(&self) -> Arc<RoleRegistry> {
        Arc::clone(&*self.current.read().await)
    }

    /// Rebuild from the database and swap it in. Returns the number of roles.
    pub async fn refresh(&self, pool: &DbPool) -> Result<usize, sqlx::Error> {
        let grants = RoleRepo::list_grants(pool).await?;
        let registry = build_registry(grants);
        let count = registry.len();
        *self.current.write().await = Arc::new(registry);
        tracing::info!(roles = count, "Role registry refreshed");
        Ok(count)
    }
}

/// Fold `(role, permission)` rows into registry entries.
pub fn build_registry(grants: Vec<RoleGrant>) -> RoleRegistry {
    let mut entries: BTreeMap<DbId, RoleEntry> = BTreeMap::new();
    for grant in grants {
        let entry = entries.entry(grant.role_id).or_insert_with(|| RoleEntry {
            id: grant.role_id,
            name: grant.role_name.clone(),
            permissions: HashSet::new(),
        });
        if let Some(permission) = grant.permission_name {
            entry.permissions.insert(permission);
        }
    }
    RoleRegistry::from_entries(entries.into_values())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(role_id: DbId, role_name: &str, permission: Option<&str>) -> RoleGrant {
        RoleGrant {
            role_id,
            role_name: role_name.to_string(),
            permission_name: permission.map(str::to_string),
        }
    }

    #[test]
    fn grants_fold_into_roles() {
        let registry = build_registry(vec![
            grant(1, "SAdmin", None),
            grant(2, "teacher", Some("permissions")),
            grant(2, "teacher", Some("classes")),
        ]);

        assert_eq!(registry.len(), 2);
        assert!(registry.is_super_admin(&[1]));
        assert!(registry.has_permission(&[2], &[], "classes"));
        assert!(registry
            .get(1)
            .is_some_and(|role| role.permissions.is_empty()));
    }

    #[tokio::test]
    async fn snapshot_survives_swap() {
        let handle = RoleRegistryHandle::new(build_registry(vec![grant(1, "SAdmin", None)]));
        let before = handle.snapshot().await;

        *handle.current.write().await = Arc::new(RoleRegistry::default());

        assert_eq!(before.len(), 1);
        assert!(handle.snapshot().await.is_empty());
    }
}
