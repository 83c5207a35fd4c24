//! Role and permission registry.
//!
//! The registry is built from the `roles` / `role_permissions` tables when the
//! server starts and is held in application state. Handlers consult it to
//! resolve the role ids carried in an access token; nothing looks roles up by
//! name on the request path. It is rebuilt only through an explicit refresh.

use std::collections::{HashMap, HashSet};

use crate::types::DbId;

/// Name of the role that bypasses every permission check and access gate.
pub const SUPER_ADMIN_ROLE: &str = "SAdmin";

/// Permission required for catalog, class, and role management.
pub const MANAGE_PERMISSION: &str = "permissions";

/// One role with the names of the permissions granted to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleEntry {
    pub id: DbId,
    pub name: String,
    pub permissions: HashSet<String>,
}

impl RoleEntry {
    /// Whether this role is the super-admin role. Names match exactly, as
    /// role-name uniqueness and the delete guard do.
    pub fn is_super_admin(&self) -> bool {
        self.name == SUPER_ADMIN_ROLE
    }
}

/// In-memory snapshot of all roles, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    roles: HashMap<DbId, RoleEntry>,
}

impl RoleRegistry {
    pub fn from_entries(entries: impl IntoIterator<Item = RoleEntry>) -> Self {
        Self {
            roles: entries.into_iter().map(|r| (r.id, r)).collect(),
        }
    }

    pub fn get(&self, id: DbId) -> Option<&RoleEntry> {
        self.roles.get(&id)
    }

    pub fn role_name(&self, id: DbId) -> Option<&str> {
        self.roles.get(&id).map(|r| r.name.as_str())
    }

    /// Names of the given role ids, skipping ids the registry does not know.
    pub fn role_names(&self, role_ids: &[DbId]) -> Vec<String> {
        role_ids
            .iter()
            .filter_map(|id| self.role_name(*id))
            .map(str::to_string)
            .collect()
    }

    /// True if any of `role_ids` is the super-admin role.
    pub fn is_super_admin(&self, role_ids: &[DbId]) -> bool {
        role_ids
            .iter()
            .filter_map(|id| self.roles.get(id))
            .any(RoleEntry::is_super_admin)
    }

    /// Permission check combining role grants with direct grants.
    ///
    /// Super-admins pass unconditionally. Unknown role ids grant nothing.
    pub fn has_permission(
        &self,
        role_ids: &[DbId],
        direct_permissions: &[String],
        permission: &str,
    ) -> bool {
        if self.is_super_admin(role_ids) {
            return true;
        }
        if direct_permissions.iter().any(|p| p == permission) {
            return true;
        }
        role_ids
            .iter()
            .filter_map(|id| self.roles.get(id))
            .any(|r| r.permissions.contains(permission))
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: DbId, name: &str, perms: &[&str]) -> RoleEntry {
        RoleEntry {
            id,
            name: name.to_string(),
            permissions: perms.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn registry() -> RoleRegistry {
        RoleRegistry::from_entries([
            entry(1, "SAdmin", &[]),
            entry(2, "teacher", &["permissions", "classes"]),
            entry(3, "student", &[]),
        ])
    }

    #[test]
    fn super_admin_bypasses_permissions() {
        let reg = registry();
        assert!(reg.is_super_admin(&[3, 1]));
        assert!(reg.has_permission(&[1], &[], "anything"));
    }

    #[test]
    fn super_admin_match_is_exact() {
        let reg = RoleRegistry::from_entries([entry(9, "sadmin", &[]), entry(10, "SADMIN", &[])]);
        assert!(!reg.is_super_admin(&[9, 10]));
        assert!(!reg.has_permission(&[9], &[], MANAGE_PERMISSION));
    }

    #[test]
    fn role_permission_grants_access() {
        let reg = registry();
        assert!(reg.has_permission(&[2], &[], MANAGE_PERMISSION));
        assert!(!reg.has_permission(&[3], &[], MANAGE_PERMISSION));
    }

    #[test]
    fn direct_permission_grants_access() {
        let reg = registry();
        assert!(reg.has_permission(&[3], &["permissions".to_string()], MANAGE_PERMISSION));
    }

    #[test]
    fn unknown_role_ids_grant_nothing() {
        let reg = registry();
        assert!(!reg.is_super_admin(&[42]));
        assert!(!reg.has_permission(&[42], &[], "classes"));
        assert!(reg.role_names(&[42, 3]) == vec!["student".to_string()]);
    }
}
