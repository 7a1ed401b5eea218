//! Role-permission map.

use crate::model::Role;
use clinic_types::{PermissionId, RoleName};
use std::collections::{BTreeSet, HashMap};

/// Role slug -> granted permissions, keyed the way users reference roles.
///
/// Entries are whole [`Role`]s. Updates replace a role outright so a reader never sees a
/// permission set that is half old and half new.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RolePermissionMap {
    roles: HashMap<RoleName, Role>,
}

impl RolePermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_roles<'a>(roles: impl IntoIterator<Item = &'a Role>) -> Self {
        Self {
            roles: roles
                .into_iter()
                .map(|role| (role.name.clone(), role.clone()))
                .collect(),
        }
    }

    pub fn role(&self, name: &RoleName) -> Option<&Role> {
        self.roles.get(name)
    }

    pub fn permissions_for(&self, name: &RoleName) -> Option<&BTreeSet<PermissionId>> {
        self.roles.get(name).map(|role| &role.effective_permissions)
    }

    /// Whether the stored permission set of `name` contains `permission`.
    ///
    /// This is the raw map lookup. Access decisions go through
    /// [`PermissionResolver`](crate::resolver::PermissionResolver), which applies the privileged
    /// bypass first.
    pub fn grants(&self, name: &RoleName, permission: &PermissionId) -> bool {
        self.permissions_for(name)
            .is_some_and(|permissions| permissions.contains(permission))
    }

    /// Insert or replace a role, returning the previous entry.
    pub fn replace(&mut self, role: Role) -> Option<Role> {
        self.roles.insert(role.name.clone(), role)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
