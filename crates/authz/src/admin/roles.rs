//! Role-permission editing.
//!
//! [`RoleEditor`] holds a local draft of each editable role's permission set. Toggling and bulk
//! selection only touch the draft; [`RoleEditor::save_role`] sends the full draft to the backend
//! in one call.
//!
//! Bulk selection is scoped to the active text filter: with a filter that matches `{p1, p3}` out
//! of `{p1, p2, p3}`, "select all" adds exactly `p1` and `p3` and leaves `p2` as it was.

use crate::backend::AdminBackend;
use crate::catalog::PermissionCatalog;
use crate::error::{AdminError, AdminResult, MutationAction, Resource};
use crate::model::{Permission, Role};
use crate::roles::RolePermissionMap;
use clinic_types::{PermissionId, RoleId};
use std::collections::BTreeSet;

#[derive(Clone, Debug)]
struct RoleDraft {
    saved: Role,
    draft: BTreeSet<PermissionId>,
}

/// Local, unsaved edits to role permission sets.
#[derive(Clone, Debug)]
pub struct RoleEditor {
    catalog: PermissionCatalog,
    editable: Vec<RoleDraft>,
    /// Roles that are shown to the resolver but never offered for editing.
    locked: Vec<Role>,
    filter: String,
}

impl RoleEditor {
    pub fn new(catalog: PermissionCatalog, roles: Vec<Role>) -> Self {
        let (editable, locked): (Vec<_>, Vec<_>) =
            roles.into_iter().partition(Role::is_editable);
        Self {
            catalog,
            editable: editable
                .into_iter()
                .map(|saved| RoleDraft {
                    draft: saved.effective_permissions.clone(),
                    saved,
                })
                .collect(),
            locked,
            filter: String::new(),
        }
    }

    /// Fetch the catalog and roles from `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::Fetch`] naming whichever read failed. Nothing is cached on failure,
    /// so the call can simply be retried.
    pub async fn load(backend: &dyn AdminBackend) -> AdminResult<Self> {
        let permissions = backend
            .list_permissions()
            .await
            .map_err(AdminError::fetch(Resource::Permissions))?;
        let catalog = PermissionCatalog::new(permissions).map_err(|e| AdminError::Fetch {
            resource: Resource::Permissions,
            source: e.into(),
        })?;
        let roles = backend
            .list_roles()
            .await
            .map_err(AdminError::fetch(Resource::Roles))?;
        Ok(Self::new(catalog, roles))
    }

    /// Editable roles as last saved, in backend order. `super_admin` is never listed.
    pub fn list_roles(&self) -> impl Iterator<Item = &Role> {
        self.editable.iter().map(|entry| &entry.saved)
    }

    pub fn list_permissions(&self) -> &PermissionCatalog {
        &self.catalog
    }

    /// Every role, editable or not, as last saved.
    pub fn role_map(&self) -> RolePermissionMap {
        RolePermissionMap::from_roles(
            self.editable
                .iter()
                .map(|entry| &entry.saved)
                .chain(self.locked.iter()),
        )
    }

    pub fn set_filter(&mut self, query: impl Into<String>) {
        self.filter = query.into();
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Permissions passing the active filter, in catalog order.
    pub fn visible_permissions(&self) -> Vec<&Permission> {
        self.catalog.filter(&self.filter)
    }

    /// Permissions passing the active filter, grouped by category.
    pub fn permissions_by_category(&self) -> Vec<(&str, Vec<&Permission>)> {
        self.catalog.by_category(&self.filter)
    }

    fn entry(&self, role: &RoleId) -> AdminResult<&RoleDraft> {
        if let Some(entry) = self.editable.iter().find(|entry| &entry.saved.id == role) {
            return Ok(entry);
        }
        Err(self.missing(role))
    }

    fn entry_mut(&mut self, role: &RoleId) -> AdminResult<&mut RoleDraft> {
        let missing = self.missing(role);
        self.editable
            .iter_mut()
            .find(|entry| &entry.saved.id == role)
            .ok_or(missing)
    }

    fn missing(&self, role: &RoleId) -> AdminError {
        match self.locked.iter().find(|locked| &locked.id == role) {
            Some(locked) => AdminError::RoleNotEditable(locked.name.clone()),
            None => AdminError::UnknownRole(role.clone()),
        }
    }

    /// The unsaved permission set of `role`.
    pub fn draft(&self, role: &RoleId) -> AdminResult<&BTreeSet<PermissionId>> {
        self.entry(role).map(|entry| &entry.draft)
    }

    /// Flip `permission` in the draft of `role`. Returns whether it is now granted.
    ///
    /// # Errors
    ///
    /// [`AdminError::UnknownPermission`] if the catalog does not list `permission`, and
    /// [`AdminError::UnknownRole`] / [`AdminError::RoleNotEditable`] for a bad role.
    pub fn toggle_permission(
        &mut self,
        role: &RoleId,
        permission: &PermissionId,
    ) -> AdminResult<bool> {
        if !self.catalog.contains(permission) {
            return Err(AdminError::UnknownPermission(permission.clone()));
        }
        let entry = self.entry_mut(role)?;
        if entry.draft.remove(permission) {
            Ok(false)
        } else {
            entry.draft.insert(permission.clone());
            Ok(true)
        }
    }

    fn visible_ids(&self) -> Vec<PermissionId> {
        self.visible_permissions()
            .into_iter()
            .map(|p| p.id.clone())
            .collect()
    }

    /// Add every permission passing the active filter to the draft of `role`.
    /// Returns how many were newly added.
    pub fn select_all_visible(&mut self, role: &RoleId) -> AdminResult<usize> {
        let visible = self.visible_ids();
        let entry = self.entry_mut(role)?;
        Ok(visible
            .into_iter()
            .filter(|id| entry.draft.insert(id.clone()))
            .count())
    }

    /// Remove every permission passing the active filter from the draft of `role`.
    /// Returns how many were removed.
    pub fn deselect_all_visible(&mut self, role: &RoleId) -> AdminResult<usize> {
        let visible = self.visible_ids();
        let entry = self.entry_mut(role)?;
        Ok(visible
            .iter()
            .filter(|id| entry.draft.remove(*id))
            .count())
    }

    pub fn has_unsaved_changes(&self, role: &RoleId) -> AdminResult<bool> {
        self.entry(role)
            .map(|entry| entry.draft != entry.saved.effective_permissions)
    }

    /// Throw away the draft of `role`, returning it to the last saved state.
    pub fn discard_changes(&mut self, role: &RoleId) -> AdminResult<()> {
        let entry = self.entry_mut(role)?;
        entry.draft = entry.saved.effective_permissions.clone();
        Ok(())
    }

    /// Throw away every draft and clear the filter.
    pub fn discard_all(&mut self) {
        for entry in &mut self.editable {
            entry.draft = entry.saved.effective_permissions.clone();
        }
        self.filter.clear();
    }

    /// Send the draft of `role` to the backend as its full permission set.
    ///
    /// On success the role returned by the backend replaces the saved copy and the draft is
    /// reset to it. On failure the draft is kept untouched, so the caller can retry the save or
    /// call [`discard_changes`](RoleEditor::discard_changes).
    ///
    /// # Errors
    ///
    /// [`AdminError::Mutation`] if the backend rejects or fails the write.
    pub async fn save_role(
        &mut self,
        backend: &dyn AdminBackend,
        role: &RoleId,
    ) -> AdminResult<Role> {
        let draft = self.entry(role)?.draft.clone();

        let stored = match backend.replace_role_permissions(role, &draft).await {
            Ok(stored) => stored,
            Err(source) => {
                tracing::warn!(role = %role, error = %source, "saving role permissions failed");
                return Err(AdminError::Mutation {
                    action: MutationAction::SaveRolePermissions,
                    source,
                });
            }
        };

        let entry = self.entry_mut(role)?;
        entry.draft = stored.effective_permissions.clone();
        entry.saved = stored.clone();
        Ok(stored)
    }
}
