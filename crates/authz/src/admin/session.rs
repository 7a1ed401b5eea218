use super::{ClinicAccessAdmin, RoleEditor};
use crate::backend::SharedBackend;
use crate::error::{AdminError, AdminResult, Resource};
use crate::model::{Clinic, Role, User};
use crate::resolver::PermissionResolver;
use crate::{ClinicAccessMap, RolePermissionMap};
use clinic_types::{ClinicId, PermissionId, RoleId, UserId};

/// One administrator's working state against a backend.
///
/// Holds the fetched catalog, roles, users and clinics together with the draft role edits and
/// the clinic-access cache. Dropping the session, or calling
/// [`reset_session_cache`](AdminSession::reset_session_cache), discards all of it.
pub struct AdminSession {
    backend: SharedBackend,
    roles: RoleEditor,
    clinic_access: ClinicAccessAdmin,
    users: Vec<User>,
    clinics: Vec<Clinic>,
}

impl std::fmt::Debug for AdminSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSession")
            .field("roles", &self.roles)
            .field("clinic_access", &self.clinic_access)
            .field("users", &self.users.len())
            .field("clinics", &self.clinics.len())
            .finish_non_exhaustive()
    }
}

impl AdminSession {
    /// Fetch everything the administration views need.
    ///
    /// # Errors
    ///
    /// [`AdminError::Fetch`] naming the first read that failed.
    pub async fn load(backend: SharedBackend) -> AdminResult<Self> {
        let roles = RoleEditor::load(backend.as_ref()).await?;
        let users = backend
            .list_users()
            .await
            .map_err(AdminError::fetch(Resource::Users))?;
        let clinics = backend
            .list_clinics()
            .await
            .map_err(AdminError::fetch(Resource::Clinics))?;

        tracing::debug!(
            roles = roles.list_roles().count(),
            users = users.len(),
            clinics = clinics.len(),
            "admin session loaded"
        );

        Ok(Self {
            clinic_access: ClinicAccessAdmin::new(backend.clone()),
            backend,
            roles,
            users,
            clinics,
        })
    }

    pub fn roles(&self) -> &RoleEditor {
        &self.roles
    }

    pub fn roles_mut(&mut self) -> &mut RoleEditor {
        &mut self.roles
    }

    pub fn clinic_access(&self) -> &ClinicAccessAdmin {
        &self.clinic_access
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn clinics(&self) -> &[Clinic] {
        &self.clinics
    }

    pub fn user(&self, id: &UserId) -> AdminResult<&User> {
        self.users
            .iter()
            .find(|user| &user.id == id)
            .ok_or_else(|| AdminError::UnknownUser(id.clone()))
    }

    pub fn clinic(&self, id: &ClinicId) -> Option<&Clinic> {
        self.clinics.iter().find(|clinic| &clinic.id == id)
    }

    /// Save the draft of `role` through this session's backend.
    pub async fn save_role(&mut self, role: &RoleId) -> AdminResult<Role> {
        self.roles.save_role(self.backend.as_ref(), role).await
    }

    /// Saved role permissions and the currently cached clinic access, for building a
    /// [`PermissionResolver`].
    pub fn resolver_inputs(&self) -> (RolePermissionMap, ClinicAccessMap) {
        (self.roles.role_map(), self.clinic_access.snapshot())
    }

    /// Whether `user` holds `permission` with the saved (not draft) role permissions.
    pub fn preview_access(&self, user: &UserId, permission: &PermissionId) -> AdminResult<bool> {
        let user = self.user(user)?;
        let (roles, access) = self.resolver_inputs();
        Ok(PermissionResolver::new(&roles, &access).can_access(user, permission))
    }

    /// Discard draft edits and every cached clinic-access entry.
    pub fn reset_session_cache(&mut self) {
        self.roles.discard_all();
        self.clinic_access.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AdminBackend, DirectoryBackend};
    use crate::directory::{tests::SAMPLE, Directory};
    use crate::error::{BackendError, BackendResult};
    use crate::model::Permission;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn shared() -> SharedBackend {
        Arc::new(DirectoryBackend::new(Directory::parse(SAMPLE).unwrap()))
    }

    fn perm(id: &str) -> PermissionId {
        PermissionId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn load_fetches_every_resource() {
        let session = AdminSession::load(shared()).await.unwrap();
        assert_eq!(session.users().len(), 4);
        assert_eq!(session.clinics().len(), 3);
        // super_admin is hidden from the editor.
        assert_eq!(session.roles().list_roles().count(), 3);
        assert!(session.user(&UserId::parse("ghost").unwrap()).is_err());
    }

    #[tokio::test]
    async fn saved_roles_feed_the_preview() {
        let mut session = AdminSession::load(shared()).await.unwrap();
        let nurse = RoleId::parse("3").unwrap();
        let n1 = UserId::parse("n1").unwrap();

        session
            .roles_mut()
            .toggle_permission(&nurse, &perm("invoices.view"))
            .unwrap();
        // Drafts do not affect access until saved.
        assert!(!session.preview_access(&n1, &perm("invoices.view")).unwrap());

        session.save_role(&nurse).await.unwrap();
        assert!(session.preview_access(&n1, &perm("invoices.view")).unwrap());
    }

    #[tokio::test]
    async fn reset_discards_drafts_and_cache() {
        let mut session = AdminSession::load(shared()).await.unwrap();
        let nurse = RoleId::parse("3").unwrap();
        let n1 = UserId::parse("n1").unwrap();

        session
            .roles_mut()
            .toggle_permission(&nurse, &perm("invoices.view"))
            .unwrap();
        session
            .clinic_access()
            .load_user_clinic_access(&n1)
            .await
            .unwrap();

        session.reset_session_cache();
        assert!(!session.roles().has_unsaved_changes(&nurse).unwrap());
        assert!(session.clinic_access().cached(&n1).is_none());
    }

    /// Fails only the user listing.
    struct NoUsers(DirectoryBackend);

    #[async_trait]
    impl AdminBackend for NoUsers {
        async fn list_permissions(&self) -> BackendResult<Vec<Permission>> {
            self.0.list_permissions().await
        }
        async fn list_roles(&self) -> BackendResult<Vec<Role>> {
            self.0.list_roles().await
        }
        async fn replace_role_permissions(
            &self,
            role: &RoleId,
            permissions: &BTreeSet<PermissionId>,
        ) -> BackendResult<Role> {
            self.0.replace_role_permissions(role, permissions).await
        }
        async fn list_users(&self) -> BackendResult<Vec<User>> {
            Err(BackendError::Unavailable("users offline".into()))
        }
        async fn list_clinics(&self) -> BackendResult<Vec<Clinic>> {
            self.0.list_clinics().await
        }
        async fn user_clinic_access(&self, user: &UserId) -> BackendResult<BTreeSet<ClinicId>> {
            self.0.user_clinic_access(user).await
        }
        async fn grant_clinic_access(&self, user: &UserId, clinic: &ClinicId) -> BackendResult<()> {
            self.0.grant_clinic_access(user, clinic).await
        }
        async fn revoke_clinic_access(
            &self,
            user: &UserId,
            clinic: &ClinicId,
        ) -> BackendResult<()> {
            self.0.revoke_clinic_access(user, clinic).await
        }
    }

    #[tokio::test]
    async fn failed_fetch_names_the_resource() {
        let backend: SharedBackend =
            Arc::new(NoUsers(DirectoryBackend::new(Directory::parse(SAMPLE).unwrap())));
        let err = AdminSession::load(backend).await.unwrap_err();
        assert!(format!("{err}").contains("users"));
        assert!(matches!(
            err,
            AdminError::Fetch {
                resource: Resource::Users,
                ..
            }
        ));
    }
}
