//! Backend contract consumed by the administration surface.
//!
//! The administration surface never talks to storage directly. Everything it reads or writes
//! goes through [`AdminBackend`], so a REST client, an RPC client or the local
//! [`DirectoryBackend`] are interchangeable.

mod directory;

pub use directory::DirectoryBackend;

use crate::access::ClinicAccessMap;
use crate::error::BackendResult;
use crate::model::{Clinic, Permission, Role, User};
use async_trait::async_trait;
use clinic_types::{ClinicId, PermissionId, RoleId, UserId};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Operations the authorisation core needs from the system of record.
#[async_trait]
pub trait AdminBackend: Send + Sync {
    /// The tenant's permission catalog, in display order.
    async fn list_permissions(&self) -> BackendResult<Vec<Permission>>;

    /// Every role with its currently effective permissions.
    async fn list_roles(&self) -> BackendResult<Vec<Role>>;

    /// Overwrite a role's permission set with `permissions` (the full desired set, not a diff)
    /// and return the role as stored.
    ///
    /// Refuses a role that is not editable with [`BackendError::NotEditable`](crate::BackendError::NotEditable).
    async fn replace_role_permissions(
        &self,
        role: &RoleId,
        permissions: &BTreeSet<PermissionId>,
    ) -> BackendResult<Role>;

    async fn list_users(&self) -> BackendResult<Vec<User>>;

    async fn list_clinics(&self) -> BackendResult<Vec<Clinic>>;

    /// The clinics `user` may access.
    async fn user_clinic_access(&self, user: &UserId) -> BackendResult<BTreeSet<ClinicId>>;

    async fn grant_clinic_access(&self, user: &UserId, clinic: &ClinicId) -> BackendResult<()>;

    async fn revoke_clinic_access(&self, user: &UserId, clinic: &ClinicId) -> BackendResult<()>;

    /// Clinic grants of every user.
    ///
    /// The default walks [`list_users`](AdminBackend::list_users) and fetches each user in turn;
    /// backends with a bulk query should override it.
    async fn all_clinic_access(&self) -> BackendResult<ClinicAccessMap> {
        let mut access = ClinicAccessMap::new();
        for user in self.list_users().await? {
            let clinics = self.user_clinic_access(&user.id).await?;
            access.replace(user.id, clinics);
        }
        Ok(access)
    }
}

/// Backend handle shared between the admin session, REST handlers and the CLI.
pub type SharedBackend = Arc<dyn AdminBackend>;
