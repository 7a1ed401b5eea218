use super::AdminBackend;
use crate::access::ClinicAccessMap;
use crate::directory::Directory;
use crate::error::{BackendError, BackendResult, DirectoryError, DirectoryResult};
use crate::model::{Clinic, Permission, Role, User};
use async_trait::async_trait;
use clinic_types::{ClinicId, PermissionId, RoleId, UserId};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// In-memory backend over a [`Directory`], optionally written back to a YAML file.
///
/// Each mutation is applied to a copy of the directory, persisted, and only then swapped in. If
/// the write fails the in-memory state is unchanged and the caller gets the error, so memory and
/// disk never disagree about a committed change. Mutations are serialised by the write lock.
#[derive(Debug)]
pub struct DirectoryBackend {
    state: RwLock<Directory>,
    snapshot_path: Option<PathBuf>,
}

impl DirectoryBackend {
    /// A backend that keeps everything in memory.
    pub fn new(directory: Directory) -> Self {
        Self {
            state: RwLock::new(directory),
            snapshot_path: None,
        }
    }

    /// Load `path` and, if `persist` is set, write committed mutations back to it.
    pub async fn open(path: &Path, persist: bool) -> DirectoryResult<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(DirectoryError::FileRead)?;
        let directory = Directory::parse(&text)?;
        tracing::info!(
            path = %path.display(),
            roles = directory.roles.len(),
            users = directory.users.len(),
            clinics = directory.clinics.len(),
            "loaded directory"
        );

        Ok(Self {
            state: RwLock::new(directory),
            snapshot_path: persist.then(|| path.to_path_buf()),
        })
    }

    /// A copy of the current directory.
    pub async fn snapshot(&self) -> Directory {
        self.state.read().await.clone()
    }

    async fn persist(&self, directory: &Directory) -> BackendResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let rendered = directory.render()?;

        // Write beside the target and rename so a crash never leaves a truncated file.
        let tmp = path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, rendered)
            .await
            .map_err(DirectoryError::FileWrite)?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(DirectoryError::FileWrite)?;
        Ok(())
    }

    fn require_user(directory: &Directory, user: &UserId) -> BackendResult<()> {
        match directory.user(user) {
            Some(_) => Ok(()),
            None => Err(BackendError::NotFound {
                kind: "user",
                id: user.to_string(),
            }),
        }
    }

    fn require_clinic(directory: &Directory, clinic: &ClinicId) -> BackendResult<()> {
        match directory.clinic(clinic) {
            Some(_) => Ok(()),
            None => Err(BackendError::NotFound {
                kind: "clinic",
                id: clinic.to_string(),
            }),
        }
    }
}

#[async_trait]
impl AdminBackend for DirectoryBackend {
    async fn list_permissions(&self) -> BackendResult<Vec<Permission>> {
        Ok(self.state.read().await.catalog.iter().cloned().collect())
    }

    async fn list_roles(&self) -> BackendResult<Vec<Role>> {
        Ok(self.state.read().await.roles.clone())
    }

    async fn replace_role_permissions(
        &self,
        role: &RoleId,
        permissions: &BTreeSet<PermissionId>,
    ) -> BackendResult<Role> {
        let mut state = self.state.write().await;

        match state.role(role) {
            None => {
                return Err(BackendError::NotFound {
                    kind: "role",
                    id: role.to_string(),
                })
            }
            Some(existing) if !existing.is_editable() => {
                return Err(BackendError::NotEditable(existing.name.to_string()));
            }
            Some(_) => {}
        }

        if let Some(unknown) = permissions.iter().find(|p| !state.catalog.contains(p)) {
            return Err(BackendError::Rejected(format!(
                "unknown permission {unknown}"
            )));
        }

        let mut next = state.clone();
        let Some(entry) = next.role_mut(role) else {
            return Err(BackendError::NotFound {
                kind: "role",
                id: role.to_string(),
            });
        };
        entry.effective_permissions = permissions.clone();
        let stored = entry.clone();

        self.persist(&next).await?;
        *state = next;

        tracing::info!(
            role = %stored.name,
            permissions = stored.effective_permissions.len(),
            "role permissions replaced"
        );
        Ok(stored)
    }

    async fn list_users(&self) -> BackendResult<Vec<User>> {
        Ok(self.state.read().await.users.clone())
    }

    async fn list_clinics(&self) -> BackendResult<Vec<Clinic>> {
        Ok(self.state.read().await.clinics.clone())
    }

    async fn user_clinic_access(&self, user: &UserId) -> BackendResult<BTreeSet<ClinicId>> {
        let state = self.state.read().await;
        Self::require_user(&state, user)?;
        Ok(state
            .clinic_access
            .clinics_for(user)
            .cloned()
            .unwrap_or_default())
    }

    async fn grant_clinic_access(&self, user: &UserId, clinic: &ClinicId) -> BackendResult<()> {
        let mut state = self.state.write().await;
        Self::require_user(&state, user)?;
        Self::require_clinic(&state, clinic)?;

        if state.clinic_access.has_access(user, clinic) {
            return Ok(());
        }
        let mut next = state.clone();
        next.clinic_access.grant(user.clone(), clinic.clone());
        self.persist(&next).await?;
        *state = next;

        tracing::info!(user = %user, clinic = %clinic, "clinic access granted");
        Ok(())
    }

    async fn revoke_clinic_access(&self, user: &UserId, clinic: &ClinicId) -> BackendResult<()> {
        let mut state = self.state.write().await;
        Self::require_user(&state, user)?;
        Self::require_clinic(&state, clinic)?;

        if !state.clinic_access.has_access(user, clinic) {
            return Ok(());
        }
        let mut next = state.clone();
        next.clinic_access.revoke(user, clinic);
        self.persist(&next).await?;
        *state = next;

        tracing::info!(user = %user, clinic = %clinic, "clinic access revoked");
        Ok(())
    }

    async fn all_clinic_access(&self) -> BackendResult<ClinicAccessMap> {
        let state = self.state.read().await;
        let mut access = state.clinic_access.clone();
        // Users without grants still get an (empty) entry so a full refresh replaces them too.
        for user in &state.users {
            if access.clinics_for(&user.id).is_none() {
                access.replace(user.id.clone(), BTreeSet::new());
            }
        }
        Ok(access)
    }
}
