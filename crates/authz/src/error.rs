use clinic_types::{PermissionId, RoleId, RoleName, UserId};
use std::fmt;

/// Invalid startup configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    InvalidInput(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading, validating or persisting a directory.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory schema mismatch at {path}: {message}")]
    Schema { path: String, message: String },

    #[error("duplicate {kind}: {id}")]
    Duplicate { kind: &'static str, id: String },

    #[error("{owner} references unknown {kind} {id}")]
    DanglingReference {
        owner: String,
        kind: &'static str,
        id: String,
    },

    #[error("navigation item {name:?} is malformed: {reason}")]
    MalformedNavigation { name: String, reason: &'static str },

    #[error("failed to read directory file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write directory file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize directory: {0}")]
    Serialization(serde_yaml::Error),
}

pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Errors reported by an [`AdminBackend`](crate::backend::AdminBackend).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("role {0} is not editable")]
    NotEditable(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// What an administration fetch was trying to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Permissions,
    Roles,
    Users,
    Clinics,
    ClinicAccess,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Permissions => "permission catalog",
            Resource::Roles => "roles",
            Resource::Users => "users",
            Resource::Clinics => "clinics",
            Resource::ClinicAccess => "clinic access",
        })
    }
}

/// What an administration mutation was trying to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    SaveRolePermissions,
    GrantClinicAccess,
    RevokeClinicAccess,
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationAction::SaveRolePermissions => "save role permissions",
            MutationAction::GrantClinicAccess => "grant clinic access",
            MutationAction::RevokeClinicAccess => "revoke clinic access",
        })
    }
}

/// Errors returned by the administration surface.
///
/// Fetch and mutation failures are separate variants so a caller can always tell a failed save
/// from a successful one and offer the matching retry.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("failed to fetch {resource}: {source}")]
    Fetch {
        resource: Resource,
        #[source]
        source: BackendError,
    },

    #[error("failed to {action}: {source}")]
    Mutation {
        action: MutationAction,
        #[source]
        source: BackendError,
    },

    #[error("unknown role: {0}")]
    UnknownRole(RoleId),

    #[error("role {0} is not editable")]
    RoleNotEditable(RoleName),

    #[error("unknown permission: {0}")]
    UnknownPermission(PermissionId),

    #[error("unknown user: {0}")]
    UnknownUser(UserId),
}

impl AdminError {
    pub(crate) fn fetch(resource: Resource) -> impl FnOnce(BackendError) -> Self {
        move |source| AdminError::Fetch { resource, source }
    }

    pub(crate) fn mutation(action: MutationAction) -> impl FnOnce(BackendError) -> Self {
        move |source| AdminError::Mutation { action, source }
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, AdminError::Fetch { .. })
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, AdminError::Mutation { .. })
    }
}

pub type AdminResult<T> = std::result::Result<T, AdminError>;
