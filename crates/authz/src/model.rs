//! Domain records consumed by the resolver and edited by the administration surface.
//!
//! These are domain-level carriers with validated fields. The on-disk shape lives in
//! [`crate::directory`] and the REST shape in `api-shared`.

use crate::constants::SUPER_ADMIN_ROLE;
use clinic_types::{
    ClinicId, EmailAddress, NonEmptyText, PermissionId, RoleId, RoleName, UserId,
};
use std::collections::BTreeSet;

/// A permission catalog entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permission {
    pub id: PermissionId,
    /// Human-readable label, e.g. "View patients".
    pub name: NonEmptyText,
    /// Grouping shown in the administration console, e.g. "Patients".
    pub category: NonEmptyText,
}

/// A role and the permissions it currently grants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    /// Slug users reference, e.g. `nurse`.
    pub name: RoleName,
    pub display_name: NonEmptyText,
    /// Predefined by the platform rather than created by a clinic administrator.
    pub is_system_role: bool,
    pub effective_permissions: BTreeSet<PermissionId>,
}

impl Role {
    /// Whether the role may be offered for editing.
    ///
    /// `super_admin` always bypasses checks, so its stored permission set is display-only.
    pub fn is_editable(&self) -> bool {
        self.name.as_str() != SUPER_ADMIN_ROLE
    }
}

/// A staff account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: NonEmptyText,
    pub email: EmailAddress,
    pub role: RoleName,
    pub is_active: bool,
}

/// A tenant-scoped clinic location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clinic {
    pub id: ClinicId,
    pub name: NonEmptyText,
    pub code: NonEmptyText,
    pub is_active: bool,
}
