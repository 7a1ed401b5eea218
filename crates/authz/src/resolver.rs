//! Permission resolution.
//!
//! [`PermissionResolver`] answers yes/no questions about a user over data the caller has already
//! loaded: the role-permission map and the user-clinic access map. It performs no I/O, holds no
//! mutable state and cannot fail.
//!
//! Resolution is fail-closed. A user whose role is missing from the map, a permission the catalog
//! has never heard of, or a user without clinic grants all resolve to "denied". Inactive users are
//! denied every check, privileged or not.
//!
//! ## Privileged roles
//!
//! Users holding one of [`PRIVILEGED_ROLES`] are granted every permission and every clinic before
//! any map is consulted. [`is_privileged`] is the only place that decision is made.

use crate::access::ClinicAccessMap;
use crate::catalog::PermissionCatalog;
use crate::constants::PRIVILEGED_ROLES;
use crate::model::User;
use crate::roles::RolePermissionMap;
use clinic_types::{ClinicId, PermissionId, RoleName};
use std::collections::BTreeSet;

/// Whether holders of `role` bypass permission and clinic checks.
pub fn is_privileged(role: &RoleName) -> bool {
    PRIVILEGED_ROLES.contains(&role.as_str())
}

/// Read-only access decisions over borrowed authorisation data.
#[derive(Clone, Copy, Debug)]
pub struct PermissionResolver<'a> {
    roles: &'a RolePermissionMap,
    clinic_access: &'a ClinicAccessMap,
}

impl<'a> PermissionResolver<'a> {
    pub fn new(roles: &'a RolePermissionMap, clinic_access: &'a ClinicAccessMap) -> Self {
        Self {
            roles,
            clinic_access,
        }
    }

    /// Decision that holds regardless of the maps, if any.
    fn short_circuit(user: &User) -> Option<bool> {
        if !user.is_active {
            return Some(false);
        }
        if is_privileged(&user.role) {
            return Some(true);
        }
        None
    }

    /// Whether `user` holds `permission`.
    pub fn can_access(&self, user: &User, permission: &PermissionId) -> bool {
        Self::short_circuit(user).unwrap_or_else(|| self.roles.grants(&user.role, permission))
    }

    /// Whether `user` holds at least one of `permissions`.
    ///
    /// An empty input is `false` for every user.
    pub fn can_access_any<'p>(
        &self,
        user: &User,
        permissions: impl IntoIterator<Item = &'p PermissionId>,
    ) -> bool {
        permissions
            .into_iter()
            .any(|permission| self.can_access(user, permission))
    }

    /// Whether `user` holds every one of `permissions`.
    ///
    /// An empty input is `true` for every user (vacuous truth). Callers that want "nothing
    /// required means hidden" must check for emptiness themselves.
    pub fn can_access_all<'p>(
        &self,
        user: &User,
        permissions: impl IntoIterator<Item = &'p PermissionId>,
    ) -> bool {
        permissions
            .into_iter()
            .all(|permission| self.can_access(user, permission))
    }

    /// Whether `user` may operate within `clinic`.
    pub fn can_access_clinic(&self, user: &User, clinic: &ClinicId) -> bool {
        Self::short_circuit(user)
            .unwrap_or_else(|| self.clinic_access.has_access(&user.id, clinic))
    }

    /// The permissions `user` effectively holds, restricted to `catalog`.
    ///
    /// Privileged users get the full catalog; stored identifiers the catalog does not know are
    /// never reported.
    pub fn effective_permissions(
        &self,
        user: &User,
        catalog: &PermissionCatalog,
    ) -> BTreeSet<PermissionId> {
        catalog
            .ids()
            .filter(|permission| self.can_access(user, permission))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use clinic_types::{EmailAddress, NonEmptyText, RoleId, UserId};

    fn perm(id: &str) -> PermissionId {
        PermissionId::parse(id).unwrap()
    }

    fn clinic(id: &str) -> ClinicId {
        ClinicId::parse(id).unwrap()
    }

    fn role(name: &str, permissions: &[&str]) -> Role {
        Role {
            id: RoleId::parse(name).unwrap(),
            name: RoleName::parse(name).unwrap(),
            display_name: NonEmptyText::new(name).unwrap(),
            is_system_role: true,
            effective_permissions: permissions.iter().map(|p| perm(p)).collect(),
        }
    }

    fn user(id: &str, role: &str) -> User {
        User {
            id: UserId::parse(id).unwrap(),
            name: NonEmptyText::new(id).unwrap(),
            email: EmailAddress::parse(format!("{id}@clinic.example")).unwrap(),
            role: RoleName::parse(role).unwrap(),
            is_active: true,
        }
    }

    fn fixture() -> (RolePermissionMap, ClinicAccessMap) {
        let roles = RolePermissionMap::from_roles(&[
            role("nurse", &["patients.view", "appointments.view"]),
            role("admin", &[]),
            role("super_admin", &[]),
        ]);
        let mut access = ClinicAccessMap::new();
        access.grant(UserId::parse("n1").unwrap(), clinic("c1"));
        (roles, access)
    }

    #[test]
    fn nurse_scenario() {
        let (roles, access) = fixture();
        let resolver = PermissionResolver::new(&roles, &access);
        let n1 = user("n1", "nurse");

        assert!(resolver.can_access(&n1, &perm("patients.view")));
        assert!(!resolver.can_access(&n1, &perm("invoices.view")));
        assert!(resolver.can_access_any(&n1, &[perm("invoices.view"), perm("patients.view")]));
        assert!(!resolver.can_access_all(&n1, &[perm("invoices.view"), perm("patients.view")]));
        assert!(resolver.can_access_all(&n1, &[perm("appointments.view"), perm("patients.view")]));
    }

    #[test]
    fn privileged_roles_are_granted_everything() {
        let (roles, access) = fixture();
        let resolver = PermissionResolver::new(&roles, &access);

        for role_name in PRIVILEGED_ROLES {
            let u = user("p1", role_name);
            // Neither role's stored set lists these, and one is not in any catalog.
            assert!(resolver.can_access(&u, &perm("invoices.view")));
            assert!(resolver.can_access(&u, &perm("made_up.permission")));
            assert!(resolver.can_access_all(&u, &[perm("a.b"), perm("c.d")]));
        }
    }

    #[test]
    fn super_admin_reaches_clinics_without_grants() {
        let (roles, access) = fixture();
        let resolver = PermissionResolver::new(&roles, &access);
        let sa1 = user("sa1", "super_admin");

        assert!(access.clinics_for(&sa1.id).is_none());
        assert!(resolver.can_access_clinic(&sa1, &clinic("c9")));
    }

    #[test]
    fn clinic_access_follows_grants_for_unprivileged_users() {
        let (roles, access) = fixture();
        let resolver = PermissionResolver::new(&roles, &access);

        assert!(resolver.can_access_clinic(&user("n1", "nurse"), &clinic("c1")));
        assert!(!resolver.can_access_clinic(&user("n1", "nurse"), &clinic("c2")));
        assert!(!resolver.can_access_clinic(&user("n2", "nurse"), &clinic("c1")));
    }

    #[test]
    fn empty_sets_follow_vacuous_truth() {
        let (roles, access) = fixture();
        let resolver = PermissionResolver::new(&roles, &access);
        let none: [PermissionId; 0] = [];

        for u in [user("n1", "nurse"), user("sa1", "super_admin"), user("x", "ghost")] {
            assert!(resolver.can_access_all(&u, &none));
            assert!(!resolver.can_access_any(&u, &none));
        }
    }

    #[test]
    fn missing_role_is_denied() {
        let (roles, access) = fixture();
        let resolver = PermissionResolver::new(&roles, &access);
        let ghost = user("g1", "ghost");

        assert!(!resolver.can_access(&ghost, &perm("patients.view")));
        assert!(!resolver.can_access_clinic(&ghost, &clinic("c1")));
    }

    #[test]
    fn inactive_users_are_denied_even_when_privileged() {
        let (roles, access) = fixture();
        let resolver = PermissionResolver::new(&roles, &access);

        let mut nurse = user("n1", "nurse");
        nurse.is_active = false;
        assert!(!resolver.can_access(&nurse, &perm("patients.view")));
        assert!(!resolver.can_access_clinic(&nurse, &clinic("c1")));

        let mut admin = user("a1", "admin");
        admin.is_active = false;
        assert!(!resolver.can_access(&admin, &perm("patients.view")));
        assert!(!resolver.can_access_clinic(&admin, &clinic("c1")));
    }

    #[test]
    fn effective_permissions_are_limited_to_the_catalog() {
        let (roles, access) = fixture();
        let resolver = PermissionResolver::new(&roles, &access);
        let catalog = PermissionCatalog::builtin().unwrap();

        let nurse = resolver.effective_permissions(&user("n1", "nurse"), &catalog);
        assert_eq!(
            nurse,
            BTreeSet::from([perm("appointments.view"), perm("patients.view")])
        );

        let admin = resolver.effective_permissions(&user("a1", "admin"), &catalog);
        assert_eq!(admin.len(), catalog.len());
    }

    #[test]
    fn is_privileged_covers_exactly_the_bypass_roles() {
        assert!(is_privileged(&RoleName::parse("super_admin").unwrap()));
        assert!(is_privileged(&RoleName::parse("admin").unwrap()));
        assert!(!is_privileged(&RoleName::parse("clinic_admin").unwrap()));
        assert!(!is_privileged(&RoleName::parse("nurse").unwrap()));
    }
}
