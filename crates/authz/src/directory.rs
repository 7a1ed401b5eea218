//! Directory files.
//!
//! A directory is a complete snapshot of one tenant's authorisation data: the permission catalog,
//! roles, users, clinics, user-clinic grants and (optionally) the navigation catalog. It is the
//! seed and persistence format of [`DirectoryBackend`](crate::backend::DirectoryBackend).
//!
//! ## File layout
//!
//! ```yaml
//! permissions:            # optional; the built-in catalog is used when omitted
//!   - id: patients.view
//!     name: View patients
//!     category: Patients
//! roles:
//!   - id: "2"
//!     name: nurse
//!     display_name: Nurse
//!     is_system_role: true
//!     permissions: [patients.view, appointments.view]
//! users:
//!   - id: n1
//!     name: Nia Nurse
//!     email: nia@clinic.example
//!     role: nurse
//! clinics:
//!   - id: c1
//!     name: Harbour Clinic
//!     code: HRB
//! clinic_access:
//!   n1: [c1]
//! navigation:             # optional; the built-in sidebar is used when omitted
//!   - name: Billing
//!     route: /billing
//!     permissions: [invoices.view, payments.record]
//!     requires_any: true
//! ```
//!
//! Parsing is strict: unknown keys are rejected and schema errors report the failing path. After
//! parsing, [`Directory::validate`] rejects duplicate identifiers and every dangling reference
//! (a user whose role no longer exists, a role or navigation entry naming a permission outside
//! the catalog, a grant for an unknown user or clinic). Broken configuration fails at load time
//! instead of being guessed at during resolution.

use crate::access::ClinicAccessMap;
use crate::catalog::PermissionCatalog;
use crate::error::{DirectoryError, DirectoryResult};
use crate::model::{Clinic, Permission, Role, User};
use crate::navigation::{builtin_navigation, CombinationMode, NavigationItem, Requirement};
use crate::roles::RolePermissionMap;
use clinic_types::{
    ClinicId, EmailAddress, NonEmptyText, PermissionId, RoleId, RoleName, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

// ============================================================================
// Wire model
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DirectoryWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    permissions: Option<Vec<PermissionWire>>,
    #[serde(default)]
    roles: Vec<RoleWire>,
    #[serde(default)]
    users: Vec<UserWire>,
    #[serde(default)]
    clinics: Vec<ClinicWire>,
    #[serde(default)]
    clinic_access: BTreeMap<UserId, Vec<ClinicId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    navigation: Option<Vec<NavigationItemWire>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PermissionWire {
    id: PermissionId,
    name: NonEmptyText,
    category: NonEmptyText,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RoleWire {
    id: RoleId,
    name: RoleName,
    display_name: NonEmptyText,
    #[serde(default)]
    is_system_role: bool,
    #[serde(default)]
    permissions: Vec<PermissionId>,
}

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct UserWire {
    id: UserId,
    name: NonEmptyText,
    email: EmailAddress,
    role: RoleName,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    is_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClinicWire {
    id: ClinicId,
    name: NonEmptyText,
    code: NonEmptyText,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    is_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct NavigationItemWire {
    name: String,
    route: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    permission: Option<PermissionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    permissions: Option<Vec<PermissionId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    requires_any: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<NavigationItemWire>,
}

fn navigation_from_wire(wire: NavigationItemWire) -> DirectoryResult<NavigationItem> {
    let malformed = |reason| DirectoryError::MalformedNavigation {
        name: wire.name.clone(),
        reason,
    };

    let requirement = match (wire.permission, wire.permissions, wire.requires_any) {
        (None, None, None) => Requirement::None,
        (Some(permission), None, None) => Requirement::Single(permission),
        (None, Some(permissions), requires_any) => {
            let mode = if requires_any.unwrap_or(false) {
                CombinationMode::Any
            } else {
                CombinationMode::All
            };
            Requirement::multiple(permissions, mode)
                .ok_or_else(|| malformed("permission set cannot be empty"))?
        }
        (Some(_), Some(_), _) => {
            return Err(malformed("declares both a single permission and a permission set"))
        }
        (_, None, Some(_)) => {
            return Err(malformed("requires_any is only valid with a permission set"))
        }
    };

    let children = wire
        .children
        .into_iter()
        .map(navigation_from_wire)
        .collect::<DirectoryResult<Vec<_>>>()?;

    let mut item = NavigationItem::new(&wire.name, &wire.route, requirement)?.with_children(children);
    item.icon = wire.icon;
    Ok(item)
}

fn navigation_to_wire(item: &NavigationItem) -> NavigationItemWire {
    let (permission, permissions, requires_any) = match &item.requirement {
        Requirement::None => (None, None, None),
        Requirement::Single(permission) => (Some(permission.clone()), None, None),
        Requirement::Multiple { permissions, mode } => (
            None,
            Some(permissions.iter().cloned().collect()),
            Some(*mode == CombinationMode::Any),
        ),
    };
    NavigationItemWire {
        name: item.name.to_string(),
        route: item.route.to_string(),
        icon: item.icon.clone(),
        permission,
        permissions,
        requires_any,
        children: item.children.iter().map(navigation_to_wire).collect(),
    }
}

// ============================================================================
// Domain directory
// ============================================================================

/// A validated authorisation snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directory {
    pub catalog: PermissionCatalog,
    pub roles: Vec<Role>,
    pub users: Vec<User>,
    pub clinics: Vec<Clinic>,
    pub clinic_access: ClinicAccessMap,
    /// `None` means the built-in sidebar.
    pub navigation: Option<Vec<NavigationItem>>,
    /// Whether the catalog came from the file rather than the built-in list.
    explicit_catalog: bool,
}

impl Directory {
    /// Parse and validate directory YAML.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Schema`] with the failing path if the YAML does not match the
    /// wire schema (including invalid identifiers), and the validation errors described on
    /// [`Directory::validate`].
    pub fn parse(yaml_text: &str) -> DirectoryResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let wire = match serde_path_to_error::deserialize::<_, DirectoryWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>".to_string()
                } else {
                    path
                };
                return Err(DirectoryError::Schema {
                    path,
                    message: source.to_string(),
                });
            }
        };

        let directory = Self::from_wire(wire)?;
        directory.validate()?;
        Ok(directory)
    }

    fn from_wire(wire: DirectoryWire) -> DirectoryResult<Self> {
        let explicit_catalog = wire.permissions.is_some();
        let catalog = match wire.permissions {
            Some(entries) => PermissionCatalog::new(
                entries
                    .into_iter()
                    .map(|p| Permission {
                        id: p.id,
                        name: p.name,
                        category: p.category,
                    })
                    .collect(),
            )?,
            None => PermissionCatalog::builtin()?,
        };

        let roles = wire
            .roles
            .into_iter()
            .map(|r| Role {
                id: r.id,
                name: r.name,
                display_name: r.display_name,
                is_system_role: r.is_system_role,
                effective_permissions: r.permissions.into_iter().collect(),
            })
            .collect();

        let users = wire
            .users
            .into_iter()
            .map(|u| User {
                id: u.id,
                name: u.name,
                email: u.email,
                role: u.role,
                is_active: u.is_active,
            })
            .collect();

        let clinics = wire
            .clinics
            .into_iter()
            .map(|c| Clinic {
                id: c.id,
                name: c.name,
                code: c.code,
                is_active: c.is_active,
            })
            .collect();

        let clinic_access = wire
            .clinic_access
            .into_iter()
            .map(|(user, clinics)| (user, clinics.into_iter().collect()))
            .collect();

        let navigation = wire
            .navigation
            .map(|items| {
                items
                    .into_iter()
                    .map(navigation_from_wire)
                    .collect::<DirectoryResult<Vec<_>>>()
            })
            .transpose()?;

        Ok(Self {
            catalog,
            roles,
            users,
            clinics,
            clinic_access,
            navigation,
            explicit_catalog,
        })
    }

    /// Render the directory as YAML text that [`Directory::parse`] accepts.
    pub fn render(&self) -> DirectoryResult<String> {
        let wire = DirectoryWire {
            permissions: self.explicit_catalog.then(|| {
                self.catalog
                    .iter()
                    .map(|p| PermissionWire {
                        id: p.id.clone(),
                        name: p.name.clone(),
                        category: p.category.clone(),
                    })
                    .collect()
            }),
            roles: self
                .roles
                .iter()
                .map(|r| RoleWire {
                    id: r.id.clone(),
                    name: r.name.clone(),
                    display_name: r.display_name.clone(),
                    is_system_role: r.is_system_role,
                    permissions: r.effective_permissions.iter().cloned().collect(),
                })
                .collect(),
            users: self
                .users
                .iter()
                .map(|u| UserWire {
                    id: u.id.clone(),
                    name: u.name.clone(),
                    email: u.email.clone(),
                    role: u.role.clone(),
                    is_active: u.is_active,
                })
                .collect(),
            clinics: self
                .clinics
                .iter()
                .map(|c| ClinicWire {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    code: c.code.clone(),
                    is_active: c.is_active,
                })
                .collect(),
            clinic_access: self
                .clinic_access
                .iter()
                .map(|(user, clinics)| (user.clone(), clinics.iter().cloned().collect()))
                .collect(),
            navigation: self
                .navigation
                .as_ref()
                .map(|items| items.iter().map(navigation_to_wire).collect()),
        };
        serde_yaml::to_string(&wire).map_err(DirectoryError::Serialization)
    }

    /// Read, parse and validate a directory file.
    pub fn load(path: &Path) -> DirectoryResult<Self> {
        let text = std::fs::read_to_string(path).map_err(DirectoryError::FileRead)?;
        Self::parse(&text)
    }

    /// Check uniqueness and referential integrity.
    ///
    /// # Errors
    ///
    /// - [`DirectoryError::Duplicate`] for a repeated role id, role name, user id or clinic id.
    /// - [`DirectoryError::DanglingReference`] for a role or navigation entry naming a permission
    ///   outside the catalog, a user whose role does not exist, or a grant for an unknown user or
    ///   clinic.
    pub fn validate(&self) -> DirectoryResult<()> {
        fn unique<'a>(
            kind: &'static str,
            ids: impl IntoIterator<Item = &'a str>,
        ) -> DirectoryResult<HashSet<&'a str>> {
            let mut seen = HashSet::new();
            for id in ids {
                if !seen.insert(id) {
                    return Err(DirectoryError::Duplicate {
                        kind,
                        id: id.to_owned(),
                    });
                }
            }
            Ok(seen)
        }

        unique("role id", self.roles.iter().map(|r| r.id.as_str()))?;
        let role_names = unique("role name", self.roles.iter().map(|r| r.name.as_str()))?;
        let user_ids = unique("user id", self.users.iter().map(|u| u.id.as_str()))?;
        let clinic_ids = unique("clinic id", self.clinics.iter().map(|c| c.id.as_str()))?;

        for role in &self.roles {
            for permission in &role.effective_permissions {
                if !self.catalog.contains(permission) {
                    return Err(DirectoryError::DanglingReference {
                        owner: format!("role {}", role.name),
                        kind: "permission",
                        id: permission.to_string(),
                    });
                }
            }
        }

        for user in &self.users {
            if !role_names.contains(user.role.as_str()) {
                return Err(DirectoryError::DanglingReference {
                    owner: format!("user {}", user.id),
                    kind: "role",
                    id: user.role.to_string(),
                });
            }
        }

        for (user, clinics) in self.clinic_access.iter() {
            if !user_ids.contains(user.as_str()) {
                return Err(DirectoryError::DanglingReference {
                    owner: "clinic access".into(),
                    kind: "user",
                    id: user.to_string(),
                });
            }
            for clinic in clinics {
                if !clinic_ids.contains(clinic.as_str()) {
                    return Err(DirectoryError::DanglingReference {
                        owner: format!("clinic access of user {user}"),
                        kind: "clinic",
                        id: clinic.to_string(),
                    });
                }
            }
        }

        // The built-in sidebar is checked too when a custom catalog replaces the built-in one.
        let items = self.navigation_items()?;
        for entry in items.iter().flat_map(NavigationItem::walk) {
            for permission in entry.requirement.permissions() {
                if !self.catalog.contains(permission) {
                    return Err(DirectoryError::DanglingReference {
                        owner: format!("navigation item {:?}", entry.name.as_str()),
                        kind: "permission",
                        id: permission.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// The configured navigation catalog, or the built-in sidebar.
    pub fn navigation_items(&self) -> DirectoryResult<Vec<NavigationItem>> {
        match &self.navigation {
            Some(items) => Ok(items.clone()),
            None => builtin_navigation(),
        }
    }

    pub fn role_map(&self) -> RolePermissionMap {
        RolePermissionMap::from_roles(&self.roles)
    }

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| &u.id == id)
    }

    pub fn clinic(&self, id: &ClinicId) -> Option<&Clinic> {
        self.clinics.iter().find(|c| &c.id == id)
    }

    pub fn role(&self, id: &RoleId) -> Option<&Role> {
        self.roles.iter().find(|r| &r.id == id)
    }

    pub(crate) fn role_mut(&mut self, id: &RoleId) -> Option<&mut Role> {
        self.roles.iter_mut().find(|r| &r.id == id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A small tenant used across the crate's tests.
    pub(crate) const SAMPLE: &str = r#"
roles:
  - id: "1"
    name: super_admin
    display_name: Super Admin
    is_system_role: true
  - id: "2"
    name: admin
    display_name: Administrator
    is_system_role: true
  - id: "3"
    name: nurse
    display_name: Nurse
    is_system_role: true
    permissions: [patients.view, appointments.view]
  - id: "4"
    name: receptionist
    display_name: Receptionist
    permissions: [appointments.view, appointments.create, invoices.view]
users:
  - id: sa1
    name: Sam Super
    email: sam@clinic.example
    role: super_admin
  - id: n1
    name: Nia Nurse
    email: nia@clinic.example
    role: nurse
  - id: r1
    name: Rae Reception
    email: rae@clinic.example
    role: receptionist
  - id: r2
    name: Rob Former
    email: rob@clinic.example
    role: receptionist
    is_active: false
clinics:
  - id: c1
    name: Harbour Clinic
    code: HRB
  - id: c2
    name: Hillside Clinic
    code: HLS
  - id: c9
    name: Old Town Clinic
    code: OLD
    is_active: false
clinic_access:
  n1: [c1]
  r1: [c1, c2]
"#;

    #[test]
    fn parses_sample_with_builtin_catalog_and_navigation() {
        let directory = Directory::parse(SAMPLE).expect("sample should parse");
        assert_eq!(directory.roles.len(), 4);
        assert_eq!(directory.users.len(), 4);
        assert!(!directory.catalog.is_empty());
        assert!(directory.navigation.is_none());
        assert!(!directory.navigation_items().unwrap().is_empty());
        assert!(!directory.users[3].is_active);
        assert!(directory.clinic_access.has_access(
            &UserId::parse("r1").unwrap(),
            &ClinicId::parse("c2").unwrap()
        ));
    }

    #[test]
    fn render_round_trips() {
        let directory = Directory::parse(SAMPLE).unwrap();
        let rendered = directory.render().unwrap();
        assert_eq!(Directory::parse(&rendered).unwrap(), directory);
    }

    #[test]
    fn schema_errors_report_the_path() {
        let err = Directory::parse("roles:\n  - id: \"1\"\n    name: Bad Name\n    display_name: X\n")
            .unwrap_err();
        match err {
            DirectoryError::Schema { path, .. } => assert!(path.starts_with("roles[0]"), "{path}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Directory::parse("rolez: []\n").unwrap_err();
        assert!(matches!(err, DirectoryError::Schema { .. }));
    }

    #[test]
    fn user_with_deleted_role_is_rejected() {
        let yaml = r#"
roles: []
users:
  - id: n1
    name: Nia
    email: nia@clinic.example
    role: nurse
"#;
        let err = Directory::parse(yaml).unwrap_err();
        assert!(matches!(
            err,
            DirectoryError::DanglingReference { kind: "role", .. }
        ));
    }

    #[test]
    fn role_referencing_unknown_permission_is_rejected() {
        let yaml = r#"
roles:
  - id: "3"
    name: nurse
    display_name: Nurse
    permissions: [patients.teleport]
"#;
        let err = Directory::parse(yaml).unwrap_err();
        assert!(matches!(
            err,
            DirectoryError::DanglingReference { kind: "permission", .. }
        ));
    }

    #[test]
    fn grants_must_reference_known_users_and_clinics() {
        let yaml = format!("{SAMPLE}\n  ghost: [c1]\n");
        assert!(matches!(
            Directory::parse(&yaml).unwrap_err(),
            DirectoryError::DanglingReference { kind: "user", .. }
        ));

        let yaml = format!("{SAMPLE}\n  sa1: [c404]\n");
        assert!(matches!(
            Directory::parse(&yaml).unwrap_err(),
            DirectoryError::DanglingReference { kind: "clinic", .. }
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let yaml = r#"
clinics:
  - id: c1
    name: One
    code: ONE
  - id: c1
    name: Two
    code: TWO
"#;
        assert!(matches!(
            Directory::parse(yaml).unwrap_err(),
            DirectoryError::Duplicate { kind: "clinic id", .. }
        ));
    }

    #[test]
    fn malformed_navigation_is_rejected() {
        let both = r#"
navigation:
  - name: Billing
    route: /billing
    permission: invoices.view
    permissions: [payments.record]
"#;
        assert!(matches!(
            Directory::parse(both).unwrap_err(),
            DirectoryError::MalformedNavigation { .. }
        ));

        let empty = r#"
navigation:
  - name: Billing
    route: /billing
    permissions: []
"#;
        assert!(matches!(
            Directory::parse(empty).unwrap_err(),
            DirectoryError::MalformedNavigation { .. }
        ));

        let stray_mode = r#"
navigation:
  - name: Billing
    route: /billing
    requires_any: true
"#;
        assert!(matches!(
            Directory::parse(stray_mode).unwrap_err(),
            DirectoryError::MalformedNavigation { .. }
        ));
    }

    #[test]
    fn navigation_must_reference_catalog_permissions() {
        let yaml = r#"
navigation:
  - name: Admin
    route: /admin
    children:
      - name: Vault
        route: /admin/vault
        permission: vault.open
"#;
        assert!(matches!(
            Directory::parse(yaml).unwrap_err(),
            DirectoryError::DanglingReference { kind: "permission", .. }
        ));
    }

    #[test]
    fn builtin_sidebar_is_checked_against_a_custom_catalog() {
        let yaml = r#"
permissions:
  - id: patients.view
    name: View patients
    category: Patients
"#;
        assert!(matches!(
            Directory::parse(yaml).unwrap_err(),
            DirectoryError::DanglingReference { kind: "permission", .. }
        ));

        let with_own_sidebar = r#"
permissions:
  - id: patients.view
    name: View patients
    category: Patients
navigation:
  - name: Patients
    route: /patients
    permission: patients.view
"#;
        assert!(Directory::parse(with_own_sidebar).is_ok());
    }

    #[test]
    fn navigation_modes_are_parsed() {
        let yaml = r#"
navigation:
  - name: Billing
    route: /billing
    permissions: [invoices.view, payments.record]
    requires_any: true
  - name: Export
    route: /export
    permissions: [reports.view, reports.export]
"#;
        let directory = Directory::parse(yaml).unwrap();
        let items = directory.navigation.unwrap();
        assert!(matches!(
            items[0].requirement,
            Requirement::Multiple { mode: CombinationMode::Any, .. }
        ));
        assert!(matches!(
            items[1].requirement,
            Requirement::Multiple { mode: CombinationMode::All, .. }
        ));
    }

    #[test]
    fn duplicate_role_permissions_collapse_to_a_set() {
        let yaml = r#"
roles:
  - id: "3"
    name: nurse
    display_name: Nurse
    permissions: [patients.view, patients.view]
"#;
        let directory = Directory::parse(yaml).unwrap();
        assert_eq!(directory.roles[0].effective_permissions.len(), 1);
    }

    #[test]
    fn demo_seed_is_valid() {
        let directory = Directory::parse(include_str!("../../../data/directory.yaml"))
            .expect("demo directory should parse");
        assert!(directory.role(&RoleId::parse("6").unwrap()).is_some());
        assert!(directory.users.iter().all(|u| directory.role_map().role(&u.role).is_some()));
    }
}
