//! Permission catalog.
//!
//! The catalog is the list of every permission identifier the tenant knows about, in display
//! order, grouped by category. Roles and navigation entries may only reference identifiers that
//! appear here; that is checked when a directory is loaded.

use crate::error::{DirectoryError, DirectoryResult};
use crate::model::Permission;
use clinic_types::{NonEmptyText, PermissionId};
use std::collections::HashMap;

/// Built-in catalog of the clinic application: `(id, name, category)`.
const BUILTIN_PERMISSIONS: &[(&str, &str, &str)] = &[
    ("patients.view", "View patients", "Patients"),
    ("patients.create", "Register patients", "Patients"),
    ("patients.edit", "Edit patient records", "Patients"),
    ("patients.delete", "Delete patients", "Patients"),
    ("appointments.view", "View appointments", "Appointments"),
    ("appointments.create", "Book appointments", "Appointments"),
    ("appointments.edit", "Reschedule appointments", "Appointments"),
    ("appointments.cancel", "Cancel appointments", "Appointments"),
    ("invoices.view", "View invoices", "Billing"),
    ("invoices.create", "Create invoices", "Billing"),
    ("invoices.edit", "Edit invoices", "Billing"),
    ("payments.record", "Record payments", "Billing"),
    ("inventory.view", "View inventory", "Inventory"),
    ("inventory.manage", "Manage stock", "Inventory"),
    ("staff.view", "View staff", "Staff"),
    ("staff.manage", "Manage staff", "Staff"),
    ("lab_tests.view", "View lab test reports", "Laboratory"),
    ("lab_tests.manage", "Manage lab tests", "Laboratory"),
    ("dental_charts.view", "View dental charts", "Dental"),
    ("dental_charts.edit", "Edit dental charts", "Dental"),
    ("analytics.view", "View analytics dashboards", "Analytics"),
    ("reports.view", "View reports", "Analytics"),
    ("reports.export", "Export reports", "Analytics"),
    ("clinics.view", "View clinics", "Clinics"),
    ("clinics.manage", "Manage clinics", "Clinics"),
    ("roles.view", "View roles and permissions", "Administration"),
    ("roles.manage", "Edit role permissions", "Administration"),
    ("users.view", "View users", "Administration"),
    ("users.manage", "Manage users and clinic access", "Administration"),
    ("settings.view", "View settings", "Settings"),
    ("settings.manage", "Change settings", "Settings"),
];

/// An ordered, duplicate-free list of permissions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PermissionCatalog {
    entries: Vec<Permission>,
    index: HashMap<PermissionId, usize>,
}

impl PermissionCatalog {
    /// Build a catalog, rejecting duplicate identifiers.
    pub fn new(entries: Vec<Permission>) -> DirectoryResult<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, permission) in entries.iter().enumerate() {
            if index.insert(permission.id.clone(), position).is_some() {
                return Err(DirectoryError::Duplicate {
                    kind: "permission",
                    id: permission.id.to_string(),
                });
            }
        }
        Ok(Self { entries, index })
    }

    /// The catalog shipped with the clinic application.
    pub fn builtin() -> DirectoryResult<Self> {
        let entries = BUILTIN_PERMISSIONS
            .iter()
            .map(|(id, name, category)| {
                let schema = |message: String| DirectoryError::Schema {
                    path: format!("builtin.{id}"),
                    message,
                };
                Ok(Permission {
                    id: PermissionId::parse(id).map_err(|e| schema(e.to_string()))?,
                    name: NonEmptyText::new(name).map_err(|e| schema(e.to_string()))?,
                    category: NonEmptyText::new(category).map_err(|e| schema(e.to_string()))?,
                })
            })
            .collect::<DirectoryResult<Vec<_>>>()?;
        Self::new(entries)
    }

    pub fn contains(&self, id: &PermissionId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &PermissionId) -> Option<&Permission> {
        self.index.get(id).map(|&position| &self.entries[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.entries.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &PermissionId> {
        self.entries.iter().map(|p| &p.id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Permissions matching a free-text filter, in catalog order.
    ///
    /// Matching is a case-insensitive substring test against the identifier, display name and
    /// category. A blank filter matches everything.
    pub fn filter(&self, query: &str) -> Vec<&Permission> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.entries.iter().collect();
        }
        self.entries
            .iter()
            .filter(|p| {
                p.id.as_str().contains(&needle)
                    || p.name.as_str().to_lowercase().contains(&needle)
                    || p.category.as_str().to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Filtered permissions grouped by category, categories in first-seen order.
    pub fn by_category(&self, query: &str) -> Vec<(&str, Vec<&Permission>)> {
        let mut groups: Vec<(&str, Vec<&Permission>)> = Vec::new();
        for permission in self.filter(query) {
            let category = permission.category.as_str();
            match groups.iter_mut().find(|(name, _)| *name == category) {
                Some((_, members)) => members.push(permission),
                None => groups.push((category, vec![permission])),
            }
        }
        groups
    }

    pub fn into_vec(self) -> Vec<Permission> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permission(id: &str, name: &str, category: &str) -> Permission {
        Permission {
            id: PermissionId::parse(id).unwrap(),
            name: NonEmptyText::new(name).unwrap(),
            category: NonEmptyText::new(category).unwrap(),
        }
    }

    #[test]
    fn builtin_catalog_parses() {
        let catalog = PermissionCatalog::builtin().expect("builtin catalog should be valid");
        assert_eq!(catalog.len(), BUILTIN_PERMISSIONS.len());
        assert!(catalog.contains(&PermissionId::parse("patients.view").unwrap()));
    }

    #[test]
    fn duplicate_identifiers_are_rejected() {
        let err = PermissionCatalog::new(vec![
            permission("patients.view", "View", "Patients"),
            permission("patients.view", "View again", "Patients"),
        ])
        .unwrap_err();
        assert!(matches!(err, DirectoryError::Duplicate { kind: "permission", .. }));
    }

    #[test]
    fn filter_matches_id_name_and_category_case_insensitively() {
        let catalog = PermissionCatalog::new(vec![
            permission("patients.view", "View patients", "Patients"),
            permission("invoices.view", "View invoices", "Billing"),
            permission("payments.record", "Record payments", "Billing"),
        ])
        .unwrap();

        let ids = |query: &str| -> Vec<String> {
            catalog
                .filter(query)
                .into_iter()
                .map(|p| p.id.to_string())
                .collect()
        };

        assert_eq!(ids("BILLING"), vec!["invoices.view", "payments.record"]);
        assert_eq!(ids("patients.v"), vec!["patients.view"]);
        assert_eq!(ids("record"), vec!["payments.record"]);
        assert_eq!(ids("  ").len(), 3);
        assert!(ids("inventory").is_empty());
    }

    #[test]
    fn by_category_keeps_catalog_order() {
        let catalog = PermissionCatalog::builtin().unwrap();
        let groups = catalog.by_category("view");

        let names: Vec<&str> = groups.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.first(), Some(&"Patients"));

        let analytics = groups
            .iter()
            .find(|(name, _)| *name == "Analytics")
            .map(|(_, members)| members.iter().map(|p| p.id.as_str()).collect::<Vec<_>>())
            .unwrap();
        assert_eq!(analytics, vec!["analytics.view", "reports.view"]);
    }
}
