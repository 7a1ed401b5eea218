//! JSON request and response bodies.
//!
//! Identifiers travel as plain strings; handlers parse them into the validated core types and
//! reject malformed input with `400 Bad Request`.

use clinic_authz_core::{Clinic, NavigationItem, Permission, Requirement, Role, User};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PermissionDto {
    pub id: String,
    pub name: String,
    pub category: String,
}

impl From<&Permission> for PermissionDto {
    fn from(permission: &Permission) -> Self {
        Self {
            id: permission.id.to_string(),
            name: permission.name.to_string(),
            category: permission.category.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListPermissionsRes {
    pub permissions: Vec<PermissionDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoleDto {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub is_system_role: bool,
    pub is_editable: bool,
    pub permissions: Vec<String>,
}

impl From<&Role> for RoleDto {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id.to_string(),
            name: role.name.to_string(),
            display_name: role.display_name.to_string(),
            is_system_role: role.is_system_role,
            is_editable: role.is_editable(),
            permissions: role
                .effective_permissions
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListRolesRes {
    pub roles: Vec<RoleDto>,
}

/// Full desired permission set of a role. Replaces, never merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReplaceRolePermissionsReq {
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserDto {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.to_string(),
            email: user.email.to_string(),
            role: user.role.to_string(),
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListUsersRes {
    pub users: Vec<UserDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClinicDto {
    pub id: String,
    pub name: String,
    pub code: String,
    pub is_active: bool,
}

impl From<&Clinic> for ClinicDto {
    fn from(clinic: &Clinic) -> Self {
        Self {
            id: clinic.id.to_string(),
            name: clinic.name.to_string(),
            code: clinic.code.to_string(),
            is_active: clinic.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListClinicsRes {
    pub clinics: Vec<ClinicDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClinicAccessRes {
    pub user_id: String,
    pub clinics: Vec<String>,
}

/// How [`CheckReq::permissions`] are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    /// Exactly one permission.
    #[default]
    Single,
    /// At least one permission. An empty list is denied.
    Any,
    /// Every permission. An empty list is allowed.
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckReq {
    pub permissions: Vec<String>,
    #[serde(default)]
    pub mode: CheckMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckRes {
    pub allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NavigationItemDto {
    pub name: String,
    pub route: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Permissions the entry is gated on, for display only.
    pub requires: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavigationItemDto>,
}

impl From<&NavigationItem> for NavigationItemDto {
    fn from(item: &NavigationItem) -> Self {
        let requires = match &item.requirement {
            Requirement::None => Vec::new(),
            requirement => requirement
                .permissions()
                .into_iter()
                .map(ToString::to_string)
                .collect(),
        };
        Self {
            name: item.name.to_string(),
            route: item.route.to_string(),
            icon: item.icon.clone(),
            requires,
            children: item.children.iter().map(Self::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NavigationRes {
    pub items: Vec<NavigationItemDto>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_authz_core::{CombinationMode, PermissionId};

    #[test]
    fn check_mode_defaults_to_single() {
        let req: CheckReq = serde_json::from_str(r#"{"permissions":["patients.view"]}"#).unwrap();
        assert_eq!(req.mode, CheckMode::Single);

        let req: CheckReq =
            serde_json::from_str(r#"{"permissions":[],"mode":"all"}"#).unwrap();
        assert_eq!(req.mode, CheckMode::All);
    }

    #[test]
    fn navigation_dto_lists_requirements_and_children() {
        let child = NavigationItem::new(
            "Export",
            "/analytics/export",
            Requirement::multiple(
                [
                    PermissionId::parse("reports.view").unwrap(),
                    PermissionId::parse("reports.export").unwrap(),
                ],
                CombinationMode::All,
            )
            .unwrap(),
        )
        .unwrap();
        let parent = NavigationItem::new("Analytics", "/analytics", Requirement::None)
            .unwrap()
            .with_children(vec![child]);

        let dto = NavigationItemDto::from(&parent);
        assert!(dto.requires.is_empty());
        assert_eq!(dto.children[0].requires, vec!["reports.export", "reports.view"]);

        let json = serde_json::to_value(&dto).unwrap();
        assert!(json.get("icon").is_none());
    }
}
