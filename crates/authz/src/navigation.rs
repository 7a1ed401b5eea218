//! Navigation and feature gating.
//!
//! A navigation catalog is a static, ordered list of [`NavigationItem`]s, each declaring what it
//! needs to be shown. [`NavigationGate::filter`] reduces it to what one user may see. It is a
//! plain synchronous filter; re-run it whenever the user, their permissions or the catalog
//! changes.
//!
//! The dashboard route is always visible to an active user, whatever it declares. The exception
//! is keyed on the route, so a dashboard entry can still carry a requirement for other consumers.

use crate::error::{DirectoryError, DirectoryResult};
use crate::model::User;
use crate::resolver::PermissionResolver;
use clinic_types::{NonEmptyText, PermissionId};
use std::collections::BTreeSet;

/// How a multi-permission requirement combines its members.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CombinationMode {
    /// Visible if any listed permission is held.
    Any,
    /// Visible only if every listed permission is held.
    All,
}

/// What a navigation entry requires. Exactly one variant holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    None,
    Single(PermissionId),
    Multiple {
        permissions: BTreeSet<PermissionId>,
        mode: CombinationMode,
    },
}

impl Requirement {
    /// A multi-permission requirement. An empty set is rejected: under `All` it would always pass
    /// and under `Any` never, and neither is what an author means.
    pub fn multiple(
        permissions: impl IntoIterator<Item = PermissionId>,
        mode: CombinationMode,
    ) -> Option<Self> {
        let permissions: BTreeSet<_> = permissions.into_iter().collect();
        if permissions.is_empty() {
            return None;
        }
        Some(Requirement::Multiple { permissions, mode })
    }

    /// Every permission this requirement mentions.
    pub fn permissions(&self) -> Vec<&PermissionId> {
        match self {
            Requirement::None => Vec::new(),
            Requirement::Single(permission) => vec![permission],
            Requirement::Multiple { permissions, .. } => permissions.iter().collect(),
        }
    }

    pub fn is_satisfied(&self, resolver: &PermissionResolver<'_>, user: &User) -> bool {
        match self {
            Requirement::None => true,
            Requirement::Single(permission) => resolver.can_access(user, permission),
            Requirement::Multiple {
                permissions,
                mode: CombinationMode::Any,
            } => resolver.can_access_any(user, permissions),
            Requirement::Multiple {
                permissions,
                mode: CombinationMode::All,
            } => resolver.can_access_all(user, permissions),
        }
    }
}

/// A sidebar or feature entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationItem {
    pub name: NonEmptyText,
    pub route: NonEmptyText,
    pub icon: Option<String>,
    pub requirement: Requirement,
    /// Nested entries. A parent that declares children is hidden when none of them survive.
    pub children: Vec<NavigationItem>,
}

impl NavigationItem {
    pub fn new(name: &str, route: &str, requirement: Requirement) -> DirectoryResult<Self> {
        let malformed = |reason| DirectoryError::MalformedNavigation {
            name: name.to_owned(),
            reason,
        };
        let name_text = NonEmptyText::new(name).map_err(|_| malformed("name cannot be empty"))?;
        let route_text = NonEmptyText::new(route).map_err(|_| malformed("route cannot be empty"))?;
        if !route_text.as_str().starts_with('/') {
            return Err(malformed("route must start with '/'"));
        }
        Ok(Self {
            name: name_text,
            route: route_text,
            icon: None,
            requirement,
            children: Vec::new(),
        })
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_owned());
        self
    }

    pub fn with_children(mut self, children: Vec<NavigationItem>) -> Self {
        self.children = children;
        self
    }

    /// This item and all of its descendants, depth first.
    pub fn walk(&self) -> Vec<&NavigationItem> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

fn normalise_route(route: &str) -> &str {
    let trimmed = route.trim();
    match trimmed.trim_end_matches('/') {
        "" => "/",
        stripped => stripped,
    }
}

/// Filters navigation catalogs for one resolver snapshot.
#[derive(Clone, Copy, Debug)]
pub struct NavigationGate<'a> {
    resolver: PermissionResolver<'a>,
    dashboard_route: &'a str,
}

impl<'a> NavigationGate<'a> {
    pub fn new(resolver: PermissionResolver<'a>, dashboard_route: &'a str) -> Self {
        Self {
            resolver,
            dashboard_route,
        }
    }

    fn is_dashboard(&self, item: &NavigationItem) -> bool {
        normalise_route(item.route.as_str()) == normalise_route(self.dashboard_route)
    }

    /// Whether the item's own requirement admits `user`, ignoring children.
    pub fn is_visible(&self, user: &User, item: &NavigationItem) -> bool {
        if !user.is_active {
            return false;
        }
        self.is_dashboard(item) || item.requirement.is_satisfied(&self.resolver, user)
    }

    /// The items `user` may see, in their original order, with children filtered recursively.
    pub fn filter(&self, user: &User, items: &[NavigationItem]) -> Vec<NavigationItem> {
        items
            .iter()
            .filter_map(|item| self.filter_item(user, item))
            .collect()
    }

    fn filter_item(&self, user: &User, item: &NavigationItem) -> Option<NavigationItem> {
        if !self.is_visible(user, item) {
            return None;
        }
        let children = self.filter(user, &item.children);
        if !item.children.is_empty() && children.is_empty() && !self.is_dashboard(item) {
            return None;
        }
        Some(NavigationItem {
            children,
            ..item.clone()
        })
    }
}

/// The clinic application's sidebar.
pub fn builtin_navigation() -> DirectoryResult<Vec<NavigationItem>> {
    fn p(id: &str) -> DirectoryResult<PermissionId> {
        PermissionId::parse(id).map_err(|e| DirectoryError::Schema {
            path: "builtin.navigation".into(),
            message: e.to_string(),
        })
    }
    fn any(ids: &[&str]) -> DirectoryResult<Requirement> {
        multi(ids, CombinationMode::Any)
    }
    fn all(ids: &[&str]) -> DirectoryResult<Requirement> {
        multi(ids, CombinationMode::All)
    }
    fn multi(ids: &[&str], mode: CombinationMode) -> DirectoryResult<Requirement> {
        let permissions = ids.iter().map(|id| p(id)).collect::<DirectoryResult<Vec<_>>>()?;
        Requirement::multiple(permissions, mode).ok_or_else(|| DirectoryError::MalformedNavigation {
            name: "builtin".into(),
            reason: "permission set cannot be empty",
        })
    }
    use Requirement::{None as Open, Single};

    Ok(vec![
        NavigationItem::new("Dashboard", "/dashboard", Single(p("analytics.view")?))?
            .with_icon("layout-dashboard"),
        NavigationItem::new("Patients", "/patients", Single(p("patients.view")?))?
            .with_icon("users"),
        NavigationItem::new("Appointments", "/appointments", Single(p("appointments.view")?))?
            .with_icon("calendar"),
        NavigationItem::new("Billing", "/billing", any(&["invoices.view", "payments.record"])?)?
            .with_icon("receipt"),
        NavigationItem::new("Inventory", "/inventory", Single(p("inventory.view")?))?
            .with_icon("package"),
        NavigationItem::new("Staff", "/staff", Single(p("staff.view")?))?.with_icon("id-card"),
        NavigationItem::new("Lab Tests", "/lab-tests", Single(p("lab_tests.view")?))?
            .with_icon("flask"),
        NavigationItem::new("Dental Chart", "/dental-chart", Single(p("dental_charts.view")?))?
            .with_icon("tooth"),
        NavigationItem::new("Analytics", "/analytics", any(&["analytics.view", "reports.view"])?)?
            .with_icon("chart-bar")
            .with_children(vec![
                NavigationItem::new("Reports", "/analytics/reports", Single(p("reports.view")?))?,
                NavigationItem::new(
                    "Export",
                    "/analytics/export",
                    all(&["reports.view", "reports.export"])?,
                )?,
            ]),
        NavigationItem::new("Clinics", "/clinics", Single(p("clinics.view")?))?
            .with_icon("building"),
        NavigationItem::new("Administration", "/admin", Open)?
            .with_icon("shield")
            .with_children(vec![
                NavigationItem::new("Users", "/admin/users", Single(p("users.view")?))?,
                NavigationItem::new(
                    "Permissions",
                    "/admin/permissions",
                    all(&["roles.view", "roles.manage"])?,
                )?,
                NavigationItem::new("Settings", "/admin/settings", Single(p("settings.view")?))?,
            ]),
    ])
}
