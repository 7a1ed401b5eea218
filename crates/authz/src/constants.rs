//! Constants used throughout the authorisation core.

/// Role slugs whose holders bypass every permission and clinic check.
pub const PRIVILEGED_ROLES: [&str; 2] = ["super_admin", "admin"];

/// Role slug that is never offered for editing in the administration surface.
pub const SUPER_ADMIN_ROLE: &str = "super_admin";

/// Route of the top-level dashboard, visible to every active user.
pub const DEFAULT_DASHBOARD_ROUTE: &str = "/dashboard";

/// Default directory file when no explicit path is configured.
pub const DEFAULT_DIRECTORY_FILE: &str = "data/directory.yaml";
