//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into services. Nothing in
//! this crate reads environment variables during request handling; binaries read the raw values
//! and hand them to the `*_from_env_value` helpers below.

use crate::constants::{DEFAULT_DASHBOARD_ROUTE, DEFAULT_DIRECTORY_FILE};
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};

/// Authorisation configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct AuthzConfig {
    directory_path: PathBuf,
    dashboard_route: String,
    persist: bool,
}

impl AuthzConfig {
    /// Create a new `AuthzConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidInput`] if the dashboard route is not an absolute route.
    pub fn new(
        directory_path: PathBuf,
        dashboard_route: String,
        persist: bool,
    ) -> ConfigResult<Self> {
        let dashboard_route = dashboard_route.trim().to_string();
        if !dashboard_route.starts_with('/') {
            return Err(ConfigError::InvalidInput(format!(
                "dashboard route must start with '/': {dashboard_route:?}"
            )));
        }

        Ok(Self {
            directory_path,
            dashboard_route,
            persist,
        })
    }

    /// Directory file the backend is seeded from.
    pub fn directory_path(&self) -> &Path {
        &self.directory_path
    }

    /// Route exempt from navigation filtering.
    pub fn dashboard_route(&self) -> &str {
        &self.dashboard_route
    }

    /// Whether committed mutations are written back to the directory file.
    pub fn persist(&self) -> bool {
        self.persist
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the directory path; unset or blank means [`DEFAULT_DIRECTORY_FILE`].
pub fn directory_path_from_env_value(value: Option<String>) -> PathBuf {
    non_blank(value)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DIRECTORY_FILE))
}

/// Resolve the dashboard route; unset or blank means [`DEFAULT_DASHBOARD_ROUTE`].
pub fn dashboard_route_from_env_value(value: Option<String>) -> String {
    non_blank(value).unwrap_or_else(|| DEFAULT_DASHBOARD_ROUTE.to_string())
}

/// Parse a persistence flag; unset or blank means `true`.
pub fn persist_from_env_value(value: Option<String>) -> ConfigResult<bool> {
    match non_blank(value).map(|v| v.to_ascii_lowercase()).as_deref() {
        None | Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::InvalidInput(format!(
            "persistence flag must be true or false, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_blank_values() {
        assert_eq!(
            directory_path_from_env_value(Some("  ".into())),
            PathBuf::from(DEFAULT_DIRECTORY_FILE)
        );
        assert_eq!(dashboard_route_from_env_value(None), DEFAULT_DASHBOARD_ROUTE);
        assert!(persist_from_env_value(None).unwrap());
    }

    #[test]
    fn persist_flag_parses_common_spellings() {
        assert!(!persist_from_env_value(Some("OFF".into())).unwrap());
        assert!(persist_from_env_value(Some("yes".into())).unwrap());
        assert!(persist_from_env_value(Some("maybe".into())).is_err());
    }

    #[test]
    fn dashboard_route_must_be_absolute() {
        assert!(AuthzConfig::new("d.yaml".into(), "dashboard".into(), true).is_err());

        let cfg = AuthzConfig::new("d.yaml".into(), " /home ".into(), false).unwrap();
        assert_eq!(cfg.dashboard_route(), "/home");
        assert!(!cfg.persist());
    }
}
