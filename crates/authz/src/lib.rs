//! # Clinic Authz Core
//!
//! Tenant-scoped permission engine for the clinic management platform.
//!
//! This crate owns the authorisation data model and every decision made over it:
//! - The permission catalog, roles and the user-clinic access map
//! - [`PermissionResolver`]: fail-closed permission and clinic checks with the privileged bypass
//! - [`NavigationGate`]: sidebar filtering against a resolver
//! - [`Directory`]: the YAML document a tenant's authorisation data is loaded from
//! - The administration surface: role-permission drafts and clinic-access management over an
//!   [`AdminBackend`]
//!
//! **No API concerns**: HTTP routing, API keys and request DTOs belong in `api-rest` and
//! `api-shared`.

pub mod access;
pub mod admin;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod directory;
pub mod error;
pub mod model;
pub mod navigation;
pub mod resolver;
pub mod roles;

pub use access::ClinicAccessMap;
pub use admin::{AdminSession, ClinicAccessAdmin, ClinicToggle, RoleEditor};
pub use backend::{AdminBackend, DirectoryBackend, SharedBackend};
pub use catalog::PermissionCatalog;
pub use config::AuthzConfig;
pub use directory::Directory;
pub use error::{
    AdminError, AdminResult, BackendError, BackendResult, ConfigError, ConfigResult,
    DirectoryError, DirectoryResult, MutationAction, Resource,
};
pub use model::{Clinic, Permission, Role, User};
pub use navigation::{CombinationMode, NavigationGate, NavigationItem, Requirement};
pub use resolver::{is_privileged, PermissionResolver};
pub use roles::RolePermissionMap;

pub use clinic_types::{ClinicId, EmailAddress, NonEmptyText, PermissionId, RoleId, RoleName, UserId};
