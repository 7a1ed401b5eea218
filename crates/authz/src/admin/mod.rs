//! Administration surface: role-permission editing and clinic-access management.

mod clinic_access;
mod roles;
mod session;

pub use clinic_access::{ClinicAccessAdmin, ClinicToggle};
pub use roles::RoleEditor;
pub use session::AdminSession;
