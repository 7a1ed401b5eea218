use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinic_authz_core::config::{dashboard_route_from_env_value, directory_path_from_env_value};
use clinic_authz_core::{
    AdminBackend, AdminSession, ClinicId, Directory, DirectoryBackend, NavigationGate,
    NavigationItem, PermissionId, PermissionResolver, RoleId, SharedBackend, User, UserId,
};

#[derive(Parser)]
#[command(name = "clinic-authz")]
#[command(about = "Clinic permission and clinic-access administration CLI")]
struct Cli {
    /// Directory file (defaults to CLINIC_AUTHZ_DIRECTORY, then data/directory.yaml)
    #[arg(long, global = true)]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Single,
    Any,
    All,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the directory file
    Validate,
    /// Check whether a user holds permissions
    Check {
        /// User id
        user: String,
        /// Permission ids, e.g. patients.view
        permissions: Vec<String>,
        /// How multiple permissions combine
        #[arg(long, value_enum, default_value_t = Mode::Single)]
        mode: Mode,
    },
    /// Check whether a user may operate within a clinic
    ClinicCheck {
        /// User id
        user: String,
        /// Clinic id
        clinic: String,
    },
    /// Print the navigation entries visible to a user
    Nav {
        /// User id
        user: String,
    },
    /// List roles and their permissions
    Roles,
    /// List catalog permissions grouped by category
    Permissions {
        /// Case-insensitive text filter on id, name or category
        #[arg(long)]
        filter: Option<String>,
    },
    /// Flip one permission on a role and save it
    TogglePermission {
        /// Role id
        role: String,
        /// Permission id
        permission: String,
    },
    /// Grant a clinic to a user
    GrantClinic {
        /// User id
        user: String,
        /// Clinic id
        clinic: String,
    },
    /// Revoke a clinic from a user
    RevokeClinic {
        /// User id
        user: String,
        /// Clinic id
        clinic: String,
    },
    /// Grant a clinic if the user lacks it, otherwise revoke it
    ToggleClinic {
        /// User id
        user: String,
        /// Clinic id
        clinic: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_authz_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let path = cli.directory.unwrap_or_else(|| {
        directory_path_from_env_value(std::env::var("CLINIC_AUTHZ_DIRECTORY").ok())
    });

    match cli.command {
        Some(Commands::Validate) => {
            let directory = Directory::load(&path)?;
            println!(
                "{} is valid: {} permissions, {} roles, {} users, {} clinics",
                path.display(),
                directory.catalog.len(),
                directory.roles.len(),
                directory.users.len(),
                directory.clinics.len()
            );
        }
        Some(Commands::Check {
            user,
            permissions,
            mode,
        }) => {
            let directory = Directory::load(&path)?;
            let user = find_user(&directory, &user)?;
            let permissions = permissions
                .iter()
                .map(|p| PermissionId::parse(p))
                .collect::<Result<Vec<_>, _>>()?;

            let roles = directory.role_map();
            let resolver = PermissionResolver::new(&roles, &directory.clinic_access);
            let allowed = match (mode, permissions.as_slice()) {
                (Mode::Single, [permission]) => resolver.can_access(user, permission),
                (Mode::Single, _) => {
                    anyhow::bail!("single mode takes exactly one permission; use --mode any|all")
                }
                (Mode::Any, permissions) => resolver.can_access_any(user, permissions),
                (Mode::All, permissions) => resolver.can_access_all(user, permissions),
            };
            println!("{}", verdict(allowed));
        }
        Some(Commands::ClinicCheck { user, clinic }) => {
            let directory = Directory::load(&path)?;
            let user = find_user(&directory, &user)?;
            let clinic = ClinicId::parse(&clinic)?;
            let roles = directory.role_map();
            let allowed = PermissionResolver::new(&roles, &directory.clinic_access)
                .can_access_clinic(user, &clinic);
            println!("{}", verdict(allowed));
        }
        Some(Commands::Nav { user }) => {
            let directory = Directory::load(&path)?;
            let user = find_user(&directory, &user)?;
            let items = directory.navigation_items()?;
            let dashboard =
                dashboard_route_from_env_value(std::env::var("CLINIC_AUTHZ_DASHBOARD_ROUTE").ok());

            let roles = directory.role_map();
            let resolver = PermissionResolver::new(&roles, &directory.clinic_access);
            let visible = NavigationGate::new(resolver, &dashboard).filter(user, &items);
            if visible.is_empty() {
                println!("No visible navigation entries.");
            } else {
                print!("{}", render_navigation(&visible));
            }
        }
        Some(Commands::Roles) => {
            let directory = Directory::load(&path)?;
            for role in &directory.roles {
                let permissions: Vec<&str> = role
                    .effective_permissions
                    .iter()
                    .map(|p| p.as_str())
                    .collect();
                println!(
                    "{} {} ({}){}: {}",
                    role.id,
                    role.name,
                    role.display_name,
                    if role.is_editable() { "" } else { " [locked]" },
                    if permissions.is_empty() {
                        "-".to_string()
                    } else {
                        permissions.join(", ")
                    }
                );
            }
        }
        Some(Commands::Permissions { filter }) => {
            let session = open_session(&path, false).await?;
            let mut editor = session.roles().clone();
            editor.set_filter(filter.unwrap_or_default());
            for (category, permissions) in editor.permissions_by_category() {
                println!("{category}");
                for permission in permissions {
                    println!("  {} - {}", permission.id, permission.name);
                }
            }
        }
        Some(Commands::TogglePermission { role, permission }) => {
            let role = RoleId::parse(&role)?;
            let permission = PermissionId::parse(&permission)?;

            let mut session = open_session(&path, true).await?;
            let granted = session.roles_mut().toggle_permission(&role, &permission)?;
            let stored = session.save_role(&role).await?;
            println!(
                "{} {} on role {} ({} permissions)",
                if granted { "Granted" } else { "Removed" },
                permission,
                stored.name,
                stored.effective_permissions.len()
            );
        }
        Some(Commands::GrantClinic { user, clinic }) => {
            let (user, clinic) = (UserId::parse(&user)?, ClinicId::parse(&clinic)?);
            let backend = DirectoryBackend::open(&path, true).await?;
            backend.grant_clinic_access(&user, &clinic).await?;
            println!("Granted clinic {} to user {}", clinic, user);
        }
        Some(Commands::RevokeClinic { user, clinic }) => {
            let (user, clinic) = (UserId::parse(&user)?, ClinicId::parse(&clinic)?);
            let backend = DirectoryBackend::open(&path, true).await?;
            backend.revoke_clinic_access(&user, &clinic).await?;
            println!("Revoked clinic {} from user {}", clinic, user);
        }
        Some(Commands::ToggleClinic { user, clinic }) => {
            let (user, clinic) = (UserId::parse(&user)?, ClinicId::parse(&clinic)?);
            let session = open_session(&path, true).await?;
            let outcome = session
                .clinic_access()
                .toggle_clinic_access(&user, &clinic)
                .await?;
            let clinics: Vec<&str> = outcome.clinics.iter().map(|c| c.as_str()).collect();
            println!(
                "{} clinic {} for user {}; now: {}",
                if outcome.granted { "Granted" } else { "Revoked" },
                clinic,
                user,
                if clinics.is_empty() {
                    "-".to_string()
                } else {
                    clinics.join(", ")
                }
            );
        }
        None => {
            println!("Use 'clinic-authz --help' for commands");
        }
    }

    Ok(())
}

async fn open_session(path: &std::path::Path, persist: bool) -> anyhow::Result<AdminSession> {
    let backend: SharedBackend = Arc::new(DirectoryBackend::open(path, persist).await?);
    Ok(AdminSession::load(backend).await?)
}

fn find_user<'d>(directory: &'d Directory, id: &str) -> anyhow::Result<&'d User> {
    let id = UserId::parse(id)?;
    directory
        .user(&id)
        .ok_or_else(|| anyhow::anyhow!("unknown user: {id}"))
}

fn verdict(allowed: bool) -> &'static str {
    if allowed {
        "allowed"
    } else {
        "denied"
    }
}

fn render_navigation(items: &[NavigationItem]) -> String {
    fn walk(items: &[NavigationItem], depth: usize, out: &mut String) {
        for item in items {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&format!("{} {}\n", item.name, item.route));
            walk(&item.children, depth + 1, out);
        }
    }
    let mut out = String::new();
    walk(items, 0, &mut out);
    out
}
