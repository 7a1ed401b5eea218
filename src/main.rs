use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use api_shared::ApiKey;
use clinic_authz_core::config::{
    dashboard_route_from_env_value, directory_path_from_env_value, persist_from_env_value,
};
use clinic_authz_core::{AuthzConfig, DirectoryBackend};

/// Main entry point for the clinic authorisation service
///
/// Loads the directory file once, then serves the REST API on `CLINIC_AUTHZ_REST_ADDR`
/// (default "0.0.0.0:3000"). Mutating routes require the `x-api-key` header.
///
/// # Environment Variables
/// - `CLINIC_AUTHZ_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CLINIC_AUTHZ_DIRECTORY`: Directory YAML file (default: "data/directory.yaml")
/// - `CLINIC_AUTHZ_DASHBOARD_ROUTE`: Route exempt from navigation filtering (default: "/dashboard")
/// - `CLINIC_AUTHZ_PERSIST`: Write committed mutations back to the file (default: true)
/// - `API_KEY`: API key for mutating requests
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, loading, or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_authz_run=info".parse()?)
                .add_directive("clinic_authz_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr =
        std::env::var("CLINIC_AUTHZ_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(AuthzConfig::new(
        directory_path_from_env_value(std::env::var("CLINIC_AUTHZ_DIRECTORY").ok()),
        dashboard_route_from_env_value(std::env::var("CLINIC_AUTHZ_DASHBOARD_ROUTE").ok()),
        persist_from_env_value(std::env::var("CLINIC_AUTHZ_PERSIST").ok())?,
    )?);
    let api_key = ApiKey::from_env_value(std::env::var("API_KEY").ok())?;
    let backend = Arc::new(DirectoryBackend::open(cfg.directory_path(), cfg.persist()).await?);

    tracing::info!("++ Starting clinic authz REST on {}", rest_addr);

    let app = router(AppState::new(backend, cfg, api_key));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
