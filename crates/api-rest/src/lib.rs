//! # API REST
//!
//! REST API implementation for the clinic authorisation service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, API key checks on mutating routes)
//!
//! Uses `api-shared` for request/response types and `clinic-authz-core` for every decision.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post, put},
    Router,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::auth::API_KEY_HEADER;
use api_shared::dto::{
    CheckMode, CheckReq, CheckRes, ClinicAccessRes, ClinicDto, HealthRes, ListClinicsRes,
    ListPermissionsRes, ListRolesRes, ListUsersRes, NavigationItemDto, NavigationRes,
    PermissionDto, ReplaceRolePermissionsReq, RoleDto, UserDto,
};
use api_shared::{ApiKey, HealthService};
use clinic_authz_core::{
    AdminBackend, AuthzConfig, BackendError, ClinicId, DirectoryBackend, NavigationGate,
    PermissionId, PermissionResolver, RoleId, UserId,
};

type ApiError = (StatusCode, &'static str);

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    backend: Arc<DirectoryBackend>,
    cfg: Arc<AuthzConfig>,
    api_key: ApiKey,
}

impl AppState {
    pub fn new(backend: Arc<DirectoryBackend>, cfg: Arc<AuthzConfig>, api_key: ApiKey) -> Self {
        Self {
            backend,
            cfg,
            api_key,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_permissions,
        list_roles,
        replace_role_permissions,
        list_users,
        list_clinics,
        user_clinic_access,
        grant_clinic_access,
        revoke_clinic_access,
        check_permissions,
        check_clinic_access,
        user_navigation,
    ),
    components(schemas(
        HealthRes,
        PermissionDto,
        ListPermissionsRes,
        RoleDto,
        ListRolesRes,
        ReplaceRolePermissionsReq,
        UserDto,
        ListUsersRes,
        ClinicDto,
        ListClinicsRes,
        ClinicAccessRes,
        CheckMode,
        CheckReq,
        CheckRes,
        NavigationItemDto,
        NavigationRes,
    ))
)]
pub struct ApiDoc;

/// Build the REST router.
///
/// Mutating routes sit behind [`require_api_key`]; reads and checks are open.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/roles/:id/permissions", put(replace_role_permissions))
        .route(
            "/users/:id/clinics/:clinic_id",
            post(grant_clinic_access).delete(revoke_clinic_access),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/permissions", get(list_permissions))
        .route("/roles", get(list_roles))
        .route("/users", get(list_users))
        .route("/clinics", get(list_clinics))
        .route("/users/:id/clinics", get(user_clinic_access))
        .route("/users/:id/check", post(check_permissions))
        .route(
            "/users/:id/clinics/:clinic_id/access",
            get(check_clinic_access),
        )
        .route("/users/:id/navigation", get(user_navigation))
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Reject requests whose `x-api-key` header does not match the configured key.
async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if let Err(e) = state.api_key.validate(provided) {
        tracing::warn!(path = %request.uri().path(), "rejected request: {e}");
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized"));
    }
    Ok(next.run(request).await)
}

fn backend_error(context: &'static str, e: BackendError) -> ApiError {
    match e {
        BackendError::NotFound { kind, id } => {
            tracing::debug!("{context}: {kind} {id} not found");
            (StatusCode::NOT_FOUND, "Not found")
        }
        BackendError::Rejected(reason) => {
            tracing::debug!("{context} rejected: {reason}");
            (StatusCode::BAD_REQUEST, "Rejected")
        }
        BackendError::NotEditable(role) => {
            tracing::debug!("{context}: role {role} is not editable");
            (StatusCode::FORBIDDEN, "Role is not editable")
        }
        other => {
            tracing::error!("{context} error: {:?}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

fn parse_user(id: &str) -> Result<UserId, ApiError> {
    UserId::parse(id).map_err(|_| (StatusCode::BAD_REQUEST, "Invalid user id"))
}

fn parse_clinic(id: &str) -> Result<ClinicId, ApiError> {
    ClinicId::parse(id).map_err(|_| (StatusCode::BAD_REQUEST, "Invalid clinic id"))
}

fn parse_permissions(ids: &[String]) -> Result<Vec<PermissionId>, ApiError> {
    ids.iter()
        .map(|id| PermissionId::parse(id))
        .collect::<Result<_, _>>()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid permission id"))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// This endpoint is used for monitoring and load balancer health checks.
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/permissions",
    responses(
        (status = 200, description = "Permission catalog", body = ListPermissionsRes),
        (status = 500, description = "Internal server error")
    )
)]
/// List the tenant's permission catalog in display order.
async fn list_permissions(
    State(state): State<AppState>,
) -> Result<Json<ListPermissionsRes>, ApiError> {
    let permissions = state
        .backend
        .list_permissions()
        .await
        .map_err(|e| backend_error("List permissions", e))?;
    Ok(Json(ListPermissionsRes {
        permissions: permissions.iter().map(PermissionDto::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/roles",
    responses(
        (status = 200, description = "Roles with effective permissions", body = ListRolesRes),
        (status = 500, description = "Internal server error")
    )
)]
async fn list_roles(State(state): State<AppState>) -> Result<Json<ListRolesRes>, ApiError> {
    let roles = state
        .backend
        .list_roles()
        .await
        .map_err(|e| backend_error("List roles", e))?;
    Ok(Json(ListRolesRes {
        roles: roles.iter().map(RoleDto::from).collect(),
    }))
}

#[utoipa::path(
    put,
    path = "/roles/{id}/permissions",
    request_body = ReplaceRolePermissionsReq,
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role as stored", body = RoleDto),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Role is not editable"),
        (status = 404, description = "Role not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Replace a role's permission set with the full set in the request body.
///
/// # Errors
/// Returns `400 Bad Request` for a malformed id or a permission outside the catalog, and
/// `403 Forbidden` for `super_admin`, whose permissions are never edited.
async fn replace_role_permissions(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<ReplaceRolePermissionsReq>,
) -> Result<Json<RoleDto>, ApiError> {
    let role_id = RoleId::parse(&id).map_err(|_| (StatusCode::BAD_REQUEST, "Invalid role id"))?;
    let permissions: BTreeSet<PermissionId> =
        parse_permissions(&req.permissions)?.into_iter().collect();

    let stored = state
        .backend
        .replace_role_permissions(&role_id, &permissions)
        .await
        .map_err(|e| backend_error("Replace role permissions", e))?;
    Ok(Json(RoleDto::from(&stored)))
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Users", body = ListUsersRes),
        (status = 500, description = "Internal server error")
    )
)]
async fn list_users(State(state): State<AppState>) -> Result<Json<ListUsersRes>, ApiError> {
    let users = state
        .backend
        .list_users()
        .await
        .map_err(|e| backend_error("List users", e))?;
    Ok(Json(ListUsersRes {
        users: users.iter().map(UserDto::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/clinics",
    responses(
        (status = 200, description = "Clinics", body = ListClinicsRes),
        (status = 500, description = "Internal server error")
    )
)]
async fn list_clinics(State(state): State<AppState>) -> Result<Json<ListClinicsRes>, ApiError> {
    let clinics = state
        .backend
        .list_clinics()
        .await
        .map_err(|e| backend_error("List clinics", e))?;
    Ok(Json(ListClinicsRes {
        clinics: clinics.iter().map(ClinicDto::from).collect(),
    }))
}

async fn clinic_access_res(state: &AppState, user: UserId) -> Result<ClinicAccessRes, ApiError> {
    let clinics = state
        .backend
        .user_clinic_access(&user)
        .await
        .map_err(|e| backend_error("Read clinic access", e))?;
    Ok(ClinicAccessRes {
        user_id: user.to_string(),
        clinics: clinics.iter().map(ToString::to_string).collect(),
    })
}

#[utoipa::path(
    get,
    path = "/users/{id}/clinics",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Clinics the user may access", body = ClinicAccessRes),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    )
)]
async fn user_clinic_access(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<ClinicAccessRes>, ApiError> {
    let user = parse_user(&id)?;
    clinic_access_res(&state, user).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/users/{id}/clinics/{clinic_id}",
    params(
        ("id" = String, Path, description = "User id"),
        ("clinic_id" = String, Path, description = "Clinic id")
    ),
    responses(
        (status = 200, description = "Clinic access after the grant", body = ClinicAccessRes),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "User or clinic not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Grant a clinic to a user. Granting an existing grant is a no-op.
async fn grant_clinic_access(
    State(state): State<AppState>,
    AxumPath((id, clinic_id)): AxumPath<(String, String)>,
) -> Result<Json<ClinicAccessRes>, ApiError> {
    let user = parse_user(&id)?;
    let clinic = parse_clinic(&clinic_id)?;
    state
        .backend
        .grant_clinic_access(&user, &clinic)
        .await
        .map_err(|e| backend_error("Grant clinic access", e))?;
    clinic_access_res(&state, user).await.map(Json)
}

#[utoipa::path(
    delete,
    path = "/users/{id}/clinics/{clinic_id}",
    params(
        ("id" = String, Path, description = "User id"),
        ("clinic_id" = String, Path, description = "Clinic id")
    ),
    responses(
        (status = 200, description = "Clinic access after the revoke", body = ClinicAccessRes),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "User or clinic not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Revoke a clinic from a user. Revoking an absent grant is a no-op.
async fn revoke_clinic_access(
    State(state): State<AppState>,
    AxumPath((id, clinic_id)): AxumPath<(String, String)>,
) -> Result<Json<ClinicAccessRes>, ApiError> {
    let user = parse_user(&id)?;
    let clinic = parse_clinic(&clinic_id)?;
    state
        .backend
        .revoke_clinic_access(&user, &clinic)
        .await
        .map_err(|e| backend_error("Revoke clinic access", e))?;
    clinic_access_res(&state, user).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/users/{id}/check",
    request_body = CheckReq,
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Decision", body = CheckRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "User not found")
    )
)]
/// Evaluate one or more permissions for a user.
///
/// Permissions the catalog does not list are simply not held. With `mode = any` an empty list is
/// denied; with `mode = all` it is allowed.
///
/// # Errors
/// Returns `400 Bad Request` for a malformed id, or if `mode = single` is sent with anything
/// other than exactly one permission.
async fn check_permissions(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<CheckReq>,
) -> Result<Json<CheckRes>, ApiError> {
    let user_id = parse_user(&id)?;
    let permissions = parse_permissions(&req.permissions)?;

    let directory = state.backend.snapshot().await;
    let user = directory
        .user(&user_id)
        .ok_or((StatusCode::NOT_FOUND, "User not found"))?;
    let roles = directory.role_map();
    let resolver = PermissionResolver::new(&roles, &directory.clinic_access);

    let allowed = match (req.mode, permissions.as_slice()) {
        (CheckMode::Single, [permission]) => resolver.can_access(user, permission),
        (CheckMode::Single, _) => {
            return Err((
                StatusCode::BAD_REQUEST,
                "Single mode takes exactly one permission",
            ))
        }
        (CheckMode::Any, permissions) => resolver.can_access_any(user, permissions),
        (CheckMode::All, permissions) => resolver.can_access_all(user, permissions),
    };
    Ok(Json(CheckRes { allowed }))
}

#[utoipa::path(
    get,
    path = "/users/{id}/clinics/{clinic_id}/access",
    params(
        ("id" = String, Path, description = "User id"),
        ("clinic_id" = String, Path, description = "Clinic id")
    ),
    responses(
        (status = 200, description = "Decision", body = CheckRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "User not found")
    )
)]
/// Whether a user may operate within a clinic.
async fn check_clinic_access(
    State(state): State<AppState>,
    AxumPath((id, clinic_id)): AxumPath<(String, String)>,
) -> Result<Json<CheckRes>, ApiError> {
    let user_id = parse_user(&id)?;
    let clinic = parse_clinic(&clinic_id)?;

    let directory = state.backend.snapshot().await;
    let user = directory
        .user(&user_id)
        .ok_or((StatusCode::NOT_FOUND, "User not found"))?;
    let roles = directory.role_map();
    let allowed =
        PermissionResolver::new(&roles, &directory.clinic_access).can_access_clinic(user, &clinic);
    Ok(Json(CheckRes { allowed }))
}

#[utoipa::path(
    get,
    path = "/users/{id}/navigation",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Sidebar entries the user may see", body = NavigationRes),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// The navigation entries visible to a user, in catalog order.
async fn user_navigation(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<NavigationRes>, ApiError> {
    let user_id = parse_user(&id)?;

    let directory = state.backend.snapshot().await;
    let user = directory
        .user(&user_id)
        .ok_or((StatusCode::NOT_FOUND, "User not found"))?;
    let items = directory.navigation_items().map_err(|e| {
        tracing::error!("Navigation catalog error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    })?;

    let roles = directory.role_map();
    let resolver = PermissionResolver::new(&roles, &directory.clinic_access);
    let visible = NavigationGate::new(resolver, state.cfg.dashboard_route()).filter(user, &items);

    Ok(Json(NavigationRes {
        items: visible.iter().map(NavigationItemDto::from).collect(),
    }))
}
