//! services/api/src/web/admin.rs
//!
//! Admin endpoints. `/admin/me` and `/admin/initialize` are open to any signed-in
//! user; the rest sit behind `require_role`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use ewaste_core::{
    analytics::metrics,
    authz::AdminRole,
    domain::{AdminUser, AuthContext},
    lifecycle::{CollectionStatus, ReportStatus},
    ports::PortError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{
    records::{CollectionRequestResponse, DumpingReportResponse},
    rest::{port_failure, record_failure, ApiFailure},
    state::AppState,
};

#[derive(Serialize, ToSchema)]
pub struct AdminMeResponse {
    pub is_admin: bool,
    /// `moderator`, `admin` or `super_admin`; absent for regular users.
    pub role: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct InitializeAdminRequest {
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct InitializeAdminResponse {
    pub initialized: bool,
}

#[derive(Serialize, ToSchema)]
pub struct AdminUserResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<AdminUser> for AdminUserResponse {
    fn from(a: AdminUser) -> Self {
        Self {
            id: a.id,
            user_id: a.owner_id,
            role: a.role.as_str().to_string(),
            is_active: a.is_active,
            created_by: a.created_by,
            created_at: a.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct GrantRoleRequest {
    pub user_id: Uuid,
    pub role: String,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct MetricResponse {
    pub metric: String,
    pub description: String,
    pub value: i64,
}

fn unknown_value(e: impl std::fmt::Display) -> ApiFailure {
    (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
}

//=========================================================================================
// Role Resolution & Bootstrap
//=========================================================================================

/// GET /admin/me - The caller's admin role, if any
#[utoipa::path(
    get,
    path = "/admin/me",
    responses((status = 200, description = "Role of the caller", body = AdminMeResponse))
)]
pub async fn admin_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Json<AdminMeResponse> {
    let role = state.authorizer.role_of(auth.user_id).await;
    Json(AdminMeResponse {
        is_admin: role.is_some(),
        role: role.map(|r| r.as_str().to_string()),
    })
}

/// POST /admin/initialize - Make the first super admin; works once per deployment
#[utoipa::path(
    post,
    path = "/admin/initialize",
    request_body = InitializeAdminRequest,
    responses((status = 200, description = "Whether the bootstrap happened", body = InitializeAdminResponse))
)]
pub async fn initialize_admin_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InitializeAdminRequest>,
) -> Json<InitializeAdminResponse> {
    let email = req.email.trim().to_lowercase();
    Json(InitializeAdminResponse {
        initialized: state.authorizer.initialize_first_admin(&email).await,
    })
}

//=========================================================================================
// Admin-only
//=========================================================================================

/// GET /admin/users - Every role assignment
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "Role assignments, newest first", body = [AdminUserResponse]),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn list_admin_users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AdminUserResponse>>, ApiFailure> {
    let admins = state
        .authorizer
        .list_admin_users()
        .await
        .map_err(|e| port_failure("Loading admin users", e))?;
    Ok(Json(admins.into_iter().map(Into::into).collect()))
}

/// POST /admin/users - Grant a role to another user
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = GrantRoleRequest,
    responses(
        (status = 201, description = "Role granted", body = AdminUserResponse),
        (status = 403, description = "Caller may not grant this role"),
        (status = 404, description = "No such user"),
        (status = 422, description = "Unknown role")
    )
)]
pub async fn grant_admin_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<GrantRoleRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let role: AdminRole = req.role.parse().map_err(unknown_value)?;
    let granted = state
        .authorizer
        .grant(auth.user_id, req.user_id, role)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => (
                StatusCode::FORBIDDEN,
                format!("You may not grant {}", role),
            ),
            other => port_failure("Granting the role", other),
        })?;
    Ok((StatusCode::CREATED, Json(AdminUserResponse::from(granted))))
}

/// GET /admin/analytics - Platform-wide counts for the dashboard
#[utoipa::path(
    get,
    path = "/admin/analytics",
    responses(
        (status = 200, description = "One row per metric", body = [MetricResponse]),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn analytics_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MetricResponse>>, ApiFailure> {
    let counts = state
        .db
        .platform_counts(state.offline.now())
        .await
        .map_err(|e| port_failure("Loading analytics", e))?;
    Ok(Json(
        metrics(&counts)
            .into_iter()
            .map(|m| MetricResponse {
                metric: m.metric.to_string(),
                description: m.description.to_string(),
                value: m.value,
            })
            .collect(),
    ))
}

//=========================================================================================
// Moderation
//=========================================================================================

/// POST /admin/collection-requests/{id}/status - Move a pickup one step forward
#[utoipa::path(
    post,
    path = "/admin/collection-requests/{id}/status",
    params(("id" = Uuid, Path, description = "Collection request id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status changed", body = CollectionRequestResponse),
        (status = 403, description = "Caller is not a moderator"),
        (status = 404, description = "No such request"),
        (status = 409, description = "Transition not allowed from the current status"),
        (status = 422, description = "Unknown status")
    )
)]
pub async fn set_collection_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<CollectionRequestResponse>, ApiFailure> {
    let next: CollectionStatus = req.status.parse().map_err(unknown_value)?;
    let request = state
        .records
        .advance_collection_request(id, next)
        .await
        .map_err(|e| record_failure("Updating the pickup", e))?;
    Ok(Json(request.into()))
}

/// POST /admin/dumping-reports/{id}/status - Move a report one step forward
#[utoipa::path(
    post,
    path = "/admin/dumping-reports/{id}/status",
    params(("id" = Uuid, Path, description = "Dumping report id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status changed", body = DumpingReportResponse),
        (status = 403, description = "Caller is not a moderator"),
        (status = 404, description = "No such report"),
        (status = 409, description = "Transition not allowed from the current status"),
        (status = 422, description = "Unknown status")
    )
)]
pub async fn set_report_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<DumpingReportResponse>, ApiFailure> {
    let next: ReportStatus = req.status.parse().map_err(unknown_value)?;
    let report = state
        .records
        .advance_dumping_report(id, next)
        .await
        .map_err(|e| record_failure("Updating the report", e))?;
    Ok(Json(report.into()))
}
