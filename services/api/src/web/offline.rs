//! services/api/src/web/offline.rs
//!
//! Offline mode endpoints: start and end the fifteen-minute window, and report
//! what is still usable while it runs.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Utc};
use ewaste_core::{
    domain::{AuthContext, OfflineSession},
    features::{capabilities, OfflineCapabilities},
    offline::{format_remaining, remaining_seconds},
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{rest::ApiFailure, state::AppState};

#[derive(Serialize, ToSchema)]
pub struct OfflineSessionResponse {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub remaining_seconds: u32,
    /// `m:ss`
    pub display: String,
}

impl OfflineSessionResponse {
    fn new(session: &OfflineSession, now: DateTime<Utc>) -> Self {
        let remaining = remaining_seconds(session, now);
        Self {
            id: session.id,
            started_at: session.started_at,
            expires_at: session.expires_at,
            remaining_seconds: remaining,
            display: format_remaining(remaining),
        }
    }
}

/// Wire form of [`OfflineCapabilities`].
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesResponse {
    pub can_view_information: bool,
    #[serde(rename = "canUseAIAssistant")]
    pub can_use_ai_assistant: bool,
    pub can_view_recycling_map: bool,
    pub can_register_items: bool,
    pub can_schedule_collection: bool,
    pub can_access_marketplace: bool,
    pub can_access_wallet: bool,
}

impl From<OfflineCapabilities> for CapabilitiesResponse {
    fn from(c: OfflineCapabilities) -> Self {
        Self {
            can_view_information: c.can_view_information,
            can_use_ai_assistant: c.can_use_ai_assistant,
            can_view_recycling_map: c.can_view_recycling_map,
            can_register_items: c.can_register_items,
            can_schedule_collection: c.can_schedule_collection,
            can_access_marketplace: c.can_access_marketplace,
            can_access_wallet: c.can_access_wallet,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct OfflineStatusResponse {
    pub is_offline: bool,
    pub session: Option<OfflineSessionResponse>,
    pub capabilities: CapabilitiesResponse,
}

/// GET /offline - Whether offline mode is active, and for how long
#[utoipa::path(
    get,
    path = "/offline",
    responses((status = 200, description = "Current offline state", body = OfflineStatusResponse))
)]
pub async fn offline_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Json<OfflineStatusResponse> {
    let session = state.offline.check_active(auth.user_id).await;
    let now = state.offline.now();
    Json(OfflineStatusResponse {
        is_offline: session.is_some(),
        capabilities: capabilities(session.is_some()).into(),
        session: session.map(|s| OfflineSessionResponse::new(&s, now)),
    })
}

/// POST /offline/start - Open a fresh fifteen-minute window
#[utoipa::path(
    post,
    path = "/offline/start",
    responses(
        (status = 201, description = "Offline mode started", body = OfflineSessionResponse),
        (status = 500, description = "Nothing changed")
    )
)]
pub async fn start_offline_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, ApiFailure> {
    let session = state.offline.start(auth.user_id).await.ok_or((
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to start offline mode".to_string(),
    ))?;
    let response = OfflineSessionResponse::new(&session, state.offline.now());
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /offline/end - End offline mode; ending twice is harmless
#[utoipa::path(
    post,
    path = "/offline/end",
    responses(
        (status = 204, description = "Offline mode is off"),
        (status = 500, description = "Nothing changed")
    )
)]
pub async fn end_offline_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<StatusCode, ApiFailure> {
    if state.offline.end(auth.user_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to end offline mode".to_string(),
        ))
    }
}

/// GET /offline/capabilities - Which features are usable right now
#[utoipa::path(
    get,
    path = "/offline/capabilities",
    responses((status = 200, description = "Feature switches", body = CapabilitiesResponse))
)]
pub async fn capabilities_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Json<CapabilitiesResponse> {
    Json(state.offline.capabilities(auth.user_id).await.into())
}
