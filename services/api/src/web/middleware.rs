//! services/api/src/web/middleware.rs
//!
//! Authentication and role middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Extension,
};
use ewaste_core::{authz::AdminRole, domain::AuthContext, ports::PortError};
use std::sync::Arc;
use tracing::{error, warn};

use crate::web::state::AppState;

/// The `session` cookie value, if the request carries one.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

/// Middleware that validates the auth session cookie and resolves the caller.
///
/// If valid, inserts an [`AuthContext`] into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id = session_cookie(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state
        .db
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            match e {
                PortError::Unauthorized => warn!("Rejected expired or unknown auth session"),
                other => error!("Failed to validate auth session: {:?}", other),
            }
            StatusCode::UNAUTHORIZED
        })?;

    let user = state.db.get_user_by_id(user_id).await.map_err(|e| {
        error!("Auth session {} points at a missing user: {:?}", user_id, e);
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(AuthContext {
        user_id: user.user_id,
        email: user.email,
    });

    Ok(next.run(req).await)
}

/// Middleware that admits only callers holding at least the given role.
///
/// Must run inside [`require_auth`]. Any failure to resolve the role denies.
pub async fn require_role(
    State((state, required)): State<(Arc<AppState>, AdminRole)>,
    Extension(auth): Extension<AuthContext>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !state.authorizer.require(auth.user_id, required).await {
        warn!("{} denied: {} required", auth.user_id, required);
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(next.run(req).await)
}
