//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use driverroom_core::PortError;
use std::sync::Arc;
use tracing::{error, warn};

use crate::web::{auth::session_id, state::AppState};

/// Paths an account awaiting activation may still use.
const INACTIVE_ALLOWED: &[&str] = &["/me"];

/// Middleware that validates the auth session cookie and loads the caller's profile.
///
/// On success the `User` is inserted into request extensions for handlers to use.
/// A missing or invalid session yields 401; an account that has not been
/// activated yet yields 403 everywhere except its own profile.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id = session_id(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state
        .identity
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            warn!("Rejected auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    let user = state.identity.get_profile(user_id).await.map_err(|e| match e {
        PortError::NotFound(_) => StatusCode::UNAUTHORIZED,
        other => {
            error!("Failed to load profile for {}: {:?}", user_id, other);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    })?;

    if !user.activated && !INACTIVE_ALLOWED.contains(&req.uri().path()) {
        return Err(StatusCode::FORBIDDEN);
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
