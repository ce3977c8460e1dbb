//! services/api/src/web/profile.rs
//!
//! Profile endpoints: the caller's own profile and account activation.

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use driverroom_core::{session::authorize_activation, ProfileUpdate, User};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::web::{
    dto::{ActivationRequest, ProfileResponse, UpdateProfileRequest},
    reply::{bad_request, port_failure, service_failure, HandlerResult},
    state::AppState,
};

/// GET /me - The caller's profile and client destination
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current profile", body = ProfileResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn get_me_handler(Extension(user): Extension<User>) -> Json<ProfileResponse> {
    Json(ProfileResponse::from(&user))
}

/// PUT /me - Change the caller's name or phone number
#[utoipa::path(
    put,
    path = "/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Blank name")
    )
)]
pub async fn update_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<UpdateProfileRequest>,
) -> HandlerResult<Json<ProfileResponse>> {
    let name = match req.name.as_deref().map(str::trim) {
        Some("") => return Err(bad_request("Name cannot be empty.")),
        other => other.map(str::to_string),
    };
    // A blank phone clears the number.
    let phone = req.phone.map(|p| p.trim().to_string());

    let updated = state
        .identity
        .update_profile(user.user_id, ProfileUpdate { name, phone })
        .await
        .map_err(|e| port_failure("update profile", e))?;
    Ok(Json(ProfileResponse::from(&updated)))
}

/// POST /users/{id}/activation - Activate or deactivate an account
#[utoipa::path(
    post,
    path = "/users/{id}/activation",
    params(("id" = Uuid, Path, description = "The user to change.")),
    request_body = ActivationRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 403, description = "Caller may not manage this account"),
        (status = 404, description = "User not found")
    )
)]
pub async fn set_activation_handler(
    State(state): State<Arc<AppState>>,
    Extension(operator): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ActivationRequest>,
) -> HandlerResult<Json<ProfileResponse>> {
    let target = state
        .identity
        .get_profile(user_id)
        .await
        .map_err(|e| port_failure("load user", e))?;
    authorize_activation(&operator, &target).map_err(|e| service_failure("activate user", e))?;

    let updated = state
        .identity
        .set_activated(user_id, req.activated)
        .await
        .map_err(|e| port_failure("activate user", e))?;
    info!(
        "{} set activation of {} to {}",
        operator.user_id, updated.user_id, updated.activated
    );
    Ok(Json(ProfileResponse::from(&updated)))
}
