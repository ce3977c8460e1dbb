//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the dispatch board, duty and returns endpoints
//! and the master definition for the OpenAPI specification.

use crate::web::{
    auth, dto::*, messaging, profile,
    reply::{service_failure, HandlerResult},
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::Utc;
use driverroom_core::{RescueRequest, ReturnsReport, User};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, OpenApi};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        profile::get_me_handler,
        profile::update_me_handler,
        profile::set_activation_handler,
        roster_handler,
        bulk_off_duty_handler,
        list_rescues_handler,
        dispatch_rescue_handler,
        confirm_rts_handler,
        start_shift_handler,
        check_in_handler,
        end_shift_handler,
        request_rescue_handler,
        log_returns_handler,
        list_returns_handler,
        mark_notified_handler,
        messaging::create_chat_handler,
        messaging::list_chats_handler,
        messaging::post_message_handler,
        messaging::list_messages_handler,
        messaging::create_notice_handler,
        messaging::list_notices_handler,
        messaging::create_post_handler,
        messaging::list_posts_handler,
        messaging::send_feedback_handler,
        messaging::list_feedback_handler,
    ),
    components(
        schemas(
            auth::SignupRequest, auth::LoginRequest, ProfileResponse, UpdateProfileRequest,
            ActivationRequest, DriverResponse, RosterEntryResponse, RosterResponse,
            RescueDispatchRequest, RescueDispatchResponse, BulkOffDutyRequest,
            BulkOffDutyResponse, ReturnsRequest, ReturnIncidentResponse, CreateChatRequest,
            ChatResponse, ChatMessageResponse, BodyRequest, NoticeRequest, NoticeResponse,
            AuthoredResponse
        )
    ),
    tags(
        (name = "DriverRoom API", description = "Duty roster, rescue dispatch, returns and messaging for delivery fleets.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Query Parameters
//=========================================================================================

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct RosterQuery {
    /// Case-insensitive name filter.
    pub q: Option<String>,
}

//=========================================================================================
// Dispatch Board Handlers
//=========================================================================================

/// The caller's company roster in board order.
#[utoipa::path(
    get,
    path = "/roster",
    params(RosterQuery),
    responses(
        (status = 200, description = "Current roster", body = RosterResponse),
        (status = 403, description = "Caller is not a dispatcher")
    )
)]
pub async fn roster_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<RosterQuery>,
) -> HandlerResult<Json<RosterResponse>> {
    let view = state
        .board
        .filtered_roster_view(&user, query.q.as_deref().unwrap_or_default())
        .await
        .map_err(|e| service_failure("load roster", e))?;
    Ok(Json(RosterResponse::from(&view)))
}

/// Moves every selected driver off duty in one step.
#[utoipa::path(
    post,
    path = "/roster/off-duty",
    request_body = BulkOffDutyRequest,
    responses(
        (status = 200, description = "Drivers moved off duty", body = BulkOffDutyResponse),
        (status = 400, description = "Empty selection"),
        (status = 403, description = "Caller is not a dispatcher")
    )
)]
pub async fn bulk_off_duty_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<BulkOffDutyRequest>,
) -> HandlerResult<Json<BulkOffDutyResponse>> {
    let updated = state
        .board
        .bulk_off_duty(&user, &req.driver_ids)
        .await
        .map_err(|e| service_failure("move drivers off duty", e))?;
    Ok(Json(BulkOffDutyResponse { updated }))
}

#[utoipa::path(
    get,
    path = "/rescues",
    responses(
        (status = 200, description = "Rescue dispatches, newest first", body = [RescueDispatchResponse]),
        (status = 403, description = "Caller is not a dispatcher")
    )
)]
pub async fn list_rescues_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> HandlerResult<Json<Vec<RescueDispatchResponse>>> {
    let dispatches = state
        .board
        .list_dispatches(&user)
        .await
        .map_err(|e| service_failure("list rescues", e))?;
    Ok(Json(dispatches.iter().map(RescueDispatchResponse::from).collect()))
}

/// Dispatches a rescuer to a driver who needs help.
#[utoipa::path(
    post,
    path = "/rescues",
    request_body = RescueDispatchRequest,
    responses(
        (status = 201, description = "Rescue dispatched", body = RescueDispatchResponse),
        (status = 400, description = "Missing rescuer, rescuee or address"),
        (status = 401, description = "No signed-in operator"),
        (status = 403, description = "Caller is not a dispatcher of both drivers"),
        (status = 404, description = "Driver not found")
    )
)]
pub async fn dispatch_rescue_handler(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<User>>,
    Json(req): Json<RescueDispatchRequest>,
) -> HandlerResult<impl IntoResponse> {
    let operator = user.as_ref().map(|Extension(u)| u);
    let request = RescueRequest {
        rescuer_id: req.rescuer_id,
        rescuee_id: req.rescuee_id,
        address: req.address,
    };
    let dispatch = state
        .board
        .dispatch_rescue(operator, request)
        .await
        .map_err(|e| service_failure("dispatch rescue", e))?;
    Ok((
        StatusCode::CREATED,
        Json(RescueDispatchResponse::from(&dispatch)),
    ))
}

/// Confirms a driver has returned to station, clearing both rescue flags.
#[utoipa::path(
    post,
    path = "/drivers/{id}/rts",
    params(("id" = Uuid, Path, description = "The driver's user id.")),
    responses(
        (status = 204, description = "RTS confirmed"),
        (status = 403, description = "Caller is not the driver's dispatcher"),
        (status = 404, description = "Driver not found")
    )
)]
pub async fn confirm_rts_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(driver_id): Path<Uuid>,
) -> HandlerResult<StatusCode> {
    state
        .board
        .confirm_rts(&user, driver_id)
        .await
        .map_err(|e| service_failure("confirm RTS", e))?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Duty Self-Service Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/duty/start",
    responses(
        (status = 200, description = "Shift started", body = DriverResponse),
        (status = 403, description = "Caller does not work shifts")
    )
)]
pub async fn start_shift_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> HandlerResult<Json<DriverResponse>> {
    let driver = state
        .board
        .start_shift(&user, Utc::now())
        .await
        .map_err(|e| service_failure("start shift", e))?;
    Ok(Json(DriverResponse::from(&driver)))
}

#[utoipa::path(
    post,
    path = "/duty/check-in",
    responses(
        (status = 200, description = "Checked in", body = DriverResponse),
        (status = 400, description = "Shift not started")
    )
)]
pub async fn check_in_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> HandlerResult<Json<DriverResponse>> {
    let driver = state
        .board
        .check_in(&user)
        .await
        .map_err(|e| service_failure("check in", e))?;
    Ok(Json(DriverResponse::from(&driver)))
}

#[utoipa::path(
    post,
    path = "/duty/end",
    responses((status = 204, description = "Shift ended"))
)]
pub async fn end_shift_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> HandlerResult<StatusCode> {
    state
        .board
        .end_shift(&user)
        .await
        .map_err(|e| service_failure("end shift", e))?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/duty/rescue-request",
    responses(
        (status = 204, description = "Rescue requested"),
        (status = 400, description = "Caller is not on duty")
    )
)]
pub async fn request_rescue_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> HandlerResult<StatusCode> {
    state
        .board
        .request_rescue(&user)
        .await
        .map_err(|e| service_failure("request rescue", e))?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Returns Handlers
//=========================================================================================

/// Logs the caller's end-of-route returns report.
#[utoipa::path(
    post,
    path = "/returns",
    request_body = ReturnsRequest,
    responses(
        (status = 201, description = "Returns logged", body = ReturnIncidentResponse),
        (status = 400, description = "Missing count or reason")
    )
)]
pub async fn log_returns_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<ReturnsRequest>,
) -> HandlerResult<impl IntoResponse> {
    let report = ReturnsReport {
        has_returns: req.has_returns,
        count: req.count,
        reasons: req.reasons,
    };
    let incident = state
        .board
        .log_returns(&user, report)
        .await
        .map_err(|e| service_failure("log returns", e))?;
    Ok((
        StatusCode::CREATED,
        Json(ReturnIncidentResponse::from(&incident)),
    ))
}

#[utoipa::path(
    get,
    path = "/returns",
    responses(
        (status = 200, description = "Return incidents, newest first", body = [ReturnIncidentResponse]),
        (status = 403, description = "Caller is not a dispatcher")
    )
)]
pub async fn list_returns_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> HandlerResult<Json<Vec<ReturnIncidentResponse>>> {
    let incidents = state
        .board
        .list_returns(&user)
        .await
        .map_err(|e| service_failure("list returns", e))?;
    Ok(Json(incidents.iter().map(ReturnIncidentResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/returns/{id}/notified",
    params(("id" = Uuid, Path, description = "The return incident id.")),
    responses(
        (status = 204, description = "Marked as notified"),
        (status = 404, description = "Incident not found")
    )
)]
pub async fn mark_notified_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(incident_id): Path<Uuid>,
) -> HandlerResult<StatusCode> {
    state
        .board
        .mark_returns_notified(&user, incident_id)
        .await
        .map_err(|e| service_failure("mark returns notified", e))?;
    Ok(StatusCode::NO_CONTENT)
}
