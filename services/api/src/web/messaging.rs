//! services/api/src/web/messaging.rs
//!
//! REST handlers for chats, notices, posts and feedback. All of them act within
//! the caller's company.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use driverroom_core::{ChatKind, NewChat, User};
use std::sync::Arc;
use uuid::Uuid;

use crate::web::{
    dto::{
        AuthoredResponse, BodyRequest, ChatMessageResponse, ChatResponse, CreateChatRequest,
        NoticeRequest, NoticeResponse,
    },
    reply::{bad_request, service_failure, HandlerResult},
    state::AppState,
};

//=========================================================================================
// Chats
//=========================================================================================

#[utoipa::path(
    post,
    path = "/chats",
    request_body = CreateChatRequest,
    responses(
        (status = 201, description = "Chat created", body = ChatResponse),
        (status = 400, description = "Unknown kind or wrong member count"),
        (status = 403, description = "A member is outside the caller's company")
    )
)]
pub async fn create_chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateChatRequest>,
) -> HandlerResult<impl IntoResponse> {
    let kind = ChatKind::parse(req.kind.trim())
        .ok_or_else(|| bad_request("Chat kind must be team, group or direct."))?;
    let chat = state
        .messaging
        .create_chat(
            &user,
            NewChat {
                kind,
                title: req.title,
                members: req.members,
            },
        )
        .await
        .map_err(|e| service_failure("create chat", e))?;
    Ok((StatusCode::CREATED, Json(ChatResponse::from(&chat))))
}

#[utoipa::path(
    get,
    path = "/chats",
    responses((status = 200, description = "Chats the caller belongs to", body = [ChatResponse]))
)]
pub async fn list_chats_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> HandlerResult<Json<Vec<ChatResponse>>> {
    let chats = state
        .messaging
        .list_chats(&user)
        .await
        .map_err(|e| service_failure("list chats", e))?;
    Ok(Json(chats.iter().map(ChatResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/chats/{id}/messages",
    params(("id" = Uuid, Path, description = "The chat id.")),
    request_body = BodyRequest,
    responses(
        (status = 201, description = "Message sent", body = ChatMessageResponse),
        (status = 400, description = "Blank message"),
        (status = 403, description = "Caller is not a member")
    )
)]
pub async fn post_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<BodyRequest>,
) -> HandlerResult<impl IntoResponse> {
    let message = state
        .messaging
        .send_message(&user, chat_id, &req.body)
        .await
        .map_err(|e| service_failure("send message", e))?;
    Ok((StatusCode::CREATED, Json(ChatMessageResponse::from(&message))))
}

#[utoipa::path(
    get,
    path = "/chats/{id}/messages",
    params(("id" = Uuid, Path, description = "The chat id.")),
    responses(
        (status = 200, description = "Messages, oldest first", body = [ChatMessageResponse]),
        (status = 403, description = "Caller is not a member")
    )
)]
pub async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(chat_id): Path<Uuid>,
) -> HandlerResult<Json<Vec<ChatMessageResponse>>> {
    let messages = state
        .messaging
        .list_messages(&user, chat_id)
        .await
        .map_err(|e| service_failure("list messages", e))?;
    Ok(Json(messages.iter().map(ChatMessageResponse::from).collect()))
}

//=========================================================================================
// Notices & Posts
//=========================================================================================

#[utoipa::path(
    post,
    path = "/notices",
    request_body = NoticeRequest,
    responses(
        (status = 201, description = "Notice published", body = NoticeResponse),
        (status = 403, description = "Caller is not a dispatcher")
    )
)]
pub async fn create_notice_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<NoticeRequest>,
) -> HandlerResult<impl IntoResponse> {
    let notice = state
        .messaging
        .publish_notice(&user, &req.title, &req.body)
        .await
        .map_err(|e| service_failure("publish notice", e))?;
    Ok((StatusCode::CREATED, Json(NoticeResponse::from(&notice))))
}

#[utoipa::path(
    get,
    path = "/notices",
    responses((status = 200, description = "Company notices, newest first", body = [NoticeResponse]))
)]
pub async fn list_notices_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> HandlerResult<Json<Vec<NoticeResponse>>> {
    let notices = state
        .messaging
        .list_notices(&user)
        .await
        .map_err(|e| service_failure("list notices", e))?;
    Ok(Json(notices.iter().map(NoticeResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/posts",
    request_body = BodyRequest,
    responses((status = 201, description = "Post created", body = AuthoredResponse))
)]
pub async fn create_post_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<BodyRequest>,
) -> HandlerResult<impl IntoResponse> {
    let post = state
        .messaging
        .create_post(&user, &req.body)
        .await
        .map_err(|e| service_failure("create post", e))?;
    Ok((StatusCode::CREATED, Json(AuthoredResponse::from(&post))))
}

#[utoipa::path(
    get,
    path = "/posts",
    responses((status = 200, description = "Company posts, newest first", body = [AuthoredResponse]))
)]
pub async fn list_posts_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> HandlerResult<Json<Vec<AuthoredResponse>>> {
    let posts = state
        .messaging
        .list_posts(&user)
        .await
        .map_err(|e| service_failure("list posts", e))?;
    Ok(Json(posts.iter().map(AuthoredResponse::from).collect()))
}

//=========================================================================================
// Feedback
//=========================================================================================

#[utoipa::path(
    post,
    path = "/feedback",
    request_body = BodyRequest,
    responses(
        (status = 201, description = "Feedback sent", body = AuthoredResponse),
        (status = 403, description = "Caller does not work shifts")
    )
)]
pub async fn send_feedback_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<BodyRequest>,
) -> HandlerResult<impl IntoResponse> {
    let feedback = state
        .messaging
        .send_feedback(&user, &req.body)
        .await
        .map_err(|e| service_failure("send feedback", e))?;
    Ok((StatusCode::CREATED, Json(AuthoredResponse::from(&feedback))))
}

#[utoipa::path(
    get,
    path = "/feedback",
    responses(
        (status = 200, description = "Feedback, newest first", body = [AuthoredResponse]),
        (status = 403, description = "Caller is not a dispatcher")
    )
)]
pub async fn list_feedback_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> HandlerResult<Json<Vec<AuthoredResponse>>> {
    let feedback = state
        .messaging
        .list_feedback(&user)
        .await
        .map_err(|e| service_failure("list feedback", e))?;
    Ok(Json(feedback.iter().map(AuthoredResponse::from).collect()))
}
