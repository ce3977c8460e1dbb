//! services/api/src/web/dto.rs
//!
//! JSON payloads of the REST and WebSocket APIs, and their conversions from the
//! core domain types.

use chrono::{DateTime, Utc};
use driverroom_core::domain::{
    Chat, ChatMessage, Driver, Feedback, Notice, Post, RescueDispatch, ReturnIncident, User,
};
use driverroom_core::session::destination;
use driverroom_core::{RosterEntry, RosterView};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Response Structs
//=========================================================================================

/// A signed-in user's profile and where the client should route them.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub company_id: Option<Uuid>,
    pub company_name: Option<String>,
    pub activated: bool,
    pub phone: Option<String>,
    pub destination: String,
}

impl From<&User> for ProfileResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            company_id: user.company_id,
            company_name: user.company_name.clone(),
            activated: user.activated,
            phone: user.phone.clone(),
            destination: destination(user).as_str().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct DriverResponse {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub on_duty: bool,
    pub on_duty_since: Option<DateTime<Utc>>,
    pub checked_in: bool,
    pub rescuing: bool,
    pub rescued: bool,
    pub rts_confirmed: bool,
}

impl From<&Driver> for DriverResponse {
    fn from(driver: &Driver) -> Self {
        Self {
            id: driver.id,
            name: driver.name.clone(),
            role: driver.role.as_str().to_string(),
            on_duty: driver.duty.on_duty,
            on_duty_since: driver.duty.on_duty_since,
            checked_in: driver.duty.checked_in,
            rescuing: driver.duty.rescuing,
            rescued: driver.duty.rescued,
            rts_confirmed: driver.duty.rts_confirmed,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct RosterEntryResponse {
    #[serde(flatten)]
    pub driver: DriverResponse,
    pub rescue_state: String,
    pub pending_returns: bool,
}

impl From<&RosterEntry> for RosterEntryResponse {
    fn from(entry: &RosterEntry) -> Self {
        Self {
            driver: DriverResponse::from(&entry.driver),
            rescue_state: entry.rescue_state.as_str().to_string(),
            pending_returns: entry.pending_returns,
        }
    }
}

/// The dispatch board, already in rendered order.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct RosterResponse {
    pub entries: Vec<RosterEntryResponse>,
    pub checked_in_count: usize,
}

impl From<&RosterView> for RosterResponse {
    fn from(view: &RosterView) -> Self {
        Self {
            entries: view.entries.iter().map(RosterEntryResponse::from).collect(),
            checked_in_count: view.checked_in_count,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct RescueDispatchResponse {
    pub id: Uuid,
    pub rescuer_id: Uuid,
    pub rescuer_name: String,
    pub rescuee_id: Uuid,
    pub rescuee_name: String,
    pub address: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<&RescueDispatch> for RescueDispatchResponse {
    fn from(dispatch: &RescueDispatch) -> Self {
        Self {
            id: dispatch.id,
            rescuer_id: dispatch.rescuer_id,
            rescuer_name: dispatch.rescuer_name.clone(),
            rescuee_id: dispatch.rescuee_id,
            rescuee_name: dispatch.rescuee_name.clone(),
            address: dispatch.address.clone(),
            status: dispatch.status.as_str().to_string(),
            created_at: dispatch.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ReturnIncidentResponse {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub driver_name: String,
    pub has_returns: bool,
    pub count: u32,
    pub reasons: Vec<String>,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&ReturnIncident> for ReturnIncidentResponse {
    fn from(incident: &ReturnIncident) -> Self {
        Self {
            id: incident.id,
            driver_id: incident.driver_id,
            driver_name: incident.driver_name.clone(),
            has_returns: incident.has_returns,
            count: incident.count,
            reasons: incident.reasons.clone(),
            notified: incident.notified,
            created_at: incident.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct BulkOffDutyResponse {
    pub updated: usize,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ChatResponse {
    pub id: Uuid,
    pub kind: String,
    pub title: Option<String>,
    pub members: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<&Chat> for ChatResponse {
    fn from(chat: &Chat) -> Self {
        Self {
            id: chat.id,
            kind: chat.kind.as_str().to_string(),
            title: chat.title.clone(),
            members: chat.members.clone(),
            created_at: chat.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ChatMessageResponse {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ChatMessage> for ChatMessageResponse {
    fn from(message: &ChatMessage) -> Self {
        Self {
            id: message.id,
            chat_id: message.chat_id,
            sender_id: message.sender_id,
            sender_name: message.sender_name.clone(),
            body: message.body.clone(),
            created_at: message.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct NoticeResponse {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Notice> for NoticeResponse {
    fn from(notice: &Notice) -> Self {
        Self {
            id: notice.id,
            author_id: notice.author_id,
            title: notice.title.clone(),
            body: notice.body.clone(),
            created_at: notice.created_at,
        }
    }
}

/// A post or a piece of feedback.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct AuthoredResponse {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Post> for AuthoredResponse {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            author_id: post.author_id,
            author_name: post.author_name.clone(),
            body: post.body.clone(),
            created_at: post.created_at,
        }
    }
}

impl From<&Feedback> for AuthoredResponse {
    fn from(feedback: &Feedback) -> Self {
        Self {
            id: feedback.id,
            author_id: feedback.author_id,
            author_name: feedback.author_name.clone(),
            body: feedback.body.clone(),
            created_at: feedback.created_at,
        }
    }
}

//=========================================================================================
// Request Payload Structs
//=========================================================================================

#[derive(Deserialize, Serialize, ToSchema, Debug, Default)]
pub struct RescueDispatchRequest {
    pub rescuer_id: Option<Uuid>,
    pub rescuee_id: Option<Uuid>,
    #[serde(default)]
    pub address: String,
}

#[derive(Deserialize, Serialize, ToSchema, Debug)]
pub struct BulkOffDutyRequest {
    pub driver_ids: Vec<Uuid>,
}

#[derive(Deserialize, Serialize, ToSchema, Debug)]
pub struct ReturnsRequest {
    pub has_returns: bool,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[derive(Deserialize, Serialize, ToSchema, Debug, Default)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize, Serialize, ToSchema, Debug)]
pub struct ActivationRequest {
    pub activated: bool,
}

#[derive(Deserialize, Serialize, ToSchema, Debug)]
pub struct CreateChatRequest {
    /// One of `team`, `group`, `direct`.
    pub kind: String,
    pub title: Option<String>,
    #[serde(default)]
    pub members: Vec<Uuid>,
}

/// Body of a chat message, post or feedback.
#[derive(Deserialize, Serialize, ToSchema, Debug)]
pub struct BodyRequest {
    pub body: String,
}

#[derive(Deserialize, Serialize, ToSchema, Debug)]
pub struct NoticeRequest {
    pub title: String,
    pub body: String,
}
