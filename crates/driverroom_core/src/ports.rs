//! crates/driverroom_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete document store behind them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    Chat, ChatMessage, Company, Driver, Feedback, NewUser, Notice, Post, ProfileUpdate,
    RescueDispatch, ReturnIncident, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A live subscription. Every item is the complete current result set, never a delta;
/// the first item is emitted as soon as the subscription is established.
pub type SnapshotStream<T> = Pin<Box<dyn Stream<Item = PortResult<Vec<T>>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait IdentityService: Send + Sync {
    // --- Companies ---
    async fn create_company(&self, name: &str, rescue_enabled: bool) -> PortResult<Company>;

    async fn get_company(&self, company_id: Uuid) -> PortResult<Company>;

    /// Creates a company together with its owner account in one atomic step.
    /// `owner.company_id` is replaced by the new company's id. A duplicate email
    /// fails with `PortError::Conflict` and leaves no company behind.
    async fn create_company_account(
        &self,
        company_name: &str,
        rescue_enabled: bool,
        owner: NewUser,
    ) -> PortResult<User>;

    // --- Accounts & Profiles ---
    /// Fails with `PortError::Conflict` when the email is already registered.
    async fn create_user(&self, new_user: NewUser) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_profile(&self, user_id: Uuid) -> PortResult<User>;

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<User>;

    async fn set_activated(&self, user_id: Uuid, activated: bool) -> PortResult<User>;

    async fn list_company_members(&self, company_id: Uuid) -> PortResult<Vec<User>>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owning user id, or `PortError::Unauthorized` for unknown or expired sessions.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait DutyStore: Send + Sync {
    /// Loads a shift-working user as a roster record.
    async fn get_driver(&self, driver_id: Uuid) -> PortResult<Driver>;

    /// All on-duty drivers and trainers of one company.
    async fn list_on_duty(&self, company_id: Uuid) -> PortResult<Vec<Driver>>;

    /// All on-duty drivers and trainers across every company.
    async fn list_all_on_duty(&self) -> PortResult<Vec<Driver>>;

    async fn start_shift(&self, driver_id: Uuid, now: DateTime<Utc>) -> PortResult<Driver>;

    async fn check_in(&self, driver_id: Uuid) -> PortResult<Driver>;

    /// Writes the off-duty field group for one record.
    async fn set_off_duty(&self, driver_id: Uuid) -> PortResult<()>;

    /// Writes the off-duty field group for every listed record of the company
    /// in one atomic step, returning how many records were updated.
    async fn bulk_set_off_duty(&self, company_id: Uuid, driver_ids: &[Uuid]) -> PortResult<usize>;

    async fn request_rescue(&self, driver_id: Uuid) -> PortResult<()>;

    /// Stores the dispatch record and flags both participants in one atomic step.
    /// The participant rules are checked again inside that step, so a dispatch
    /// racing another one fails with `PortError::Conflict` instead of leaving a
    /// driver both rescuing and waiting on a rescue.
    async fn dispatch_rescue(&self, dispatch: &RescueDispatch) -> PortResult<()>;

    async fn confirm_rts(&self, driver_id: Uuid) -> PortResult<()>;

    /// Newest first.
    async fn list_dispatches(&self, company_id: Uuid) -> PortResult<Vec<RescueDispatch>>;

    async fn watch_roster(&self, company_id: Uuid) -> PortResult<SnapshotStream<Driver>>;
}

#[async_trait]
pub trait ReturnsStore: Send + Sync {
    async fn create_return(&self, incident: &ReturnIncident) -> PortResult<()>;

    /// Newest first.
    async fn list_returns(&self, company_id: Uuid) -> PortResult<Vec<ReturnIncident>>;

    async fn mark_returns_notified(&self, company_id: Uuid, incident_id: Uuid) -> PortResult<()>;

    async fn watch_returns(&self, company_id: Uuid) -> PortResult<SnapshotStream<ReturnIncident>>;
}

#[async_trait]
pub trait MessagingStore: Send + Sync {
    // --- Chats ---
    async fn create_chat(&self, chat: &Chat) -> PortResult<()>;

    async fn get_chat(&self, chat_id: Uuid) -> PortResult<Chat>;

    async fn list_chats_for_member(&self, company_id: Uuid, user_id: Uuid) -> PortResult<Vec<Chat>>;

    async fn post_message(&self, message: &ChatMessage) -> PortResult<()>;

    /// Oldest first.
    async fn list_messages(&self, chat_id: Uuid) -> PortResult<Vec<ChatMessage>>;

    async fn watch_messages(&self, chat_id: Uuid) -> PortResult<SnapshotStream<ChatMessage>>;

    // --- Notices, Posts & Feedback (all newest first) ---
    async fn create_notice(&self, notice: &Notice) -> PortResult<()>;

    async fn list_notices(&self, company_id: Uuid) -> PortResult<Vec<Notice>>;

    async fn create_post(&self, post: &Post) -> PortResult<()>;

    async fn list_posts(&self, company_id: Uuid) -> PortResult<Vec<Post>>;

    async fn create_feedback(&self, feedback: &Feedback) -> PortResult<()>;

    async fn list_feedback(&self, company_id: Uuid) -> PortResult<Vec<Feedback>>;
}
