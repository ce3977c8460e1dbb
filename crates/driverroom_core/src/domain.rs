//! crates/driverroom_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Identity & Companies
//=========================================================================================

/// The closed set of roles an account can hold.
///
/// `Company` is the dispatcher account of a fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Driver,
    Trainer,
    Company,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Driver => "driver",
            Role::Trainer => "trainer",
            Role::Company => "company",
            Role::Admin => "admin",
        }
    }

    /// Parses the canonical lowercase name of a role.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "driver" => Some(Role::Driver),
            "trainer" => Some(Role::Trainer),
            "company" => Some(Role::Company),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Roles that run the dispatch board for a company.
    pub fn is_dispatcher(&self) -> bool {
        matches!(self, Role::Company | Role::Admin)
    }

    /// Roles that go on duty and appear on a roster.
    pub fn works_shifts(&self) -> bool {
        matches!(self, Role::Driver | Role::Trainer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fleet (DSP) that scopes rosters, chats and notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    /// Whether the company's plan includes the rescue feature.
    pub rescue_enabled: bool,
}

// Represents a user profile - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub company_id: Option<Uuid>,
    pub company_name: Option<String>,
    pub role: Role,
    pub activated: bool,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// Everything needed to register an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub role: Role,
    pub company_id: Option<Uuid>,
    pub activated: bool,
}

/// Profile fields a user may change about themselves.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
}

// Represents a login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Duty Tracking
//=========================================================================================

/// The duty flags stored on every driver record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DutyStatus {
    pub on_duty: bool,
    pub on_duty_since: Option<DateTime<Utc>>,
    pub checked_in: bool,
    /// This driver has been dispatched to help someone else.
    pub rescuing: bool,
    /// This driver needs a rescue.
    pub rescued: bool,
    /// Returned to station; clears pending issues.
    pub rts_confirmed: bool,
}

impl DutyStatus {
    /// Puts the record on duty from `now`. A pending rescue request survives
    /// until RTS is confirmed.
    pub fn start_shift(&mut self, now: DateTime<Utc>) {
        self.on_duty = true;
        self.on_duty_since = Some(now);
        self.checked_in = false;
        self.rts_confirmed = false;
    }

    /// Applies the off-duty field group.
    ///
    /// `rescued` and `on_duty_since` are left as is: a driver still waiting on
    /// help keeps the flag until RTS is confirmed.
    pub fn clear_off_duty(&mut self) {
        self.on_duty = false;
        self.checked_in = false;
        self.rescuing = false;
        self.rts_confirmed = false;
    }

    /// Applies the "Confirm RTS" field group.
    pub fn confirm_rts(&mut self) {
        self.rescued = false;
        self.rescuing = false;
        self.rts_confirmed = true;
    }
}

/// A person as seen by the duty roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub company_id: Uuid,
    pub duty: DutyStatus,
}

//=========================================================================================
// Rescues & Returns
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Dispatched,
}

impl DispatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Dispatched => "dispatched",
        }
    }
}

/// An immutable record of one rescue dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescueDispatch {
    pub id: Uuid,
    pub company_id: Uuid,
    pub rescuer_id: Uuid,
    pub rescuer_name: String,
    pub rescuee_id: Uuid,
    pub rescuee_name: String,
    pub address: String,
    pub status: DispatchStatus,
    pub created_at: DateTime<Utc>,
}

/// Undelivered packages a driver brought back, logged once per report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnIncident {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub driver_name: String,
    pub company_id: Uuid,
    pub has_returns: bool,
    pub count: u32,
    pub reasons: Vec<String>,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Messaging
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Team,
    Group,
    Direct,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatKind::Team => "team",
            ChatKind::Group => "group",
            ChatKind::Direct => "direct",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "team" => Some(ChatKind::Team),
            "group" => Some(ChatKind::Group),
            "direct" => Some(ChatKind::Direct),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: Uuid,
    pub company_id: Uuid,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub members: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A company-wide announcement from dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: Uuid,
    pub company_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub company_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Feedback sent by a driver to their company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub id: Uuid,
    pub company_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip_through_parse() {
        for role in [Role::Driver, Role::Trainer, Role::Company, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse(" Trainer "), Some(Role::Trainer));
        assert_eq!(Role::parse("dsp"), None);
    }

    #[test]
    fn off_duty_group_keeps_rescue_request() {
        let mut duty = DutyStatus {
            on_duty: true,
            on_duty_since: Some(Utc::now()),
            checked_in: true,
            rescuing: true,
            rescued: true,
            rts_confirmed: true,
        };
        duty.clear_off_duty();
        assert!(!duty.on_duty && !duty.checked_in && !duty.rescuing && !duty.rts_confirmed);
        assert!(duty.on_duty_since.is_some());
        assert!(duty.rescued);
    }

    #[test]
    fn starting_a_shift_keeps_a_pending_rescue_request() {
        let mut duty = DutyStatus {
            rescued: true,
            rts_confirmed: true,
            ..DutyStatus::default()
        };
        let now = Utc::now();
        duty.start_shift(now);
        assert!(duty.on_duty);
        assert_eq!(duty.on_duty_since, Some(now));
        assert!(!duty.rts_confirmed);
        assert!(duty.rescued);
    }
}
