//! crates/driverroom_core/src/session.rs
//!
//! Derives where a signed-in profile lands and what it is allowed to reach.

use uuid::Uuid;

use crate::domain::{Role, User};
use crate::error::{ServiceError, ServiceResult};

/// The client route a profile is sent to after sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    AwaitingActivation,
    JoinCompany,
    DriverHome,
    DispatchBoard,
    AdminConsole,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::AwaitingActivation => "awaiting_activation",
            Destination::JoinCompany => "join_company",
            Destination::DriverHome => "driver_home",
            Destination::DispatchBoard => "dispatch_board",
            Destination::AdminConsole => "admin_console",
        }
    }
}

pub fn destination(user: &User) -> Destination {
    if !user.activated {
        return Destination::AwaitingActivation;
    }
    match user.role {
        Role::Admin => Destination::AdminConsole,
        Role::Company => Destination::DispatchBoard,
        Role::Driver | Role::Trainer if user.company_id.is_none() => Destination::JoinCompany,
        Role::Driver | Role::Trainer => Destination::DriverHome,
    }
}

/// The company a user acts for. Inactive accounts and accounts without a
/// company are refused.
pub fn company_scope(user: &User) -> ServiceResult<Uuid> {
    if !user.activated {
        return Err(ServiceError::forbidden("account is not activated"));
    }
    user.company_id
        .ok_or_else(|| ServiceError::forbidden("account is not affiliated with a company"))
}

/// The company a dispatcher runs the board for.
pub fn dispatcher_scope(user: &User) -> ServiceResult<Uuid> {
    if !user.role.is_dispatcher() {
        return Err(ServiceError::forbidden("dispatch board requires a company account"));
    }
    company_scope(user)
}

/// Admins may activate anyone; a dispatcher only members of their own company.
pub fn authorize_activation(operator: &User, target: &User) -> ServiceResult<()> {
    if operator.role == Role::Admin && operator.activated {
        return Ok(());
    }
    let company_id = dispatcher_scope(operator)?;
    if target.company_id != Some(company_id) {
        return Err(ServiceError::forbidden("user belongs to another company"));
    }
    Ok(())
}
