//! crates/driverroom_core/src/rescue.rs
//!
//! The per-driver rescue state machine and the checks a dispatch must pass
//! before anything is written.

use uuid::Uuid;

use crate::domain::{Driver, DutyStatus};
use crate::error::{ServiceError, ServiceResult};

/// The rescue state derived from a driver's two rescue flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescueState {
    Idle,
    NeedsRescue,
    Rescuing,
    /// Both flags set. Never produced by this service, but storable.
    Conflicted,
}

impl RescueState {
    pub fn of(duty: &DutyStatus) -> Self {
        match (duty.rescued, duty.rescuing) {
            (false, false) => RescueState::Idle,
            (true, false) => RescueState::NeedsRescue,
            (false, true) => RescueState::Rescuing,
            (true, true) => RescueState::Conflicted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RescueState::Idle => "idle",
            RescueState::NeedsRescue => "needs_rescue",
            RescueState::Rescuing => "rescuing",
            RescueState::Conflicted => "conflicted",
        }
    }
}

/// A dispatch as submitted from the rescue selection form.
#[derive(Debug, Clone, Default)]
pub struct RescueRequest {
    pub rescuer_id: Option<Uuid>,
    pub rescuee_id: Option<Uuid>,
    pub address: String,
}

/// A request that passed [`validate_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRescue {
    pub rescuer_id: Uuid,
    pub rescuee_id: Uuid,
    pub address: String,
}

pub fn validate_request(request: &RescueRequest) -> ServiceResult<ValidRescue> {
    let rescuee_id = request
        .rescuee_id
        .ok_or_else(|| ServiceError::validation("Please select the driver who needs rescue."))?;
    let address = request.address.trim();
    if address.is_empty() {
        return Err(ServiceError::validation("Please enter the rescue address."));
    }
    let rescuer_id = request
        .rescuer_id
        .ok_or_else(|| ServiceError::validation("Please select a rescuer."))?;
    if rescuer_id == rescuee_id {
        return Err(ServiceError::validation("A driver cannot rescue themselves."));
    }
    Ok(ValidRescue {
        rescuer_id,
        rescuee_id,
        address: address.to_string(),
    })
}

/// Both participants must be on duty, and neither may end up both rescuing and
/// waiting on a rescue.
pub fn check_participants(rescuer: &Driver, rescuee: &Driver) -> ServiceResult<()> {
    for driver in [rescuer, rescuee] {
        if !driver.duty.on_duty {
            return Err(ServiceError::validation(format!(
                "{} is not on duty.",
                driver.name
            )));
        }
    }
    match RescueState::of(&rescuer.duty) {
        RescueState::NeedsRescue | RescueState::Conflicted => {
            return Err(ServiceError::validation(format!(
                "{} is waiting on a rescue and cannot be dispatched.",
                rescuer.name
            )))
        }
        RescueState::Idle | RescueState::Rescuing => {}
    }
    match RescueState::of(&rescuee.duty) {
        RescueState::Rescuing | RescueState::Conflicted => Err(ServiceError::validation(
            format!("{} is already out on a rescue.", rescuee.name),
        )),
        RescueState::Idle | RescueState::NeedsRescue => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn on_duty(name: &str) -> Driver {
        Driver {
            id: Uuid::new_v4(),
            name: name.to_string(),
            role: Role::Driver,
            company_id: Uuid::nil(),
            duty: DutyStatus {
                on_duty: true,
                ..DutyStatus::default()
            },
        }
    }

    fn request(address: &str) -> RescueRequest {
        RescueRequest {
            rescuer_id: Some(Uuid::new_v4()),
            rescuee_id: Some(Uuid::new_v4()),
            address: address.to_string(),
        }
    }

    #[test]
    fn state_follows_flags() {
        let mut duty = DutyStatus::default();
        assert_eq!(RescueState::of(&duty), RescueState::Idle);
        duty.rescued = true;
        assert_eq!(RescueState::of(&duty), RescueState::NeedsRescue);
        duty.rescuing = true;
        assert_eq!(RescueState::of(&duty), RescueState::Conflicted);
        duty.confirm_rts();
        assert_eq!(RescueState::of(&duty), RescueState::Idle);
        assert!(duty.rts_confirmed);
    }

    #[test]
    fn blank_address_is_rejected() {
        let err = validate_request(&request("   ")).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn missing_rescuee_is_rejected() {
        let mut req = request("123 Main St");
        req.rescuee_id = None;
        assert!(matches!(
            validate_request(&req),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn self_rescue_is_rejected() {
        let id = Uuid::new_v4();
        let req = RescueRequest {
            rescuer_id: Some(id),
            rescuee_id: Some(id),
            address: "123 Main St".to_string(),
        };
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn valid_request_trims_address() {
        let req = request("  123 Main St ");
        let valid = validate_request(&req).unwrap();
        assert_eq!(valid.address, "123 Main St");
        assert_eq!(Some(valid.rescuee_id), req.rescuee_id);
    }

    #[test]
    fn stranded_rescuer_cannot_be_dispatched() {
        let mut rescuer = on_duty("B");
        let rescuee = on_duty("A");
        assert!(check_participants(&rescuer, &rescuee).is_ok());

        rescuer.duty.rescued = true;
        assert!(check_participants(&rescuer, &rescuee).is_err());

        rescuer.duty.rescued = false;
        rescuer.duty.on_duty = false;
        assert!(check_participants(&rescuer, &rescuee).is_err());
    }

    #[test]
    fn busy_rescuee_cannot_be_rescued() {
        let rescuer = on_duty("B");
        let mut rescuee = on_duty("A");
        rescuee.duty.rescued = true;
        assert!(check_participants(&rescuer, &rescuee).is_ok());

        rescuee.duty.rescued = false;
        rescuee.duty.rescuing = true;
        assert!(check_participants(&rescuer, &rescuee).is_err());
    }
}
