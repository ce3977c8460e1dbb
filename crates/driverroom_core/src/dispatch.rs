//! crates/driverroom_core/src/dispatch.rs
//!
//! The dispatch board service: roster views, duty transitions, rescue dispatch,
//! bulk off-duty and the stale-shift sweep. Every logical action maps to a single
//! store call so a failure never leaves half of an action applied.

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    DispatchStatus, Driver, RescueDispatch, ReturnIncident, User,
};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{DutyStore, ReturnsStore, SnapshotStream};
use crate::rescue::{check_participants, validate_request, RescueRequest, RescueState};
use crate::returns::ReturnsIndex;
use crate::roster::Roster;
use crate::session::{company_scope, dispatcher_scope};

//=========================================================================================
// Views
//=========================================================================================

/// One rendered roster row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub driver: Driver,
    pub rescue_state: RescueState,
    pub pending_returns: bool,
}

/// The dispatch board as rendered for one company.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterView {
    pub entries: Vec<RosterEntry>,
    pub checked_in_count: usize,
}

impl RosterView {
    pub fn compose(roster: &Roster, returns: &ReturnsIndex) -> Self {
        Self::compose_matching(roster, returns, "")
    }

    /// Renders only the rows whose name contains `query`, ignoring case. The
    /// checked-in count still covers the whole roster.
    pub fn compose_matching(roster: &Roster, returns: &ReturnsIndex, query: &str) -> Self {
        let entries = roster
            .filtered(query)
            .into_iter()
            .map(|driver| RosterEntry {
                rescue_state: RescueState::of(&driver.duty),
                pending_returns: returns.has_pending(driver),
                driver: driver.clone(),
            })
            .collect();
        Self {
            entries,
            checked_in_count: roster.checked_in_count(),
        }
    }
}

/// A driver's returns report as submitted from the returns form.
#[derive(Debug, Clone, Default)]
pub struct ReturnsReport {
    pub has_returns: bool,
    pub count: u32,
    pub reasons: Vec<String>,
}

/// Outcome of one stale-shift sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub stale: usize,
    pub cleared: usize,
    pub failed: usize,
}

//=========================================================================================
// DispatchBoard
//=========================================================================================

#[derive(Clone)]
pub struct DispatchBoard {
    duty: Arc<dyn DutyStore>,
    returns: Arc<dyn ReturnsStore>,
    off_duty_after: Duration,
}

impl DispatchBoard {
    pub fn new(
        duty: Arc<dyn DutyStore>,
        returns: Arc<dyn ReturnsStore>,
        off_duty_after: Duration,
    ) -> Self {
        Self {
            duty,
            returns,
            off_duty_after,
        }
    }

    pub fn off_duty_after(&self) -> Duration {
        self.off_duty_after
    }

    // --- Roster ---

    pub async fn roster_view(&self, operator: &User) -> ServiceResult<RosterView> {
        self.filtered_roster_view(operator, "").await
    }

    /// The roster view narrowed by a name search. A blank query keeps everyone.
    pub async fn filtered_roster_view(
        &self,
        operator: &User,
        query: &str,
    ) -> ServiceResult<RosterView> {
        let company_id = dispatcher_scope(operator)?;
        let drivers = self.duty.list_on_duty(company_id).await?;
        let incidents = self.returns.list_returns(company_id).await?;
        Ok(RosterView::compose_matching(
            &Roster::from_snapshot(drivers),
            &ReturnsIndex::from_incidents(&incidents),
            query,
        ))
    }

    /// Live on-duty snapshots of the operator's company.
    pub async fn watch_roster(&self, operator: &User) -> ServiceResult<SnapshotStream<Driver>> {
        let company_id = dispatcher_scope(operator)?;
        Ok(self.duty.watch_roster(company_id).await?)
    }

    /// Live return-incident snapshots of the operator's company.
    pub async fn watch_returns(
        &self,
        operator: &User,
    ) -> ServiceResult<SnapshotStream<ReturnIncident>> {
        let company_id = dispatcher_scope(operator)?;
        Ok(self.returns.watch_returns(company_id).await?)
    }

    pub async fn list_dispatches(&self, operator: &User) -> ServiceResult<Vec<RescueDispatch>> {
        let company_id = dispatcher_scope(operator)?;
        Ok(self.duty.list_dispatches(company_id).await?)
    }

    // --- Driver self-service ---

    pub async fn start_shift(&self, user: &User, now: DateTime<Utc>) -> ServiceResult<Driver> {
        self.own_record(user).await?;
        let driver = self.duty.start_shift(user.user_id, now).await?;
        info!("{} went on duty", driver.name);
        Ok(driver)
    }

    pub async fn check_in(&self, user: &User) -> ServiceResult<Driver> {
        let driver = self.own_record(user).await?;
        if !driver.duty.on_duty {
            return Err(ServiceError::validation("Start your shift before checking in."));
        }
        Ok(self.duty.check_in(user.user_id).await?)
    }

    pub async fn end_shift(&self, user: &User) -> ServiceResult<()> {
        self.own_record(user).await?;
        self.duty.set_off_duty(user.user_id).await?;
        info!("{} went off duty", user.name);
        Ok(())
    }

    /// The driver flags that they need a rescue.
    pub async fn request_rescue(&self, user: &User) -> ServiceResult<()> {
        let driver = self.own_record(user).await?;
        if !driver.duty.on_duty {
            return Err(ServiceError::validation("Only on-duty drivers can request a rescue."));
        }
        self.duty.request_rescue(driver.id).await?;
        info!("{} requested a rescue", driver.name);
        Ok(())
    }

    async fn own_record(&self, user: &User) -> ServiceResult<Driver> {
        company_scope(user)?;
        if !user.role.works_shifts() {
            return Err(ServiceError::forbidden("only drivers and trainers work shifts"));
        }
        Ok(self.duty.get_driver(user.user_id).await?)
    }

    // --- Rescue ---

    /// Dispatches a rescuer to a stranded driver.
    ///
    /// Nothing is written unless the operator is known and the request is valid.
    pub async fn dispatch_rescue(
        &self,
        operator: Option<&User>,
        request: RescueRequest,
    ) -> ServiceResult<RescueDispatch> {
        let operator = operator.ok_or(ServiceError::MissingOperator)?;
        let company_id = dispatcher_scope(operator)?;
        let valid = validate_request(&request)?;

        let rescuer = self.company_driver(company_id, valid.rescuer_id).await?;
        let rescuee = self.company_driver(company_id, valid.rescuee_id).await?;
        check_participants(&rescuer, &rescuee)?;

        let dispatch = RescueDispatch {
            id: Uuid::new_v4(),
            company_id,
            rescuer_id: rescuer.id,
            rescuer_name: rescuer.name,
            rescuee_id: rescuee.id,
            rescuee_name: rescuee.name,
            address: valid.address,
            status: DispatchStatus::Dispatched,
            created_at: Utc::now(),
        };
        self.duty.dispatch_rescue(&dispatch).await?;
        info!(
            "Dispatched {} to rescue {} at '{}'",
            dispatch.rescuer_name, dispatch.rescuee_name, dispatch.address
        );
        Ok(dispatch)
    }

    /// Clears both rescue flags and confirms the driver is back at the station.
    pub async fn confirm_rts(&self, operator: &User, driver_id: Uuid) -> ServiceResult<()> {
        let company_id = dispatcher_scope(operator)?;
        let driver = self.company_driver(company_id, driver_id).await?;
        self.duty.confirm_rts(driver.id).await?;
        info!("RTS confirmed for {}", driver.name);
        Ok(())
    }

    async fn company_driver(&self, company_id: Uuid, driver_id: Uuid) -> ServiceResult<Driver> {
        let driver = self.duty.get_driver(driver_id).await?;
        if driver.company_id != company_id {
            return Err(ServiceError::forbidden("driver belongs to another company"));
        }
        Ok(driver)
    }

    // --- Bulk ---

    pub async fn bulk_off_duty(&self, operator: &User, driver_ids: &[Uuid]) -> ServiceResult<usize> {
        let company_id = dispatcher_scope(operator)?;
        if driver_ids.is_empty() {
            return Err(ServiceError::validation("Select at least one driver."));
        }
        let updated = self.duty.bulk_set_off_duty(company_id, driver_ids).await?;
        info!("Moved {} of {} selected drivers off duty", updated, driver_ids.len());
        Ok(updated)
    }

    // --- Stale-shift sweep ---

    /// Forces every shift older than the threshold off duty.
    ///
    /// Runs unattended, so write failures are logged and counted, never returned.
    pub async fn sweep_stale(&self, now: DateTime<Utc>) -> ServiceResult<SweepReport> {
        let roster = Roster::from_snapshot(self.duty.list_all_on_duty().await?);
        let stale: Vec<&Driver> = roster
            .stale_ids(now, self.off_duty_after)
            .into_iter()
            .filter_map(|id| roster.get(id))
            .collect();

        let writes = stale.iter().map(|driver| async move {
            match self.duty.set_off_duty(driver.id).await {
                Ok(()) => {
                    info!("Auto off-duty for {} after a long shift", driver.name);
                    true
                }
                Err(e) => {
                    warn!("Auto off-duty failed for {}: {:?}", driver.id, e);
                    false
                }
            }
        });
        let results = join_all(writes).await;

        let cleared = results.iter().filter(|ok| **ok).count();
        Ok(SweepReport {
            stale: stale.len(),
            cleared,
            failed: results.len() - cleared,
        })
    }

    // --- Returns ---

    pub async fn log_returns(
        &self,
        user: &User,
        report: ReturnsReport,
    ) -> ServiceResult<ReturnIncident> {
        let company_id = company_scope(user)?;
        if !user.role.works_shifts() {
            return Err(ServiceError::forbidden("only drivers and trainers log returns"));
        }
        let reasons: Vec<String> = report
            .reasons
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        let (count, reasons) = if report.has_returns {
            if report.count == 0 {
                return Err(ServiceError::validation("Enter how many packages came back."));
            }
            if reasons.is_empty() {
                return Err(ServiceError::validation("Select at least one return reason."));
            }
            (report.count, reasons)
        } else {
            (0, Vec::new())
        };

        let incident = ReturnIncident {
            id: Uuid::new_v4(),
            driver_id: user.user_id,
            driver_name: user.name.clone(),
            company_id,
            has_returns: report.has_returns,
            count,
            reasons,
            notified: false,
            created_at: Utc::now(),
        };
        self.returns.create_return(&incident).await?;
        info!("{} logged {} returns", incident.driver_name, incident.count);
        Ok(incident)
    }

    pub async fn list_returns(&self, operator: &User) -> ServiceResult<Vec<ReturnIncident>> {
        let company_id = dispatcher_scope(operator)?;
        Ok(self.returns.list_returns(company_id).await?)
    }

    pub async fn mark_returns_notified(&self, operator: &User, incident_id: Uuid) -> ServiceResult<()> {
        let company_id = dispatcher_scope(operator)?;
        Ok(self.returns.mark_returns_notified(company_id, incident_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DutyStatus, Role};

    fn on_duty(name: &str, checked_in: bool, rts_confirmed: bool) -> Driver {
        Driver {
            id: Uuid::new_v4(),
            name: name.to_string(),
            role: Role::Driver,
            company_id: Uuid::nil(),
            duty: DutyStatus {
                on_duty: true,
                on_duty_since: Some(Utc::now()),
                checked_in,
                rts_confirmed,
                ..DutyStatus::default()
            },
        }
    }

    fn incident(driver: &Driver) -> ReturnIncident {
        ReturnIncident {
            id: Uuid::new_v4(),
            driver_id: driver.id,
            driver_name: driver.name.clone(),
            company_id: Uuid::nil(),
            has_returns: true,
            count: 2,
            reasons: vec!["Business closed".to_string()],
            notified: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn view_marks_pending_returns_until_rts() {
        let pending = on_duty("Pat", true, false);
        let confirmed = on_duty("Quinn", false, true);
        let incidents = vec![incident(&pending), incident(&confirmed)];

        let view = RosterView::compose(
            &Roster::from_snapshot(vec![pending.clone(), confirmed.clone()]),
            &ReturnsIndex::from_incidents(&incidents),
        );

        assert_eq!(view.checked_in_count, 1);
        let flags: Vec<(String, bool)> = view
            .entries
            .iter()
            .map(|e| (e.driver.name.clone(), e.pending_returns))
            .collect();
        assert_eq!(
            flags,
            vec![("Pat".to_string(), true), ("Quinn".to_string(), false)]
        );
    }

    #[test]
    fn matching_view_filters_rows_but_keeps_count() {
        let roster = Roster::from_snapshot(vec![
            on_duty("Alice", true, false),
            on_duty("Bob", true, false),
        ]);
        let view = RosterView::compose_matching(&roster, &ReturnsIndex::new(), "  ALI ");
        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.entries[0].driver.name, "Alice");
        assert_eq!(view.checked_in_count, 2);
    }
}
