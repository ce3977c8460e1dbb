//! crates/driverroom_core/src/returns.rs
//!
//! Correlates return incidents with drivers for the roster's "pending returns" badge.

use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{Driver, ReturnIncident};

#[derive(Debug, Clone, Default)]
pub struct ReturnsIndex {
    by_driver: HashMap<Uuid, Vec<Uuid>>,
}

impl ReturnsIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_incidents(incidents: &[ReturnIncident]) -> Self {
        let mut index = Self::new();
        index.rebuild(incidents);
        index
    }

    /// Replaces the whole index from a full snapshot.
    pub fn rebuild(&mut self, incidents: &[ReturnIncident]) {
        self.by_driver.clear();
        for incident in incidents {
            self.insert(incident);
        }
    }

    pub fn insert(&mut self, incident: &ReturnIncident) {
        let ids = self.by_driver.entry(incident.driver_id).or_default();
        if !ids.contains(&incident.id) {
            ids.push(incident.id);
        }
    }

    pub fn incidents_for(&self, driver_id: Uuid) -> &[Uuid] {
        self.by_driver
            .get(&driver_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// A confirmed RTS suppresses the badge even though the incidents remain.
    pub fn has_pending(&self, driver: &Driver) -> bool {
        !driver.duty.rts_confirmed && !self.incidents_for(driver.id).is_empty()
    }
}
