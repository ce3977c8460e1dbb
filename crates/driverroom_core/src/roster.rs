//! crates/driverroom_core/src/roster.rs
//!
//! The live duty roster of one company: an id-keyed index of on-duty drivers and
//! trainers, with the derived views the dispatch board renders (sort order,
//! check-in count, staleness).

use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::domain::{Driver, Role};

/// Nine hours, after which an on-duty entry is forced off duty.
pub const DEFAULT_OFF_DUTY_AFTER_MS: i64 = 32_400_000;

pub fn default_off_duty_after() -> Duration {
    Duration::milliseconds(DEFAULT_OFF_DUTY_AFTER_MS)
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: HashMap<Uuid, Driver>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a roster from a full snapshot.
    pub fn from_snapshot(drivers: Vec<Driver>) -> Self {
        let mut roster = Self::new();
        roster.replace_snapshot(drivers);
        roster
    }

    /// Reconciles against a full snapshot. Entries missing from it, and
    /// off-duty records in it, are dropped.
    pub fn replace_snapshot(&mut self, drivers: Vec<Driver>) {
        let present: HashSet<Uuid> = drivers.iter().map(|d| d.id).collect();
        let gone: Vec<Uuid> = self
            .entries
            .keys()
            .filter(|id| !present.contains(id))
            .copied()
            .collect();
        for id in gone {
            self.remove(id);
        }
        for driver in drivers {
            self.upsert(driver);
        }
    }

    pub fn upsert(&mut self, driver: Driver) {
        if driver.duty.on_duty {
            self.entries.insert(driver.id, driver);
        } else {
            self.entries.remove(&driver.id);
        }
    }

    pub fn remove(&mut self, driver_id: Uuid) -> Option<Driver> {
        self.entries.remove(&driver_id)
    }

    pub fn get(&self, driver_id: Uuid) -> Option<&Driver> {
        self.entries.get(&driver_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn checked_in_count(&self) -> usize {
        self.entries.values().filter(|d| d.duty.checked_in).count()
    }

    /// The rendered order of the roster.
    pub fn sorted(&self) -> Vec<&Driver> {
        let mut drivers: Vec<&Driver> = self.entries.values().collect();
        drivers.sort_by(|a, b| roster_order(a, b));
        drivers
    }

    /// The sorted roster narrowed to names containing `query`, ignoring case.
    /// A blank query keeps everyone.
    pub fn filtered(&self, query: &str) -> Vec<&Driver> {
        let needle = query.trim().to_lowercase();
        self.sorted()
            .into_iter()
            .filter(|d| needle.is_empty() || d.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Ids of entries that have been on duty for longer than `threshold` at `now`.
    pub fn stale_ids(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<Uuid> {
        self.entries
            .values()
            .filter(|d| is_stale(d, now, threshold))
            .map(|d| d.id)
            .collect()
    }
}

fn role_rank(role: Role) -> u8 {
    match role {
        Role::Trainer => 0,
        Role::Driver => 1,
        Role::Company => 2,
        Role::Admin => 3,
    }
}

/// Checked-in first, then trainers before drivers, then name without case.
pub fn roster_order(a: &Driver, b: &Driver) -> Ordering {
    b.duty
        .checked_in
        .cmp(&a.duty.checked_in)
        .then_with(|| role_rank(a.role).cmp(&role_rank(b.role)))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn is_stale(driver: &Driver, now: DateTime<Utc>, threshold: Duration) -> bool {
    match (driver.duty.on_duty, driver.duty.on_duty_since) {
        (true, Some(since)) => now.signed_duration_since(since) > threshold,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DutyStatus;

    fn driver(name: &str, role: Role, checked_in: bool) -> Driver {
        Driver {
            id: Uuid::new_v4(),
            name: name.to_string(),
            role,
            company_id: Uuid::nil(),
            duty: DutyStatus {
                on_duty: true,
                on_duty_since: Some(Utc::now()),
                checked_in,
                ..DutyStatus::default()
            },
        }
    }

    fn names(drivers: &[&Driver]) -> Vec<String> {
        drivers.iter().map(|d| d.name.clone()).collect()
    }

    #[test]
    fn check_in_status_dominates_role() {
        let a = driver("A", Role::Trainer, false);
        let b = driver("B", Role::Driver, true);
        let roster = Roster::from_snapshot(vec![a, b]);
        assert_eq!(names(&roster.sorted()), vec!["B", "A"]);
    }

    #[test]
    fn trainers_before_drivers_then_names_ignore_case() {
        let roster = Roster::from_snapshot(vec![
            driver("zoe", Role::Driver, false),
            driver("Adam", Role::Driver, false),
            driver("bella", Role::Trainer, false),
            driver("Carl", Role::Trainer, true),
            driver("anna", Role::Driver, true),
        ]);
        assert_eq!(
            names(&roster.sorted()),
            vec!["Carl", "anna", "bella", "Adam", "zoe"]
        );
    }

    #[test]
    fn snapshot_drops_off_duty_records_and_counts_check_ins() {
        let mut off = driver("Off", Role::Driver, true);
        off.duty.on_duty = false;
        let roster = Roster::from_snapshot(vec![
            driver("One", Role::Driver, true),
            driver("Two", Role::Trainer, false),
            off,
        ]);
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.checked_in_count(), 1);
    }

    #[test]
    fn snapshot_reconciles_updates_departures_and_off_duty_records() {
        let mut stays = driver("Stays", Role::Driver, false);
        let leaves = driver("Leaves", Role::Driver, false);
        let mut ends = driver("Ends", Role::Trainer, false);
        let mut roster = Roster::from_snapshot(vec![stays.clone(), leaves.clone(), ends.clone()]);

        stays.duty.checked_in = true;
        ends.duty.clear_off_duty();
        let joins = driver("Joins", Role::Driver, false);
        roster.replace_snapshot(vec![stays.clone(), ends.clone(), joins.clone()]);

        assert_eq!(names(&roster.sorted()), vec!["Stays", "Joins"]);
        assert!(roster.get(leaves.id).is_none());
        assert!(roster.get(ends.id).is_none());
        assert_eq!(roster.checked_in_count(), 1);
    }

    #[test]
    fn filter_matches_substring_without_case() {
        let roster = Roster::from_snapshot(vec![
            driver("Maria Lopez", Role::Driver, false),
            driver("Mario Rossi", Role::Driver, false),
            driver("Tom", Role::Driver, false),
        ]);
        assert_eq!(names(&roster.filtered("MARI")), vec!["Maria Lopez", "Mario Rossi"]);
        assert_eq!(roster.filtered("  ").len(), 3);
    }

    #[test]
    fn staleness_uses_strict_threshold() {
        let now = Utc::now();
        let threshold = default_off_duty_after();
        let mut exactly = driver("Exactly", Role::Driver, false);
        exactly.duty.on_duty_since = Some(now - threshold);
        let mut over = driver("Over", Role::Driver, false);
        over.duty.on_duty_since = Some(now - Duration::hours(10));
        let mut unknown = driver("Unknown", Role::Driver, false);
        unknown.duty.on_duty_since = None;

        assert!(!is_stale(&exactly, now, threshold));
        assert!(is_stale(&over, now, threshold));
        assert!(!is_stale(&unknown, now, threshold));

        let roster = Roster::from_snapshot(vec![exactly, over.clone(), unknown]);
        assert_eq!(roster.stale_ids(now, threshold), vec![over.id]);
    }
}
