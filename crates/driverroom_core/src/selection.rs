//! crates/driverroom_core/src/selection.rs
//!
//! Multi-select state for bulk roster actions. Ephemeral and client-side;
//! nothing here touches a store.

use std::collections::HashSet;
use uuid::Uuid;

/// What a tap on a roster row resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    /// Multi-select is off and the company plan has no rescue feature.
    Ignored,
    /// Multi-select is off: open the rescue selection for this driver.
    OpenRescue(Uuid),
    /// Multi-select is on: membership flipped.
    Toggled { selected: bool },
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    active: bool,
    ids: HashSet<Uuid>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    /// Leaving multi-select always empties the set.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if !active {
            self.ids.clear();
        }
    }

    pub fn toggle_mode(&mut self) {
        self.set_active(!self.active);
    }

    pub fn tap(&mut self, id: Uuid, rescue_enabled: bool) -> TapOutcome {
        if !self.active {
            return if rescue_enabled {
                TapOutcome::OpenRescue(id)
            } else {
                TapOutcome::Ignored
            };
        }
        let selected = if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        };
        TapOutcome::Toggled { selected }
    }

    /// Selects exactly `filtered`, or clears when that is already the selection.
    pub fn toggle_all(&mut self, filtered: &[Uuid]) {
        let target: HashSet<Uuid> = filtered.iter().copied().collect();
        if self.ids == target {
            self.ids.clear();
        } else {
            self.ids = target;
        }
    }

    /// Hands the selection to a bulk action and leaves multi-select mode.
    pub fn finish_bulk(&mut self) -> Vec<Uuid> {
        let ids = self.ids.drain().collect();
        self.active = false;
        ids
    }
}
