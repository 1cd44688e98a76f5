//! Audit trail of authorization changes.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use vendorauth_core::{Entity, VendorId};

use crate::vendor::Transition;

/// Identifier of a history entry.
///
/// Assigned by the store from a strictly increasing counter; never derived
/// from the wall clock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryId(u64);

impl HistoryId {
    pub const FIRST: HistoryId = HistoryId(1);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Default for HistoryId {
    fn default() -> Self {
        Self::FIRST
    }
}

impl core::fmt::Display for HistoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Normalize a timestamp to whole-second resolution.
pub fn truncate_to_second(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(0)
}

/// Immutable record of one authorization change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub history_id: HistoryId,
    pub vendor_id: VendorId,
    pub previous_state: bool,
    pub new_state: bool,
    pub changed_at: DateTime<Utc>,
    #[serde(default)]
    pub actor: String,
}

impl HistoryEntry {
    pub fn transition(&self) -> Transition {
        Transition::from_target(self.new_state)
    }
}

impl Entity for HistoryEntry {
    type Id = HistoryId;

    fn id(&self) -> HistoryId {
        self.history_id
    }
}

/// A history entry that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub vendor_id: VendorId,
    pub previous_state: bool,
    pub new_state: bool,
    pub changed_at: DateTime<Utc>,
    pub actor: String,
}

impl NewHistoryEntry {
    /// Seal the entry with its id. `changed_at` is truncated to whole seconds.
    pub fn assign(self, history_id: HistoryId) -> HistoryEntry {
        HistoryEntry {
            history_id,
            vendor_id: self.vendor_id,
            previous_state: self.previous_state,
            new_state: self.new_state,
            changed_at: truncate_to_second(self.changed_at),
            actor: self.actor,
        }
    }
}

/// A validated request to move a vendor to a new authorization state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub vendor_id: VendorId,
    pub transition: Transition,
    pub actor: String,
    pub requested_at: DateTime<Utc>,
}

impl TransitionRequest {
    pub fn new(
        vendor_id: VendorId,
        transition: Transition,
        actor: impl Into<String>,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            vendor_id,
            transition,
            actor: actor.into(),
            requested_at,
        }
    }

    pub fn target(&self) -> bool {
        self.transition.target()
    }

    /// Audit entry for this request given the state observed before it.
    pub fn to_history(&self, previous_state: bool) -> NewHistoryEntry {
        NewHistoryEntry {
            vendor_id: self.vendor_id,
            previous_state,
            new_state: self.target(),
            changed_at: self.requested_at,
            actor: self.actor.clone(),
        }
    }
}
