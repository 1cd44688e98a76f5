//! Vendor authorization engine (application-level orchestration).
//!
//! Enforces the two permitted business transitions and produces one audit
//! entry for each of them:
//!
//! ```text
//! authorize / revoke (raw id, actor)
//!   ↓
//! 1. Validate the vendor id (positive)
//!   ↓
//! 2. Build the transition request, stamped with the current time
//!   ↓
//! 3. Store: read previous state, write new state, append history entry
//!   ↓
//! 4. Return the now-current state
//! ```
//!
//! Store failures are propagated unchanged; nothing is retried.

use chrono::Utc;
use thiserror::Error;

use vendorauth_core::VendorId;
use vendorauth_vendors::{HistoryEntry, Transition, TransitionRequest, VendorRecord};

use crate::store::{StoreError, VendorStore};

#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// Vendor id was zero or negative. The caller must correct the request.
    #[error("invalid vendor id {0}: must be a positive integer")]
    InvalidId(i64),

    /// No record exists for the vendor.
    #[error("vendor {0} not found")]
    NotFound(i64),

    /// Persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Authorization engine over a [`VendorStore`].
///
/// Transitions are unconstrained: authorizing an authorized vendor (or
/// revoking an unauthorized one) is legal and still recorded. Unknown vendors
/// are created on their first transition and start out unauthorized.
#[derive(Debug, Clone)]
pub struct AuthorizationEngine<S> {
    store: S,
}

impl<S: VendorStore> AuthorizationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn authorize(&self, vendor_id: i64, actor: &str) -> Result<bool, AuthorizationError> {
        self.set_state(vendor_id, true, actor)
    }

    pub fn revoke(&self, vendor_id: i64, actor: &str) -> Result<bool, AuthorizationError> {
        self.set_state(vendor_id, false, actor)
    }

    /// Move the vendor to `target` and return it as the confirmed state.
    pub fn set_state(
        &self,
        vendor_id: i64,
        target: bool,
        actor: &str,
    ) -> Result<bool, AuthorizationError> {
        self.transition(vendor_id, Transition::from_target(target), actor)
            .map(|entry| entry.new_state)
    }

    /// Apply a transition and return the audit entry that records it.
    pub fn transition(
        &self,
        vendor_id: i64,
        transition: Transition,
        actor: &str,
    ) -> Result<HistoryEntry, AuthorizationError> {
        let id = VendorId::new(vendor_id).map_err(|_| {
            tracing::warn!(vendor_id, %transition, "rejected transition for invalid vendor id");
            AuthorizationError::InvalidId(vendor_id)
        })?;

        let request = TransitionRequest::new(id, transition, actor, Utc::now());
        let entry = self.store.apply_transition(request).map_err(|e| {
            tracing::error!(vendor_id, %transition, error = %e, "transition could not be stored");
            AuthorizationError::Store(e)
        })?;

        tracing::info!(
            vendor_id,
            %transition,
            previous_state = entry.previous_state,
            new_state = entry.new_state,
            actor = %entry.actor,
            history_id = %entry.history_id,
            "vendor authorization changed"
        );
        Ok(entry)
    }

    /// Current authorization flag.
    ///
    /// Non-positive ids can never have a record, so they report `NotFound`.
    pub fn query_state(&self, vendor_id: i64) -> Result<bool, AuthorizationError> {
        let Ok(id) = VendorId::new(vendor_id) else {
            return Err(AuthorizationError::NotFound(vendor_id));
        };
        self.store
            .get_state(id)
            .map_err(|e| {
                tracing::error!(vendor_id, error = %e, "vendor state could not be read");
                AuthorizationError::Store(e)
            })?
            .ok_or(AuthorizationError::NotFound(vendor_id))
    }

    /// Audit trail in insertion order. Never fails.
    pub fn history(&self, vendor_id: i64) -> Vec<HistoryEntry> {
        match VendorId::new(vendor_id) {
            Ok(id) => self.store.list_history(id),
            Err(_) => vec![],
        }
    }

    pub fn list_vendors(&self) -> Vec<VendorRecord> {
        self.store.list_vendors()
    }
}
