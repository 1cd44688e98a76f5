use std::sync::Arc;

use thiserror::Error;

use vendorauth_core::VendorId;
use vendorauth_vendors::{HistoryEntry, NewHistoryEntry, TransitionRequest, VendorRecord};

/// One persisted set of records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Collection {
    Vendors,
    History,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Vendors => "vendors",
            Collection::History => "history",
        }
    }
}

impl core::fmt::Display for Collection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor store operation error.
///
/// These are **infrastructure errors** (durability, data integrity) as opposed
/// to domain errors (bad ids, missing vendors).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a collection failed.
    #[error("{collection} collection I/O failed: {source}")]
    Io {
        collection: Collection,
        #[source]
        source: std::io::Error,
    },

    /// Stored data could not be parsed. Fatal at startup.
    #[error("{collection} collection is corrupt: {source}")]
    Corrupt {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },

    #[error("{collection} collection serialization failed: {source}")]
    Serialize {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} lock poisoned")]
    LockPoisoned(Collection),

    /// The vendor state was durably advanced but its history entry could not
    /// be written, and rolling the state back failed as well.
    #[error("vendor {vendor_id} state persisted without its history entry: {source}")]
    PartialWrite {
        vendor_id: VendorId,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub fn collection(&self) -> Option<Collection> {
        match self {
            StoreError::Io { collection, .. }
            | StoreError::Corrupt { collection, .. }
            | StoreError::Serialize { collection, .. } => Some(*collection),
            StoreError::LockPoisoned(collection) => Some(*collection),
            StoreError::PartialWrite { .. } => None,
        }
    }
}

/// Durable, thread-safe keeper of vendor state and authorization history.
///
/// The store is the only owner of authoritative records; every read returns
/// clones so callers can never mutate stored state.
///
/// ## Concurrency
///
/// Implementations guard each collection (vendors, history) with a
/// reader/writer lock. Readers run concurrently with each other; a mutation
/// excludes everything else on the collections it touches.
///
/// ## Durability
///
/// Mutations are synchronous: `Ok` is only returned after the affected
/// collection has been fully rewritten to the backing medium. When a write
/// fails, the in-memory change is undone so the store keeps reflecting the
/// last successful flush.
///
/// ## History ids
///
/// `append_history` and `apply_transition` assign ids from a counter owned by
/// the store and guarded by the history lock, so ids are unique and strictly
/// increasing in append order.
pub trait VendorStore: Send + Sync {
    /// Current authorization flag, `None` if the vendor was never created.
    fn get_state(&self, vendor_id: VendorId) -> Result<Option<bool>, StoreError>;

    /// Copy of a single vendor record.
    fn get_vendor(&self, vendor_id: VendorId) -> Result<Option<VendorRecord>, StoreError>;

    /// Upsert the vendor's flag and stamp the matching timestamp with now.
    fn set_state(&self, vendor_id: VendorId, authorized: bool) -> Result<(), StoreError>;

    /// Append an audit entry, assigning its id and truncating `changed_at`
    /// to whole seconds.
    fn append_history(&self, entry: NewHistoryEntry) -> Result<HistoryEntry, StoreError>;

    /// Read the previous state, write the new one and record the audit entry
    /// as one operation, holding both collection locks for its duration.
    ///
    /// An unknown vendor counts as previously unauthorized.
    fn apply_transition(&self, request: TransitionRequest) -> Result<HistoryEntry, StoreError>;

    /// History of one vendor in insertion order, empty if none.
    ///
    /// Never fails: an unreadable collection is logged and reads as empty.
    fn list_history(&self, vendor_id: VendorId) -> Vec<HistoryEntry>;

    /// All vendor records. Order is not part of the contract.
    fn list_vendors(&self) -> Vec<VendorRecord>;
}

impl<S> VendorStore for Arc<S>
where
    S: VendorStore + ?Sized,
{
    fn get_state(&self, vendor_id: VendorId) -> Result<Option<bool>, StoreError> {
        (**self).get_state(vendor_id)
    }

    fn get_vendor(&self, vendor_id: VendorId) -> Result<Option<VendorRecord>, StoreError> {
        (**self).get_vendor(vendor_id)
    }

    fn set_state(&self, vendor_id: VendorId, authorized: bool) -> Result<(), StoreError> {
        (**self).set_state(vendor_id, authorized)
    }

    fn append_history(&self, entry: NewHistoryEntry) -> Result<HistoryEntry, StoreError> {
        (**self).append_history(entry)
    }

    fn apply_transition(&self, request: TransitionRequest) -> Result<HistoryEntry, StoreError> {
        (**self).apply_transition(request)
    }

    fn list_history(&self, vendor_id: VendorId) -> Vec<HistoryEntry> {
        (**self).list_history(vendor_id)
    }

    fn list_vendors(&self) -> Vec<VendorRecord> {
        (**self).list_vendors()
    }
}
