//! Vendors domain module (sales authorization and its audit trail).
//!
//! This crate contains the business types for vendor authorization,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod history;
pub mod vendor;

pub use history::{HistoryEntry, HistoryId, NewHistoryEntry, TransitionRequest, truncate_to_second};
pub use vendor::{Transition, VendorRecord};
