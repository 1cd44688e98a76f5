//! Vendor state and authorization history storage.
//!
//! The store owns the authoritative records, serializes access with one
//! reader/writer lock per collection and rewrites a collection in full after
//! each mutation through a pluggable [`CollectionBackend`].

pub mod backend;
pub mod json;
pub mod r#trait;

pub use backend::{CollectionBackend, FileBackend, MemoryBackend};
pub use json::JsonStore;
pub use r#trait::{Collection, StoreError, VendorStore};
