//! Infrastructure layer: vendor store, persistence backends, config, and the
//! authorization engine that composes them.

pub mod authorization;
pub mod config;
pub mod store;


pub use authorization::{AuthorizationEngine, AuthorizationError};
pub use config::{Config, ConfigError};
pub use store::{
    Collection, CollectionBackend, FileBackend, JsonStore, MemoryBackend, StoreError, VendorStore,
};
