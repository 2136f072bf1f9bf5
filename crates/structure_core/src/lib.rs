//! Generic data-access layer for the Structure application.
//! Entity tables, the `ModelContext` gateway and its unit of work live here.

pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;

pub use config::{ConfigError, DatabaseLocation, StoreConfig};
pub use context::error::{StoreError, StoreResult};
pub use context::model_context::ModelContext;
pub use context::query::{EntityQuery, SortOrder};
pub use context::unit_of_work::{CommitOutcome, InsertedKey, UnitOfWork};
pub use context::ModelStore;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::client::Client;
pub use model::entity::{Entity, EntityId};
pub use model::user::User;

/// Minimal health-check API for wiring checks.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
