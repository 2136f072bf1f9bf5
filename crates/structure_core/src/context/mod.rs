//! Entity store gateway: generic CRUD over every entity table.
//!
//! # Responsibility
//! - Expose get/find/query/save/delete generic over [`Entity`].
//! - Keep SQL and transaction handling behind the gateway boundary.
//!
//! # Invariants
//! - Include paths are optional; an empty or blank-only set loads no
//!   relations.
//! - Store errors propagate unchanged; the gateway never retries or logs
//!   failures.

pub mod error;
pub mod include;
pub mod model_context;
pub mod query;
pub mod unit_of_work;

use crate::model::entity::{Entity, EntityId};
use error::StoreResult;
use query::EntityQuery;

/// Generic data-access contract over persistent entities.
pub trait ModelStore {
    /// Lazy query over every `T`, eager-loading each include path.
    fn as_queryable<T: Entity>(&self, includes: &[&str]) -> EntityQuery<'_, T>;

    /// Returns exactly one entity; fails when none or several match.
    fn get<T: Entity>(&mut self, id: EntityId, includes: &[&str]) -> StoreResult<T>;

    /// Returns the matching entity, or `None` when it does not exist.
    fn find<T: Entity>(&mut self, id: EntityId, includes: &[&str]) -> StoreResult<Option<T>>;

    /// Deletes by id. A missing id is a no-op that returns `false`.
    fn delete<T: Entity>(&mut self, id: EntityId) -> StoreResult<bool>;

    /// Deletes the given entity and commits. `None` is an invalid argument.
    /// Returns whether the commit affected any row.
    fn delete_entity<T: Entity>(&mut self, entity: Option<&T>) -> StoreResult<bool>;

    /// Inserts a transient entity or updates a persisted one, then commits.
    /// Store-assigned values are written back onto `entity`.
    fn save<'e, T: Entity>(&mut self, entity: &'e mut T) -> StoreResult<&'e mut T>;
}
