//! Eager-loading helpers used by [`Entity::load_include`] implementations.
//!
//! Each helper issues one extra query per relation level and per chunk of
//! at most [`KEY_CHUNK_SIZE`] keys (`WHERE key IN (...)`), then distributes
//! the results onto the already loaded entities.

use crate::context::error::StoreResult;
use crate::context::query::EntityQuery;
use crate::model::entity::{Entity, EntityId, ID_COLUMN};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};

/// Upper bound on bound parameters per relation query. SQLite caps host
/// parameters per statement at 32766.
pub const KEY_CHUNK_SIZE: usize = 500;

/// Loads a one-to-many relation: every `C` whose `foreign_key` column points
/// at a parent's id is attached to that parent through `slot`.
pub fn load_collection<P, C>(
    conn: &Connection,
    parents: &mut [P],
    foreign_key: &'static str,
    rest: Option<&str>,
    parent_key: impl Fn(&C) -> EntityId,
    slot: impl Fn(&mut P) -> &mut Vec<C>,
) -> StoreResult<()>
where
    P: Entity,
    C: Entity,
{
    let keys: BTreeSet<EntityId> = parents
        .iter()
        .map(P::id)
        .filter(|id| *id > 0)
        .collect();

    let mut grouped: BTreeMap<EntityId, Vec<C>> = BTreeMap::new();
    for chunk in key_chunks(&keys) {
        for child in fetch_chunk::<C>(conn, foreign_key, chunk, rest)? {
            grouped.entry(parent_key(&child)).or_default().push(child);
        }
    }

    for parent in parents.iter_mut() {
        let children = grouped.get(&parent.id()).cloned().unwrap_or_default();
        *slot(parent) = children;
    }
    Ok(())
}

/// Loads a many-to-one relation: the `P` referenced by each entity's
/// `reference_key` is attached through `slot`.
pub fn load_reference<C, P>(
    conn: &Connection,
    entities: &mut [C],
    rest: Option<&str>,
    reference_key: impl Fn(&C) -> Option<EntityId>,
    slot: impl Fn(&mut C) -> &mut Option<P>,
) -> StoreResult<()>
where
    C: Entity,
    P: Entity,
{
    let keys: BTreeSet<EntityId> = entities.iter().filter_map(&reference_key).collect();

    let mut targets: BTreeMap<EntityId, P> = BTreeMap::new();
    for chunk in key_chunks(&keys) {
        for target in fetch_chunk::<P>(conn, ID_COLUMN, chunk, rest)? {
            targets.insert(target.id(), target);
        }
    }

    for entity in entities.iter_mut() {
        let target = reference_key(&*entity).and_then(|key| targets.get(&key).cloned());
        *slot(entity) = target;
    }
    Ok(())
}

/// Splits `keys` into bounded chunks. An empty key set still yields one
/// empty chunk so nested include paths get resolved against the target type.
fn key_chunks(keys: &BTreeSet<EntityId>) -> Vec<Vec<EntityId>> {
    let keys: Vec<EntityId> = keys.iter().copied().collect();
    if keys.is_empty() {
        return vec![Vec::new()];
    }
    keys.chunks(KEY_CHUNK_SIZE).map(<[EntityId]>::to_vec).collect()
}

fn fetch_chunk<T: Entity>(
    conn: &Connection,
    column: &'static str,
    keys: Vec<EntityId>,
    rest: Option<&str>,
) -> StoreResult<Vec<T>> {
    let mut query =
        EntityQuery::<T>::new(conn).filter_in(column, keys.into_iter().map(Value::Integer));
    if let Some(rest) = rest {
        query = query.include(rest);
    }
    query.fetch_all()
}
