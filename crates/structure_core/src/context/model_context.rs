//! SQLite-backed entity store gateway.
//!
//! # Invariants
//! - One context wraps one mutably borrowed connection; it is never shared.
//! - Every mutating operation commits before it returns.
//! - The identity map only holds entities without loaded relations.

use crate::context::error::{StoreError, StoreResult};
use crate::context::query::EntityQuery;
use crate::context::unit_of_work::UnitOfWork;
use crate::context::ModelStore;
use crate::db::migrations::{current_version, latest_version};
use crate::model::entity::{now_epoch_ms, select_columns, Entity, EntityId, ID_COLUMN};
use crate::model::{entity_tables, IDENTITY_COLUMNS};
use rusqlite::Connection;
use std::any::{Any, TypeId};
use std::collections::HashMap;

type TrackedKey = (TypeId, EntityId);

/// Generic gateway over every entity table.
pub struct ModelContext<'conn> {
    conn: &'conn mut Connection,
    unit: UnitOfWork,
    tracked: HashMap<TrackedKey, Box<dyn Any>>,
}

impl<'conn> ModelContext<'conn> {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version is not the latest.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when an entity
    ///   table does not have the expected shape.
    pub fn try_new(conn: &'conn mut Connection) -> StoreResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self {
            conn,
            unit: UnitOfWork::new(),
            tracked: HashMap::new(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &*self.conn
    }

    /// Returns whether `find` would answer `id` without a store round-trip.
    pub fn is_tracked<T: Entity>(&self, id: EntityId) -> bool {
        self.tracked.contains_key(&(TypeId::of::<T>(), id))
    }

    /// Forgets every tracked entity.
    pub fn clear_tracked(&mut self) {
        self.tracked.clear();
    }

    fn track<T: Entity>(&mut self, entity: &T) {
        let mut snapshot = entity.clone();
        snapshot.clear_relations();
        self.tracked
            .insert((TypeId::of::<T>(), entity.id()), Box::new(snapshot));
    }

    fn tracked_copy<T: Entity>(&self, id: EntityId) -> Option<T> {
        self.tracked
            .get(&(TypeId::of::<T>(), id))
            .and_then(|entity| entity.downcast_ref::<T>())
            .cloned()
    }
}

impl ModelStore for ModelContext<'_> {
    fn as_queryable<T: Entity>(&self, includes: &[&str]) -> EntityQuery<'_, T> {
        includes
            .iter()
            .fold(EntityQuery::new(self.connection()), |query, path| query.include(*path))
    }

    fn get<T: Entity>(&mut self, id: EntityId, includes: &[&str]) -> StoreResult<T> {
        if has_includes(includes) {
            let entity = self.as_queryable::<T>(includes).filter_id(id).single()?;
            self.track(&entity);
            return Ok(entity);
        }

        let mut rows = fetch_by_id::<T>(self.connection(), id)?;
        let entity = match rows.len() {
            0 => {
                return Err(StoreError::NotFound {
                    entity: T::TABLE,
                    id: Some(id),
                })
            }
            1 => rows.remove(0),
            _ => {
                return Err(StoreError::MultipleFound {
                    entity: T::TABLE,
                    id: Some(id),
                })
            }
        };
        self.track(&entity);
        Ok(entity)
    }

    fn find<T: Entity>(&mut self, id: EntityId, includes: &[&str]) -> StoreResult<Option<T>> {
        if has_includes(includes) {
            let entity = self
                .as_queryable::<T>(includes)
                .filter_id(id)
                .single_or_none()?;
            if let Some(entity) = entity.as_ref() {
                self.track(entity);
            }
            return Ok(entity);
        }

        if let Some(entity) = self.tracked_copy::<T>(id) {
            return Ok(Some(entity));
        }

        let mut rows = fetch_by_id::<T>(self.connection(), id)?;
        if rows.len() > 1 {
            return Err(StoreError::MultipleFound {
                entity: T::TABLE,
                id: Some(id),
            });
        }
        let entity = rows.pop();
        if let Some(entity) = entity.as_ref() {
            self.track(entity);
        }
        Ok(entity)
    }

    fn delete<T: Entity>(&mut self, id: EntityId) -> StoreResult<bool> {
        match self.find::<T>(id, &[])? {
            Some(entity) => self.delete_entity(Some(&entity)),
            None => Ok(false),
        }
    }

    fn delete_entity<T: Entity>(&mut self, entity: Option<&T>) -> StoreResult<bool> {
        let entity = entity.ok_or_else(|| {
            StoreError::InvalidArgument(format!(
                "{} entity can not be absent when calling delete",
                T::TABLE
            ))
        })?;
        if entity.is_transient() {
            return Err(StoreError::InvalidArgument(format!(
                "{} entity with id {} has never been saved",
                T::TABLE,
                entity.id()
            )));
        }

        self.unit.remove(entity);
        let outcome = self.unit.commit(&mut *self.conn)?;
        // Cascades may have removed rows of other entity types.
        self.tracked.clear();
        Ok(outcome.affected_rows > 0)
    }

    fn save<'e, T: Entity>(&mut self, entity: &'e mut T) -> StoreResult<&'e mut T> {
        if entity.is_transient() {
            self.unit.add(&*entity);
            let outcome = self.unit.commit(&mut *self.conn)?;
            let key = outcome.inserted.first().copied().ok_or_else(|| {
                StoreError::InvalidData(format!("insert into {} returned no key", T::TABLE))
            })?;
            entity.set_id(key.id);
            entity.set_changed_date(key.changed_date);
        } else {
            let previous = entity.changed_date();
            let now = now_epoch_ms();
            entity.set_changed_date(Some(previous.map_or(now, |previous| now.max(previous))));
            self.unit.mark_modified(&*entity);
            if let Err(err) = self.unit.commit(&mut *self.conn) {
                entity.set_changed_date(previous);
                return Err(err);
            }
        }

        self.track(&*entity);
        Ok(entity)
    }
}

fn has_includes(includes: &[&str]) -> bool {
    includes.iter().any(|path| !path.trim().is_empty())
}

/// Keyed lookup that bypasses the query builder. Reads at most two rows so
/// duplicated keys are detectable.
fn fetch_by_id<T: Entity>(conn: &Connection, id: EntityId) -> StoreResult<Vec<T>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} WHERE {ID_COLUMN} = ?1 LIMIT 2;",
        select_columns::<T>(),
        T::TABLE
    ))?;
    let mut rows = stmt.query([id])?;
    let mut entities = Vec::new();
    while let Some(row) = rows.next()? {
        entities.push(T::from_row(row)?);
    }
    Ok(entities)
}

fn ensure_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for (table, columns) in entity_tables() {
        if !table_exists(conn, table)? {
            return Err(StoreError::MissingRequiredTable(table));
        }
        for column in IDENTITY_COLUMNS.iter().chain(columns.iter()) {
            if !table_has_column(conn, table, column)? {
                return Err(StoreError::MissingRequiredColumn {
                    table,
                    column: *column,
                });
            }
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
