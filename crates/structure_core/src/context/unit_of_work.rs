//! Explicit unit of work: pending changes committed as one transaction.
//!
//! # Invariants
//! - Changes apply in registration order inside one immediate transaction.
//! - `commit` drains the pending set whether it succeeds or not; a failed
//!   commit leaves the store untouched.
//! - An update that matches no row aborts the whole commit.

use crate::context::error::{StoreError, StoreResult};
use crate::model::entity::{Entity, EntityId, CHANGED_DATE_COLUMN, ID_COLUMN};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use std::time::Instant;

#[derive(Debug, Clone)]
enum PendingChange {
    Insert {
        table: &'static str,
        columns: &'static [&'static str],
        values: Vec<Value>,
    },
    Update {
        table: &'static str,
        columns: &'static [&'static str],
        values: Vec<Value>,
        changed_date: Option<i64>,
        id: EntityId,
    },
    Delete {
        table: &'static str,
        id: EntityId,
    },
}

/// Store-assigned values of one inserted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertedKey {
    pub id: EntityId,
    pub changed_date: Option<i64>,
}

/// Result of a successful [`UnitOfWork::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Rows directly touched by the committed changes.
    pub affected_rows: usize,
    /// One entry per insert, in registration order.
    pub inserted: Vec<InsertedKey>,
}

/// Scoped set of pending inserts, updates and deletes.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    pending: Vec<PendingChange>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `entity` for insertion. The store assigns its identity.
    pub fn add<T: Entity>(&mut self, entity: &T) {
        self.pending.push(PendingChange::Insert {
            table: T::TABLE,
            columns: T::COLUMNS,
            values: entity.column_values(),
        });
    }

    /// Registers a full-row update of a persisted entity, including its
    /// current `changed_date`.
    pub fn mark_modified<T: Entity>(&mut self, entity: &T) {
        self.pending.push(PendingChange::Update {
            table: T::TABLE,
            columns: T::COLUMNS,
            values: entity.column_values(),
            changed_date: entity.changed_date(),
            id: entity.id(),
        });
    }

    /// Registers physical removal of a persisted entity.
    pub fn remove<T: Entity>(&mut self, entity: &T) {
        self.pending.push(PendingChange::Delete {
            table: T::TABLE,
            id: entity.id(),
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every pending change without touching the store.
    pub fn discard(&mut self) {
        self.pending.clear();
    }

    /// Applies all pending changes atomically.
    pub fn commit(&mut self, conn: &mut Connection) -> StoreResult<CommitOutcome> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(CommitOutcome::default());
        }

        let started_at = Instant::now();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut outcome = CommitOutcome::default();
        for change in &pending {
            apply_change(&tx, change, &mut outcome)?;
        }
        tx.commit()?;

        debug!(
            "event=uow_commit module=context status=ok changes={} affected_rows={} duration_ms={}",
            pending.len(),
            outcome.affected_rows,
            started_at.elapsed().as_millis()
        );
        Ok(outcome)
    }
}

fn apply_change(
    tx: &Transaction<'_>,
    change: &PendingChange,
    outcome: &mut CommitOutcome,
) -> StoreResult<()> {
    match change {
        PendingChange::Insert {
            table,
            columns,
            values,
        } => {
            let sql = if columns.is_empty() {
                format!(
                    "INSERT INTO {table} DEFAULT VALUES RETURNING {ID_COLUMN}, {CHANGED_DATE_COLUMN};"
                )
            } else {
                let placeholders = (1..=columns.len())
                    .map(|index| format!("?{index}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "INSERT INTO {table} ({}) VALUES ({placeholders}) RETURNING {ID_COLUMN}, {CHANGED_DATE_COLUMN};",
                    columns.join(", ")
                )
            };
            let key = tx.query_row(&sql, params_from_iter(values.iter()), |row| {
                Ok(InsertedKey {
                    id: row.get(0)?,
                    changed_date: row.get(1)?,
                })
            })?;
            outcome.affected_rows += 1;
            outcome.inserted.push(key);
        }
        PendingChange::Update {
            table,
            columns,
            values,
            changed_date,
            id,
        } => {
            let mut assignments: Vec<String> = columns
                .iter()
                .enumerate()
                .map(|(index, column)| format!("{column} = ?{}", index + 1))
                .collect();
            assignments.push(format!("{CHANGED_DATE_COLUMN} = ?{}", columns.len() + 1));
            let sql = format!(
                "UPDATE {table} SET {} WHERE {ID_COLUMN} = ?{};",
                assignments.join(", "),
                columns.len() + 2
            );

            let mut bind_values = values.clone();
            bind_values.push(changed_date.map_or(Value::Null, Value::Integer));
            bind_values.push(Value::Integer(*id));

            let changed = tx.execute(&sql, params_from_iter(bind_values))?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    entity: *table,
                    id: Some(*id),
                });
            }
            outcome.affected_rows += changed;
        }
        PendingChange::Delete { table, id } => {
            let changed = tx.execute(
                &format!("DELETE FROM {table} WHERE {ID_COLUMN} = ?1;"),
                [*id],
            )?;
            outcome.affected_rows += changed;
        }
    }
    Ok(())
}
