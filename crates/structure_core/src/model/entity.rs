//! Persistent entity contract shared by every stored type.
//!
//! # Invariants
//! - `id() > 0` if and only if the entity has been persisted at least once.
//! - `changed_date()` is `None` while the entity is transient.
//! - Relation fields stay empty unless an include path requested them.

use crate::context::error::{StoreError, StoreResult};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::time::{SystemTime, UNIX_EPOCH};

/// Store-assigned integer identity. `0` marks a transient entity.
pub type EntityId = i64;

/// Column holding the store-assigned identity.
pub const ID_COLUMN: &str = "id";
/// Column holding the last-modified timestamp in epoch milliseconds.
pub const CHANGED_DATE_COLUMN: &str = "changed_date";

/// A domain object with persistent integer identity and a last-modified stamp.
///
/// Implementors describe their table shape statically so the gateway can
/// build keyed lookups, inserts and updates without per-type SQL.
pub trait Entity: Clone + 'static {
    /// Backing table name.
    const TABLE: &'static str;
    /// Persisted data columns, excluding `id` and `changed_date`, in the
    /// order produced by [`Entity::column_values`].
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> EntityId;
    fn set_id(&mut self, id: EntityId);
    fn changed_date(&self) -> Option<i64>;
    fn set_changed_date(&mut self, changed_date: Option<i64>);

    /// Values bound to [`Entity::COLUMNS`] on insert and update.
    fn column_values(&self) -> Vec<Value>;

    /// Maps one row selected with [`select_columns`] into an entity.
    fn from_row(row: &Row<'_>) -> StoreResult<Self>;

    /// Eagerly loads the relation named `relation` onto every entity in
    /// `entities`. `rest` carries the remaining dotted path, if any, which
    /// is applied to the loaded related entities.
    fn load_include(
        _conn: &Connection,
        _entities: &mut [Self],
        relation: &str,
        _rest: Option<&str>,
    ) -> StoreResult<()> {
        Err(unknown_include::<Self>(relation))
    }

    /// Resets every relation field to its unloaded state.
    fn clear_relations(&mut self) {}

    fn is_transient(&self) -> bool {
        self.id() <= 0
    }

    /// Returns whether `column` names a persisted column of this entity.
    fn has_column(column: &str) -> bool {
        column == ID_COLUMN || column == CHANGED_DATE_COLUMN || Self::COLUMNS.contains(&column)
    }
}

/// Comma-separated select list: `id, changed_date, <COLUMNS>`.
pub fn select_columns<T: Entity>() -> String {
    let mut columns = vec![ID_COLUMN, CHANGED_DATE_COLUMN];
    columns.extend_from_slice(T::COLUMNS);
    columns.join(", ")
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Error for a relation name the entity `T` does not define.
pub fn unknown_include<T: Entity>(relation: &str) -> StoreError {
    StoreError::UnknownInclude {
        entity: T::TABLE,
        path: relation.to_string(),
    }
}

/// Reads the shared `id` and `changed_date` columns from a selected row.
pub(crate) fn read_identity(row: &Row<'_>) -> StoreResult<(EntityId, Option<i64>)> {
    let id: EntityId = row.get(ID_COLUMN)?;
    if id <= 0 {
        return Err(StoreError::InvalidData(format!(
            "non-positive id `{id}` in persisted row"
        )));
    }
    Ok((id, row.get(CHANGED_DATE_COLUMN)?))
}

pub(crate) fn optional_text(value: &Option<String>) -> Value {
    match value {
        Some(text) => Value::Text(text.clone()),
        None => Value::Null,
    }
}
