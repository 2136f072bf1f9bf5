//! Error taxonomy for gateway, query and unit-of-work operations.

use crate::db::DbError;
use crate::model::entity::EntityId;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the entity store gateway.
///
/// Store failures are wrapped in [`StoreError::Db`] with their source kept
/// intact; nothing is retried or translated.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
    /// No row matched a strict single-row lookup.
    #[error("{entity} not found{}", id_suffix(.id))]
    NotFound {
        entity: &'static str,
        id: Option<EntityId>,
    },
    /// More than one row matched a single-row lookup.
    #[error("multiple {entity} rows matched{}", id_suffix(.id))]
    MultipleFound {
        entity: &'static str,
        id: Option<EntityId>,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid include path `{0}`")]
    InvalidIncludePath(String),
    #[error("{entity} has no relation named `{path}`")]
    UnknownInclude { entity: &'static str, path: String },
    #[error("{entity} has no column named `{column}`")]
    UnknownColumn { entity: &'static str, column: String },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    #[error("model context requires schema version {expected_version}, got {actual_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("model context requires table `{0}`")]
    MissingRequiredTable(&'static str),
    #[error("model context requires column `{column}` in table `{table}`")]
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

fn id_suffix(id: &Option<EntityId>) -> String {
    match id {
        Some(id) => format!(" (id {id})"),
        None => String::new(),
    }
}
