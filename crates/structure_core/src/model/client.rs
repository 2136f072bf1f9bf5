//! Client entity.

use crate::context::error::StoreResult;
use crate::context::include::load_collection;
use crate::model::entity::{read_identity, unknown_include, Entity, EntityId};
use crate::model::user::User;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

/// A customer organisation owning zero or more users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: EntityId,
    pub name: String,
    /// Unix epoch milliseconds of the last successful modification.
    pub changed_date: Option<i64>,
    /// Loaded only through the `Users` include path.
    #[serde(default)]
    pub users: Vec<User>,
}

impl Client {
    /// Creates a transient client.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            changed_date: None,
            users: Vec::new(),
        }
    }
}

impl Entity for Client {
    const TABLE: &'static str = "clients";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn changed_date(&self) -> Option<i64> {
        self.changed_date
    }

    fn set_changed_date(&mut self, changed_date: Option<i64>) {
        self.changed_date = changed_date;
    }

    fn column_values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone())]
    }

    fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        let (id, changed_date) = read_identity(row)?;
        Ok(Self {
            id,
            name: row.get("name")?,
            changed_date,
            users: Vec::new(),
        })
    }

    fn load_include(
        conn: &Connection,
        entities: &mut [Self],
        relation: &str,
        rest: Option<&str>,
    ) -> StoreResult<()> {
        if relation.eq_ignore_ascii_case("users") {
            return load_collection(
                conn,
                entities,
                "client_id",
                rest,
                |user: &User| user.client_id,
                |client: &mut Client| &mut client.users,
            );
        }
        Err(unknown_include::<Self>(relation))
    }

    fn clear_relations(&mut self) {
        self.users.clear();
    }
}
