//! User entity.

use crate::context::error::StoreResult;
use crate::context::include::load_reference;
use crate::model::client::Client;
use crate::model::entity::{optional_text, read_identity, unknown_include, Entity, EntityId};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

/// A login belonging to exactly one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub client_id: EntityId,
    pub user_name: String,
    pub email: Option<String>,
    pub changed_date: Option<i64>,
    /// Loaded only through the `Client` include path.
    #[serde(default)]
    pub client: Option<Client>,
}

impl User {
    /// Creates a transient user attached to `client_id`.
    pub fn new(client_id: EntityId, user_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            client_id,
            user_name: user_name.into(),
            email: None,
            changed_date: None,
            client: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &["client_id", "user_name", "email"];

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
        vec![
            Value::Integer(self.client_id),
            Value::Text(self.user_name.clone()),
            optional_text(&self.email),
        ]
    }

    fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        let (id, changed_date) = read_identity(row)?;
        Ok(Self {
            id,
            client_id: row.get("client_id")?,
            user_name: row.get("user_name")?,
            email: row.get("email")?,
            changed_date,
            client: None,
        })
    }

    fn load_include(
        conn: &Connection,
        entities: &mut [Self],
        relation: &str,
        rest: Option<&str>,
    ) -> StoreResult<()> {
        if relation.eq_ignore_ascii_case("client") {
            return load_reference(
                conn,
                entities,
                rest,
                |user: &User| Some(user.client_id),
                |user: &mut User| &mut user.client,
            );
        }
        Err(unknown_include::<Self>(relation))
    }

    fn clear_relations(&mut self) {
        self.client = None;
    }
}
