//! Lazy, composable entity queries with eager loading.
//!
//! # Invariants
//! - Building a query never touches the store; only terminal operations
//!   (`fetch_all`, `single`, `single_or_none`, `first`, `count`) execute SQL.
//! - Column names are checked against the entity shape before they reach SQL.
//! - Rows come back in a deterministic order (`id ASC` unless overridden,
//!   with `id` as the final tie-break).

use crate::context::error::{StoreError, StoreResult};
use crate::model::entity::{select_columns, Entity, EntityId, ID_COLUMN};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::marker::PhantomData;

static INCLUDE_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid include path regex")
});

/// Sort direction for [`EntityQuery::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
}

/// Deferred query over every row of `T`.
pub struct EntityQuery<'conn, T: Entity> {
    conn: &'conn Connection,
    includes: Vec<String>,
    filters: Vec<Filter>,
    id_filter: Option<EntityId>,
    order: Vec<(String, SortOrder)>,
    limit: Option<u32>,
    offset: u32,
    _entity: PhantomData<fn() -> T>,
}

impl<'conn, T: Entity> EntityQuery<'conn, T> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            includes: Vec::new(),
            filters: Vec::new(),
            id_filter: None,
            order: Vec::new(),
            limit: None,
            offset: 0,
            _entity: PhantomData,
        }
    }

    /// Adds one relation path to eager-load. Blank paths are ignored.
    pub fn include(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        let trimmed = path.trim();
        if !trimmed.is_empty() && !self.includes.iter().any(|known| known == trimmed) {
            self.includes.push(trimmed.to_string());
        }
        self
    }

    /// Restricts the query to the row with the given identity.
    pub fn filter_id(mut self, id: EntityId) -> Self {
        self.id_filter = Some(id);
        self.filters.push(Filter::Eq(ID_COLUMN.to_string(), Value::Integer(id)));
        self
    }

    /// Restricts the query to rows where `column` equals `value`.
    /// A `NULL` value matches rows where the column is null.
    pub fn filter_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    /// Restricts the query to rows where `column` is one of `values`.
    /// An empty value set matches nothing.
    pub fn filter_in(mut self, column: &str, values: impl IntoIterator<Item = Value>) -> Self {
        self.filters
            .push(Filter::In(column.to_string(), values.into_iter().collect()));
        self
    }

    pub fn order_by(mut self, column: &str, order: SortOrder) -> Self {
        self.order.push((column.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Include paths in the order they will be loaded.
    pub fn include_paths(&self) -> &[String] {
        &self.includes
    }

    /// Executes the query and returns every matching entity.
    pub fn fetch_all(self) -> StoreResult<Vec<T>> {
        self.execute(None)
    }

    /// Returns exactly one match; fails when zero or several rows match.
    pub fn single(self) -> StoreResult<T> {
        let entity = T::TABLE;
        let id = self.id_filter;
        self.single_or_none()?
            .ok_or(StoreError::NotFound { entity, id })
    }

    /// Returns at most one match; fails only when several rows match.
    pub fn single_or_none(self) -> StoreResult<Option<T>> {
        let id = self.id_filter;
        let mut rows = self.execute(Some(2))?;
        if rows.len() > 1 {
            return Err(StoreError::MultipleFound {
                entity: T::TABLE,
                id,
            });
        }
        Ok(rows.pop())
    }

    /// Returns the first match in query order, if any.
    pub fn first(self) -> StoreResult<Option<T>> {
        let mut rows = self.execute(Some(1))?;
        Ok(rows.pop())
    }

    /// Counts matching rows. Include paths are validated and resolved
    /// against the entity type but load nothing.
    pub fn count(self) -> StoreResult<u64> {
        self.validate_includes()?;
        self.load_includes(&mut [])?;
        let (select_sql, bind_values) = self.build_sql(None)?;
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM ({select_sql});"),
            params_from_iter(bind_values),
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| StoreError::InvalidData(format!("negative row count `{count}`")))
    }

    fn execute(self, cap: Option<u32>) -> StoreResult<Vec<T>> {
        self.validate_includes()?;
        let (sql, bind_values) = self.build_sql(cap)?;

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(T::from_row(row)?);
        }

        self.load_includes(&mut entities)?;
        Ok(entities)
    }

    fn load_includes(&self, entities: &mut [T]) -> StoreResult<()> {
        for path in &self.includes {
            let (relation, rest) = match path.split_once('.') {
                Some((relation, rest)) => (relation, Some(rest)),
                None => (path.as_str(), None),
            };
            T::load_include(self.conn, entities, relation, rest)?;
        }
        Ok(())
    }

    fn validate_includes(&self) -> StoreResult<()> {
        match self
            .includes
            .iter()
            .find(|path| !INCLUDE_PATH_RE.is_match(path))
        {
            Some(invalid) => Err(StoreError::InvalidIncludePath(invalid.clone())),
            None => Ok(()),
        }
    }

    fn build_sql(&self, cap: Option<u32>) -> StoreResult<(String, Vec<Value>)> {
        let mut sql = format!("SELECT {} FROM {}", select_columns::<T>(), T::TABLE);
        let mut bind_values: Vec<Value> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();

        for filter in &self.filters {
            match filter {
                Filter::Eq(column, Value::Null) => {
                    self.check_column(column)?;
                    clauses.push(format!("{column} IS NULL"));
                }
                Filter::Eq(column, value) => {
                    self.check_column(column)?;
                    clauses.push(format!("{column} = ?"));
                    bind_values.push(value.clone());
                }
                Filter::In(column, values) => {
                    self.check_column(column)?;
                    if values.is_empty() {
                        clauses.push("0 = 1".to_string());
                    } else {
                        let placeholders = vec!["?"; values.len()].join(", ");
                        clauses.push(format!("{column} IN ({placeholders})"));
                        bind_values.extend(values.iter().cloned());
                    }
                }
            }
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut order_terms = Vec::with_capacity(self.order.len() + 1);
        for (column, order) in &self.order {
            self.check_column(column)?;
            order_terms.push(format!("{column} {}", order.as_sql()));
        }
        if !self.order.iter().any(|(column, _)| column == ID_COLUMN) {
            order_terms.push(format!("{ID_COLUMN} ASC"));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_terms.join(", "));

        let limit = match (self.limit, cap) {
            (Some(limit), Some(cap)) => Some(limit.min(cap)),
            (limit, cap) => limit.or(cap),
        };
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if self.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(self.offset)));
            }
        } else if self.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(self.offset)));
        }

        Ok((sql, bind_values))
    }

    fn check_column(&self, column: &str) -> StoreResult<()> {
        if T::has_column(column) {
            Ok(())
        } else {
            Err(StoreError::UnknownColumn {
                entity: T::TABLE,
                column: column.to_string(),
            })
        }
    }
}
