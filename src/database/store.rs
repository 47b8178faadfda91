use async_trait::async_trait;
use serde_json::Value;

use crate::database::manager::DatabaseError;
use crate::filter::{FilterData, FilterWhereOptions};

/// Tables the application reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Profiles,
    Articles,
    AuthUsers,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Articles => "articles",
            Table::AuthUsers => "auth_users",
        }
    }

    /// Columns whose JSON representation needs a SQL cast when bound.
    pub fn casts(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Table::Profiles => &[
                ("id", "uuid"),
                ("created_at", "timestamptz"),
                ("updated_at", "timestamptz"),
            ],
            Table::Articles => &[
                ("id", "uuid"),
                ("author_id", "uuid"),
                ("published", "boolean"),
                ("created_at", "timestamptz"),
                ("updated_at", "timestamptz"),
            ],
            Table::AuthUsers => &[
                ("id", "uuid"),
                ("confirmed_at", "timestamptz"),
                ("created_at", "timestamptz"),
                ("last_sign_in_at", "timestamptz"),
            ],
        }
    }

    /// Columns carrying a unique constraint besides the `id` primary key.
    pub fn unique_columns(&self) -> &'static [&'static str] {
        match self {
            Table::Profiles => &["username"],
            Table::Articles => &[],
            Table::AuthUsers => &["email"],
        }
    }

    pub fn where_options(&self) -> FilterWhereOptions {
        FilterWhereOptions::with_casts(self.casts())
    }

    pub fn cast_for(&self, column: &str) -> Option<&'static str> {
        self.casts().iter().find(|(c, _)| *c == column).map(|(_, t)| *t)
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Table-scoped CRUD with filter / order / limit. Rows travel as JSON objects.
#[async_trait]
pub trait Store: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn select(&self, table: Table, filter: FilterData) -> Result<Vec<Value>, DatabaseError>;

    /// Insert one row and return it as stored.
    async fn insert(&self, table: Table, row: Value) -> Result<Value, DatabaseError>;

    /// Insert rows across tables as one unit: either all are stored or none.
    async fn insert_all(&self, rows: Vec<(Table, Value)>) -> Result<Vec<Value>, DatabaseError>;

    /// Apply `patch` to every row matching `filter.where_clause`; returns the row count.
    async fn update(&self, table: Table, filter: FilterData, patch: Value) -> Result<u64, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

pub(crate) fn require_object(value: &Value, what: &str) -> Result<(), DatabaseError> {
    match value {
        Value::Object(map) if !map.is_empty() => Ok(()),
        _ => Err(DatabaseError::QueryError(format!("{} must be a non-empty JSON object", what))),
    }
}

pub(crate) fn require_where(filter: &FilterData) -> Result<(), DatabaseError> {
    match filter.where_clause {
        Some(Value::Object(ref map)) if !map.is_empty() => Ok(()),
        _ => Err(DatabaseError::QueryError("update requires a where clause".to_string())),
    }
}
