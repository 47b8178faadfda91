use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::database::manager::DatabaseError;
use crate::database::store::{require_object, require_where, Store, Table};
use crate::filter::{matcher, FilterData};

/// Process-local store evaluating the filter language over JSON rows.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn unique_violation(table: Table, rows: &[Value], candidate: &Value, skip: Option<usize>) -> Option<String> {
        let columns = std::iter::once("id").chain(table.unique_columns().iter().copied());
        for column in columns {
            let value = match candidate.get(column) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };
            let clash = rows
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != skip)
                .any(|(_, row)| row.get(column) == Some(value));
            if clash {
                return Some(format!(
                    "duplicate key value violates unique constraint \"{}_{}_key\"",
                    table.name(),
                    column
                ));
            }
        }
        None
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn select(&self, table: Table, filter: FilterData) -> Result<Vec<Value>, DatabaseError> {
        let tables = self.tables.read().await;
        let rows = tables.get(&table).map(Vec::as_slice).unwrap_or(&[]);
        Ok(matcher::apply(rows, &filter)?)
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, DatabaseError> {
        let mut stored = self.insert_all(vec![(table, row)]).await?;
        stored
            .pop()
            .ok_or_else(|| DatabaseError::QueryError("insert stored no row".to_string()))
    }

    async fn insert_all(&self, rows: Vec<(Table, Value)>) -> Result<Vec<Value>, DatabaseError> {
        for (_, row) in &rows {
            require_object(row, "insert row")?;
        }

        // One write lock for the whole batch; nothing lands until every row passed
        let mut tables = self.tables.write().await;
        let mut staged: HashMap<Table, Vec<Value>> = HashMap::new();
        for (table, row) in &rows {
            let existing = tables.get(table).map(Vec::as_slice).unwrap_or(&[]);
            let pending = staged.entry(*table).or_default();
            let clash = Self::unique_violation(*table, existing, row, None)
                .or_else(|| Self::unique_violation(*table, pending, row, None));
            if let Some(message) = clash {
                return Err(DatabaseError::Conflict(message));
            }
            pending.push(row.clone());
        }

        for (table, pending) in staged {
            tables.entry(table).or_default().extend(pending);
        }
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn update(&self, table: Table, filter: FilterData, patch: Value) -> Result<u64, DatabaseError> {
        require_object(&patch, "update patch")?;
        require_where(&filter)?;
        let where_data = filter.where_clause.unwrap_or(Value::Null);
        let patch = patch.as_object().cloned().unwrap_or_default();

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();

        // Stage every change first so a conflict leaves the table untouched
        let mut staged = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if !matcher::matches(row, &where_data)? {
                continue;
            }
            let mut updated = row.clone();
            if let Value::Object(ref mut map) = updated {
                for (k, v) in &patch {
                    map.insert(k.clone(), v.clone());
                }
            }
            if let Some(message) = Self::unique_violation(table, rows, &updated, Some(index)) {
                return Err(DatabaseError::Conflict(message));
            }
            staged.push((index, updated));
        }

        let count = staged.len() as u64;
        for (index, updated) in staged {
            rows[index] = updated;
        }
        Ok(count)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
