use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, PgPool, Postgres, Row};

use crate::database::manager::DatabaseError;
use crate::database::store::{require_object, require_where, Store, Table};
use crate::filter::filter::validate_identifier;
use crate::filter::{Filter, FilterData};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Postgres-backed store. SQL comes from the filter module; rows are
/// returned through `row_to_json` so decoding is shared with `MemoryStore`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn filter_for(table: Table, data: FilterData) -> Result<Filter, DatabaseError> {
        let mut filter = Filter::new(table.name())?.with_options(table.where_options());
        filter.assign(data)?;
        Ok(filter)
    }

    fn placeholder(table: Table, column: &str, index: usize) -> String {
        match table.cast_for(column) {
            Some(cast) => format!("${}::{}", index, cast),
            None => format!("${}", index),
        }
    }

    fn insert_sql(table: Table, row: &serde_json::Map<String, Value>) -> Result<(String, Vec<Value>), DatabaseError> {
        let mut columns = Vec::with_capacity(row.len());
        let mut placeholders = Vec::with_capacity(row.len());
        let mut params = Vec::with_capacity(row.len());
        for (i, (column, value)) in row.iter().enumerate() {
            validate_identifier(column).map_err(DatabaseError::QueryError)?;
            columns.push(format!("\"{}\"", column));
            placeholders.push(Self::placeholder(table, column, i + 1));
            params.push(value.clone());
        }
        let sql = format!(
            "WITH \"ins\" AS (INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING *) SELECT row_to_json(\"ins\") AS \"row\" FROM \"ins\"",
            table.name(),
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok((sql, params))
    }

    fn update_sql(table: Table, filter: FilterData, patch: &serde_json::Map<String, Value>) -> Result<(String, Vec<Value>), DatabaseError> {
        let mut assignments = Vec::with_capacity(patch.len());
        let mut params = Vec::with_capacity(patch.len());
        for (i, (column, value)) in patch.iter().enumerate() {
            validate_identifier(column).map_err(DatabaseError::QueryError)?;
            assignments.push(format!("\"{}\" = {}", column, Self::placeholder(table, column, i + 1)));
            params.push(value.clone());
        }

        let where_only = FilterData { where_clause: filter.where_clause, ..Default::default() };
        let where_result = Self::filter_for(table, where_only)?.to_where_sql(params.len())?;
        params.extend(where_result.params);

        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE {}",
            table.name(),
            assignments.join(", "),
            where_result.query
        );
        Ok((sql, params))
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn select(&self, table: Table, filter: FilterData) -> Result<Vec<Value>, DatabaseError> {
        let sql_result = Self::filter_for(table, filter)?.to_sql()?;
        tracing::debug!(table = %table, query = %sql_result.query, "select");

        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
        rows.iter()
            .map(|row| row.try_get::<Value, _>("row").map_err(DatabaseError::from))
            .collect()
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, DatabaseError> {
        require_object(&row, "insert row")?;
        let map = row.as_object().cloned().unwrap_or_default();
        let (sql, params) = Self::insert_sql(table, &map)?;
        tracing::debug!(table = %table, query = %sql, "insert");

        let mut q = sqlx::query(&sql);
        for p in params.iter() {
            q = bind_param(q, p);
        }
        let inserted = q.fetch_one(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(inserted.try_get::<Value, _>("row")?)
    }

    async fn insert_all(&self, rows: Vec<(Table, Value)>) -> Result<Vec<Value>, DatabaseError> {
        // Dropping the transaction on any early return rolls it back
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut stored = Vec::with_capacity(rows.len());
        for (table, row) in &rows {
            require_object(row, "insert row")?;
            let map = row.as_object().cloned().unwrap_or_default();
            let (sql, params) = Self::insert_sql(*table, &map)?;
            tracing::debug!(table = %table, query = %sql, "insert (batch)");

            let mut q = sqlx::query(&sql);
            for p in params.iter() {
                q = bind_param(q, p);
            }
            let inserted = q.fetch_one(&mut *tx).await.map_err(map_sqlx_error)?;
            stored.push(inserted.try_get::<Value, _>("row")?);
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(stored)
    }

    async fn update(&self, table: Table, filter: FilterData, patch: Value) -> Result<u64, DatabaseError> {
        require_object(&patch, "update patch")?;
        require_where(&filter)?;
        let map = patch.as_object().cloned().unwrap_or_default();
        let (sql, params) = Self::update_sql(table, filter, &map)?;
        tracing::debug!(table = %table, query = %sql, "update");

        let mut q = sqlx::query(&sql);
        for p in params.iter() {
            q = bind_param(q, p);
        }
        let result = q.execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn map_sqlx_error(err: sqlx::Error) -> DatabaseError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return DatabaseError::Conflict(db_err.message().to_string());
        }
    }
    DatabaseError::Sqlx(err)
}

fn bind_param<'q>(q: PgQuery<'q>, v: &'q Value) -> PgQuery<'q> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        Value::Array(_) | Value::Object(_) => q.bind(sqlx::types::Json(v.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_sql_casts_typed_columns() {
        let row = json!({ "author_id": "u", "published": false, "title": "t" });
        let (sql, params) = PgStore::insert_sql(Table::Articles, row.as_object().unwrap()).unwrap();
        assert_eq!(
            sql,
            "WITH \"ins\" AS (INSERT INTO \"articles\" (\"author_id\", \"published\", \"title\") VALUES ($1::uuid, $2::boolean, $3) RETURNING *) SELECT row_to_json(\"ins\") AS \"row\" FROM \"ins\""
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn update_sql_numbers_where_after_set() {
        let patch = json!({ "title": "new", "updated_at": "2024-01-01T00:00:00Z" });
        let (sql, params) = PgStore::update_sql(
            Table::Articles,
            FilterData::where_eq("id", "a1"),
            patch.as_object().unwrap(),
        )
        .unwrap();
        assert_eq!(
            sql,
            "UPDATE \"articles\" SET \"title\" = $1, \"updated_at\" = $2::timestamptz WHERE \"id\" = $3::uuid"
        );
        assert_eq!(params, vec![json!("new"), json!("2024-01-01T00:00:00Z"), json!("a1")]);
    }

    #[test]
    fn rejects_injected_column_names() {
        let row = json!({ "title\" = 'x'; --": "t" });
        assert!(PgStore::insert_sql(Table::Articles, row.as_object().unwrap()).is_err());
    }
}
