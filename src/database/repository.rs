use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::store::{Store, Table};
use crate::filter::FilterData;

/// Typed access to one table of a [`Store`].
pub struct Repository<T> {
    table: Table,
    store: Arc<dyn Store>,
    _phantom: PhantomData<T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table,
            store: self.store.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    pub fn new(table: Table, store: Arc<dyn Store>) -> Self {
        Self {
            table,
            store,
            _phantom: PhantomData,
        }
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<T>, DatabaseError> {
        let rows = self.store.select(self.table, filter_data).await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn select_one(&self, mut filter_data: FilterData) -> Result<Option<T>, DatabaseError> {
        filter_data.limit = Some(1);
        let mut rows = self.store.select(self.table, filter_data).await?;
        match rows.pop() {
            Some(row) => Ok(Some(decode(row)?)),
            None => Ok(None),
        }
    }

    pub async fn select_404(&self, filter_data: FilterData) -> Result<T, DatabaseError> {
        self.select_one(filter_data)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Record not found in {}", self.table)))
    }

    pub async fn select_ids(&self, ids: &[Uuid]) -> Result<Vec<T>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let filter = FilterData::where_json(json!({ "id": { "$in": ids } }));
        self.select_any(filter).await
    }

    pub async fn insert(&self, record: &T) -> Result<T, DatabaseError> {
        let row = serde_json::to_value(record)?;
        let stored = self.store.insert(self.table, row).await?;
        decode(stored)
    }

    /// Patch every row matching `filter`; returns how many changed.
    pub async fn update_where(&self, filter_data: FilterData, patch: Value) -> Result<u64, DatabaseError> {
        self.store.update(self.table, filter_data, patch).await
    }

    /// Patch the row with `id` and return it re-read from the store.
    pub async fn update_id(&self, id: Uuid, patch: Value) -> Result<T, DatabaseError> {
        let filter = FilterData::where_eq("id", id.to_string());
        let changed = self.store.update(self.table, filter.clone(), patch).await?;
        if changed == 0 {
            return Err(DatabaseError::NotFound(format!("Record not found in {}", self.table)));
        }
        self.select_404(filter).await
    }
}

fn decode<T: DeserializeOwned>(row: Value) -> Result<T, DatabaseError> {
    Ok(serde_json::from_value(row)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::models::Profile;
    use chrono::Utc;

    fn profile(username: &str) -> Profile {
        let now = Utc::now();
        Profile {
            id: Uuid::new_v4(),
            username: username.to_string(),
            display_name: None,
            bio: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn select_ids_returns_only_requested_rows() {
        let repo: Repository<Profile> = Repository::new(Table::Profiles, Arc::new(MemoryStore::new()));
        let alice = repo.insert(&profile("alice")).await.unwrap();
        let bob = repo.insert(&profile("bob")).await.unwrap();
        repo.insert(&profile("carol")).await.unwrap();

        let mut found = repo.select_ids(&[alice.id, bob.id]).await.unwrap();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        let names: Vec<_> = found.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);

        assert!(repo.select_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_id_reports_missing_rows() {
        let repo: Repository<Profile> = Repository::new(Table::Profiles, Arc::new(MemoryStore::new()));
        let result = repo.update_id(Uuid::new_v4(), json!({ "bio": "hi" })).await;
        assert!(matches!(result, Err(DatabaseError::NotFound(_))));

        let alice = repo.insert(&profile("alice")).await.unwrap();
        let updated = repo.update_id(alice.id, json!({ "bio": "hi" })).await.unwrap();
        assert_eq!(updated.bio.as_deref(), Some("hi"));
        assert_eq!(updated.username, "alice");
    }
}
