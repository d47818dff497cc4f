use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    domain::{FieldUpdate, UserRecord},
    errors::Error,
    store::{Condition, ScanFilter, UserStore},
    Result,
};

/// In-process user table.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = UserRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|r| (r.username.clone(), r))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Copy of the whole table, sorted by username.
    pub async fn snapshot(&self) -> Vec<UserRecord> {
        let mut out: Vec<UserRecord> = self.records.read().await.values().cloned().collect();
        out.sort_by(|a, b| a.username.cmp(&b.username));
        out
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self.records.read().await.get(username).cloned())
    }

    async fn put(&self, record: UserRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.username.clone(), record);
        Ok(())
    }

    async fn put_if_absent(&self, record: UserRecord) -> Result<bool> {
        let mut map = self.records.write().await;
        if map.contains_key(&record.username) {
            return Ok(false);
        }
        map.insert(record.username.clone(), record);
        Ok(true)
    }

    async fn update_fields(
        &self,
        username: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<UserRecord> {
        let mut map = self.records.write().await;
        let record = map
            .get_mut(username)
            .ok_or_else(|| Error::NotFound(username.to_string()))?;
        record.apply(&updates);
        Ok(record.clone())
    }

    async fn update_fields_if(
        &self,
        username: &str,
        condition: &Condition,
        updates: Vec<FieldUpdate>,
    ) -> Result<Option<UserRecord>> {
        let mut map = self.records.write().await;
        let record = map
            .get_mut(username)
            .ok_or_else(|| Error::NotFound(username.to_string()))?;
        if !condition.holds(record) {
            return Ok(None);
        }
        record.apply(&updates);
        Ok(Some(record.clone()))
    }

    async fn scan(&self, filter: &ScanFilter) -> Result<Vec<UserRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }
}
