use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{FieldUpdate, UserRecord},
    errors::Error,
    store::{Condition, MemoryStore, ScanFilter, UserStore},
    Result,
};

/// `MemoryStore` with write-through persistence of the whole table to one JSON file.
///
/// Each successful write rewrites the file (temp file + rename). A failed
/// persist surfaces as `StoreUnavailable` even though the in-memory table
/// already holds the change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    // Serializes file writes so snapshots land in order.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = load_records(&path).await?;
        tracing::info!(path = %path.display(), users = records.len(), "user store loaded");
        Ok(Self {
            path,
            inner: MemoryStore::from_records(records),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let records = self.inner.snapshot().await;
        let txt = serde_json::to_string_pretty(&records)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, txt)
            .await
            .map_err(|e| unavailable(&self.path, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| unavailable(&self.path, e))?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for JsonFileStore {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>> {
        self.inner.get(username).await
    }

    async fn put(&self, record: UserRecord) -> Result<()> {
        self.inner.put(record).await?;
        self.persist().await
    }

    async fn put_if_absent(&self, record: UserRecord) -> Result<bool> {
        let written = self.inner.put_if_absent(record).await?;
        if written {
            self.persist().await?;
        }
        Ok(written)
    }

    async fn update_fields(
        &self,
        username: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<UserRecord> {
        let record = self.inner.update_fields(username, updates).await?;
        self.persist().await?;
        Ok(record)
    }

    async fn update_fields_if(
        &self,
        username: &str,
        condition: &Condition,
        updates: Vec<FieldUpdate>,
    ) -> Result<Option<UserRecord>> {
        let updated = self
            .inner
            .update_fields_if(username, condition, updates)
            .await?;
        if updated.is_some() {
            self.persist().await?;
        }
        Ok(updated)
    }

    async fn scan(&self, filter: &ScanFilter) -> Result<Vec<UserRecord>> {
        self.inner.scan(filter).await
    }
}

async fn load_records(path: &Path) -> Result<Vec<UserRecord>> {
    let txt = match tokio::fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(unavailable(path, e)),
    };
    if txt.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&txt)?)
}

fn unavailable(path: &Path, e: std::io::Error) -> Error {
    Error::StoreUnavailable(format!("{}: {e}", path.display()))
}
