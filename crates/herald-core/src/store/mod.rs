//! User record storage.
//!
//! The store is a schema-less key/value table keyed by username. Its only
//! atomic primitive is a single-record update; there are no cross-record
//! transactions and no secondary indexes, so membership queries are scans.

use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;

use crate::{
    domain::{FieldUpdate, UserRecord},
    Result,
};

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Predicate evaluated by `UserStore::scan`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanFilter {
    All,
    /// Records whose `follow` set contains the username.
    FollowContains(String),
    /// Records whose first or last name contains the fragment (names are stored uppercased).
    NameContains(String),
}

impl ScanFilter {
    pub fn matches(&self, record: &UserRecord) -> bool {
        match self {
            ScanFilter::All => true,
            ScanFilter::FollowContains(username) => record.follows(username),
            ScanFilter::NameContains(fragment) => {
                let fragment = fragment.to_uppercase();
                record.first_name.contains(&fragment) || record.last_name.contains(&fragment)
            }
        }
    }
}

/// Guard evaluated against the stored record inside a conditional update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// `follow` does not contain the username.
    NotFollowing(String),
    /// `follow` is exactly this set.
    FollowIs(BTreeSet<String>),
}

impl Condition {
    pub fn holds(&self, record: &UserRecord) -> bool {
        match self {
            Condition::NotFollowing(username) => !record.follows(username),
            Condition::FollowIs(expected) => &record.follow == expected,
        }
    }
}

/// Storage port for user records.
///
/// Implementations must be safe for concurrent use. Every method may fail with
/// `Error::StoreUnavailable`; callers must treat a failed write as possibly
/// not applied.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// `Ok(None)` when no record exists.
    async fn get(&self, username: &str) -> Result<Option<UserRecord>>;

    /// Create or replace the whole record.
    async fn put(&self, record: UserRecord) -> Result<()>;

    /// Create the record only if none exists under its username. Returns `true` when written.
    async fn put_if_absent(&self, record: UserRecord) -> Result<bool>;

    /// Apply `updates` atomically to one record and return the record as stored.
    ///
    /// Fails with `Error::NotFound` when the record does not exist.
    async fn update_fields(&self, username: &str, updates: Vec<FieldUpdate>)
        -> Result<UserRecord>;

    /// Like `update_fields`, but the check of `condition` and the write happen
    /// as one atomic step. `Ok(None)` when the condition does not hold.
    async fn update_fields_if(
        &self,
        username: &str,
        condition: &Condition,
        updates: Vec<FieldUpdate>,
    ) -> Result<Option<UserRecord>>;

    /// Full-table scan. Unordered snapshot as of scan time.
    async fn scan(&self, filter: &ScanFilter) -> Result<Vec<UserRecord>>;
}

#[async_trait]
impl<S: UserStore + ?Sized> UserStore for Arc<S> {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>> {
        (**self).get(username).await
    }

    async fn put(&self, record: UserRecord) -> Result<()> {
        (**self).put(record).await
    }

    async fn put_if_absent(&self, record: UserRecord) -> Result<bool> {
        (**self).put_if_absent(record).await
    }

    async fn update_fields(
        &self,
        username: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<UserRecord> {
        (**self).update_fields(username, updates).await
    }

    async fn update_fields_if(
        &self,
        username: &str,
        condition: &Condition,
        updates: Vec<FieldUpdate>,
    ) -> Result<Option<UserRecord>> {
        (**self).update_fields_if(username, condition, updates).await
    }

    async fn scan(&self, filter: &ScanFilter) -> Result<Vec<UserRecord>> {
        (**self).scan(filter).await
    }
}
