use std::sync::Arc;

use crate::{
    domain::UserRecord,
    store::{ScanFilter, UserStore},
    Result,
};

/// Derives follower sets from the authoritative `follow` fields.
///
/// Every answer comes from a fresh scan, so it never depends on the cached
/// `followers` field being current.
#[derive(Clone)]
pub struct FollowerResolver {
    store: Arc<dyn UserStore>,
}

impl FollowerResolver {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// All records whose `follow` contains `username`.
    pub async fn resolve_followers_of(&self, username: &str) -> Result<Vec<UserRecord>> {
        self.store
            .scan(&ScanFilter::FollowContains(username.to_string()))
            .await
    }

    /// Usernames of `resolve_followers_of`, sorted for stable output.
    pub async fn follower_names(&self, username: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .resolve_followers_of(username)
            .await?
            .into_iter()
            .map(|r| r.username)
            .collect();
        names.sort();
        Ok(names)
    }

    pub async fn all_users(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .store
            .scan(&ScanFilter::All)
            .await?
            .into_iter()
            .map(|r| r.username)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Inline search over display names.
    pub async fn search_by_name(&self, fragment: &str) -> Result<Vec<UserRecord>> {
        let mut found = self
            .store
            .scan(&ScanFilter::NameContains(fragment.to_uppercase()))
            .await?;
        found.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(found)
    }
}
