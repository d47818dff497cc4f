//! Follow-graph mutations.
//!
//! A follow edge lives in two places: the follower's `follow` set
//! (authoritative) and the followee's `followers` set (denormalized cache).
//! The store has no multi-record transactions, so every operation performs the
//! follower-side write first; that write decides success. The mirrored
//! followee-side write is best-effort: a missing followee record is skipped,
//! never reported.

use std::{collections::BTreeSet, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    domain::{FieldUpdate, Profile, UserRecord},
    errors::Error,
    resolver::FollowerResolver,
    store::{Condition, UserStore},
    Result,
};

const MAX_UNFOLLOW_ATTEMPTS: usize = 5;

/// Result of `register_or_refresh`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    /// A new record was written; `backfilled` users already followed this identity.
    Created { backfilled: usize },
    /// The record existed; only profile and photo were touched.
    Refreshed,
}

/// A followee of some user, labelled for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Followee {
    pub username: String,
    pub label: String,
}

#[derive(Clone)]
pub struct FollowGraphService {
    store: Arc<dyn UserStore>,
    resolver: FollowerResolver,
}

impl FollowGraphService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        let resolver = FollowerResolver::new(store.clone());
        Self { store, resolver }
    }

    pub fn resolver(&self) -> &FollowerResolver {
        &self.resolver
    }

    pub async fn get(&self, username: &str) -> Result<Option<UserRecord>> {
        self.store.get(username).await
    }

    /// Register a new identity, or refresh profile fields of an existing one.
    ///
    /// On creation `followers` is backfilled from users that followed this
    /// identity before it registered, and each of those users gets its
    /// `follow_count` bumped since that entry now resolves to a registered user.
    /// An existing record keeps its `follow`/`followers` untouched.
    pub async fn register_or_refresh(
        &self,
        username: &str,
        profile: &Profile,
    ) -> Result<Registration> {
        if self.store.get(username).await?.is_some() {
            return self.refresh(username, profile).await;
        }

        let early_followers = self.resolver.resolve_followers_of(username).await?;

        let mut record = UserRecord::new(username, profile);
        record.followers = early_followers
            .iter()
            .map(|r| r.username.clone())
            .filter(|u| u != username)
            .collect();
        record.followers_count = record.followers.len() as u64;
        let backfilled = record.followers.len();
        let followers: Vec<String> = record.followers.iter().cloned().collect();

        // Someone else may have created the record since the lookup above.
        if !self.store.put_if_absent(record).await? {
            debug!(username, "record created concurrently; refreshing instead");
            return self.refresh(username, profile).await;
        }

        for follower in &followers {
            if let Err(e) = self
                .update_mirror(follower, vec![FieldUpdate::AdjustFollowCount(1)])
                .await
            {
                warn!(username, follower = %follower, error = %e, "follow_count backfill skipped");
            }
        }

        info!(username, backfilled, "user registered");
        Ok(Registration::Created { backfilled })
    }

    async fn refresh(&self, username: &str, profile: &Profile) -> Result<Registration> {
        let mut updates = vec![FieldUpdate::SetProfile {
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
        }];
        if let Some(photo_id) = &profile.photo_id {
            updates.push(FieldUpdate::SetPhoto(photo_id.clone()));
        }
        self.store.update_fields(username, updates).await?;
        debug!(username, "profile refreshed");
        Ok(Registration::Refreshed)
    }

    /// Create a record for `username` if none exists. Returns `true` when created.
    pub async fn ensure_registered(&self, username: &str, profile: &Profile) -> Result<bool> {
        if self.store.get(username).await?.is_some() {
            return Ok(false);
        }
        let created = self.register_or_refresh(username, profile).await?;
        Ok(matches!(created, Registration::Created { .. }))
    }

    /// Add `followee` to `follower.follow`.
    ///
    /// Returns `true` only when this created a new edge; self-follow and
    /// already-present edges are no-ops returning `false`. Fails with
    /// `NotFound` when `follower` has no record.
    pub async fn follow(&self, follower: &str, followee: &str) -> Result<bool> {
        if follower == followee || followee.is_empty() {
            debug!(follower, followee, "ignoring self or empty follow");
            return Ok(false);
        }

        let followee_registered = self.store.get(followee).await?.is_some();
        let inserted = self
            .store
            .update_fields_if(
                follower,
                &Condition::NotFollowing(followee.to_string()),
                vec![
                    FieldUpdate::AppendFollow(vec![followee.to_string()]),
                    FieldUpdate::AdjustFollowCount(i64::from(followee_registered)),
                ],
            )
            .await?;
        if inserted.is_none() {
            debug!(follower, followee, "already following");
            return Ok(false);
        }

        if followee_registered {
            self.update_mirror(
                followee,
                vec![
                    FieldUpdate::AddFollower(follower.to_string()),
                    FieldUpdate::RecountFollowers,
                ],
            )
            .await?;
        } else {
            debug!(follower, followee, "followee not registered; followers sync deferred");
        }

        info!(follower, followee, new_edge = true, "follow");
        Ok(true)
    }

    /// Remove `followees` from `follower.follow`. Returns the usernames actually removed.
    ///
    /// The follower's `follow` set is overwritten wholesale. Calling this again
    /// with the same arguments removes nothing and writes nothing.
    pub async fn unfollow(&self, follower: &str, followees: &[String]) -> Result<Vec<String>> {
        let wanted: BTreeSet<&str> = followees.iter().map(String::as_str).collect();

        // Compare-and-set on the whole `follow` set; a concurrent change forces a re-read.
        let mut attempts = 0usize;
        let removed = loop {
            let record = self
                .store
                .get(follower)
                .await?
                .ok_or_else(|| Error::NotFound(follower.to_string()))?;

            let (removed, remaining): (Vec<String>, Vec<String>) = record
                .follow
                .iter()
                .cloned()
                .partition(|u| wanted.contains(u.as_str()));
            if removed.is_empty() {
                debug!(follower, "nothing to unfollow");
                return Ok(removed);
            }

            let mut registered_removed: i64 = 0;
            for followee in &removed {
                if self.store.get(followee).await?.is_some() {
                    registered_removed += 1;
                }
            }

            let swapped = self
                .store
                .update_fields_if(
                    follower,
                    &Condition::FollowIs(record.follow),
                    vec![
                        FieldUpdate::SetFollow(remaining.into_iter().collect()),
                        FieldUpdate::AdjustFollowCount(-registered_removed),
                    ],
                )
                .await?;
            if swapped.is_some() {
                break removed;
            }

            attempts += 1;
            if attempts >= MAX_UNFOLLOW_ATTEMPTS {
                return Err(Error::StoreUnavailable(format!(
                    "follow list of {follower} kept changing"
                )));
            }
            debug!(follower, attempts, "follow list changed concurrently; retrying");
        };

        for followee in &removed {
            self.update_mirror(
                followee,
                vec![
                    FieldUpdate::RemoveFollower(follower.to_string()),
                    FieldUpdate::RecountFollowers,
                ],
            )
            .await?;
        }

        info!(follower, removed = ?removed, "unfollow");
        Ok(removed)
    }

    /// Recompute counters and the `followers` cache from the source of truth.
    pub async fn recount(&self, username: &str) -> Result<UserRecord> {
        let record = self
            .store
            .get(username)
            .await?
            .ok_or_else(|| Error::NotFound(username.to_string()))?;

        let mut registered = 0u64;
        for followee in &record.follow {
            if self.store.get(followee).await?.is_some() {
                registered += 1;
            }
        }
        let followers: BTreeSet<String> = self
            .resolver
            .follower_names(username)
            .await?
            .into_iter()
            .collect();

        let updated = self
            .store
            .update_fields(
                username,
                vec![
                    FieldUpdate::SetFollowCount(registered),
                    FieldUpdate::SetFollowers(followers),
                    FieldUpdate::RecountFollowers,
                ],
            )
            .await?;
        debug!(
            username,
            follow_count = updated.follow_count,
            followers_count = updated.followers_count,
            "counters recomputed"
        );
        Ok(updated)
    }

    /// Current followees of `username`, labelled with display names where registered.
    pub async fn followees(&self, username: &str) -> Result<Vec<Followee>> {
        let Some(record) = self.store.get(username).await? else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(record.follow.len());
        for followee in record.follow {
            let label = match self.store.get(&followee).await? {
                Some(r) => r.display_name(),
                None => followee.clone(),
            };
            out.push(Followee {
                username: followee,
                label,
            });
        }
        Ok(out)
    }

    /// Best-effort write to another user's record. `Ok(false)` when it does not exist.
    async fn update_mirror(&self, username: &str, updates: Vec<FieldUpdate>) -> Result<bool> {
        match self.store.update_fields(username, updates).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => {
                debug!(username, "mirror target missing; skipped");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
