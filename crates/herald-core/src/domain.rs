use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Sentinel stored in `photo_id` until a profile photo is known.
pub const NO_PHOTO: &str = "";

/// Display metadata captured from the chat transport for the sender of an event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    /// File id of the most recent profile photo, when the transport could look one up.
    pub photo_id: Option<String>,
}

/// One registered chat identity.
///
/// `username` is the chat id rendered as a string and is the primary key.
/// `follow` is authoritative; `followers` is a denormalized cache of the inverse
/// relation and may lag behind it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub follow: BTreeSet<String>,
    /// Number of `follow` entries that resolve to registered users.
    #[serde(default, alias = "real_follow_count")]
    pub follow_count: u64,
    #[serde(default)]
    pub followers: BTreeSet<String>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub photo_id: String,
}

impl UserRecord {
    /// Fresh record with empty graph state. Names are uppercased on write.
    pub fn new(username: impl Into<String>, profile: &Profile) -> Self {
        Self {
            username: username.into(),
            first_name: profile.first_name.to_uppercase(),
            last_name: profile.last_name.to_uppercase(),
            follow: BTreeSet::new(),
            follow_count: 0,
            followers: BTreeSet::new(),
            followers_count: 0,
            photo_id: profile
                .photo_id
                .clone()
                .unwrap_or_else(|| NO_PHOTO.to_string()),
        }
    }

    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.username.clone()
        } else {
            name.to_string()
        }
    }

    pub fn follows(&self, username: &str) -> bool {
        self.follow.contains(username)
    }

    /// Apply a batch of partial updates in order.
    pub fn apply(&mut self, updates: &[FieldUpdate]) {
        for update in updates {
            self.apply_one(update);
        }
    }

    fn apply_one(&mut self, update: &FieldUpdate) {
        match update {
            FieldUpdate::AppendFollow(names) => {
                for name in names {
                    if name != &self.username {
                        self.follow.insert(name.clone());
                    }
                }
            }
            FieldUpdate::SetFollow(names) => {
                self.follow = names
                    .iter()
                    .filter(|n| *n != &self.username)
                    .cloned()
                    .collect();
            }
            FieldUpdate::AddFollower(name) => {
                self.followers.insert(name.clone());
            }
            FieldUpdate::RemoveFollower(name) => {
                self.followers.remove(name);
            }
            FieldUpdate::SetFollowers(names) => {
                self.followers = names.clone();
            }
            FieldUpdate::RecountFollowers => {
                self.followers_count = self.followers.len() as u64;
            }
            FieldUpdate::AdjustFollowCount(delta) => {
                self.follow_count = if *delta >= 0 {
                    self.follow_count.saturating_add(delta.unsigned_abs())
                } else {
                    self.follow_count.saturating_sub(delta.unsigned_abs())
                };
            }
            FieldUpdate::SetFollowCount(n) => {
                self.follow_count = *n;
            }
            FieldUpdate::SetProfile {
                first_name,
                last_name,
            } => {
                self.first_name = first_name.to_uppercase();
                self.last_name = last_name.to_uppercase();
            }
            FieldUpdate::SetPhoto(photo_id) => {
                self.photo_id = photo_id.clone();
            }
        }
    }
}

/// A single-field change applied by `UserStore::update_fields`.
///
/// One `update_fields` call applies its whole batch atomically to one record;
/// there is no atomicity across records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldUpdate {
    /// Union into `follow`, never adding the record's own username.
    AppendFollow(Vec<String>),
    /// Replace `follow` wholesale.
    SetFollow(BTreeSet<String>),
    AddFollower(String),
    /// No-op when absent.
    RemoveFollower(String),
    SetFollowers(BTreeSet<String>),
    /// `followers_count = len(followers)` as of this update.
    RecountFollowers,
    /// Saturating add/subtract on `follow_count`.
    AdjustFollowCount(i64),
    SetFollowCount(u64),
    SetProfile {
        first_name: String,
        last_name: String,
    },
    SetPhoto(String),
}
