use crate::{ChannelKey, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A channel as tracked by a live channel list.
///
/// Only the attributes that filters and sort keys read are modelled as
/// fields. Everything else the backend sends travels untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub key: ChannelKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_at: Option<Timestamp>,
    /// Members known locally. May be a partial list for large channels.
    #[serde(default)]
    pub members: BTreeSet<UserId>,
    /// Total member count as reported by the backend.
    #[serde(default)]
    pub member_count: u32,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub frozen: bool,
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl Channel {
    /// Creates a visible, memberless channel created at `created_at`.
    #[must_use]
    pub fn new(key: ChannelKey, created_at: Timestamp) -> Self {
        Self {
            key,
            name: None,
            created_at,
            updated_at: created_at,
            last_message_at: None,
            pinned_at: None,
            members: BTreeSet::new(),
            member_count: 0,
            unread_count: 0,
            hidden: false,
            frozen: false,
            extra: serde_json::Value::Null,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the last message time.
    #[must_use]
    pub fn with_last_message_at(mut self, at: Timestamp) -> Self {
        self.last_message_at = Some(at);
        self
    }

    /// Adds members and bumps the member count accordingly.
    #[must_use]
    pub fn with_members<I, U>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<UserId>,
    {
        for member in members {
            self.add_member(member.into());
        }
        self
    }

    /// Sets the unread count.
    #[must_use]
    pub fn with_unread_count(mut self, count: u32) -> Self {
        self.unread_count = count;
        self
    }

    /// Sets a top-level key in `extra`, turning it into an object if needed.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        if !self.extra.is_object() {
            self.extra = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(obj) = self.extra.as_object_mut() {
            obj.insert(key.into(), value);
        }
        self
    }

    /// Returns true if `user` is in the local member set.
    #[must_use]
    pub fn has_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }

    /// Adds a member. Returns false if the user was already a member.
    ///
    /// The count never drops below the size of the local member set.
    pub fn add_member(&mut self, user: UserId) -> bool {
        let inserted = self.members.insert(user);
        if inserted {
            self.member_count = self.member_count.saturating_add(1);
        }
        self.member_count = self.member_count.max(self.members.len() as u32);
        inserted
    }

    /// Removes a member. Returns false if the user was not a member.
    pub fn remove_member(&mut self, user: &UserId) -> bool {
        let removed = self.members.remove(user);
        if removed {
            self.member_count = self.member_count.saturating_sub(1);
        }
        self.member_count = self.member_count.max(self.members.len() as u32);
        removed
    }

    /// Last message time, falling back to creation time.
    ///
    /// This is the value the default channel ordering sorts by.
    #[must_use]
    pub fn default_sorting_at(&self) -> Timestamp {
        self.last_message_at.unwrap_or(self.created_at)
    }

    /// Reads a top-level key of `extra`.
    #[must_use]
    pub fn extra_field(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.as_object().and_then(|obj| obj.get(key))
    }
}
