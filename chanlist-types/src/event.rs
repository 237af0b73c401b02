//! Domain events delivered to live channel lists.
//!
//! Events arrive already decoded from the wire. Every variant carries
//! absolute values rather than increments, so folding the same event twice
//! leaves a view unchanged.

use crate::{Channel, ChannelKey, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A typed notification of a remote-side change to a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A channel was created.
    ChannelCreated { channel: Channel },

    /// A channel's attributes changed. Carries the full new state.
    ChannelUpdated { channel: Channel },

    /// A channel was deleted.
    ChannelDeleted { key: ChannelKey },

    /// A user joined a channel.
    MemberAdded {
        key: ChannelKey,
        user: UserId,
        /// Full channel state, when the notification carries it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<Channel>,
    },

    /// A user left or was removed from a channel.
    MemberRemoved { key: ChannelKey, user: UserId },

    /// A message changed the channel's activity time.
    ActivityChanged {
        key: ChannelKey,
        last_message_at: Timestamp,
        /// Full channel state, when the notification carries it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<Channel>,
    },

    /// The channel was hidden or shown again for the current user.
    VisibilityChanged { key: ChannelKey, hidden: bool },

    /// The current user's unread count for the channel changed.
    ReadStateChanged { key: ChannelKey, unread_count: u32 },
}

impl DomainEvent {
    /// Creates a channel-created event.
    #[must_use]
    pub fn created(channel: Channel) -> Self {
        Self::ChannelCreated { channel }
    }

    /// Creates a channel-updated event.
    #[must_use]
    pub fn updated(channel: Channel) -> Self {
        Self::ChannelUpdated { channel }
    }

    /// Creates a channel-deleted event.
    #[must_use]
    pub fn deleted(key: ChannelKey) -> Self {
        Self::ChannelDeleted { key }
    }

    /// Creates a member-added event without a channel payload.
    #[must_use]
    pub fn member_added(key: ChannelKey, user: impl Into<UserId>) -> Self {
        Self::MemberAdded {
            key,
            user: user.into(),
            channel: None,
        }
    }

    /// Creates a member-removed event.
    #[must_use]
    pub fn member_removed(key: ChannelKey, user: impl Into<UserId>) -> Self {
        Self::MemberRemoved {
            key,
            user: user.into(),
        }
    }

    /// Creates an activity event without a channel payload.
    #[must_use]
    pub fn activity(key: ChannelKey, last_message_at: impl Into<Timestamp>) -> Self {
        Self::ActivityChanged {
            key,
            last_message_at: last_message_at.into(),
            channel: None,
        }
    }

    /// Returns the key of the channel this event is about.
    #[must_use]
    pub fn key(&self) -> &ChannelKey {
        match self {
            Self::ChannelCreated { channel } | Self::ChannelUpdated { channel } => &channel.key,
            Self::ChannelDeleted { key }
            | Self::MemberAdded { key, .. }
            | Self::MemberRemoved { key, .. }
            | Self::ActivityChanged { key, .. }
            | Self::VisibilityChanged { key, .. }
            | Self::ReadStateChanged { key, .. } => key,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChannelCreated { .. } => "channel_created",
            Self::ChannelUpdated { .. } => "channel_updated",
            Self::ChannelDeleted { .. } => "channel_deleted",
            Self::MemberAdded { .. } => "member_added",
            Self::MemberRemoved { .. } => "member_removed",
            Self::ActivityChanged { .. } => "activity_changed",
            Self::VisibilityChanged { .. } => "visibility_changed",
            Self::ReadStateChanged { .. } => "read_state_changed",
        }
    }
}
