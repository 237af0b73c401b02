use crate::{select, SnapshotStore, StoreError, StoreResult};
use async_trait::async_trait;
use chanlist_query::ChannelListQuery;
use chanlist_types::{Channel, ChannelKey};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory snapshot store.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    channels: RwLock<HashMap<ChannelKey, Channel>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `channels`.
    pub fn with_channels(channels: impl IntoIterator<Item = Channel>) -> Self {
        let map = channels.into_iter().map(|c| (c.key.clone(), c)).collect();
        Self {
            channels: RwLock::new(map),
        }
    }

    /// Returns a copy of the stored channel, if any.
    pub fn get(&self, key: &ChannelKey) -> Option<Channel> {
        self.channels.read().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.channels.read().map(|c| c.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn fetch_local(&self, query: &ChannelListQuery) -> StoreResult<Vec<Channel>> {
        let channels = self.channels.read().map_err(|_| StoreError::Poisoned)?;
        Ok(select(query, channels.values().cloned()))
    }

    async fn persist(&self, channels: Vec<Channel>) -> StoreResult<()> {
        let mut stored = self.channels.write().map_err(|_| StoreError::Poisoned)?;
        for channel in channels {
            stored.insert(channel.key.clone(), channel);
        }
        Ok(())
    }
}
