//! Local snapshot storage for live channel lists.
//!
//! A live view bootstraps from whatever channels are already known locally
//! and hands every page it fetches back for persistence. Stores are shared
//! by all views of a client, so implementations must be `Send + Sync`.
//!
//! # Implementations
//!
//! - [`MemorySnapshotStore`] keeps channels in a map, for tests and
//!   ephemeral sessions
//! - [`SqliteSnapshotStore`] keeps channels as JSON rows in SQLite

mod error;
mod memory;
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemorySnapshotStore;
pub use sqlite::SqliteSnapshotStore;

use async_trait::async_trait;
use chanlist_query::ChannelListQuery;
use chanlist_types::Channel;

/// Read/write access to locally persisted channels.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Returns the locally known channels matching `query`, sorted by the
    /// query's order.
    ///
    /// Best-effort: data may be stale or partial. Having no local data is
    /// not an error and yields an empty list.
    async fn fetch_local(&self, query: &ChannelListQuery) -> StoreResult<Vec<Channel>>;

    /// Upserts channels by key.
    async fn persist(&self, channels: Vec<Channel>) -> StoreResult<()>;
}

/// Filters and orders a candidate set the way `fetch_local` must.
pub(crate) fn select(query: &ChannelListQuery, candidates: impl IntoIterator<Item = Channel>) -> Vec<Channel> {
    let predicate = query.predicate();
    let mut selected: Vec<Channel> = candidates
        .into_iter()
        .filter(|channel| predicate.matches(channel))
        .collect();
    query.sort.sort(&mut selected);
    selected
}
