//! Paginated remote fetching.
//!
//! The fetcher is the only path to the backend. It is shared by every live
//! view of a client; each view owns its own cursor.

use crate::error::FetchResult;
use async_trait::async_trait;
use chanlist_query::ChannelListQuery;
use chanlist_types::Channel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque continuation token handed out by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of remote results, in the query's order.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub channels: Vec<Channel>,
    pub next_cursor: Option<PageCursor>,
    pub has_more: bool,
}

impl Page {
    /// A final page.
    pub fn last(channels: Vec<Channel>) -> Self {
        Self {
            channels,
            next_cursor: None,
            has_more: false,
        }
    }

    /// A page followed by more results at `cursor`.
    pub fn with_more(channels: Vec<Channel>, cursor: PageCursor) -> Self {
        Self {
            channels,
            next_cursor: Some(cursor),
            has_more: true,
        }
    }
}

/// Remote paginated channel queries.
///
/// Transport retry and backoff belong to implementations; the live view
/// surfaces a failure as-is and never retries on its own.
#[async_trait]
pub trait ChannelFetcher: Send + Sync {
    /// Fetches the first page of `query`.
    async fn fetch_first_page(&self, query: &ChannelListQuery) -> FetchResult<Page>;

    /// Fetches the page that follows `cursor`. The query is passed along
    /// for its page size and payload limits.
    async fn fetch_next_page(
        &self,
        query: &ChannelListQuery,
        cursor: &PageCursor,
    ) -> FetchResult<Page>;
}

/// A scripted in-memory backend for testing.
pub mod mock {
    use super::*;
    use crate::error::FetchError;
    use chanlist_query::ChannelPredicate;
    use chanlist_types::ChannelKey;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Semaphore;

    /// Serves offset-paginated pages over a mutable remote channel set.
    ///
    /// The backend evaluates only the structural filter; dynamic filters are
    /// a purely local concern.
    #[derive(Default)]
    pub struct MockFetcher {
        remote: Mutex<Vec<Channel>>,
        failures: Mutex<VecDeque<FetchError>>,
        gate: Mutex<Option<Arc<Semaphore>>>,
        first_calls: AtomicUsize,
        next_calls: AtomicUsize,
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a backend holding `channels`.
        pub fn with_channels(channels: impl IntoIterator<Item = Channel>) -> Self {
            let fetcher = Self::new();
            fetcher.set_remote(channels);
            fetcher
        }

        /// Replaces the remote channel set.
        pub fn set_remote(&self, channels: impl IntoIterator<Item = Channel>) {
            if let Ok(mut remote) = self.remote.lock() {
                *remote = channels.into_iter().collect();
            }
        }

        /// Inserts or replaces one remote channel.
        pub fn upsert_remote(&self, channel: Channel) {
            if let Ok(mut remote) = self.remote.lock() {
                remote.retain(|c| c.key != channel.key);
                remote.push(channel);
            }
        }

        /// Removes one remote channel.
        pub fn remove_remote(&self, key: &ChannelKey) {
            if let Ok(mut remote) = self.remote.lock() {
                remote.retain(|c| &c.key != key);
            }
        }

        /// Makes the next fetch fail with `error`. Failures queue up.
        pub fn fail_next(&self, error: FetchError) {
            if let Ok(mut failures) = self.failures.lock() {
                failures.push_back(error);
            }
        }

        /// Holds every subsequent fetch until a permit is added to the
        /// returned semaphore.
        pub fn hold(&self) -> Arc<Semaphore> {
            let gate = Arc::new(Semaphore::new(0));
            if let Ok(mut slot) = self.gate.lock() {
                *slot = Some(Arc::clone(&gate));
            }
            gate
        }

        /// Stops holding fetches. Fetches already waiting stay held.
        pub fn release(&self) {
            if let Ok(mut slot) = self.gate.lock() {
                *slot = None;
            }
        }

        pub fn first_page_calls(&self) -> usize {
            self.first_calls.load(Ordering::SeqCst)
        }

        pub fn next_page_calls(&self) -> usize {
            self.next_calls.load(Ordering::SeqCst)
        }

        async fn wait_for_gate(&self) {
            let gate = self.gate.lock().ok().and_then(|g| g.clone());
            if let Some(gate) = gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
        }

        fn take_failure(&self) -> Option<FetchError> {
            self.failures.lock().ok()?.pop_front()
        }

        fn page_at(&self, query: &ChannelListQuery, offset: usize) -> Page {
            let predicate = ChannelPredicate::Structural(&query.filter);
            let mut matching: Vec<Channel> = self
                .remote
                .lock()
                .map(|remote| remote.iter().filter(|c| predicate.matches(c)).cloned().collect())
                .unwrap_or_default();
            query.sort.sort(&mut matching);

            let end = (offset + query.page_size()).min(matching.len());
            let channels = matching.get(offset..end).map(<[Channel]>::to_vec).unwrap_or_default();
            if end < matching.len() {
                Page::with_more(channels, PageCursor::new(format!("offset:{end}")))
            } else {
                Page::last(channels)
            }
        }
    }

    #[async_trait]
    impl ChannelFetcher for MockFetcher {
        async fn fetch_first_page(&self, query: &ChannelListQuery) -> FetchResult<Page> {
            self.first_calls.fetch_add(1, Ordering::SeqCst);
            self.wait_for_gate().await;
            if let Some(error) = self.take_failure() {
                return Err(error);
            }
            Ok(self.page_at(query, 0))
        }

        async fn fetch_next_page(
            &self,
            query: &ChannelListQuery,
            cursor: &PageCursor,
        ) -> FetchResult<Page> {
            self.next_calls.fetch_add(1, Ordering::SeqCst);
            self.wait_for_gate().await;
            if let Some(error) = self.take_failure() {
                return Err(error);
            }
            let offset = cursor
                .as_str()
                .strip_prefix("offset:")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| FetchError::Backend {
                    status: 400,
                    message: format!("invalid cursor {cursor}"),
                })?;
            Ok(self.page_at(query, offset))
        }
    }
}
