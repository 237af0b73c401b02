//! Lifecycle and pagination state of a live channel list.

use crate::fetcher::{Page, PageCursor};
use chanlist_types::DomainEvent;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::warn;

/// Lifecycle phase of a live view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    /// Created, nothing fetched yet. Events are queued.
    Uninitialized,
    /// Local snapshot and first page are being fetched. Events are queued.
    Bootstrapping,
    /// The view is live. Events fold immediately.
    Ready,
    /// Terminal. Events and fetch results are discarded.
    TornDown,
}

impl EnginePhase {
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }

    pub fn is_torn_down(self) -> bool {
        self == Self::TornDown
    }
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Bootstrapping => "bootstrapping",
            Self::Ready => "ready",
            Self::TornDown => "torn_down",
        };
        f.write_str(name)
    }
}

/// Result of a `load_next_page` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// A page was fetched and merged. `changed` is false if every channel on
    /// it was already present and identical.
    Loaded { changed: bool },
    /// The backend has no more results. Nothing was fetched.
    Exhausted,
    /// A page fetch is already outstanding. Nothing was fetched.
    InFlight,
}

/// What a fetch result will be merged as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Bootstrap,
    NextPage,
    Refresh,
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bootstrap => "bootstrap",
            Self::NextPage => "next_page",
            Self::Refresh => "refresh",
        };
        f.write_str(name)
    }
}

/// Identifies one outstanding fetch. Results carrying any other ticket are
/// stale and get discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    pub kind: FetchKind,
    pub(crate) seq: u64,
}

/// Pagination cursor owned by one live view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pagination {
    cursor: Option<PageCursor>,
    has_more: bool,
}

impl Pagination {
    /// Continuation token for the next page, if any.
    pub fn cursor(&self) -> Option<&PageCursor> {
        self.cursor.as_ref()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Advances past `page`.
    pub(crate) fn advance(&mut self, page: &Page) {
        self.cursor = page.next_cursor.clone();
        self.has_more = page.has_more && page.next_cursor.is_some();
        if page.has_more && page.next_cursor.is_none() {
            warn!("Page reported more results without a cursor; treating as exhausted");
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Bounded FIFO of events awaiting (re)application.
///
/// During bootstrap it holds events not yet folded. While a page or refresh
/// fetch is outstanding it holds events already folded, to be folded again
/// over the fetched result.
#[derive(Debug, Clone)]
pub struct PendingEvents {
    events: VecDeque<DomainEvent>,
    capacity: usize,
    dropped: u64,
}

impl PendingEvents {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Appends an event, dropping the oldest one when full.
    pub fn push(&mut self, event: DomainEvent) {
        if self.events.len() >= self.capacity {
            if let Some(oldest) = self.events.pop_front() {
                self.dropped += 1;
                warn!(
                    "Pending event queue full ({}), dropped oldest {} for {}",
                    self.capacity,
                    oldest.kind(),
                    oldest.key()
                );
            }
        }
        self.events.push_back(event);
    }

    /// Removes and returns all events in receipt order.
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        self.events.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total number of events dropped for lack of space.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
