//! Live channel lists for the chanlist client.
//!
//! A live channel list is a filtered, ordered, paginated view over channels
//! that stays correct while channels are created, changed, joined, left and
//! deleted. It starts from the local snapshot, overlays pages from the
//! backend, and folds every domain event into the view as it arrives.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Reconciler**: the view as a pure state machine, with no I/O
//! - **Orchestrator**: one task per view that runs fetches, receives events
//!   and publishes updates
//! - **Fetcher**: paginated access to the backend
//! - **Events**: the broadcast stream of domain events
//! - **Observable view**: read-only snapshots and change subscriptions
//!
//! ## Lifecycle
//!
//! 1. **Spawn**: subscribe to events; they queue from here on
//! 2. **Bootstrap**: read the local snapshot and first page concurrently,
//!    merge them with remote data winning, replay queued events, go live
//! 3. **Live**: fold events immediately, load further pages on demand
//! 4. **Teardown**: cancel fetches, unsubscribe, drop subscribers
//!
//! # Example
//!
//! ```
//! use chanlist_live::{BootstrapStart, LiveQueryConfig, Page, Reconciler};
//! use chanlist_query::{ChannelListQuery, Filter};
//! use chanlist_types::{Channel, ChannelKey, DomainEvent, Timestamp};
//!
//! let query = ChannelListQuery::new(Filter::member("alice"));
//! let mut reconciler = Reconciler::new(query, LiveQueryConfig::default());
//!
//! let general = Channel::new(ChannelKey::messaging("general"), Timestamp::from_millis(1))
//!     .with_members(["alice", "bob"]);
//! let ticket = match reconciler.begin_bootstrap().unwrap() {
//!     BootstrapStart::Started(ticket) => ticket,
//!     other => panic!("unexpected {other:?}"),
//! };
//! reconciler.complete_bootstrap(ticket, Vec::new(), Page::last(vec![general]));
//!
//! let update = reconciler
//!     .fold(DomainEvent::member_removed(ChannelKey::messaging("general"), "alice"))
//!     .unwrap();
//! assert_eq!(update.diff.removed, vec![ChannelKey::messaging("general")]);
//! assert!(reconciler.channels().is_empty());
//! ```

mod diff;
mod engine;
mod error;
pub mod events;
pub mod fetcher;
mod observable;
mod orchestrator;
pub mod state;

pub use diff::ViewDiff;
pub use engine::{BootstrapStart, LiveQueryConfig, PageStart, Reconciler, RefreshStart};
pub use error::{FetchError, FetchResult, LiveQueryError, LiveQueryResult};
pub use events::{EventBus, EventSource};
pub use fetcher::{ChannelFetcher, Page, PageCursor};
pub use observable::{ObservableView, Subscription, ViewSnapshot, ViewUpdate};
pub use orchestrator::{Collaborators, LiveChannelList};
pub use state::{EnginePhase, FetchKind, FetchTicket, PageOutcome, Pagination};
