//! Query model for live channel lists.
//!
//! Defines the immutable descriptor a live view is bound to:
//! - [`ChannelListQuery`]: filter, sort order, page size and payload limits
//! - [`Filter`]: the structural filter, kept as data so it can be sent to
//!   the backend and evaluated locally with the same semantics
//! - [`ChannelPredicate`]: structural filter optionally ANDed with a
//!   caller-supplied [`DynamicFilter`]
//! - [`Sorting`]: a strict total order over channels

mod filter;
mod predicate;
mod query;
mod sort;

pub use filter::{Filter, FilterField, FilterValue};
pub use predicate::{matches, ChannelPredicate, DynamicFilter};
pub use query::{ChannelListQuery, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use sort::{Sort, SortDirection, SortKey, Sorting};
