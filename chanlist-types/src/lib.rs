//! Core type definitions for live channel lists.
//!
//! This crate defines the plain data shared by every layer:
//! - Channel keys (`type:id`), user and view identifiers
//! - Millisecond timestamps used for activity ordering
//! - The [`Channel`] entity tracked by a live query
//! - Already-decoded domain events delivered by the event bus
//!
//! Filtering, sorting and reconciliation live in the crates above this one.

mod channel;
mod event;
mod ids;
mod timestamp;

pub use channel::Channel;
pub use event::DomainEvent;
pub use ids::{ChannelKey, UserId, ViewId};
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid channel key: {0:?}")]
    InvalidChannelKey(String),
}
