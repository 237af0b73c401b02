//! Shared helpers for live channel list tests.

#![allow(dead_code)]

use chanlist_live::{BootstrapStart, LiveQueryConfig, Page, PageCursor, Reconciler, ViewUpdate};
use chanlist_query::{ChannelListQuery, Filter};
use chanlist_types::{Channel, ChannelKey, Timestamp};
use std::time::Duration;

/// Installs a test log subscriber once. `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn key(id: &str) -> ChannelKey {
    ChannelKey::messaging(id)
}

/// A channel alice belongs to, last active at `activity`.
pub fn channel(id: &str, activity: i64) -> Channel {
    Channel::new(key(id), Timestamp::from_millis(0))
        .with_members(["alice", "bob"])
        .with_last_message_at(Timestamp::from_millis(activity))
}

/// A channel alice does not belong to.
pub fn foreign_channel(id: &str, activity: i64) -> Channel {
    Channel::new(key(id), Timestamp::from_millis(0))
        .with_members(["bob"])
        .with_last_message_at(Timestamp::from_millis(activity))
}

/// Alice's channels, most recently active first.
pub fn alice_query() -> ChannelListQuery {
    ChannelListQuery::new(Filter::member("alice"))
}

pub fn more(channels: Vec<Channel>, cursor: &str) -> Page {
    Page::with_more(channels, PageCursor::new(cursor))
}

pub fn make_reconciler() -> Reconciler {
    Reconciler::new(alice_query(), LiveQueryConfig::default())
}

/// Runs a whole bootstrap and returns its update.
pub fn bootstrap(
    reconciler: &mut Reconciler,
    local: Vec<Channel>,
    page: Page,
) -> Option<ViewUpdate> {
    match reconciler.begin_bootstrap().unwrap() {
        BootstrapStart::Started(ticket) => reconciler.complete_bootstrap(ticket, local, page),
        other => panic!("bootstrap did not start: {other:?}"),
    }
}

/// A reconciler already live with `page` as its first page.
pub fn ready(page: Page) -> Reconciler {
    let mut reconciler = make_reconciler();
    bootstrap(&mut reconciler, Vec::new(), page);
    reconciler
}

/// Channel ids in view order.
pub fn ids(channels: &[Channel]) -> Vec<String> {
    channels.iter().map(|c| c.key.id.clone()).collect()
}

pub fn keys(ids: &[&str]) -> Vec<ChannelKey> {
    ids.iter().map(|id| key(id)).collect()
}

/// Polls `condition` until it holds, failing after five seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
