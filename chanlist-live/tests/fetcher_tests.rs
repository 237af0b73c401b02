mod common;

use chanlist_live::fetcher::mock::MockFetcher;
use chanlist_live::{ChannelFetcher, EventBus, EventSource, FetchError, PageCursor};
use chanlist_types::DomainEvent;
use common::*;
use pretty_assertions::assert_eq;

// ── Mock fetcher ────────────────────────────────────────────────

#[tokio::test]
async fn mock_serves_sorted_filtered_pages() {
    let fetcher = MockFetcher::with_channels(vec![
        channel("c", 1),
        foreign_channel("x", 9),
        channel("a", 3),
        channel("b", 2),
    ]);
    let query = alice_query().with_page_size(2);

    let first = fetcher.fetch_first_page(&query).await.unwrap();
    assert_eq!(ids(&first.channels), vec!["a", "b"]);
    assert!(first.has_more);

    let cursor = first.next_cursor.unwrap();
    let second = fetcher.fetch_next_page(&query, &cursor).await.unwrap();
    assert_eq!(ids(&second.channels), vec!["c"]);
    assert!(!second.has_more);
    assert_eq!(second.next_cursor, None);
}

#[tokio::test]
async fn mock_rejects_unknown_cursors() {
    let fetcher = MockFetcher::new();

    let result = fetcher
        .fetch_next_page(&alice_query(), &PageCursor::new("bogus"))
        .await;

    assert!(matches!(result, Err(FetchError::Backend { status: 400, .. })));
}

#[tokio::test]
async fn mock_failures_are_consumed_in_order() {
    let fetcher = MockFetcher::with_channels(vec![channel("a", 1)]);
    fetcher.fail_next(FetchError::Timeout);
    fetcher.fail_next(FetchError::Network("reset".into()));
    let query = alice_query();

    assert_eq!(fetcher.fetch_first_page(&query).await, Err(FetchError::Timeout));
    assert_eq!(
        fetcher.fetch_first_page(&query).await,
        Err(FetchError::Network("reset".into()))
    );
    assert!(fetcher.fetch_first_page(&query).await.is_ok());
    assert_eq!(fetcher.first_page_calls(), 3);
}

#[test]
fn fetch_errors_display_their_cause() {
    let error = FetchError::Backend {
        status: 503,
        message: "unavailable".into(),
    };

    assert_eq!(error.to_string(), "backend error 503: unavailable");
}

// ── Event bus ───────────────────────────────────────────────────

#[tokio::test]
async fn bus_delivers_events_in_order() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe();

    assert_eq!(bus.publish(DomainEvent::deleted(key("a"))), 1);
    bus.publish(DomainEvent::deleted(key("b")));

    assert_eq!(rx.recv().await.unwrap(), DomainEvent::deleted(key("a")));
    assert_eq!(rx.recv().await.unwrap(), DomainEvent::deleted(key("b")));
}

#[test]
fn publishing_without_subscribers_is_harmless() {
    let bus = EventBus::new(4);

    assert_eq!(bus.publish(DomainEvent::deleted(key("a"))), 0);
    assert_eq!(bus.subscriber_count(), 0);
}
