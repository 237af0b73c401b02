//! Property-based tests for the reconciler.
//!
//! Whatever events arrive and in whatever order pages land, the view must stay:
//! - Unique: no channel key appears twice
//! - Sound: every channel matches the query
//! - Sorted: strictly ordered by the query's comparator
//!
//! Events carrying whole channels must also leave the view exactly where a
//! from-scratch recomputation would.

mod common;

use chanlist_live::{Page, PageStart, Reconciler, ViewDiff};
use chanlist_types::{Channel, ChannelKey, DomainEvent, UserId};
use common::*;
use proptest::prelude::*;
use std::collections::HashMap;

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn id_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["a", "b", "c", "d", "e", "f"])
}

fn channel_strategy() -> impl Strategy<Value = Channel> {
    (id_strategy(), 0i64..50, any::<bool>(), 0u32..3).prop_map(
        |(id, activity, member, unread)| {
            let base = if member {
                channel(id, activity)
            } else {
                foreign_channel(id, activity)
            };
            base.with_unread_count(unread)
        },
    )
}

/// Events that carry absolute channel state.
fn absolute_event_strategy() -> impl Strategy<Value = DomainEvent> {
    prop_oneof![
        channel_strategy().prop_map(DomainEvent::created),
        channel_strategy().prop_map(DomainEvent::updated),
        id_strategy().prop_map(|id| DomainEvent::deleted(key(id))),
    ]
}

fn event_strategy() -> impl Strategy<Value = DomainEvent> {
    prop_oneof![
        absolute_event_strategy(),
        (id_strategy(), any::<bool>()).prop_map(|(id, add)| if add {
            DomainEvent::member_added(key(id), "alice")
        } else {
            DomainEvent::member_removed(key(id), "alice")
        }),
        (id_strategy(), 0i64..100).prop_map(|(id, at)| DomainEvent::activity(key(id), at)),
        (id_strategy(), any::<bool>()).prop_map(|(id, hidden)| DomainEvent::VisibilityChanged {
            key: key(id),
            hidden,
        }),
        (id_strategy(), 0u32..5).prop_map(|(id, unread_count)| DomainEvent::ReadStateChanged {
            key: key(id),
            unread_count,
        }),
    ]
}

fn page_strategy() -> impl Strategy<Value = Vec<Channel>> {
    prop::collection::vec(channel_strategy(), 0..8)
}

/// Applies absolute events to a plain map and filters and sorts the result.
fn recompute(initial: &[Channel], events: &[DomainEvent]) -> Vec<Channel> {
    let mut model: HashMap<ChannelKey, Channel> = HashMap::new();
    for channel in initial {
        model.insert(channel.key.clone(), channel.clone());
    }
    for event in events {
        match event {
            DomainEvent::ChannelCreated { channel } | DomainEvent::ChannelUpdated { channel } => {
                model.insert(channel.key.clone(), channel.clone());
            }
            DomainEvent::ChannelDeleted { key } => {
                model.remove(key);
            }
            other => panic!("not an absolute event: {other:?}"),
        }
    }
    let alice = UserId::new("alice");
    let query = alice_query();
    let mut expected: Vec<Channel> = model
        .into_values()
        .filter(|c| c.has_member(&alice) && !c.hidden)
        .collect();
    query.sort.sort(&mut expected);
    expected
}

fn paged_reconciler(first: Vec<Channel>) -> (Reconciler, chanlist_live::FetchTicket) {
    let mut reconciler = ready(more(first, "p2"));
    match reconciler.begin_page().unwrap() {
        PageStart::Started { ticket, .. } => (reconciler, ticket),
        other => panic!("page did not start: {other:?}"),
    }
}

// =============================================================================
// VIEW INVARIANTS
// =============================================================================

mod view_invariants {
    use super::*;

    proptest! {
        /// Uniqueness, soundness and order hold after every single event.
        #[test]
        fn hold_after_every_event(
            page in page_strategy(),
            events in prop::collection::vec(event_strategy(), 0..40),
        ) {
            let mut reconciler = ready(Page::last(page));
            prop_assert!(reconciler.check_invariants().is_ok());

            let mut revision = reconciler.revision();
            for event in events {
                let update = reconciler.fold(event);
                prop_assert!(reconciler.check_invariants().is_ok());
                match update {
                    Some(update) => {
                        prop_assert!(!update.diff.is_empty());
                        prop_assert_eq!(update.snapshot.revision, revision + 1);
                    }
                    None => prop_assert_eq!(reconciler.revision(), revision),
                }
                revision = reconciler.revision();
            }
        }

        /// Queued bootstrap events end in the same view as folding them live.
        #[test]
        fn queued_events_match_live_folding(
            page in page_strategy(),
            events in prop::collection::vec(event_strategy(), 0..20),
        ) {
            let mut queued = make_reconciler();
            for event in events.clone() {
                queued.fold(event);
            }
            bootstrap(&mut queued, Vec::new(), Page::last(page.clone()));

            let mut live = ready(Page::last(page));
            for event in events {
                live.fold(event);
            }

            prop_assert_eq!(queued.channels(), live.channels());
        }
    }
}

// =============================================================================
// CONVERGENCE
// =============================================================================

mod convergence {
    use super::*;

    proptest! {
        /// Folding whole-channel events equals recomputing from scratch.
        #[test]
        fn absolute_events_match_recomputation(
            page in page_strategy(),
            events in prop::collection::vec(absolute_event_strategy(), 0..30),
        ) {
            let mut reconciler = ready(Page::last(page.clone()));
            for event in events.clone() {
                reconciler.fold(event);
            }

            let expected = recompute(&page, &events);
            prop_assert_eq!(reconciler.channels(), expected.as_slice());
        }

        /// Events that race a page fetch end where they would had the page
        /// landed first.
        #[test]
        fn events_racing_a_page_match_sequential_order(
            first in page_strategy(),
            second in page_strategy(),
            events in prop::collection::vec(absolute_event_strategy(), 0..20),
        ) {
            let (mut racing, ticket) = paged_reconciler(first.clone());
            for event in events.clone() {
                racing.fold(event);
            }
            racing.complete_page(ticket, Page::last(second.clone()));

            let (mut sequential, ticket) = paged_reconciler(first);
            sequential.complete_page(ticket, Page::last(second));
            for event in events {
                sequential.fold(event);
            }

            prop_assert_eq!(racing.channels(), sequential.channels());
            prop_assert!(racing.check_invariants().is_ok());
        }

        /// Re-folding an absolute event changes nothing.
        #[test]
        fn absolute_events_are_idempotent(
            page in page_strategy(),
            event in absolute_event_strategy(),
        ) {
            let mut reconciler = ready(Page::last(page));
            reconciler.fold(event.clone());
            let once = reconciler.channels().to_vec();

            prop_assert!(reconciler.fold(event).is_none());
            prop_assert_eq!(reconciler.channels(), once.as_slice());
        }
    }
}

// =============================================================================
// DIFF
// =============================================================================

mod diff_properties {
    use super::*;

    proptest! {
        /// Sizes add up and moves only involve surviving channels.
        #[test]
        fn diff_accounts_for_every_channel(
            old_page in page_strategy(),
            new_page in page_strategy(),
        ) {
            let old = ready(Page::last(old_page)).channels().to_vec();
            let new = ready(Page::last(new_page)).channels().to_vec();

            let diff = ViewDiff::between(&old, &new);

            prop_assert_eq!(new.len() + diff.removed.len(), old.len() + diff.inserted.len());
            for moved in &diff.moved {
                prop_assert!(old.iter().any(|c| &c.key == moved));
                prop_assert!(new.iter().any(|c| &c.key == moved));
            }
        }
    }
}
