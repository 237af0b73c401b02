//! Observable view: the read-only snapshot of a live channel list plus
//! change subscriptions.
//!
//! Only the owning live list writes to the view. Readers get an `Arc` of the
//! latest published snapshot, which never changes underneath them.

use crate::diff::ViewDiff;
use crate::state::EnginePhase;
use chanlist_types::{Channel, ChannelKey, ViewId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::debug;

/// An immutable snapshot of a live view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub view_id: ViewId,
    pub phase: EnginePhase,
    pub channels: Arc<Vec<Channel>>,
    /// Whether the backend reported more pages.
    pub has_more: bool,
    /// Increments with every published change.
    pub revision: u64,
}

impl ViewSnapshot {
    pub(crate) fn empty(view_id: ViewId) -> Self {
        Self {
            view_id,
            phase: EnginePhase::Uninitialized,
            channels: Arc::new(Vec::new()),
            has_more: false,
            revision: 0,
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, key: &ChannelKey) -> Option<&Channel> {
        self.channels.iter().find(|c| &c.key == key)
    }

    pub fn position(&self, key: &ChannelKey) -> Option<usize> {
        self.channels.iter().position(|c| &c.key == key)
    }

    /// Keys in view order.
    pub fn keys(&self) -> Vec<ChannelKey> {
        self.channels.iter().map(|c| c.key.clone()).collect()
    }
}

/// One published change.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewUpdate {
    pub snapshot: Arc<ViewSnapshot>,
    pub diff: ViewDiff,
}

type Callback = Arc<dyn Fn(&ViewUpdate) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    callbacks: BTreeMap<u64, Callback>,
    next_id: u64,
}

struct ViewInner {
    current: RwLock<Arc<ViewSnapshot>>,
    subscribers: Mutex<Subscribers>,
}

/// Shared handle to a view's latest snapshot and its subscribers.
#[derive(Clone)]
pub struct ObservableView {
    inner: Arc<ViewInner>,
}

impl std::fmt::Debug for ObservableView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableView")
            .field("revision", &self.snapshot().revision)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl ObservableView {
    pub(crate) fn new(initial: ViewSnapshot) -> Self {
        Self {
            inner: Arc::new(ViewInner {
                current: RwLock::new(Arc::new(initial)),
                subscribers: Mutex::new(Subscribers::default()),
            }),
        }
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> Arc<ViewSnapshot> {
        match self.inner.current.read() {
            Ok(current) => Arc::clone(&current),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Registers a callback invoked once per published change, on the task
    /// that owns the view. Dropping the returned handle unsubscribes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ViewUpdate) + Send + Sync + 'static,
    {
        let mut subscribers = self.lock_subscribers();
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.callbacks.insert(id, Arc::new(callback));
        Subscription {
            id,
            view: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().callbacks.len()
    }

    /// Replaces the snapshot without notifying anyone.
    pub(crate) fn store(&self, snapshot: Arc<ViewSnapshot>) {
        match self.inner.current.write() {
            Ok(mut current) => *current = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    /// Replaces the snapshot and notifies every subscriber once.
    pub(crate) fn publish(&self, update: ViewUpdate) {
        self.store(Arc::clone(&update.snapshot));
        // Callbacks run outside the lock so they may unsubscribe themselves.
        let callbacks: Vec<Callback> = self.lock_subscribers().callbacks.values().cloned().collect();
        debug!(
            "Publishing revision {} ({} changes) to {} subscribers",
            update.snapshot.revision,
            update.diff.len(),
            callbacks.len()
        );
        for callback in callbacks {
            callback(&update);
        }
    }

    /// Drops every subscriber.
    pub(crate) fn close(&self) {
        self.lock_subscribers().callbacks.clear();
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        match self.inner.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Handle to a change subscription.
#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
    id: u64,
    view: Weak<ViewInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns true while the callback is still registered.
    pub fn is_active(&self) -> bool {
        let Some(inner) = self.view.upgrade() else {
            return false;
        };
        let subscribers = match inner.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.callbacks.contains_key(&self.id)
    }

    /// Unsubscribes.
    pub fn cancel(self) {}

    fn remove(&self) {
        if let Some(inner) = self.view.upgrade() {
            match inner.subscribers.lock() {
                Ok(mut subscribers) => subscribers.callbacks.remove(&self.id),
                Err(poisoned) => poisoned.into_inner().callbacks.remove(&self.id),
            };
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
