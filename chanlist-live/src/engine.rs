//! Reconciler: the live ordered view as a state machine without I/O.
//!
//! The reconciler consumes fetch results and domain events and returns the
//! view updates to publish. The orchestrator performs all fetching, event
//! delivery and notification.
//!
//! Every operation builds its result on a working copy and commits it in one
//! step, so observers never see a half-merged page.

use crate::diff::ViewDiff;
use crate::error::{FetchError, LiveQueryError, LiveQueryResult};
use crate::fetcher::{Page, PageCursor};
use crate::observable::{ViewSnapshot, ViewUpdate};
use crate::state::{EnginePhase, FetchKind, FetchTicket, PendingEvents, Pagination};
use chanlist_query::{ChannelListQuery, Sorting};
use chanlist_types::{Channel, ChannelKey, DomainEvent, ViewId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Configuration for a live channel list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveQueryConfig {
    /// Capacity of the command channel between handles and the view task.
    pub command_buffer: usize,
    /// Maximum events held while bootstrapping or while a fetch is
    /// outstanding. The oldest are dropped beyond this.
    pub max_pending_events: usize,
    /// Write fetched pages back to the snapshot store.
    pub persist_pages: bool,
    /// Refresh the view when the event stream reports lost events.
    pub refresh_on_lag: bool,
}

impl Default for LiveQueryConfig {
    fn default() -> Self {
        Self {
            command_buffer: 32,
            max_pending_events: 1024,
            persist_pages: true,
            refresh_on_lag: true,
        }
    }
}

/// Result of asking to bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStart {
    /// Fetch the local snapshot and first page, then complete with `ticket`.
    Started(FetchTicket),
    /// A bootstrap is already running.
    InFlight,
    /// The view is already live.
    AlreadyReady,
}

/// Result of asking for the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStart {
    /// Fetch the page after `cursor`, then complete with `ticket`.
    Started {
        ticket: FetchTicket,
        cursor: PageCursor,
    },
    Exhausted,
    /// A page or refresh fetch is outstanding.
    InFlight,
}

/// Result of asking to refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStart {
    /// Fetch the local snapshot and first page, then complete with `ticket`.
    /// `superseded` is a page fetch that will no longer be accepted.
    Started {
        ticket: FetchTicket,
        superseded: Option<FetchTicket>,
    },
    /// A refresh is already running.
    InFlight,
}

/// The reconciliation state of one live view.
pub struct Reconciler {
    view_id: ViewId,
    query: ChannelListQuery,
    config: LiveQueryConfig,
    phase: EnginePhase,
    /// The ordered view as last committed.
    channels: Arc<Vec<Channel>>,
    pagination: Pagination,
    pending: PendingEvents,
    in_flight: Option<FetchTicket>,
    next_seq: u64,
    revision: u64,
}

impl Reconciler {
    pub fn new(query: ChannelListQuery, config: LiveQueryConfig) -> Self {
        Self::with_view_id(ViewId::new(), query, config)
    }

    pub fn with_view_id(view_id: ViewId, query: ChannelListQuery, config: LiveQueryConfig) -> Self {
        let pending = PendingEvents::new(config.max_pending_events);
        Self {
            view_id,
            query,
            config,
            phase: EnginePhase::Uninitialized,
            channels: Arc::new(Vec::new()),
            pagination: Pagination::default(),
            pending,
            in_flight: None,
            next_seq: 0,
            revision: 0,
        }
    }

    pub fn view_id(&self) -> ViewId {
        self.view_id
    }

    pub fn query(&self) -> &ChannelListQuery {
        &self.query
    }

    pub fn config(&self) -> &LiveQueryConfig {
        &self.config
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// The committed ordered view.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    /// Number of events queued or recorded for replay.
    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    /// Kind of the outstanding fetch, if any.
    pub fn in_flight(&self) -> Option<FetchKind> {
        self.in_flight.map(|t| t.kind)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns true if a result for `ticket` would still be merged.
    pub fn accepts(&self, ticket: FetchTicket) -> bool {
        self.in_flight == Some(ticket) && !self.phase.is_torn_down()
    }

    pub fn snapshot(&self) -> Arc<ViewSnapshot> {
        Arc::new(ViewSnapshot {
            view_id: self.view_id,
            phase: self.phase,
            channels: Arc::clone(&self.channels),
            has_more: self.pagination.has_more(),
            revision: self.revision,
        })
    }

    // ── Bootstrap ───────────────────────────────────────────────────

    pub fn begin_bootstrap(&mut self) -> LiveQueryResult<BootstrapStart> {
        match self.phase {
            EnginePhase::TornDown => Err(LiveQueryError::TornDown),
            EnginePhase::Ready => Ok(BootstrapStart::AlreadyReady),
            EnginePhase::Bootstrapping => Ok(BootstrapStart::InFlight),
            EnginePhase::Uninitialized => {
                self.phase = EnginePhase::Bootstrapping;
                Ok(BootstrapStart::Started(self.issue(FetchKind::Bootstrap)))
            }
        }
    }

    /// Merges the local snapshot with the first remote page, replays queued
    /// events and goes live. Always publishes, even an empty view.
    pub fn complete_bootstrap(
        &mut self,
        ticket: FetchTicket,
        local: Vec<Channel>,
        page: Page,
    ) -> Option<ViewUpdate> {
        if !self.settle(ticket) {
            return None;
        }
        let local_count = local.len();
        let remote_count = page.channels.len();
        self.pagination.advance(&page);
        let mut working = self.merge(local, page.channels);
        let replayed = self.replay(&mut working);
        self.phase = EnginePhase::Ready;

        info!(
            "Bootstrapped {} channels ({} local, {} remote, {} queued events)",
            working.len(),
            local_count,
            remote_count,
            replayed
        );
        self.commit(working, true)
    }

    /// Returns to `Uninitialized`. Queued events are kept for the next
    /// attempt.
    pub fn fail_bootstrap(&mut self, ticket: FetchTicket, error: &FetchError) -> bool {
        if ticket.kind != FetchKind::Bootstrap || !self.settle(ticket) {
            return false;
        }
        self.phase = EnginePhase::Uninitialized;
        warn!(
            "Bootstrap failed, {} queued events kept: {}",
            self.pending.len(),
            error
        );
        true
    }

    // ── Pagination ──────────────────────────────────────────────────

    pub fn begin_page(&mut self) -> LiveQueryResult<PageStart> {
        match self.phase {
            EnginePhase::TornDown => return Err(LiveQueryError::TornDown),
            EnginePhase::Uninitialized | EnginePhase::Bootstrapping => {
                return Err(LiveQueryError::NotReady);
            }
            EnginePhase::Ready => {}
        }
        if self.in_flight.is_some() {
            return Ok(PageStart::InFlight);
        }
        let cursor = match self.pagination.cursor() {
            Some(cursor) if self.pagination.has_more() => cursor.clone(),
            _ => return Ok(PageStart::Exhausted),
        };
        Ok(PageStart::Started {
            ticket: self.issue(FetchKind::NextPage),
            cursor,
        })
    }

    /// Merges a fetched page into the view and advances the cursor.
    /// Publishes only if the view changed.
    pub fn complete_page(&mut self, ticket: FetchTicket, page: Page) -> Option<ViewUpdate> {
        if !self.settle(ticket) {
            return None;
        }
        self.pagination.advance(&page);
        let fetched = page.channels.len();
        let mut working = self.merge(self.channels.to_vec(), page.channels);
        let replayed = self.replay(&mut working);
        debug!(
            "Merged page of {} channels ({} events replayed), has_more={}",
            fetched,
            replayed,
            self.pagination.has_more()
        );
        self.commit(working, false)
    }

    /// Leaves the view and cursor untouched.
    pub fn fail_page(&mut self, ticket: FetchTicket, error: &FetchError) -> bool {
        if ticket.kind != FetchKind::NextPage || !self.settle(ticket) {
            return false;
        }
        self.pending.clear();
        warn!("Page fetch failed: {}", error);
        true
    }

    // ── Refresh ─────────────────────────────────────────────────────

    /// Starts rebuilding the view from the local snapshot and a fresh first
    /// page. An outstanding page fetch is superseded.
    pub fn begin_refresh(&mut self) -> LiveQueryResult<RefreshStart> {
        match self.phase {
            EnginePhase::TornDown => return Err(LiveQueryError::TornDown),
            EnginePhase::Uninitialized | EnginePhase::Bootstrapping => {
                return Err(LiveQueryError::NotReady);
            }
            EnginePhase::Ready => {}
        }
        match self.in_flight {
            Some(ticket) if ticket.kind == FetchKind::Refresh => Ok(RefreshStart::InFlight),
            superseded => Ok(RefreshStart::Started {
                ticket: self.issue(FetchKind::Refresh),
                superseded,
            }),
        }
    }

    /// Replaces the view with the merge of `local` and the first page, then
    /// replays events received meanwhile. Publishes only if the view changed.
    pub fn complete_refresh(
        &mut self,
        ticket: FetchTicket,
        local: Vec<Channel>,
        page: Page,
    ) -> Option<ViewUpdate> {
        if !self.settle(ticket) {
            return None;
        }
        self.pagination.reset();
        self.pagination.advance(&page);
        let mut working = self.merge(local, page.channels);
        let replayed = self.replay(&mut working);
        info!(
            "Refreshed to {} channels ({} events replayed)",
            working.len(),
            replayed
        );
        self.commit(working, false)
    }

    pub fn fail_refresh(&mut self, ticket: FetchTicket, error: &FetchError) -> bool {
        if ticket.kind != FetchKind::Refresh || !self.settle(ticket) {
            return false;
        }
        self.pending.clear();
        warn!("Refresh failed: {}", error);
        true
    }

    // ── Events ──────────────────────────────────────────────────────

    /// Folds one event into the view.
    ///
    /// Before the view is live, events are queued. While a fetch is
    /// outstanding they are also recorded, and folded again over the fetched
    /// result. Publishes only if the view changed.
    pub fn fold(&mut self, event: DomainEvent) -> Option<ViewUpdate> {
        match self.phase {
            EnginePhase::TornDown => {
                debug!("Dropping {} for {} after teardown", event.kind(), event.key());
                None
            }
            EnginePhase::Uninitialized | EnginePhase::Bootstrapping => {
                self.pending.push(event);
                None
            }
            EnginePhase::Ready => {
                let change = plan(&self.query, &self.channels, &event);
                if self.in_flight.is_some() {
                    self.pending.push(event);
                }
                let change = change?;
                let mut working = self.channels.to_vec();
                apply(&self.query.sort, &mut working, change);
                self.commit(working, false)
            }
        }
    }

    /// Stops the view. Returns false if it was already torn down.
    pub fn teardown(&mut self) -> bool {
        if self.phase.is_torn_down() {
            return false;
        }
        self.phase = EnginePhase::TornDown;
        self.in_flight = None;
        self.pending.clear();
        info!("Torn down");
        true
    }

    // ── Invariants ──────────────────────────────────────────────────

    /// Checks key uniqueness, strict order and filter soundness of the
    /// committed view.
    pub fn check_invariants(&self) -> LiveQueryResult<()> {
        validate(&self.query.sort, &self.channels)?;
        let predicate = self.query.predicate();
        match self.channels.iter().find(|c| !predicate.matches(c)) {
            Some(stray) => Err(LiveQueryError::InvariantViolation(format!(
                "{} does not match the query",
                stray.key
            ))),
            None => Ok(()),
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    fn issue(&mut self, kind: FetchKind) -> FetchTicket {
        self.next_seq += 1;
        let ticket = FetchTicket {
            kind,
            seq: self.next_seq,
        };
        self.in_flight = Some(ticket);
        ticket
    }

    /// Clears the outstanding fetch if `ticket` is it.
    fn settle(&mut self, ticket: FetchTicket) -> bool {
        if !self.accepts(ticket) {
            debug!("Discarding stale {} result", ticket.kind);
            return false;
        }
        self.in_flight = None;
        true
    }

    /// Overlays `overlay` on `base` (later entries win per key), drops
    /// channels outside the query and sorts.
    fn merge(&self, base: Vec<Channel>, overlay: Vec<Channel>) -> Vec<Channel> {
        let predicate = self.query.predicate();
        let mut by_key: HashMap<ChannelKey, Channel> =
            HashMap::with_capacity(base.len() + overlay.len());
        for channel in base.into_iter().chain(overlay) {
            by_key.insert(channel.key.clone(), channel);
        }
        let mut merged: Vec<Channel> = by_key
            .into_values()
            .filter(|c| predicate.matches(c))
            .collect();
        self.query.sort.sort(&mut merged);
        merged
    }

    /// Folds all pending events into `working`. Returns how many there were.
    fn replay(&mut self, working: &mut Vec<Channel>) -> usize {
        let events = self.pending.drain();
        for event in &events {
            if let Some(change) = plan(&self.query, working, event) {
                apply(&self.query.sort, working, change);
            }
        }
        events.len()
    }

    fn commit(&mut self, mut working: Vec<Channel>, force: bool) -> Option<ViewUpdate> {
        if let Err(violation) = validate(&self.query.sort, &working) {
            if cfg!(debug_assertions) {
                panic!("{violation}");
            }
            error!("{}; rebuilding view order", violation);
            heal(&self.query.sort, &mut working);
        }

        let diff = ViewDiff::between(&self.channels, &working);
        if diff.is_empty() && !force {
            return None;
        }
        self.channels = Arc::new(working);
        self.revision += 1;
        Some(ViewUpdate {
            snapshot: self.snapshot(),
            diff,
        })
    }
}

/// A single positional edit of the view.
#[derive(Debug)]
enum Change {
    Insert(Channel),
    Replace(usize, Channel),
    Remove(usize),
}

/// Works out what `event` does to `channels`, or `None` if nothing.
fn plan(query: &ChannelListQuery, channels: &[Channel], event: &DomainEvent) -> Option<Change> {
    let key = event.key();
    let payload = match event {
        DomainEvent::MemberAdded { channel, .. } | DomainEvent::ActivityChanged { channel, .. } => {
            channel.as_ref()
        }
        _ => None,
    };
    if let Some(payload) = payload.filter(|p| &p.key != key) {
        warn!(
            event = event.kind(),
            %key,
            payload = %payload.key,
            "dropping event whose channel payload has another key"
        );
        return None;
    }

    let position = channels.iter().position(|c| &c.key == key);
    let current = position.map(|i| &channels[i]);

    let next = match event {
        DomainEvent::ChannelCreated { channel } | DomainEvent::ChannelUpdated { channel } => {
            channel.clone()
        }
        DomainEvent::ChannelDeleted { .. } => return position.map(Change::Remove),
        DomainEvent::MemberAdded { user, channel, .. } => {
            let mut next = channel.as_ref().or(current)?.clone();
            next.add_member(user.clone());
            next
        }
        DomainEvent::MemberRemoved { user, .. } => {
            let mut next = current?.clone();
            next.remove_member(user);
            next
        }
        DomainEvent::ActivityChanged {
            last_message_at,
            channel,
            ..
        } => {
            let mut next = channel.as_ref().or(current)?.clone();
            next.last_message_at = next
                .last_message_at
                .max(Some(*last_message_at))
                .max(current.and_then(|c| c.last_message_at));
            next
        }
        DomainEvent::VisibilityChanged { hidden, .. } => {
            let mut next = current?.clone();
            next.hidden = *hidden;
            next
        }
        DomainEvent::ReadStateChanged { unread_count, .. } => {
            let mut next = current?.clone();
            next.unread_count = *unread_count;
            next
        }
    };

    match (position, query.predicate().matches(&next)) {
        (None, false) => None,
        (None, true) => Some(Change::Insert(next)),
        (Some(i), false) => Some(Change::Remove(i)),
        (Some(i), true) if channels[i] == next => None,
        (Some(i), true) => Some(Change::Replace(i, next)),
    }
}

fn apply(sorting: &Sorting, channels: &mut Vec<Channel>, change: Change) {
    match change {
        Change::Insert(next) => {
            let at = insertion_point(sorting, channels, &next);
            channels.insert(at, next);
        }
        Change::Remove(i) => {
            channels.remove(i);
        }
        Change::Replace(i, next) => {
            if sorting.position_may_change(&channels[i], &next) {
                channels.remove(i);
                let at = insertion_point(sorting, channels, &next);
                channels.insert(at, next);
            } else {
                channels[i] = next;
            }
        }
    }
}

fn insertion_point(sorting: &Sorting, channels: &[Channel], channel: &Channel) -> usize {
    channels
        .binary_search_by(|probe| sorting.compare(probe, channel))
        .unwrap_or_else(|at| at)
}

fn validate(sorting: &Sorting, channels: &[Channel]) -> LiveQueryResult<()> {
    let mut seen = HashSet::with_capacity(channels.len());
    if let Some(dup) = channels.iter().find(|c| !seen.insert(&c.key)) {
        return Err(LiveQueryError::InvariantViolation(format!(
            "duplicate channel {}",
            dup.key
        )));
    }
    if !sorting.is_sorted(channels) {
        return Err(LiveQueryError::InvariantViolation(
            "view is out of order".to_string(),
        ));
    }
    Ok(())
}

/// Restores order and uniqueness, keeping the later copy of a duplicate.
fn heal(sorting: &Sorting, channels: &mut Vec<Channel>) {
    let mut by_key: HashMap<ChannelKey, Channel> = HashMap::with_capacity(channels.len());
    for channel in channels.drain(..) {
        by_key.insert(channel.key.clone(), channel);
    }
    channels.extend(by_key.into_values());
    sorting.sort(channels);
}
