//! Orchestrator: drives a `Reconciler` with real I/O.
//!
//! Each live list runs as one task owning its reconciler. Handles talk to it
//! over a command channel; domain events arrive over a broadcast receiver;
//! fetches run as child tasks that report back to the same loop. All state
//! changes happen on that one task, in the order its inputs arrive.

use crate::engine::{BootstrapStart, LiveQueryConfig, PageStart, Reconciler, RefreshStart};
use crate::error::{FetchError, FetchResult, LiveQueryError, LiveQueryResult};
use crate::events::EventSource;
use crate::fetcher::{ChannelFetcher, Page};
use crate::observable::{ObservableView, Subscription, ViewSnapshot, ViewUpdate};
use crate::state::{FetchKind, FetchTicket, PageOutcome};
use chanlist_query::ChannelListQuery;
use chanlist_storage::SnapshotStore;
use chanlist_types::{Channel, DomainEvent, ViewId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

/// Fetch results buffered between fetch tasks and the view task. At most a
/// first-page fetch and a page fetch are outstanding at once.
const FETCH_RESULT_BUFFER: usize = 4;

/// Events folded in a row before pending commands and fetch results get a turn.
const EVENT_BURST: usize = 64;

/// The services a live list depends on. Shared between lists.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn SnapshotStore>,
    pub fetcher: Arc<dyn ChannelFetcher>,
    pub events: Arc<dyn EventSource>,
}

impl Collaborators {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        fetcher: Arc<dyn ChannelFetcher>,
        events: Arc<dyn EventSource>,
    ) -> Self {
        Self {
            store,
            fetcher,
            events,
        }
    }
}

/// Commands sent from handles to the view task.
enum Command {
    Bootstrap {
        reply: oneshot::Sender<LiveQueryResult<()>>,
    },
    LoadNextPage {
        reply: oneshot::Sender<LiveQueryResult<PageOutcome>>,
    },
    Refresh {
        reply: oneshot::Sender<LiveQueryResult<()>>,
    },
    Fold {
        event: DomainEvent,
        reply: oneshot::Sender<()>,
    },
    Teardown {
        reply: oneshot::Sender<()>,
    },
}

/// A finished fetch. `local` is empty for next-page fetches.
struct Fetched {
    ticket: FetchTicket,
    local: Vec<Channel>,
    page: FetchResult<Page>,
}

/// Handle to a live, continuously reconciled channel list.
///
/// Cloning the handle is cheap. The list tears itself down when the last
/// handle is dropped.
#[derive(Clone)]
pub struct LiveChannelList {
    view_id: ViewId,
    commands: mpsc::Sender<Command>,
    view: ObservableView,
}

impl std::fmt::Debug for LiveChannelList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveChannelList")
            .field("view_id", &self.view_id)
            .field("view", &self.view)
            .finish()
    }
}

impl LiveChannelList {
    /// Spawns the list's task and subscribes to events right away. Events
    /// queue until `bootstrap` completes.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(
        query: ChannelListQuery,
        config: LiveQueryConfig,
        collaborators: Collaborators,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (fetched_tx, fetched_rx) = mpsc::channel(FETCH_RESULT_BUFFER);

        let reconciler = Reconciler::new(query, config);
        let view_id = reconciler.view_id();
        let view = ObservableView::new(ViewSnapshot::empty(view_id));
        let events = collaborators.events.subscribe();

        let task = ViewTask {
            reconciler,
            view: view.clone(),
            store: collaborators.store,
            fetcher: collaborators.fetcher,
            commands: command_rx,
            events: Some(events),
            fetched_tx,
            fetched_rx,
            fetches: HashMap::new(),
            bootstrap_waiters: Vec::new(),
            refresh_waiters: Vec::new(),
            page_waiter: None,
        };
        tokio::spawn(
            task.run()
                .instrument(info_span!("live_channel_list", view = %view_id)),
        );
        debug!("Spawned live channel list {}", view_id);

        Self {
            view_id,
            commands: command_tx,
            view,
        }
    }

    /// Spawns a list and bootstraps it. On failure the list is torn down.
    pub async fn start(
        query: ChannelListQuery,
        config: LiveQueryConfig,
        collaborators: Collaborators,
    ) -> LiveQueryResult<Self> {
        let list = Self::spawn(query, config, collaborators);
        match list.bootstrap().await {
            Ok(()) => Ok(list),
            Err(e) => {
                list.teardown().await;
                Err(e)
            }
        }
    }

    /// Loads the local snapshot and the first remote page and goes live.
    /// Returns immediately if already live; concurrent calls share one
    /// bootstrap. May be retried after a failure.
    pub async fn bootstrap(&self) -> LiveQueryResult<()> {
        self.request(|reply| Command::Bootstrap { reply }).await?
    }

    /// Fetches and merges the next page.
    pub async fn load_next_page(&self) -> LiveQueryResult<PageOutcome> {
        self.request(|reply| Command::LoadNextPage { reply }).await?
    }

    /// Rebuilds the view from the local snapshot and a fresh first page.
    /// Supersedes an outstanding page fetch. Before the list is live this
    /// bootstraps instead.
    pub async fn refresh(&self) -> LiveQueryResult<()> {
        self.request(|reply| Command::Refresh { reply }).await?
    }

    /// Folds an event as if it arrived from the event source. Returns once
    /// the event has been applied and any change published.
    pub async fn fold_event(&self, event: DomainEvent) -> LiveQueryResult<()> {
        self.request(|reply| Command::Fold { event, reply }).await
    }

    /// Stops the list: cancels fetches, unsubscribes from events and drops
    /// all subscribers. Idempotent.
    pub async fn teardown(&self) {
        if self
            .request(|reply| Command::Teardown { reply })
            .await
            .is_err()
        {
            debug!("Live channel list {} already torn down", self.view_id);
        }
    }

    pub fn view_id(&self) -> ViewId {
        self.view_id
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<ViewSnapshot> {
        self.view.snapshot()
    }

    /// Registers a change callback. See [`ObservableView::subscribe`].
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ViewUpdate) + Send + Sync + 'static,
    {
        self.view.subscribe(callback)
    }

    pub fn view(&self) -> &ObservableView {
        &self.view
    }

    pub fn is_torn_down(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> LiveQueryResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| LiveQueryError::TornDown)?;
        response.await.map_err(|_| LiveQueryError::TornDown)
    }
}

/// The task owning one live list.
struct ViewTask {
    reconciler: Reconciler,
    view: ObservableView,
    store: Arc<dyn SnapshotStore>,
    fetcher: Arc<dyn ChannelFetcher>,
    commands: mpsc::Receiver<Command>,
    events: Option<broadcast::Receiver<DomainEvent>>,
    fetched_tx: mpsc::Sender<Fetched>,
    fetched_rx: mpsc::Receiver<Fetched>,
    fetches: HashMap<FetchTicket, JoinHandle<()>>,
    bootstrap_waiters: Vec<oneshot::Sender<LiveQueryResult<()>>>,
    refresh_waiters: Vec<oneshot::Sender<LiveQueryResult<()>>>,
    page_waiter: Option<(FetchTicket, oneshot::Sender<LiveQueryResult<PageOutcome>>)>,
}

impl ViewTask {
    async fn run(mut self) {
        let mut burst = 0;
        loop {
            // Events first, then fetch results, so a result merges against
            // every event received before it.
            tokio::select! {
                biased;

                received = next_event(&mut self.events) => {
                    self.on_event(received);
                    burst += 1;
                    if burst == EVENT_BURST {
                        burst = 0;
                        if !self.drain_one() {
                            break;
                        }
                    }
                }

                Some(fetched) = self.fetched_rx.recv() => {
                    burst = 0;
                    self.on_fetched(fetched);
                }

                command = self.commands.recv() => match command {
                    Some(command) => {
                        burst = 0;
                        if !self.on_command(command) {
                            break;
                        }
                    }
                    None => {
                        debug!("All handles dropped");
                        self.shutdown();
                        break;
                    }
                },
            }
        }
    }

    /// Handles at most one ready fetch result and one ready command without
    /// waiting. Keeps a steady event stream from starving callers. Returns
    /// false once the list is torn down.
    fn drain_one(&mut self) -> bool {
        if let Ok(fetched) = self.fetched_rx.try_recv() {
            self.on_fetched(fetched);
        }
        match self.commands.try_recv() {
            Ok(command) => self.on_command(command),
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => {
                debug!("All handles dropped");
                self.shutdown();
                false
            }
        }
    }

    /// Handles one command. Returns false once the list is torn down.
    fn on_command(&mut self, command: Command) -> bool {
        match command {
            Command::Bootstrap { reply } => self.start_bootstrap(reply),
            Command::LoadNextPage { reply } => self.start_page(reply),
            Command::Refresh { reply } => self.start_refresh(Some(reply)),
            Command::Fold { event, reply } => {
                let update = self.reconciler.fold(event);
                self.publish(update);
                let _ = reply.send(());
            }
            Command::Teardown { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn on_event(&mut self, received: Result<DomainEvent, RecvError>) {
        match received {
            Ok(event) => {
                let update = self.reconciler.fold(event);
                self.publish(update);
            }
            Err(RecvError::Lagged(missed)) => {
                warn!("Event stream lagged, {} events lost", missed);
                if self.reconciler.config().refresh_on_lag && self.reconciler.phase().is_ready() {
                    self.start_refresh(None);
                }
            }
            Err(RecvError::Closed) => {
                info!("Event source closed");
                self.events = None;
            }
        }
    }

    // ── Fetch lifecycle ─────────────────────────────────────────────

    fn start_bootstrap(&mut self, reply: oneshot::Sender<LiveQueryResult<()>>) {
        match self.reconciler.begin_bootstrap() {
            Ok(BootstrapStart::Started(ticket)) => {
                self.bootstrap_waiters.push(reply);
                self.spawn_first_page(ticket);
                self.view.store(self.reconciler.snapshot());
            }
            Ok(BootstrapStart::InFlight) => self.bootstrap_waiters.push(reply),
            Ok(BootstrapStart::AlreadyReady) => {
                let _ = reply.send(Ok(()));
            }
            Err(e) => {
                let _ = reply.send(Err(e));
            }
        }
    }

    fn start_page(&mut self, reply: oneshot::Sender<LiveQueryResult<PageOutcome>>) {
        match self.reconciler.begin_page() {
            Ok(PageStart::Started { ticket, cursor }) => {
                self.page_waiter = Some((ticket, reply));
                let fetcher = Arc::clone(&self.fetcher);
                let query = self.reconciler.query().clone();
                let fetched_tx = self.fetched_tx.clone();
                let handle = tokio::spawn(
                    async move {
                        let page = fetcher.fetch_next_page(&query, &cursor).await;
                        let _ = fetched_tx
                            .send(Fetched {
                                ticket,
                                local: Vec::new(),
                                page,
                            })
                            .await;
                    }
                    .in_current_span(),
                );
                self.fetches.insert(ticket, handle);
            }
            Ok(PageStart::Exhausted) => {
                let _ = reply.send(Ok(PageOutcome::Exhausted));
            }
            Ok(PageStart::InFlight) => {
                let _ = reply.send(Ok(PageOutcome::InFlight));
            }
            Err(e) => {
                let _ = reply.send(Err(e));
            }
        }
    }

    fn start_refresh(&mut self, reply: Option<oneshot::Sender<LiveQueryResult<()>>>) {
        match self.reconciler.begin_refresh() {
            Ok(RefreshStart::Started { ticket, superseded }) => {
                if let Some(old) = superseded {
                    self.cancel_fetch(old);
                }
                self.refresh_waiters.extend(reply);
                self.spawn_first_page(ticket);
            }
            Ok(RefreshStart::InFlight) => self.refresh_waiters.extend(reply),
            Err(LiveQueryError::NotReady) => {
                if let Some(reply) = reply {
                    self.start_bootstrap(reply);
                }
            }
            Err(e) => {
                if let Some(reply) = reply {
                    let _ = reply.send(Err(e));
                }
            }
        }
    }

    /// Fetches the local snapshot and first page concurrently.
    fn spawn_first_page(&mut self, ticket: FetchTicket) {
        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let query = self.reconciler.query().clone();
        let fetched_tx = self.fetched_tx.clone();
        let handle = tokio::spawn(
            async move {
                let (local, page) = tokio::join!(
                    load_local(store.as_ref(), &query),
                    fetcher.fetch_first_page(&query)
                );
                let _ = fetched_tx.send(Fetched { ticket, local, page }).await;
            }
            .in_current_span(),
        );
        self.fetches.insert(ticket, handle);
    }

    fn cancel_fetch(&mut self, ticket: FetchTicket) {
        if let Some(handle) = self.fetches.remove(&ticket) {
            handle.abort();
        }
        if let Some((waiting, reply)) = self.page_waiter.take() {
            if waiting == ticket {
                let _ = reply.send(Err(LiveQueryError::Fetch(FetchError::Cancelled)));
            } else {
                self.page_waiter = Some((waiting, reply));
            }
        }
        debug!("Cancelled {} fetch", ticket.kind);
    }

    fn on_fetched(&mut self, fetched: Fetched) {
        let Fetched {
            ticket,
            local,
            page,
        } = fetched;
        self.fetches.remove(&ticket);
        if !self.reconciler.accepts(ticket) {
            debug!("Discarding stale {} result", ticket.kind);
            return;
        }

        match ticket.kind {
            FetchKind::Bootstrap => {
                let result = match page {
                    Ok(page) => {
                        self.persist(&page);
                        let update = self.reconciler.complete_bootstrap(ticket, local, page);
                        self.publish(update);
                        Ok(())
                    }
                    Err(e) => {
                        self.reconciler.fail_bootstrap(ticket, &e);
                        self.view.store(self.reconciler.snapshot());
                        Err(LiveQueryError::Fetch(e))
                    }
                };
                for waiter in self.bootstrap_waiters.drain(..) {
                    let _ = waiter.send(result.clone());
                }
            }
            FetchKind::Refresh => {
                let result = match page {
                    Ok(page) => {
                        self.persist(&page);
                        let update = self.reconciler.complete_refresh(ticket, local, page);
                        self.publish(update);
                        Ok(())
                    }
                    Err(e) => {
                        self.reconciler.fail_refresh(ticket, &e);
                        Err(LiveQueryError::Fetch(e))
                    }
                };
                for waiter in self.refresh_waiters.drain(..) {
                    let _ = waiter.send(result.clone());
                }
            }
            FetchKind::NextPage => {
                let result = match page {
                    Ok(page) => {
                        self.persist(&page);
                        let update = self.reconciler.complete_page(ticket, page);
                        let changed = update.is_some();
                        self.publish(update);
                        Ok(PageOutcome::Loaded { changed })
                    }
                    Err(e) => {
                        self.reconciler.fail_page(ticket, &e);
                        Err(LiveQueryError::Fetch(e))
                    }
                };
                if let Some((_, reply)) = self.page_waiter.take_if(|(waiting, _)| *waiting == ticket) {
                    let _ = reply.send(result);
                }
            }
        }
    }

    // ── Output ──────────────────────────────────────────────────────

    fn publish(&self, update: Option<ViewUpdate>) {
        match update {
            Some(update) => self.view.publish(update),
            None => self.view.store(self.reconciler.snapshot()),
        }
    }

    /// Writes fetched channels back to the store without blocking the view.
    fn persist(&self, page: &Page) {
        if !self.reconciler.config().persist_pages || page.channels.is_empty() {
            return;
        }
        let store = Arc::clone(&self.store);
        let channels = page.channels.clone();
        tokio::spawn(
            async move {
                let count = channels.len();
                match store.persist(channels).await {
                    Ok(()) => debug!("Persisted {} fetched channels", count),
                    Err(e) => warn!("Failed to persist fetched channels: {}", e),
                }
            }
            .in_current_span(),
        );
    }

    fn shutdown(&mut self) {
        if !self.reconciler.teardown() {
            return;
        }
        for (_, handle) in self.fetches.drain() {
            handle.abort();
        }
        self.events = None;
        for waiter in self
            .bootstrap_waiters
            .drain(..)
            .chain(self.refresh_waiters.drain(..))
        {
            let _ = waiter.send(Err(LiveQueryError::TornDown));
        }
        if let Some((_, reply)) = self.page_waiter.take() {
            let _ = reply.send(Err(LiveQueryError::TornDown));
        }
        self.view.store(self.reconciler.snapshot());
        self.view.close();
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<DomainEvent>>,
) -> Result<DomainEvent, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Reads the local snapshot. A failing store counts as empty.
async fn load_local(store: &dyn SnapshotStore, query: &ChannelListQuery) -> Vec<Channel> {
    match store.fetch_local(query).await {
        Ok(channels) => channels,
        Err(e) => {
            warn!("Local snapshot unavailable, starting empty: {}", e);
            Vec::new()
        }
    }
}
