//! Async driver that wires the controller to its timers and fetches.
//!
//! A [`NavigatorSession`] owns one [`SearchNavController`] and runs a single
//! event loop over user input, debounce releases, fetch outcomes and remote
//! leaf searches. Presentation talks to it through a [`SessionHandle`] and
//! observes it through [`SessionSnapshot`]s.

use crate::commit::CommitSink;
use crate::config::NavigatorConfig;
use crate::controller::KeyOutcome;
use crate::controller::QueryChange;
use crate::controller::SearchApplied;
use crate::controller::SearchNavController;
use crate::cursor::NavKey;
use crate::error::Result;
use crate::fetch::FetchCoordinator;
use crate::fetch::FetchOutcome;
use crate::fetch::FetchPlan;
use crate::fetch::FetchResolution;
use crate::fetch::HierarchyCache;
use crate::fetch::HierarchySource;
use crate::model::Entity;
use crate::model::FlatLeaf;
use crate::model::HierarchyKey;
use crate::search::MatchTier;
use opsdesk_async_utils::DebounceGate;
use opsdesk_async_utils::Debounced;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    /// Show the hierarchy under `key`, from cache when fresh.
    Mount(HierarchyKey),
    /// Refetch the mounted hierarchy, bypassing the cache.
    Reload,
    Query(String),
    Key(NavKey),
    Shutdown,
}

/// Everything presentation needs to render one frame.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionSnapshot {
    pub key: Option<HierarchyKey>,
    pub query: String,
    pub tier: MatchTier,
    pub items: Vec<String>,
    pub selected: Option<usize>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct SessionHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Returns `false` once the session has stopped.
    pub fn send(&self, input: SessionInput) -> bool {
        self.inputs.send(input).is_ok()
    }

    pub fn mount(&self, key: HierarchyKey) -> bool {
        self.send(SessionInput::Mount(key))
    }

    pub fn reload(&self) -> bool {
        self.send(SessionInput::Reload)
    }

    pub fn query(&self, text: impl Into<String>) -> bool {
        self.send(SessionInput::Query(text.into()))
    }

    pub fn key(&self, key: NavKey) -> bool {
        self.send(SessionInput::Key(key))
    }

    pub fn shutdown(&self) -> bool {
        self.send(SessionInput::Shutdown)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }
}

#[derive(Debug)]
struct RemoteLeaves {
    query: String,
    token: CancellationToken,
    result: Result<Vec<FlatLeaf>>,
}

pub struct NavigatorSession<S: ?Sized> {
    controller: SearchNavController,
    fetcher: FetchCoordinator<S>,
    mounted: Option<HierarchyKey>,
    error: Option<String>,
    debounce: DebounceGate<String>,
    debounced: mpsc::UnboundedReceiver<Debounced<String>>,
    fetch_tx: mpsc::UnboundedSender<FetchOutcome>,
    fetch_rx: mpsc::UnboundedReceiver<FetchOutcome>,
    remote: Option<CancellationToken>,
    remote_tx: mpsc::UnboundedSender<RemoteLeaves>,
    remote_rx: mpsc::UnboundedReceiver<RemoteLeaves>,
    inputs: mpsc::UnboundedReceiver<SessionInput>,
    snapshots: watch::Sender<SessionSnapshot>,
    sink: Box<dyn CommitSink>,
}

impl<S> NavigatorSession<S>
where
    S: HierarchySource + ?Sized + 'static,
{
    pub fn new(
        source: Arc<S>,
        cache: HierarchyCache,
        config: NavigatorConfig,
        sink: impl CommitSink + 'static,
    ) -> (Self, SessionHandle) {
        let (debounce, debounced) = DebounceGate::new(config.debounce());
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        let (remote_tx, remote_rx) = mpsc::unbounded_channel();
        let (input_tx, inputs) = mpsc::unbounded_channel();
        let (snapshots, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let session = Self {
            controller: SearchNavController::new(config),
            fetcher: FetchCoordinator::new(source, cache),
            mounted: None,
            error: None,
            debounce,
            debounced,
            fetch_tx,
            fetch_rx,
            remote: None,
            remote_tx,
            remote_rx,
            inputs,
            snapshots,
            sink: Box::new(sink),
        };
        let handle = SessionHandle {
            inputs: input_tx,
            snapshots: snapshot_rx,
        };
        (session, handle)
    }

    pub fn controller(&self) -> &SearchNavController {
        &self.controller
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let active = self.controller.active_list();
        SessionSnapshot {
            key: self.mounted.clone(),
            query: self.controller.query().to_string(),
            tier: self.controller.active_tier(),
            items: active.labels(),
            selected: self.controller.selected_index(),
            loading: self.fetcher.is_loading(),
            error: self.error.clone(),
        }
    }

    /// Runs until [`SessionInput::Shutdown`] or until every handle is dropped.
    pub async fn run(mut self) {
        self.publish();
        loop {
            let keep_running = tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => false,
                },
                Some(fired) = self.debounced.recv() => {
                    self.on_debounced(fired);
                    true
                }
                Some(outcome) = self.fetch_rx.recv() => {
                    self.on_fetch(outcome);
                    true
                }
                Some(remote) = self.remote_rx.recv() => {
                    self.on_remote_leaves(remote);
                    true
                }
            };
            if !keep_running {
                break;
            }
            self.publish();
        }
        self.stop();
        self.publish();
        debug!("navigator session stopped");
    }

    fn handle_input(&mut self, input: SessionInput) -> bool {
        match input {
            SessionInput::Mount(key) => self.mount(key),
            SessionInput::Reload => {
                if let Some(key) = self.mounted.clone() {
                    self.fetcher.invalidate(&key);
                    self.mount(key);
                }
            }
            SessionInput::Query(text) => match self.controller.handle_query_change(&text) {
                QueryChange::Unchanged => {}
                QueryChange::Cleared => self.cancel_search(),
                QueryChange::Schedule(query) => {
                    self.cancel_remote();
                    self.debounce.schedule(query);
                }
            },
            SessionInput::Key(key) => match self.controller.handle_key(key) {
                KeyOutcome::Committed(event) => self.sink.deliver(&event),
                KeyOutcome::Cleared => self.cancel_search(),
                KeyOutcome::Moved(_) | KeyOutcome::Ignored => {}
            },
            SessionInput::Shutdown => return false,
        }
        true
    }

    fn mount(&mut self, key: HierarchyKey) {
        if self.controller.key() != Some(&key) {
            self.controller.clear_hierarchy();
        }
        self.error = None;
        self.mounted = Some(key.clone());
        match self.fetcher.begin(&key) {
            FetchPlan::Ready(entities) => self.install_hierarchy(key, entities),
            FetchPlan::Pending(ticket) => self.fetcher.spawn(ticket, self.fetch_tx.clone()),
        }
    }

    fn install_hierarchy(&mut self, key: HierarchyKey, entities: Vec<Entity>) {
        if let SearchApplied::AwaitingRemote(query) = self.controller.set_hierarchy(key, entities) {
            self.spawn_remote_search(query);
        }
    }

    fn on_debounced(&mut self, fired: Debounced<String>) {
        let Some(query) = self.debounce.accept(fired) else {
            return;
        };
        if let SearchApplied::AwaitingRemote(query) = self.controller.apply_search(&query) {
            self.spawn_remote_search(query);
        }
    }

    fn on_fetch(&mut self, outcome: FetchOutcome) {
        match self.fetcher.finish(outcome) {
            Some(FetchResolution::Loaded { key, entities, .. }) => {
                self.error = None;
                self.install_hierarchy(key, entities);
            }
            Some(FetchResolution::Failed { error, .. }) => {
                self.error = Some(error.to_string());
            }
            None => {}
        }
    }

    fn spawn_remote_search(&mut self, query: String) {
        self.cancel_remote();
        let token = CancellationToken::new();
        self.remote = Some(token.clone());

        let source = Arc::clone(self.fetcher.source());
        let tx = self.remote_tx.clone();
        tokio::spawn(async move {
            let result = source.search_leaves(&query).await;
            if token.is_cancelled() {
                debug!("dropping superseded leaf search for {query:?}");
                return;
            }
            let _ = tx.send(RemoteLeaves {
                query,
                token,
                result,
            });
        });
    }

    fn on_remote_leaves(&mut self, remote: RemoteLeaves) {
        if remote.token.is_cancelled() {
            return;
        }
        self.remote = None;
        match remote.result {
            Ok(leaves) => {
                self.controller.apply_remote_fallback(&remote.query, leaves);
            }
            Err(error) => warn!("leaf search for {:?} failed: {error}", remote.query),
        }
    }

    fn cancel_search(&mut self) {
        self.debounce.cancel();
        self.cancel_remote();
    }

    fn cancel_remote(&mut self) {
        if let Some(token) = self.remote.take() {
            token.cancel();
        }
    }

    fn stop(&mut self) {
        self.cancel_search();
        self.fetcher.cancel();
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}
