use crate::error::NavError;
use crate::error::Result;
use crate::model::Entity;
use crate::model::FlatLeaf;
use crate::model::HierarchyKey;
use async_trait::async_trait;
use opsdesk_utils_cache::TtlCache;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Remote store the hierarchy is loaded from.
#[async_trait]
pub trait HierarchySource: Send + Sync {
    /// Entities for `key` with their leaves already attached.
    async fn fetch_hierarchy(&self, key: &HierarchyKey) -> Result<Vec<Entity>>;

    /// Server-side free-text leaf search, for scopes too large to flatten
    /// locally.
    async fn search_leaves(&self, _query: &str) -> Result<Vec<FlatLeaf>> {
        Err(NavError::Unsupported("free-text leaf search"))
    }
}

pub type HierarchyCache = TtlCache<Vec<Entity>>;

/// Identity of one fetch. Cancelling the token marks every copy of the
/// ticket as superseded.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    key: HierarchyKey,
    generation: u64,
    token: CancellationToken,
}

impl FetchTicket {
    pub fn key(&self) -> &HierarchyKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_superseded(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
pub enum FetchPlan {
    /// Served from cache; no loading state was entered.
    Ready(Vec<Entity>),
    Pending(FetchTicket),
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub ticket: FetchTicket,
    pub result: Result<Vec<Entity>>,
}

#[derive(Debug)]
pub enum FetchResolution {
    Loaded {
        key: HierarchyKey,
        entities: Vec<Entity>,
        from_cache: bool,
    },
    Failed {
        key: HierarchyKey,
        error: NavError,
    },
}

/// Loads hierarchies through the TTL cache and guarantees that only the most
/// recent request for this instance is ever applied.
pub struct FetchCoordinator<S: ?Sized> {
    source: Arc<S>,
    cache: HierarchyCache,
    current: Option<FetchTicket>,
    generation: u64,
    loading: bool,
}

impl<S> FetchCoordinator<S>
where
    S: HierarchySource + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, cache: HierarchyCache) -> Self {
        Self {
            source,
            cache,
            current: None,
            generation: 0,
            loading: false,
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn cache(&self) -> &HierarchyCache {
        &self.cache
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Supersedes any in-flight request, then consults the cache.
    pub fn begin(&mut self, key: &HierarchyKey) -> FetchPlan {
        self.cancel();
        if let Some(entities) = self.cache.get(&key.cache_key()) {
            debug!("hierarchy cache hit for {key}");
            return FetchPlan::Ready(entities);
        }

        self.generation += 1;
        let ticket = FetchTicket {
            key: key.clone(),
            generation: self.generation,
            token: CancellationToken::new(),
        };
        debug!(
            "hierarchy cache miss for {key}; starting fetch #{}",
            ticket.generation
        );
        self.current = Some(ticket.clone());
        self.loading = true;
        FetchPlan::Pending(ticket)
    }

    /// Awaits the source to completion. The underlying call is never
    /// aborted; a superseded ticket only suppresses the cache write.
    pub fn run(&self, ticket: FetchTicket) -> impl Future<Output = FetchOutcome> + Send + 'static {
        let source = Arc::clone(&self.source);
        let cache = self.cache.clone();
        async move {
            let result = source.fetch_hierarchy(&ticket.key).await;
            match &result {
                Ok(entities) if !ticket.is_superseded() => {
                    info!("fetched {} entities for {}", entities.len(), ticket.key);
                    cache.set(&ticket.key.cache_key(), entities);
                }
                Ok(_) => debug!("fetch #{} for {} superseded", ticket.generation, ticket.key),
                Err(_) => {}
            }
            FetchOutcome { ticket, result }
        }
    }

    /// Runs the fetch on a tokio task and delivers the outcome unless it was
    /// superseded meanwhile.
    pub fn spawn(&self, ticket: FetchTicket, tx: UnboundedSender<FetchOutcome>) {
        let fetch = self.run(ticket);
        tokio::spawn(async move {
            let outcome = fetch.await;
            if outcome.ticket.is_superseded() {
                return;
            }
            let _ = tx.send(outcome);
        });
    }

    /// Applies an outcome if it still belongs to the current request.
    pub fn finish(&mut self, outcome: FetchOutcome) -> Option<FetchResolution> {
        let FetchOutcome { ticket, result } = outcome;
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|current| current.generation == ticket.generation);
        if ticket.is_superseded() || !is_current {
            debug!(
                "dropping superseded fetch #{} for {}",
                ticket.generation, ticket.key
            );
            return None;
        }

        self.current = None;
        self.loading = false;
        match result {
            Ok(entities) => Some(FetchResolution::Loaded {
                key: ticket.key,
                entities,
                from_cache: false,
            }),
            Err(error) => {
                warn!("hierarchy fetch for {} failed: {error}", ticket.key);
                Some(FetchResolution::Failed {
                    key: ticket.key,
                    error,
                })
            }
        }
    }

    /// `begin`, `run` and `finish` in one step.
    pub async fn load(&mut self, key: &HierarchyKey) -> Option<FetchResolution> {
        match self.begin(key) {
            FetchPlan::Ready(entities) => Some(FetchResolution::Loaded {
                key: key.clone(),
                entities,
                from_cache: true,
            }),
            FetchPlan::Pending(ticket) => {
                let outcome = self.run(ticket).await;
                self.finish(outcome)
            }
        }
    }

    /// Drops the cached hierarchy so the next `begin` goes to the source.
    pub fn invalidate(&self, key: &HierarchyKey) {
        self.cache.invalidate(&key.cache_key());
    }

    pub fn cancel(&mut self) {
        if let Some(ticket) = self.current.take() {
            ticket.token.cancel();
        }
        self.loading = false;
    }
}

impl<S: ?Sized> Drop for FetchCoordinator<S> {
    fn drop(&mut self) {
        if let Some(ticket) = self.current.take() {
            ticket.token.cancel();
        }
    }
}
