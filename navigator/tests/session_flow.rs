use async_trait::async_trait;
use opsdesk_navigator::AncestorContext;
use opsdesk_navigator::CommitEvent;
use opsdesk_navigator::Entity;
use opsdesk_navigator::FallbackMode;
use opsdesk_navigator::FlatLeaf;
use opsdesk_navigator::HierarchyCache;
use opsdesk_navigator::HierarchyKey;
use opsdesk_navigator::HierarchySource;
use opsdesk_navigator::Leaf;
use opsdesk_navigator::MatchTier;
use opsdesk_navigator::NavError;
use opsdesk_navigator::NavKey;
use opsdesk_navigator::NavigatorConfig;
use opsdesk_navigator::NavigatorSession;
use opsdesk_navigator::Result;
use opsdesk_navigator::SessionHandle;
use opsdesk_navigator::SessionSnapshot;
use opsdesk_navigator::flatten_leaves;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn leaf(id: &str, name: &str, contact: &str) -> Leaf {
    Leaf {
        id: id.to_string(),
        name: name.to_string(),
        contact: contact.to_string(),
        secondary_contact: None,
        notes: None,
    }
}

fn entity(id: &str, name: &str, leaves: Vec<Leaf>) -> Entity {
    Entity {
        id: id.to_string(),
        name: name.to_string(),
        label: String::new(),
        leaves,
    }
}

fn germany() -> Vec<Entity> {
    vec![
        entity(
            "ber",
            "Berlin",
            vec![leaf("r1", "Zen Room", "AD-1"), leaf("r2", "Lab", "AD-2")],
        ),
        entity("ham", "Hamburg", vec![leaf("r3", "Vault", "AD-3")]),
    ]
}

fn germany_key() -> HierarchyKey {
    HierarchyKey::new(["sites", "Germany"])
}

/// In-memory source with per-scope latency and call accounting.
#[derive(Default)]
struct ScriptedSource {
    data: HashMap<String, Vec<Entity>>,
    delays: HashMap<String, Duration>,
    fetches: AtomicUsize,
    leaf_queries: Mutex<Vec<String>>,
}

impl ScriptedSource {
    fn with(mut self, key: &HierarchyKey, entities: Vec<Entity>, delay_ms: u64) -> Self {
        self.data.insert(key.cache_key(), entities);
        self.delays
            .insert(key.cache_key(), Duration::from_millis(delay_ms));
        self
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn leaf_queries(&self) -> Vec<String> {
        self.leaf_queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl HierarchySource for ScriptedSource {
    async fn fetch_hierarchy(&self, key: &HierarchyKey) -> Result<Vec<Entity>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.get(&key.cache_key()).copied().unwrap_or_default();
        tokio::time::sleep(delay).await;
        self.data
            .get(&key.cache_key())
            .cloned()
            .ok_or_else(|| NavError::Fetch {
                key: key.cache_key(),
                message: "scope not found".into(),
            })
    }

    async fn search_leaves(&self, query: &str) -> Result<Vec<FlatLeaf>> {
        self.leaf_queries.lock().unwrap().push(query.to_string());
        let mut hits = Vec::new();
        for (scope, entities) in &self.data {
            let key = HierarchyKey::parse(scope);
            hits.extend(
                flatten_leaves(&key, entities)
                    .into_iter()
                    .filter(|flat| flat.haystack().contains(&query.to_lowercase())),
            );
        }
        Ok(hits)
    }
}

struct Running {
    handle: SessionHandle,
    commits: mpsc::UnboundedReceiver<CommitEvent>,
    task: JoinHandle<()>,
    cache: HierarchyCache,
}

fn start(source: Arc<ScriptedSource>, config: NavigatorConfig) -> Running {
    let cache = HierarchyCache::in_memory();
    let (commit_tx, commits) = mpsc::unbounded_channel();
    let (session, handle) = NavigatorSession::new(source, cache.clone(), config, commit_tx);
    let task = tokio::spawn(session.run());
    Running {
        handle,
        commits,
        task,
        cache,
    }
}

async fn wait_for(handle: &SessionHandle, pred: impl Fn(&SessionSnapshot) -> bool) -> SessionSnapshot {
    let mut rx = handle.subscribe();
    let snapshot = rx.wait_for(pred).await.unwrap();
    snapshot.clone()
}

#[tokio::test(start_paused = true)]
async fn room_query_then_down_enter_acts_on_zen_room() {
    let source = Arc::new(ScriptedSource::default().with(&germany_key(), germany(), 20));
    let mut running = start(source, NavigatorConfig::linear());

    running.handle.mount(germany_key());
    let loaded = wait_for(&running.handle, |s| !s.loading && s.items.len() == 2).await;
    assert_eq!(loaded.items, vec!["Berlin", "Hamburg"]);
    assert_eq!(loaded.tier, MatchTier::Inactive);

    for text in ["r", "ro", "roo", "room"] {
        running.handle.query(text);
    }
    let searched = wait_for(&running.handle, |s| s.tier == MatchTier::Fallback).await;
    assert_eq!(searched.items, vec!["Zen Room (Berlin)"]);
    assert_eq!(searched.selected, None);

    running.handle.key(NavKey::Down);
    running.handle.key(NavKey::Enter);
    let event = running.commits.recv().await.unwrap();
    assert_eq!(
        event,
        CommitEvent::ActOnLeaf {
            leaf: leaf("r1", "Zen Room", "AD-1"),
            context: AncestorContext {
                entity_id: "ber".into(),
                entity_name: "Berlin".into(),
                entity_label: String::new(),
                scope: Some("Germany".into()),
            },
        }
    );

    running.handle.shutdown();
    running.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn rapid_typing_searches_once_for_the_last_query() {
    let source = Arc::new(ScriptedSource::default().with(&germany_key(), germany(), 0));
    let running = start(Arc::clone(&source), remote_config());

    running.handle.mount(germany_key());
    wait_for(&running.handle, |s| s.items.len() == 2).await;

    for text in ["z", "ze", "zen"] {
        running.handle.query(text);
    }
    let searched = wait_for(&running.handle, |s| !s.items.is_empty() && s.query == "zen").await;
    assert_eq!(searched.items, vec!["Zen Room (Berlin)"]);
    assert_eq!(source.leaf_queries(), vec!["zen"]);

    running.handle.shutdown();
    running.task.await.unwrap();
}

fn remote_config() -> NavigatorConfig {
    NavigatorConfig {
        fallback: FallbackMode::Remote,
        ..NavigatorConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn reload_keeps_remote_fallback_results() {
    let source = Arc::new(ScriptedSource::default().with(&germany_key(), germany(), 10));
    let running = start(Arc::clone(&source), remote_config());

    running.handle.mount(germany_key());
    wait_for(&running.handle, |s| s.items.len() == 2).await;
    running.handle.query("zen");
    wait_for(&running.handle, |s| s.tier == MatchTier::Fallback && !s.items.is_empty()).await;

    running.handle.reload();
    let reloaded = wait_for(&running.handle, |s| {
        !s.loading && !s.items.is_empty() && source.leaf_queries().len() == 2
    })
    .await;
    assert_eq!(reloaded.items, vec!["Zen Room (Berlin)"]);
    assert_eq!(reloaded.tier, MatchTier::Fallback);
    assert_eq!(source.fetches(), 2);
    assert_eq!(source.leaf_queries(), vec!["zen", "zen"]);

    running.handle.shutdown();
    running.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn query_typed_before_load_searches_remotely_once_loaded() {
    let source = Arc::new(ScriptedSource::default().with(&germany_key(), germany(), 500));
    let running = start(Arc::clone(&source), remote_config());

    running.handle.mount(germany_key());
    running.handle.query("zen");
    let searched = wait_for(&running.handle, |s| {
        !s.loading && !s.items.is_empty() && source.leaf_queries().len() == 2
    })
    .await;
    assert_eq!(searched.query, "zen");
    assert_eq!(searched.tier, MatchTier::Fallback);
    assert_eq!(searched.items, vec!["Zen Room (Berlin)"]);

    running.handle.shutdown();
    running.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn slow_earlier_mount_never_overwrites_later_one() {
    let eu = HierarchyKey::new(["sites", "eu"]);
    let us = HierarchyKey::new(["sites", "us"]);
    let source = Arc::new(
        ScriptedSource::default()
            .with(&eu, vec![entity("par", "Paris", Vec::new())], 50)
            .with(&us, vec![entity("nyc", "New York", Vec::new())], 10),
    );
    let running = start(Arc::clone(&source), NavigatorConfig::linear());

    running.handle.mount(eu.clone());
    running.handle.mount(us.clone());
    let loaded = wait_for(&running.handle, |s| !s.loading && !s.items.is_empty()).await;
    assert_eq!(loaded.items, vec!["New York"]);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = running.handle.snapshot();
    assert_eq!(settled.key, Some(us.clone()));
    assert_eq!(settled.items, vec!["New York"]);
    assert_eq!(source.fetches(), 2);
    assert!(running.cache.get(&eu.cache_key()).is_none());
    assert!(running.cache.get(&us.cache_key()).is_some());

    running.handle.shutdown();
    running.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn remount_within_ttl_is_served_from_cache() {
    let source = Arc::new(ScriptedSource::default().with(&germany_key(), germany(), 5));
    let running = start(Arc::clone(&source), NavigatorConfig::linear());

    running.handle.mount(germany_key());
    wait_for(&running.handle, |s| s.items.len() == 2).await;
    running.handle.mount(germany_key());
    running.handle.query("ham");
    wait_for(&running.handle, |s| s.tier == MatchTier::Primary).await;
    assert_eq!(source.fetches(), 1);

    running.handle.reload();
    wait_for(&running.handle, |_| source.fetches() == 2).await;

    running.handle.shutdown();
    running.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_surfaces_error_and_stops_loading() {
    let source = Arc::new(ScriptedSource::default());
    let running = start(source, NavigatorConfig::linear());

    running.handle.mount(HierarchyKey::new(["sites", "nowhere"]));
    let failed = wait_for(&running.handle, |s| s.error.is_some()).await;
    assert!(!failed.loading);
    assert!(failed.items.is_empty());
    assert!(failed.error.unwrap().contains("scope not found"));

    running.handle.shutdown();
    running.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn escape_clears_query_and_cancels_pending_search() {
    let source = Arc::new(ScriptedSource::default().with(&germany_key(), germany(), 0));
    let running = start(source, NavigatorConfig::linear());

    running.handle.mount(germany_key());
    wait_for(&running.handle, |s| s.items.len() == 2).await;

    running.handle.query("ham");
    running.handle.key(NavKey::Escape);
    let cleared = wait_for(&running.handle, |s| s.query.is_empty()).await;
    assert_eq!(cleared.tier, MatchTier::Inactive);

    tokio::time::sleep(Duration::from_millis(500)).await;
    let settled = running.handle.snapshot();
    assert_eq!(settled.tier, MatchTier::Inactive);
    assert_eq!(settled.items, vec!["Berlin", "Hamburg"]);

    running.handle.shutdown();
    running.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_stops_the_session() {
    let source = Arc::new(ScriptedSource::default());
    let Running { handle, task, .. } = start(source, NavigatorConfig::linear());
    drop(handle);
    task.await.unwrap();
}
