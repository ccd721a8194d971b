use crate::data_source::JsonFileSource;
use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use anyhow::bail;
use clap::Args;
use clap::Parser;
use opsdesk_navigator::FetchCoordinator;
use opsdesk_navigator::FetchResolution;
use opsdesk_navigator::HierarchyCache;
use opsdesk_navigator::HierarchyKey;
use opsdesk_navigator::HierarchySource;
use opsdesk_navigator::KeyOutcome;
use opsdesk_navigator::MatchTier;
use opsdesk_navigator::NavKey;
use opsdesk_navigator::NavigatorConfig;
use opsdesk_navigator::QueryChange;
use opsdesk_navigator::SearchApplied;
use opsdesk_navigator::SearchNavController;
use opsdesk_utils_cache::FileStore;
use opsdesk_utils_cache::SystemClock;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Where the hierarchy comes from and how the navigator is tuned.
#[derive(Debug, Args)]
pub struct ScopeArgs {
    /// JSON file mapping scope keys to entity lists.
    #[arg(long = "data", value_name = "FILE")]
    pub data: PathBuf,

    /// Scope path, outermost segment first.
    #[arg(long = "scope", value_name = "SEGMENT", num_args = 1.., required = true)]
    pub scope: Vec<String>,

    /// TOML file with navigator settings.
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl ScopeArgs {
    fn key(&self) -> HierarchyKey {
        HierarchyKey::new(self.scope.iter().cloned())
    }

    fn config(&self, columns: Option<usize>) -> Result<NavigatorConfig> {
        let mut config = match &self.config {
            Some(path) => NavigatorConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => NavigatorConfig::default(),
        };
        if let Some(columns) = columns {
            config.columns = columns;
        }
        config.validate().map_err(|err| anyhow!(err))?;
        Ok(config)
    }
}

#[derive(Debug, Parser)]
pub struct SearchCommand {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Search text; blank shows the whole hierarchy.
    #[arg(long = "query", default_value = "")]
    pub query: String,

    /// Print machine-readable JSON.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct NavigateCommand {
    #[command(flatten)]
    pub scope: ScopeArgs,

    #[arg(long = "query", default_value = "")]
    pub query: String,

    /// Comma-separated key presses: up, down, left, right, enter, escape.
    #[arg(long = "keys", value_delimiter = ',', required = true)]
    pub keys: Vec<NavKey>,

    /// Grid width; overrides the config file.
    #[arg(long = "columns")]
    pub columns: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SearchReport<'a> {
    scope: String,
    query: &'a str,
    tier: MatchTier,
    items: Vec<String>,
}

pub(crate) fn open_cache(cache_dir: &Path, ttl: Duration) -> HierarchyCache {
    HierarchyCache::new(
        Arc::new(FileStore::new(cache_dir.to_path_buf())),
        Arc::new(SystemClock),
        ttl,
    )
}

async fn mount(
    args: &ScopeArgs,
    config: NavigatorConfig,
    cache_dir: &Path,
) -> Result<(SearchNavController, Arc<JsonFileSource>)> {
    let source = Arc::new(JsonFileSource::new(&args.data));
    let mut fetcher = FetchCoordinator::new(
        Arc::clone(&source),
        open_cache(cache_dir, config.cache_ttl()),
    );
    let key = args.key();
    let entities = match fetcher.load(&key).await {
        Some(FetchResolution::Loaded {
            entities,
            from_cache,
            ..
        }) => {
            debug!("loaded {key} (from cache: {from_cache})");
            entities
        }
        Some(FetchResolution::Failed { error, .. }) => {
            return Err(error).with_context(|| format!("failed to load scope {key}"));
        }
        None => bail!("load of scope {key} was superseded"),
    };

    let mut controller = SearchNavController::new(config);
    controller.set_hierarchy(key, entities);
    Ok((controller, source))
}

/// Runs `text` through the controller without the debounce delay.
async fn apply_query(
    controller: &mut SearchNavController,
    source: &JsonFileSource,
    text: &str,
) -> Result<()> {
    let query = match controller.handle_query_change(text) {
        QueryChange::Schedule(query) => query,
        QueryChange::Cleared | QueryChange::Unchanged => return Ok(()),
    };
    match controller.apply_search(&query) {
        SearchApplied::AwaitingRemote(query) => {
            let leaves = source
                .search_leaves(&query)
                .await
                .context("leaf search failed")?;
            controller.apply_remote_fallback(&query, leaves);
        }
        SearchApplied::Applied | SearchApplied::Stale => {}
    }
    Ok(())
}

pub async fn run_search(cmd: SearchCommand, cache_dir: &Path) -> Result<()> {
    let config = cmd.scope.config(None)?;
    let (mut controller, source) = mount(&cmd.scope, config, cache_dir).await?;
    apply_query(&mut controller, &source, &cmd.query).await?;

    let report = SearchReport {
        scope: cmd.scope.key().to_string(),
        query: &cmd.query,
        tier: controller.active_tier(),
        items: controller.active_list().labels(),
    };
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let tier = serde_json::to_value(report.tier)?;
    println!("tier: {}", tier.as_str().unwrap_or_default());
    if report.items.is_empty() {
        println!("no matches");
    }
    for (index, item) in report.items.iter().enumerate() {
        println!("{index:>3}  {item}");
    }
    Ok(())
}

pub async fn run_navigate(cmd: NavigateCommand, cache_dir: &Path) -> Result<()> {
    let config = cmd.scope.config(cmd.columns)?;
    let (mut controller, source) = mount(&cmd.scope, config, cache_dir).await?;
    apply_query(&mut controller, &source, &cmd.query).await?;

    for key in cmd.keys {
        match controller.handle_key(key) {
            KeyOutcome::Committed(event) => {
                println!("{}", serde_json::to_string_pretty(&event)?);
                return Ok(());
            }
            outcome => debug!("{key}: {outcome:?}"),
        }
    }
    println!("no commit");
    Ok(())
}
