use async_trait::async_trait;
use opsdesk_navigator::Entity;
use opsdesk_navigator::FlatLeaf;
use opsdesk_navigator::HierarchyKey;
use opsdesk_navigator::HierarchySource;
use opsdesk_navigator::NavError;
use opsdesk_navigator::Result;
use opsdesk_navigator::flatten_leaves;
use opsdesk_navigator::leaf_matches;
use opsdesk_navigator::normalize_query;
use opsdesk_navigator::query_words;
use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;

/// Hierarchies stored in one JSON document keyed by scope, e.g.
/// `{"sites:Germany": [{"id": "ber", "name": "Berlin", "leaves": [...]}]}`.
///
/// The file is re-read on every fetch so edits show up once the cache entry
/// expires.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, Vec<Entity>>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl HierarchySource for JsonFileSource {
    async fn fetch_hierarchy(&self, key: &HierarchyKey) -> Result<Vec<Entity>> {
        let mut scopes = self.read_all().await?;
        debug!("read {} scopes from {}", scopes.len(), self.path.display());
        scopes.remove(&key.cache_key()).ok_or_else(|| NavError::Fetch {
            key: key.cache_key(),
            message: format!("no such scope in {}", self.path.display()),
        })
    }

    /// Scans every scope in the file, not just the mounted one.
    async fn search_leaves(&self, query: &str) -> Result<Vec<FlatLeaf>> {
        let normalized = normalize_query(query);
        let words = query_words(&normalized);
        if words.is_empty() {
            return Ok(Vec::new());
        }
        let scopes = self.read_all().await?;
        let mut hits = Vec::new();
        for (scope, entities) in &scopes {
            let key = HierarchyKey::parse(scope);
            hits.extend(
                flatten_leaves(&key, entities)
                    .into_iter()
                    .filter(|flat| leaf_matches(flat.haystack(), &words)),
            );
        }
        Ok(hits)
    }
}
