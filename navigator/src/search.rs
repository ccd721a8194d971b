use crate::config::FallbackMode;
use crate::model::Entity;
use crate::model::FlatLeaf;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

/// Which result set is currently displayed and navigable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// No query: the full hierarchy is active.
    #[default]
    Inactive,
    /// Entities matched by name.
    Primary,
    /// Denormalized leaves matched word by word.
    Fallback,
}

/// Output of one tiered search. `fallback` is only ever populated when
/// `primary` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchTierResult {
    pub primary: Vec<Entity>,
    pub fallback: Vec<FlatLeaf>,
}

impl MatchTierResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.fallback.is_empty()
    }

    /// The tier the caller should display for `query`. A blank query is
    /// always inactive; an active query with no matches at all still reports
    /// the fallback tier (an empty result list, not the full hierarchy).
    pub fn tier(&self, query: &str) -> MatchTier {
        if query.trim().is_empty() {
            MatchTier::Inactive
        } else if !self.primary.is_empty() {
            MatchTier::Primary
        } else {
            MatchTier::Fallback
        }
    }
}

pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Splits on runs of whitespace; never yields empty words.
pub fn query_words(normalized: &str) -> Vec<&str> {
    normalized.split_whitespace().collect()
}

/// Tiered search with the local fallback tier.
pub fn search(query: &str, hierarchy: &[Entity], flat: &[FlatLeaf]) -> MatchTierResult {
    search_with(query, hierarchy, flat, FallbackMode::Local)
}

/// Tiered search. Primary matches win outright; the fallback tier is only
/// consulted, and only computed locally for [`FallbackMode::Local`], when no
/// entity matches by name.
pub fn search_with(
    query: &str,
    hierarchy: &[Entity],
    flat: &[FlatLeaf],
    fallback: FallbackMode,
) -> MatchTierResult {
    let normalized = normalize_query(query);
    if normalized.is_empty() {
        return MatchTierResult::empty();
    }

    let primary = match_entities(&normalized, hierarchy);
    if !primary.is_empty() {
        debug!(
            "query {normalized:?}: {} primary matches of {}",
            primary.len(),
            hierarchy.len()
        );
        return MatchTierResult {
            primary,
            fallback: Vec::new(),
        };
    }

    let fallback = match fallback {
        FallbackMode::Local => match_leaves(&normalized, flat),
        FallbackMode::Remote | FallbackMode::Disabled => Vec::new(),
    };
    debug!(
        "query {normalized:?}: no primary matches, {} fallback matches of {}",
        fallback.len(),
        flat.len()
    );
    MatchTierResult {
        primary: Vec::new(),
        fallback,
    }
}

fn match_entities(normalized: &str, hierarchy: &[Entity]) -> Vec<Entity> {
    hierarchy
        .iter()
        .filter(|entity| entity.display_name().to_lowercase().contains(normalized))
        .cloned()
        .collect()
}

fn match_leaves(normalized: &str, flat: &[FlatLeaf]) -> Vec<FlatLeaf> {
    let words = query_words(normalized);
    if words.is_empty() {
        return Vec::new();
    }
    flat.iter()
        .filter(|leaf| leaf_matches(leaf.haystack(), &words))
        .cloned()
        .collect()
}

/// Conjunctive match: every word must occur somewhere in the haystack.
pub fn leaf_matches(haystack: &str, words: &[&str]) -> bool {
    words.iter().all(|word| haystack.contains(word))
}
