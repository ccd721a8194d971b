use crate::commit::CommitEvent;
use crate::commit::CommitLists;
use crate::commit::dispatch;
use crate::config::FallbackMode;
use crate::config::NavigatorConfig;
use crate::cursor::Cursor;
use crate::cursor::CursorStep;
use crate::cursor::NavKey;
use crate::model::Entity;
use crate::model::FlatLeaf;
use crate::model::HierarchyKey;
use crate::model::flatten_leaves;
use crate::search::MatchTier;
use crate::search::MatchTierResult;
use crate::search::normalize_query;
use crate::search::search_with;
use tokio::sync::watch;
use tracing::debug;

/// What the caller must do after a query edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryChange {
    Unchanged,
    /// The query is blank; search is inactive and nothing needs scheduling.
    Cleared,
    /// Debounce and then call [`SearchNavController::apply_search`] with it.
    Schedule(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchApplied {
    /// The query changed since this search was scheduled.
    Stale,
    Applied,
    /// No entity matched and the fallback tier is remote: fetch leaves for
    /// this query and hand them to [`SearchNavController::apply_remote_fallback`].
    AwaitingRemote(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Moved(usize),
    Committed(CommitEvent),
    /// Escape cleared the query.
    Cleared,
    Ignored,
}

/// The list currently displayed and navigable.
#[derive(Debug, Clone, Copy)]
pub enum ActiveList<'a> {
    Entities(&'a [Entity]),
    Leaves(&'a [FlatLeaf]),
}

impl ActiveList<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::Entities(entities) => entities.len(),
            Self::Leaves(leaves) => leaves.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One display line per item, in list order.
    pub fn labels(&self) -> Vec<String> {
        match self {
            Self::Entities(entities) => entities
                .iter()
                .map(|entity| entity.display_name().to_string())
                .collect(),
            Self::Leaves(leaves) => leaves
                .iter()
                .map(|flat| format!("{} ({})", flat.leaf.name, flat.context.entity_name))
                .collect(),
        }
    }
}

/// Owns query text, cursor and the current match sets for one screen.
///
/// Every derived value (active tier, active list, its length) is computed from
/// that state on demand, and every change to the active list resets the
/// cursor to unselected.
pub struct SearchNavController {
    config: NavigatorConfig,
    key: Option<HierarchyKey>,
    hierarchy: Vec<Entity>,
    flat: Vec<FlatLeaf>,
    query: String,
    /// Query the current `matches` were computed for.
    applied: Option<String>,
    matches: MatchTierResult,
    cursor: Cursor,
    selection: watch::Sender<Option<usize>>,
}

impl SearchNavController {
    pub fn new(config: NavigatorConfig) -> Self {
        let (selection, _) = watch::channel(None);
        Self {
            config,
            key: None,
            hierarchy: Vec::new(),
            flat: Vec::new(),
            query: String::new(),
            applied: None,
            matches: MatchTierResult::empty(),
            cursor: Cursor::new(),
            selection,
        }
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    pub fn key(&self) -> Option<&HierarchyKey> {
        self.key.as_ref()
    }

    pub fn hierarchy(&self) -> &[Entity] {
        &self.hierarchy
    }

    pub fn flat_leaves(&self) -> &[FlatLeaf] {
        &self.flat
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self) -> &MatchTierResult {
        &self.matches
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.cursor.selected()
    }

    /// Fires on every selection change; presentation scrolls the selected
    /// item into view when it becomes `Some`.
    pub fn subscribe_selection(&self) -> watch::Receiver<Option<usize>> {
        self.selection.subscribe()
    }

    pub fn set_columns(&mut self, columns: usize) {
        self.config.columns = columns.max(1);
    }

    pub fn active_tier(&self) -> MatchTier {
        match &self.applied {
            Some(query) => self.matches.tier(query),
            None => MatchTier::Inactive,
        }
    }

    pub fn active_list(&self) -> ActiveList<'_> {
        match self.active_tier() {
            MatchTier::Inactive => ActiveList::Entities(&self.hierarchy),
            MatchTier::Primary => ActiveList::Entities(&self.matches.primary),
            MatchTier::Fallback => ActiveList::Leaves(&self.matches.fallback),
        }
    }

    pub fn active_len(&self) -> usize {
        self.active_list().len()
    }

    pub fn handle_query_change(&mut self, text: &str) -> QueryChange {
        if text == self.query {
            return QueryChange::Unchanged;
        }
        self.query = text.to_string();
        self.reset_cursor();

        if normalize_query(text).is_empty() {
            self.applied = None;
            self.matches = MatchTierResult::empty();
            return QueryChange::Cleared;
        }
        QueryChange::Schedule(self.query.clone())
    }

    /// Runs the tiered search for `query` if it is still the current query.
    pub fn apply_search(&mut self, query: &str) -> SearchApplied {
        if query != self.query {
            debug!("skipping stale search for {query:?}");
            return SearchApplied::Stale;
        }
        self.run_search(query)
    }

    /// Installs server-side fallback results. Ignored when the query moved on
    /// or the primary tier has matches.
    pub fn apply_remote_fallback(&mut self, query: &str, leaves: Vec<FlatLeaf>) -> bool {
        if query != self.query || self.applied.as_deref() != Some(query) {
            debug!("skipping stale remote fallback for {query:?}");
            return false;
        }
        if !self.matches.primary.is_empty() {
            return false;
        }
        self.matches.fallback = leaves.into_iter().map(FlatLeaf::reindex).collect();
        self.reset_cursor();
        true
    }

    /// Replaces the hierarchy, rebuilds the flattened leaves and re-runs an
    /// active search against them. A re-run that wiped remote fallback
    /// results reports `AwaitingRemote` so the caller can fetch them again.
    pub fn set_hierarchy(&mut self, key: HierarchyKey, entities: Vec<Entity>) -> SearchApplied {
        self.flat = flatten_leaves(&key, &entities);
        self.hierarchy = entities;
        self.key = Some(key);
        debug!(
            "hierarchy now {} entities / {} leaves",
            self.hierarchy.len(),
            self.flat.len()
        );
        match self.applied.clone() {
            Some(query) => self.run_search(&query),
            None => {
                self.reset_cursor();
                SearchApplied::Applied
            }
        }
    }

    pub fn clear_hierarchy(&mut self) {
        self.hierarchy.clear();
        self.flat.clear();
        self.key = None;
        self.matches = MatchTierResult::empty();
        self.reset_cursor();
    }

    pub fn handle_key(&mut self, key: NavKey) -> KeyOutcome {
        let len = self.active_len();
        if self.cursor.clamp_to(len) {
            self.publish_selection();
        }
        match self.cursor.step(key, len, self.config.columns) {
            CursorStep::Moved(index) => {
                self.publish_selection();
                KeyOutcome::Moved(index)
            }
            CursorStep::Commit(index) => match self.commit(index) {
                Some(event) => KeyOutcome::Committed(event),
                None => KeyOutcome::Ignored,
            },
            CursorStep::Clear => {
                self.query.clear();
                self.applied = None;
                self.matches = MatchTierResult::empty();
                self.publish_selection();
                KeyOutcome::Cleared
            }
            CursorStep::Ignored => KeyOutcome::Ignored,
        }
    }

    /// Click-style commit of an arbitrary index in the active list.
    pub fn commit(&self, index: usize) -> Option<CommitEvent> {
        dispatch(
            self.active_tier(),
            index,
            CommitLists {
                hierarchy: &self.hierarchy,
                primary: &self.matches.primary,
                fallback: &self.matches.fallback,
            },
        )
    }

    fn run_search(&mut self, query: &str) -> SearchApplied {
        let result = search_with(query, &self.hierarchy, &self.flat, self.config.fallback);
        let awaiting_remote = self.config.fallback == FallbackMode::Remote
            && result.primary.is_empty()
            && !normalize_query(query).is_empty();
        self.set_matches(query, result);

        if awaiting_remote {
            SearchApplied::AwaitingRemote(query.to_string())
        } else {
            SearchApplied::Applied
        }
    }

    fn set_matches(&mut self, query: &str, result: MatchTierResult) {
        self.applied = Some(query.to_string());
        self.matches = result;
        self.reset_cursor();
    }

    fn reset_cursor(&mut self) {
        if self.cursor.reset() {
            self.publish_selection();
        }
    }

    fn publish_selection(&self) {
        let selected = self.cursor.selected();
        self.selection.send_if_modified(|current| {
            if *current == selected {
                false
            } else {
                *current = selected;
                true
            }
        });
    }
}
