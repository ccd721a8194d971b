/*!
# Navigator

Keyboard-driven search and navigation over a two-level hierarchy of entities
and their leaves.

## Pipeline

```text
Mount(key)
  └─> FetchCoordinator (TTL cache, latest request wins)
        └─> hierarchy + flattened leaves
Query text
  └─> DebounceGate
        └─> tiered search
              ├─> primary: entity names
              └─> fallback: every word in a leaf's haystack
Arrow / Enter / Escape
  └─> Cursor (wrapping grid)
        └─> CommitEvent
```

## Example

```rust,no_run
use opsdesk_navigator::{HierarchyKey, NavKey, NavigatorConfig, SearchNavController, QueryChange};

let mut controller = SearchNavController::new(NavigatorConfig::grid(2));
controller.set_hierarchy(HierarchyKey::new(["sites"]), Vec::new());
if let QueryChange::Schedule(query) = controller.handle_query_change("room") {
    controller.apply_search(&query);
}
controller.handle_key(NavKey::Down);
let _event = controller.handle_key(NavKey::Enter);
```
*/

mod commit;
mod config;
mod controller;
mod cursor;
mod error;
mod fetch;
mod model;
mod search;
mod session;

pub use commit::{CommitEvent, CommitLists, CommitSink, dispatch};
pub use config::{FallbackMode, MAX_COLUMNS, NavigatorConfig};
pub use controller::{ActiveList, KeyOutcome, QueryChange, SearchApplied, SearchNavController};
pub use cursor::{Cursor, CursorStep, NavKey, move_down, move_left, move_right, move_up};
pub use error::{NavError, Result};
pub use fetch::{
    FetchCoordinator, FetchOutcome, FetchPlan, FetchResolution, FetchTicket, HierarchyCache,
    HierarchySource,
};
pub use model::{AncestorContext, Entity, FlatLeaf, HierarchyKey, Leaf, flatten_leaves};
pub use search::{
    MatchTier, MatchTierResult, leaf_matches, normalize_query, query_words, search, search_with,
};
pub use session::{NavigatorSession, SessionHandle, SessionInput, SessionSnapshot};
