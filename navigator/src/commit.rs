use crate::model::AncestorContext;
use crate::model::Entity;
use crate::model::FlatLeaf;
use crate::model::Leaf;
use crate::search::MatchTier;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// What committing the selected item means. The dispatcher only resolves the
/// item; opening, connecting or copying is up to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommitEvent {
    DescendIntoEntity { entity: Entity },
    ActOnLeaf { leaf: Leaf, context: AncestorContext },
}

/// Borrowed view of the lists a commit may resolve against.
#[derive(Debug, Clone, Copy)]
pub struct CommitLists<'a> {
    pub hierarchy: &'a [Entity],
    pub primary: &'a [Entity],
    pub fallback: &'a [FlatLeaf],
}

/// Resolves `(tier, index)` against the lists as they are now. An index that
/// no longer fits, e.g. after a re-render raced a key press, commits nothing.
pub fn dispatch(tier: MatchTier, index: usize, lists: CommitLists<'_>) -> Option<CommitEvent> {
    let event = match tier {
        MatchTier::Inactive => lists
            .hierarchy
            .get(index)
            .map(|entity| CommitEvent::DescendIntoEntity {
                entity: entity.clone(),
            }),
        MatchTier::Primary => lists
            .primary
            .get(index)
            .map(|entity| CommitEvent::DescendIntoEntity {
                entity: entity.clone(),
            }),
        MatchTier::Fallback => lists.fallback.get(index).map(|flat| CommitEvent::ActOnLeaf {
            leaf: flat.leaf.clone(),
            context: flat.context.clone(),
        }),
    };
    if event.is_none() {
        debug!("ignoring out-of-range commit {index} on {tier:?} tier");
    }
    event
}

/// Receiver of committed items.
pub trait CommitSink: Send {
    fn on_entity_selected(&mut self, entity: &Entity);
    fn on_leaf_action(&mut self, leaf: &Leaf, context: &AncestorContext);

    fn deliver(&mut self, event: &CommitEvent) {
        match event {
            CommitEvent::DescendIntoEntity { entity } => self.on_entity_selected(entity),
            CommitEvent::ActOnLeaf { leaf, context } => self.on_leaf_action(leaf, context),
        }
    }
}

/// Forwards commits onto an event stream.
impl CommitSink for UnboundedSender<CommitEvent> {
    fn on_entity_selected(&mut self, entity: &Entity) {
        let _ = self.send(CommitEvent::DescendIntoEntity {
            entity: entity.clone(),
        });
    }

    fn on_leaf_action(&mut self, leaf: &Leaf, context: &AncestorContext) {
        let _ = self.send(CommitEvent::ActOnLeaf {
            leaf: leaf.clone(),
            context: context.clone(),
        });
    }
}
