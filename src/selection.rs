use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::model::{Node, NodeId};
use crate::tree::TreeHandle;

/// Expanded and focused nodes of the tree view, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    expanded_ids: BTreeSet<NodeId>,
    focused_path: Vec<NodeId>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expand(&mut self, id: NodeId) -> bool {
        self.expanded_ids.insert(id)
    }

    pub fn collapse(&mut self, id: &NodeId) -> bool {
        self.expanded_ids.remove(id)
    }

    /// Returns whether the node is expanded afterwards.
    pub fn toggle(&mut self, id: NodeId) -> bool {
        if self.expanded_ids.remove(&id) {
            false
        } else {
            self.expanded_ids.insert(id);
            true
        }
    }

    pub fn set_focus(&mut self, path: Vec<NodeId>) {
        self.focused_path = path;
    }

    pub fn is_expanded(&self, id: &NodeId) -> bool {
        self.expanded_ids.contains(id)
    }

    pub fn expanded_ids(&self) -> &BTreeSet<NodeId> {
        &self.expanded_ids
    }

    /// Board-first path of the focused node, never including the root.
    pub fn focused_path(&self) -> &[NodeId] {
        &self.focused_path
    }

    pub fn focused(&self) -> Option<&NodeId> {
        self.focused_path.last()
    }

    /// Drop ids that no longer resolve in `tree` and cut the focus path back
    /// to its longest valid prefix. A leading root id is removed as well, so
    /// a reconciled focus path always starts at a board; that removal is not
    /// counted. Returns how many stale entries were dropped.
    pub fn reconcile(&mut self, tree: &TreeHandle) -> usize {
        let live = tree.ids();
        let path = tree.strip_root(&self.focused_path).to_vec();
        let before = self.expanded_ids.len() + path.len();
        self.expanded_ids.retain(|id| live.contains(id));

        let mut valid = 0;
        let mut children: &[Arc<Node>] = tree.boards();
        for id in &path {
            let Some(node) = children.iter().find(|n| n.id() == id) else {
                break;
            };
            children = node.children();
            valid += 1;
        }
        self.focused_path = path;
        self.focused_path.truncate(valid);

        before - (self.expanded_ids.len() + self.focused_path.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_state() {
        let mut s = SelectionState::new();
        assert!(s.toggle(NodeId::from("b1")));
        assert!(s.is_expanded(&NodeId::from("b1")));
        assert!(!s.toggle(NodeId::from("b1")));
        assert!(s.expanded_ids().is_empty());
    }

    #[test]
    fn reconcile_against_empty_tree_clears_everything() {
        let mut s = SelectionState::new();
        s.expand(NodeId::from("b1"));
        s.set_focus(vec![NodeId::from("b1"), NodeId::from("g1")]);
        let dropped = s.reconcile(&TreeHandle::empty());
        assert_eq!(dropped, 3);
        assert!(s.expanded_ids().is_empty());
        assert!(s.focused_path().is_empty());
        assert_eq!(s.focused(), None);
    }

    #[test]
    fn root_prefix_is_not_counted_as_stale() {
        let mut s = SelectionState::new();
        s.set_focus(vec![NodeId::from("root")]);
        assert_eq!(s.reconcile(&TreeHandle::empty()), 0);
        assert!(s.focused_path().is_empty());
    }
}
