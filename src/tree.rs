use std::collections::HashSet;
use std::sync::Arc;

use crate::aggregate::{self, Aggregates};
use crate::error::EditError;
use crate::model::{Level, Node, NodeId};

pub const ROOT_ID: &str = "root";

#[derive(Debug, PartialEq)]
struct Root {
    id: NodeId,
    children: Vec<Arc<Node>>,
    aggregates: Aggregates,
}

/// An immutable tree value. Cloning is a pointer copy; edits never change an
/// existing handle, they produce a new one that shares unchanged subtrees.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeHandle {
    root: Arc<Root>,
}

impl Default for TreeHandle {
    fn default() -> Self {
        TreeHandle::empty()
    }
}

impl TreeHandle {
    pub fn empty() -> Self {
        TreeHandle::from_parts(NodeId::from(ROOT_ID), Vec::new())
    }

    pub(crate) fn from_parts(id: NodeId, boards: Vec<Arc<Node>>) -> Self {
        let aggregates = aggregate::recompute(None, &boards);
        TreeHandle {
            root: Arc::new(Root {
                id,
                children: boards,
                aggregates,
            }),
        }
    }

    pub fn root_id(&self) -> &NodeId {
        &self.root.id
    }

    pub fn boards(&self) -> &[Arc<Node>] {
        &self.root.children
    }

    pub fn aggregates(&self) -> &Aggregates {
        &self.root.aggregates
    }

    /// True when both handles are the same tree value, not just equal trees.
    pub fn ptr_eq(&self, other: &TreeHandle) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    /// Drop a leading root id; paths may be given with or without it.
    pub fn strip_root<'a>(&self, path: &'a [NodeId]) -> &'a [NodeId] {
        match path.split_first() {
            Some((first, rest)) if *first == self.root.id => rest,
            _ => path,
        }
    }

    pub fn get(&self, path: &[NodeId]) -> Option<&Arc<Node>> {
        let path = self.strip_root(path);
        let (last, parent) = path.split_last()?;
        let (_, siblings) = self.children_at(parent).ok()?;
        siblings.iter().find(|n| n.id() == last)
    }

    /// Level and children of the node at `path` (already stripped of the
    /// root). The empty path is the root, whose level is `None`.
    pub(crate) fn children_at(&self, path: &[NodeId]) -> Result<(Option<Level>, &[Arc<Node>]), EditError> {
        let mut level = None;
        let mut children: &[Arc<Node>] = &self.root.children;
        for (i, id) in path.iter().enumerate() {
            let Some(node) = children.iter().find(|n| n.id() == id) else {
                return Err(EditError::not_found(&path[..=i], id));
            };
            level = Some(node.level());
            children = node.children();
        }
        Ok((level, children))
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.iter().any(|n| n.id() == id)
    }

    /// Path from the first board down to `id`, root excluded.
    pub fn find_path(&self, id: &NodeId) -> Option<Vec<NodeId>> {
        fn walk(children: &[Arc<Node>], id: &NodeId, trail: &mut Vec<NodeId>) -> bool {
            for c in children {
                trail.push(c.id().clone());
                if c.id() == id || walk(c.children(), id, trail) {
                    return true;
                }
                trail.pop();
            }
            false
        }
        let mut trail = Vec::new();
        if walk(&self.root.children, id, &mut trail) {
            Some(trail)
        } else {
            None
        }
    }

    pub fn ids(&self) -> HashSet<NodeId> {
        self.iter().map(|n| n.id().clone()).collect()
    }

    /// Number of nodes, root excluded.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Pre-order walk over every node below the root.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stack: self.root.children.iter().rev().collect(),
        }
    }

    /// Every node whose aggregates or child level disagree with its children.
    pub fn inconsistencies(&self) -> Vec<NodeId> {
        let mut out = aggregate::inconsistencies(None, &self.root.children);
        if self.root.aggregates != aggregate::recompute(None, &self.root.children) {
            out.push(self.root.id.clone());
        }
        out
    }
}

pub struct Iter<'a> {
    stack: Vec<&'a Arc<Node>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Arc<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}
