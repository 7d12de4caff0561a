use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::model::{child_level_of, Level, Node, NodeId, SessionStatus};

/// Derived counters kept on every node.
///
/// `total_child_count` and `completed_child_count` count sessions anywhere
/// beneath the node, so at each ancestor they equal the sum over its children.
/// At a chapter they coincide with its direct session children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregates {
    pub child_count: usize,
    pub completed_child_count: usize,
    pub total_child_count: usize,
    pub total_duration_minutes: i64,
}

impl Aggregates {
    pub fn completion_ratio(&self) -> f64 {
        if self.total_child_count == 0 {
            0.0
        } else {
            self.completed_child_count as f64 / self.total_child_count as f64
        }
    }
}

/// Aggregates of a node at `level` (`None` is the tree root) given its
/// current children. Only the children's own aggregates are read, never
/// deeper levels.
pub fn recompute(level: Option<Level>, children: &[Arc<Node>]) -> Aggregates {
    match level {
        Some(Level::Session) => Aggregates::default(),
        Some(Level::Chapter) => {
            let mut out = Aggregates {
                child_count: children.len(),
                total_child_count: children.len(),
                ..Aggregates::default()
            };
            for c in children {
                let Some(session) = c.attributes().as_session() else {
                    continue;
                };
                if session.status == SessionStatus::Completed {
                    out.completed_child_count += 1;
                }
                out.total_duration_minutes = out
                    .total_duration_minutes
                    .saturating_add(session.duration_minutes.unwrap_or(0));
            }
            out
        }
        _ => children.iter().fold(
            Aggregates {
                child_count: children.len(),
                ..Aggregates::default()
            },
            |mut acc, c| {
                let a = c.aggregates();
                acc.completed_child_count += a.completed_child_count;
                acc.total_child_count += a.total_child_count;
                acc.total_duration_minutes = acc.total_duration_minutes.saturating_add(a.total_duration_minutes);
                acc
            },
        ),
    }
}

/// Ids of every node whose stored aggregates disagree with a fresh recompute,
/// or whose children sit at the wrong level. Walks the full subtree; meant for
/// loading and tests, not for the edit path.
pub fn inconsistencies(parent: Option<Level>, children: &[Arc<Node>]) -> Vec<NodeId> {
    let mut out = Vec::new();
    let expected = child_level_of(parent);
    for c in children {
        if Some(c.level()) != expected || *c.aggregates() != recompute(Some(c.level()), c.children()) {
            out.push(c.id().clone());
        }
        out.extend(inconsistencies(Some(c.level()), c.children()));
    }
    out
}
