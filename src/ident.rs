use uuid::Uuid;

use crate::model::{Level, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdStrategy {
    /// Per-level monotonic counters: `b1`, `g1`, `s1`, `c1`, `ss1`.
    #[default]
    Counter,
    /// Level prefix plus a random v4 uuid: `c-6f1c…`.
    Uuid,
}

impl IdStrategy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "counter" => Some(IdStrategy::Counter),
            "uuid" => Some(IdStrategy::Uuid),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IdStrategy::Counter => "counter",
            IdStrategy::Uuid => "uuid",
        }
    }
}

/// Hands out node ids for one tree instance. Counters only move forward, so
/// an id freed by a delete is never produced again.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    strategy: IdStrategy,
    counters: [u64; 5],
}

impl IdGenerator {
    pub fn new(strategy: IdStrategy) -> Self {
        Self {
            strategy,
            counters: [0; 5],
        }
    }

    /// Switch strategy for ids handed out from now on; counters are kept.
    pub fn set_strategy(&mut self, strategy: IdStrategy) {
        self.strategy = strategy;
    }

    pub fn new_id(&mut self, level: Level) -> NodeId {
        match self.strategy {
            IdStrategy::Counter => {
                let slot = &mut self.counters[level.depth()];
                *slot += 1;
                NodeId::new(format!("{}{}", level.id_prefix(), slot))
            }
            IdStrategy::Uuid => NodeId::new(format!("{}-{}", level.id_prefix(), Uuid::new_v4())),
        }
    }

    /// Advance counters past an id that already exists in the tree, whatever
    /// level it was found at.
    pub fn observe(&mut self, id: &NodeId) {
        for level in Level::ALL {
            let Some(rest) = id.as_str().strip_prefix(level.id_prefix()) else {
                continue;
            };
            if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            if let Ok(n) = rest.parse::<u64>() {
                let slot = &mut self.counters[level.depth()];
                *slot = (*slot).max(n);
            }
        }
    }

    pub fn reset(&mut self) {
        self.counters = [0; 5];
    }
}
