//! Stable node identifiers.
//!
//! Ids are indices into a tree's arena, assigned in pre-order during
//! construction. They are only ever compared within one tree; all
//! deterministic tie-breaking (Dijkstra, enumeration order) relies on the
//! pre-order numbering.

use serde::{Deserialize, Serialize};

/// Index of a node inside a [`Tree`](crate::features::ast::Tree) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0)
    }
}
