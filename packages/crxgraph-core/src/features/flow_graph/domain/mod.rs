/*
 * DataFlow values and enumeration strategies.
 *
 * A DataFlow is a non-empty path of Identifier nodes along data-flow
 * edges. A *pseudo* flow wraps one non-Identifier node (a
 * MemberExpression sink with no identifier to follow).
 */

use serde::{Deserialize, Serialize};

use crate::errors::{CrxError, Result};
use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::features::data_flow;
use crate::shared::models::NodeId;

/// Which data flows to generate for a start node.
///
/// Inclusions: `OnePerFinalNodeShortest` ⊆ `DijkstraLeaves` ⊆
/// `OnePerNodeShortest` ⊆ `All`.
///
/// | variant | worst-case count | node coverage |
/// |---|---|---|
/// | `All` | exponential | full |
/// | `AllStopAtCycleInclusive` | exponential | full |
/// | `AllStopAtCycleExclusive` | exponential | full |
/// | `OnePerNodeShortest` | \|V\| | full |
/// | `OnePerFinalNodeShortest` | final nodes | partial |
/// | `DijkstraLeaves` | Dijkstra-tree leaves | partial |
/// | `JustOne` | 1 | partial |
///
/// The double-flow matcher squares the flow count (every from/to pair is
/// considered), so the exponential variants are strictly for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStrategy {
    All,
    AllStopAtCycleInclusive,
    AllStopAtCycleExclusive,
    OnePerNodeShortest,
    OnePerFinalNodeShortest,
    DijkstraLeaves,
    JustOne,
}

impl FlowStrategy {
    pub fn from_cli_name(s: &str) -> Option<FlowStrategy> {
        match s {
            "ALL" => Some(FlowStrategy::All),
            "ALL_STOP_AT_CYCLE_INCLUSIVE" => Some(FlowStrategy::AllStopAtCycleInclusive),
            "ALL_STOP_AT_CYCLE_EXCLUSIVE" => Some(FlowStrategy::AllStopAtCycleExclusive),
            "ONE_PER_NODE_SHORTEST" => Some(FlowStrategy::OnePerNodeShortest),
            "ONE_PER_FINAL_NODE_SHORTEST" => Some(FlowStrategy::OnePerFinalNodeShortest),
            "DIJKSTRA_LEAVES" => Some(FlowStrategy::DijkstraLeaves),
            "JUST_ONE" => Some(FlowStrategy::JustOne),
            _ => None,
        }
    }

    pub fn cli_name(&self) -> &'static str {
        match self {
            FlowStrategy::All => "ALL",
            FlowStrategy::AllStopAtCycleInclusive => "ALL_STOP_AT_CYCLE_INCLUSIVE",
            FlowStrategy::AllStopAtCycleExclusive => "ALL_STOP_AT_CYCLE_EXCLUSIVE",
            FlowStrategy::OnePerNodeShortest => "ONE_PER_NODE_SHORTEST",
            FlowStrategy::OnePerFinalNodeShortest => "ONE_PER_FINAL_NODE_SHORTEST",
            FlowStrategy::DijkstraLeaves => "DIJKSTRA_LEAVES",
            FlowStrategy::JustOne => "JUST_ONE",
        }
    }
}

impl Default for FlowStrategy {
    fn default() -> Self {
        FlowStrategy::OnePerNodeShortest
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFlow {
    nodes: Vec<NodeId>,
    pseudo: bool,
}

impl DataFlow {
    pub fn new(nodes: Vec<NodeId>) -> DataFlow {
        debug_assert!(!nodes.is_empty());
        DataFlow {
            nodes,
            pseudo: false,
        }
    }

    /// A single-node flow over a non-Identifier (cannot be continued).
    pub fn pseudo(node: NodeId) -> DataFlow {
        DataFlow {
            nodes: vec![node],
            pseudo: true,
        }
    }

    /// Flows starting at an Identifier (one flow) or an ObjectPattern
    /// (one flow per bound property).
    pub fn beginning_at(tree: &Tree, node: NodeId) -> Result<Vec<DataFlow>> {
        match tree.kind(node) {
            NodeKind::Identifier => Ok(vec![DataFlow::new(vec![node])]),
            NodeKind::ObjectPattern => {
                // start one flow at each property's bound identifier
                let mut flows = Vec::new();
                for prop in tree.children(node) {
                    if let Some(&binding) = tree.children(*prop).get(1) {
                        if tree.is_identifier(binding) {
                            flows.push(DataFlow::new(vec![binding]));
                        }
                    }
                }
                Ok(flows)
            }
            other => Err(CrxError::lookup(format!(
                "a data flow must begin at an Identifier or ObjectPattern, not a {}",
                other
            ))),
        }
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn is_pseudo(&self) -> bool {
        self.pseudo
    }

    pub fn first_node(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn last_node(&self) -> NodeId {
        *self.nodes.last().unwrap()
    }

    pub fn may_continue(&self, tree: &Tree) -> bool {
        !self.pseudo && !data_flow::flow_children(tree, self.last_node()).is_empty()
    }

    pub fn has_cycle(&self) -> bool {
        let mut seen = std::collections::BTreeSet::new();
        !self.nodes.iter().all(|n| seen.insert(*n))
    }

    /// The flow restricted to `[first..=last]` (either bound optional).
    pub fn sub_flow(&self, first: Option<NodeId>, last: Option<NodeId>) -> DataFlow {
        let start = first
            .and_then(|f| self.nodes.iter().position(|n| *n == f))
            .unwrap_or(0);
        let end = last
            .and_then(|l| self.nodes.iter().position(|n| *n == l))
            .map(|i| i + 1)
            .unwrap_or(self.nodes.len());
        DataFlow {
            nodes: self.nodes[start..end].to_vec(),
            pseudo: self.pseudo,
        }
    }

    /// Members/attributes of the initial variable accessed along the
    /// flow, in order: for `let x = s.url; y = x.split("/")`,
    /// `["url"]` (or `["url", "split()"]` with method calls included).
    /// Computed index accesses (`x[0]`, `x[i]`) are always ignored;
    /// `x['y']` counts like `x.y`.
    pub fn accessed_members(
        &self,
        tree: &Tree,
        include_method_calls: bool,
        include_last_node: bool,
    ) -> Vec<String> {
        let mut result = Vec::new();
        let upto = if include_last_node {
            self.nodes.len()
        } else {
            self.nodes.len().saturating_sub(1)
        };
        for &node in &self.nodes[..upto] {
            let Some(parent) = tree.parent(node) else {
                continue;
            };
            if tree.kind(parent) == NodeKind::MemberExpression && tree.is_nth_child(node, 0) {
                let mut current = node;
                // nested member expressions: x.y.z yields ["y", "z"]
                while let Some(p) = tree.parent(current) {
                    if tree.kind(p) != NodeKind::MemberExpression || !tree.is_nth_child(current, 0)
                    {
                        break;
                    }
                    let is_method_call = tree
                        .grandparent(current)
                        .map(|gp| {
                            tree.kind(gp) == NodeKind::CallExpression && tree.is_nth_child(p, 0)
                        })
                        .unwrap_or(false);
                    if !include_method_calls && is_method_call {
                        // hop over the call and see whether we are still
                        // inside a member chain
                        current = match tree.grandparent(current) {
                            Some(gp) => gp,
                            None => break,
                        };
                        continue;
                    }
                    if let Some(accessed) = tree.sibling(current, 1) {
                        let suffix = if is_method_call { "()" } else { "" };
                        if tree.is_identifier(accessed) && !tree.attrs(p).computed {
                            if let Some(name) = tree.name(accessed) {
                                result.push(format!("{}{}", name, suffix));
                            }
                        } else if tree.kind(accessed) == NodeKind::Literal
                            && tree.attrs(p).computed
                        {
                            if let Some(crate::shared::models::JsVal::Str(s)) =
                                tree.literal_value(accessed)
                            {
                                result.push(format!("{}{}", s, suffix));
                            }
                        }
                        // x[y] and x[0] accesses are skipped entirely
                    }
                    current = if is_method_call {
                        match tree.grandparent(current) {
                            Some(gp) => gp,
                            None => break,
                        }
                    } else {
                        p
                    };
                }
            } else if tree.kind(parent) == NodeKind::Property
                && tree.is_nth_child(node, 1)
                && tree
                    .grandparent(node)
                    .map(|gp| tree.kind(gp) == NodeKind::ObjectPattern)
                    .unwrap_or(false)
            {
                // {y: x} object patterns access member y
                if let Some(key) = tree.sibling(node, 0) {
                    if let Some(name) = tree.name(key) {
                        result.push(name.to_string());
                    }
                }
            }
        }
        result
    }
}

impl std::fmt::Display for DataFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.nodes.iter().map(|n| n.to_string()).collect();
        f.write_str(&parts.join(" -> "))
    }
}
