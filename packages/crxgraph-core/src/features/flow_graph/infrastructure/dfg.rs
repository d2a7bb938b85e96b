/*
 * DataFlowGraph: the sub-view of the PDG containing every Identifier
 * reachable from a start node via data-flow edges.
 *
 * The number of *paths* through this graph can be exponential in its
 * node count; this view plus the Dijkstra index is what keeps flow
 * enumeration polynomial for the shortest-path strategies.
 *
 * Do not confuse this with the Tree: the Tree is the AST annotated with
 * edges, this is a per-start projection of those edges.
 *
 * Determinism: adjacency is kept sorted by node id, Dijkstra prefers
 * smaller ids on equal distances, and every enumeration walks children
 * in ascending id order.
 */

use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::Result;
use crate::features::ast::Tree;
use crate::features::data_flow;
use crate::shared::models::NodeId;
use crate::shared::deadline::Deadline;

use super::super::domain::{DataFlow, FlowStrategy};

#[derive(Debug)]
pub struct DataFlowGraph {
    start: NodeId,
    /// per-node adjacency, sorted ascending
    children: FxHashMap<NodeId, Vec<NodeId>>,
    /// reverse adjacency restricted to the view, sorted ascending
    parents: FxHashMap<NodeId, Vec<NodeId>>,
    distances: FxHashMap<NodeId, u32>,
    predecessors: FxHashMap<NodeId, NodeId>,
}

impl DataFlowGraph {
    /// Build the forward-closed view from `start` (BFS over lazy edges)
    /// and its Dijkstra index (edge weight 1, smallest-id tie-breaks).
    pub fn new(tree: &Tree, start: NodeId, deadline: &Deadline) -> Result<DataFlowGraph> {
        debug_assert!(tree.is_identifier(start));
        let mut in_view: FxHashSet<NodeId> = FxHashSet::default();
        let mut queue = std::collections::VecDeque::new();
        in_view.insert(start);
        queue.push_back(start);
        while let Some(node) = queue.pop_front() {
            deadline.check()?;
            for child in data_flow::flow_children(tree, node) {
                if in_view.insert(child) {
                    queue.push_back(child);
                }
            }
        }

        let mut children: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        let mut parents: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        for &node in &in_view {
            let mut cs: Vec<NodeId> = data_flow::flow_children(tree, node);
            cs.sort();
            cs.dedup();
            for &c in &cs {
                parents.entry(c).or_default().push(node);
            }
            children.insert(node, cs);
            parents.entry(node).or_default();
        }
        for ps in parents.values_mut() {
            ps.sort();
            ps.dedup();
        }

        // Dijkstra with deterministic tie-breaking: visit order is
        // (distance, id); a predecessor is replaced only by a strictly
        // shorter path (equal-distance alternatives keep the
        // smallest-id predecessor because of the visit order)
        let mut distances: FxHashMap<NodeId, u32> = FxHashMap::default();
        let mut predecessors: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        distances.insert(start, 0);
        let mut unvisited: FxHashSet<NodeId> = in_view.clone();
        while !unvisited.is_empty() {
            deadline.check()?;
            let u = match unvisited
                .iter()
                .filter(|n| distances.contains_key(*n))
                .min_by_key(|n| (distances[*n], **n))
            {
                Some(&u) => u,
                None => break, // remaining nodes unreachable (cannot happen in a forward-closed view)
            };
            unvisited.remove(&u);
            let du = distances[&u];
            for &v in &children[&u] {
                if !unvisited.contains(&v) {
                    continue;
                }
                let alt = du + 1;
                let better = match distances.get(&v) {
                    Some(&dv) => alt < dv,
                    None => true,
                };
                if better {
                    distances.insert(v, alt);
                    predecessors.insert(v, u);
                }
            }
        }

        Ok(DataFlowGraph {
            start,
            children,
            parents,
            distances,
            predecessors,
        })
    }

    pub fn start_node(&self) -> NodeId {
        self.start
    }

    /// All nodes of the view, ascending.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut ns: Vec<NodeId> = self.children.keys().copied().collect();
        ns.sort();
        ns
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn distance(&self, node: NodeId) -> Option<u32> {
        self.distances.get(&node).copied()
    }

    pub fn predecessor(&self, node: NodeId) -> Option<NodeId> {
        self.predecessors.get(&node).copied()
    }

    /// Nodes without outgoing edges.
    pub fn final_nodes(&self) -> Vec<NodeId> {
        let mut ns: Vec<NodeId> = self
            .children
            .iter()
            .filter(|(_, cs)| cs.is_empty())
            .map(|(n, _)| *n)
            .collect();
        ns.sort();
        ns
    }

    /// Leaves of the Dijkstra shortest-path tree (no node claims them as
    /// predecessor). Every final node is one.
    pub fn dijkstra_leaves(&self) -> Vec<NodeId> {
        let preds: FxHashSet<NodeId> = self.predecessors.values().copied().collect();
        let mut ns: Vec<NodeId> = self
            .children
            .keys()
            .copied()
            .filter(|n| !preds.contains(n))
            .collect();
        ns.sort();
        ns
    }

    /// The shortest path start -> node along the predecessor chain.
    pub fn shortest_path_to(&self, node: NodeId) -> Vec<NodeId> {
        let mut reverse = vec![node];
        while *reverse.last().unwrap() != self.start {
            match self.predecessors.get(reverse.last().unwrap()) {
                Some(&p) => reverse.push(p),
                None => break,
            }
        }
        reverse.reverse();
        reverse
    }

    /// Whether the view contains a cycle (iterative DFS, back-edge
    /// detection).
    pub fn has_cycle(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let mut color: FxHashMap<NodeId, Color> =
            self.children.keys().map(|n| (*n, Color::White)).collect();
        // explicit stack of (node, next-child-index)
        let mut stack: Vec<(NodeId, usize)> = vec![(self.start, 0)];
        color.insert(self.start, Color::Gray);
        while let Some((node, idx)) = stack.pop() {
            let cs = &self.children[&node];
            if idx < cs.len() {
                stack.push((node, idx + 1));
                let child = cs[idx];
                match color[&child] {
                    Color::Gray => return true,
                    Color::White => {
                        color.insert(child, Color::Gray);
                        stack.push((child, 0));
                    }
                    Color::Black => {}
                }
            } else {
                color.insert(node, Color::Black);
            }
        }
        false
    }

    /// Whether two different paths exist between some pair of nodes.
    /// In a forward-closed view every node is reachable from the start,
    /// so this reduces to an in-degree test.
    pub fn has_split(&self) -> bool {
        self.parents.values().any(|ps| ps.len() >= 2)
    }

    /// Enumerate flows per the strategy. All variants are deterministic.
    pub fn flows(&self, strategy: FlowStrategy, deadline: &Deadline) -> Result<Vec<DataFlow>> {
        match strategy {
            FlowStrategy::OnePerNodeShortest => {
                let mut targets = self.nodes();
                targets.sort_by_key(|n| (self.distances.get(n).copied().unwrap_or(u32::MAX), *n));
                let mut out = Vec::with_capacity(targets.len());
                for t in targets {
                    deadline.check()?;
                    out.push(DataFlow::new(self.shortest_path_to(t)));
                }
                Ok(out)
            }
            FlowStrategy::OnePerFinalNodeShortest => {
                let mut targets = self.final_nodes();
                targets.sort_by_key(|n| (self.distances.get(n).copied().unwrap_or(u32::MAX), *n));
                let mut out = Vec::with_capacity(targets.len());
                for t in targets {
                    deadline.check()?;
                    out.push(DataFlow::new(self.shortest_path_to(t)));
                }
                Ok(out)
            }
            FlowStrategy::DijkstraLeaves => {
                let mut targets = self.dijkstra_leaves();
                targets.sort_by_key(|n| (self.distances.get(n).copied().unwrap_or(u32::MAX), *n));
                let mut out = Vec::with_capacity(targets.len());
                for t in targets {
                    deadline.check()?;
                    out.push(DataFlow::new(self.shortest_path_to(t)));
                }
                Ok(out)
            }
            FlowStrategy::JustOne => {
                let mut path = vec![self.start];
                let mut seen: FxHashSet<NodeId> = FxHashSet::default();
                seen.insert(self.start);
                loop {
                    deadline.check()?;
                    let cs = &self.children[path.last().unwrap()];
                    let Some(&next) = cs.first() else {
                        break;
                    };
                    path.push(next);
                    if !seen.insert(next) {
                        break;
                    }
                }
                Ok(vec![DataFlow::new(path)])
            }
            FlowStrategy::All => {
                let mut out = Vec::new();
                let mut path = vec![self.start];
                let mut on_path: FxHashSet<NodeId> = FxHashSet::default();
                on_path.insert(self.start);
                self.enumerate_all(&mut path, &mut on_path, &mut out, deadline)?;
                Ok(out)
            }
            FlowStrategy::AllStopAtCycleInclusive | FlowStrategy::AllStopAtCycleExclusive => {
                let inclusive = strategy == FlowStrategy::AllStopAtCycleInclusive;
                let mut out = Vec::new();
                let mut path = vec![self.start];
                let mut on_path: FxHashSet<NodeId> = FxHashSet::default();
                on_path.insert(self.start);
                self.enumerate_maximal(&mut path, &mut on_path, inclusive, &mut out, deadline)?;
                Ok(out)
            }
        }
    }

    /// Every simple path of every length, in DFS order. Exponential.
    fn enumerate_all(
        &self,
        path: &mut Vec<NodeId>,
        on_path: &mut FxHashSet<NodeId>,
        out: &mut Vec<DataFlow>,
        deadline: &Deadline,
    ) -> Result<()> {
        deadline.check()?;
        out.push(DataFlow::new(path.clone()));
        let children = self.children[path.last().unwrap()].clone();
        for child in children {
            if on_path.contains(&child) {
                continue;
            }
            path.push(child);
            on_path.insert(child);
            self.enumerate_all(path, on_path, out, deadline)?;
            on_path.remove(&child);
            path.pop();
        }
        Ok(())
    }

    /// Every maximal path: ends at a final node or at the first repeated
    /// node (included or excluded). Exponential.
    fn enumerate_maximal(
        &self,
        path: &mut Vec<NodeId>,
        on_path: &mut FxHashSet<NodeId>,
        inclusive: bool,
        out: &mut Vec<DataFlow>,
        deadline: &Deadline,
    ) -> Result<()> {
        deadline.check()?;
        let children = self.children[path.last().unwrap()].clone();
        if children.is_empty() {
            out.push(DataFlow::new(path.clone()));
            return Ok(());
        }
        let mut emitted_cut = false;
        for child in children {
            if on_path.contains(&child) {
                if inclusive {
                    let mut cut = path.clone();
                    cut.push(child);
                    out.push(DataFlow::new(cut));
                } else if !emitted_cut {
                    // two repeated children would emit identical flows
                    out.push(DataFlow::new(path.clone()));
                    emitted_cut = true;
                }
                continue;
            }
            path.push(child);
            on_path.insert(child);
            self.enumerate_maximal(path, on_path, inclusive, out, deadline)?;
            on_path.remove(&child);
            path.pop();
        }
        Ok(())
    }
}

/// Continue a flow with every continuation of its last node per the
/// strategy (the entry point the matcher uses).
pub fn continued_flows(
    tree: &Tree,
    flow: &DataFlow,
    strategy: FlowStrategy,
    deadline: &Deadline,
) -> Result<Vec<DataFlow>> {
    if flow.is_pseudo() {
        return Ok(vec![flow.clone()]);
    }
    let graph = DataFlowGraph::new(tree, flow.last_node(), deadline)?;
    let continuations = graph.flows(strategy, deadline)?;
    if flow.nodes().len() == 1 {
        Ok(continuations)
    } else {
        let prefix = &flow.nodes()[..flow.nodes().len() - 1];
        Ok(continuations
            .into_iter()
            .map(|c| {
                let mut nodes = prefix.to_vec();
                nodes.extend_from_slice(c.nodes());
                DataFlow::new(nodes)
            })
            .collect())
    }
}

/// All continued flows beginning at an Identifier or ObjectPattern.
pub fn all_continued_beginning_at(
    tree: &Tree,
    node: NodeId,
    strategy: FlowStrategy,
    deadline: &Deadline,
) -> Result<Vec<DataFlow>> {
    let mut out = Vec::new();
    for flow in DataFlow::beginning_at(tree, node)? {
        out.extend(continued_flows(tree, &flow, strategy, deadline)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ast::builder as b;
    use crate::features::ast::domain::NodeKind;
    use crate::features::ast::estree;
    use pretty_assertions::assert_eq;

    fn load(doc: serde_json::Value) -> Tree {
        estree::load_document(&doc, "t.js", None).unwrap()
    }

    fn nth_named(tree: &Tree, name: &str, nth: usize) -> NodeId {
        tree.nodes_of_kind(NodeKind::Identifier)
            .filter(|i| tree.name(*i) == Some(name))
            .nth(nth)
            .unwrap()
    }

    /// The diamond from the module docs:
    ///   let a = "data"; let b = a, c = a;
    ///   let d = b + c;
    fn diamond() -> Tree {
        load(b::program(vec![
            b::let_decl("a", b::lit_str("data")),
            b::var_decl(
                "let",
                vec![
                    b::declarator(b::ident("b"), Some(b::ident("a"))),
                    b::declarator(b::ident("c"), Some(b::ident("a"))),
                ],
            ),
            b::let_decl("d", b::bin("+", b::ident("b"), b::ident("c"))),
        ]))
    }

    #[test]
    fn test_view_is_forward_closed() {
        let t = diamond();
        let start = nth_named(&t, "a", 0);
        let g = DataFlowGraph::new(&t, start, &Deadline::unlimited()).unwrap();
        // a_decl, a_use1, a_use2, b_decl, c_decl, b_use, c_use, d_decl
        assert_eq!(g.len(), 8);
        assert_eq!(g.start_node(), start);
    }

    #[test]
    fn test_dijkstra_tree_well_formed() {
        let t = diamond();
        let start = nth_named(&t, "a", 0);
        let g = DataFlowGraph::new(&t, start, &Deadline::unlimited()).unwrap();
        for node in g.nodes() {
            let path = g.shortest_path_to(node);
            assert_eq!(path[0], start);
            assert_eq!(*path.last().unwrap(), node);
            // simple path, length equals recorded distance
            let mut uniq = path.clone();
            uniq.sort();
            uniq.dedup();
            assert_eq!(uniq.len(), path.len());
            assert_eq!(path.len() as u32 - 1, g.distance(node).unwrap());
        }
    }

    #[test]
    fn test_strategy_inclusions() {
        let t = diamond();
        let start = nth_named(&t, "a", 0);
        let g = DataFlowGraph::new(&t, start, &Deadline::unlimited()).unwrap();
        let d = Deadline::unlimited();
        let all = g.flows(FlowStrategy::All, &d).unwrap();
        let per_node = g.flows(FlowStrategy::OnePerNodeShortest, &d).unwrap();
        let leaves = g.flows(FlowStrategy::DijkstraLeaves, &d).unwrap();
        let finals = g.flows(FlowStrategy::OnePerFinalNodeShortest, &d).unwrap();
        assert!(finals.iter().all(|f| leaves.contains(f)));
        assert!(leaves.iter().all(|f| per_node.contains(f)));
        assert!(per_node.iter().all(|f| all.contains(f)));
        // full node coverage for OnePerNodeShortest
        assert_eq!(per_node.len(), g.len());
        // the diamond has exactly one final node (d's declaration)
        assert_eq!(finals.len(), 1);
    }

    #[test]
    fn test_all_is_exponential_in_shape_not_count_here() {
        let t = diamond();
        let start = nth_named(&t, "a", 0);
        let g = DataFlowGraph::new(&t, start, &Deadline::unlimited()).unwrap();
        let all = g.flows(FlowStrategy::All, &Deadline::unlimited()).unwrap();
        // every prefix of every branch: 1 (a) + 2 (uses) + 2 (decls)
        // + 2 (uses) + 2 (d via either branch) = 9
        assert_eq!(all.len(), 9);
        // flows through both branches end in the same final node
        let d_decl = nth_named(&t, "d", 0);
        assert_eq!(all.iter().filter(|f| f.last_node() == d_decl).count(), 2);
    }

    #[test]
    fn test_split_and_cycle_detection() {
        let t = diamond();
        let start = nth_named(&t, "a", 0);
        let g = DataFlowGraph::new(&t, start, &Deadline::unlimited()).unwrap();
        assert!(g.has_split());
        assert!(!g.has_cycle());

        // while (1) { x = y; y = x; } produces a cycle
        let t2 = load(b::program(vec![
            b::let_decl("x", b::lit_int(1)),
            b::let_decl("y", b::lit_int(2)),
            b::while_stmt(
                b::lit_int(1),
                b::block(vec![
                    b::expr_stmt(b::assign("=", b::ident("x"), b::ident("y"))),
                    b::expr_stmt(b::assign("=", b::ident("y"), b::ident("x"))),
                ]),
            ),
        ]));
        let start2 = nth_named(&t2, "x", 1);
        let g2 = DataFlowGraph::new(&t2, start2, &Deadline::unlimited()).unwrap();
        assert!(g2.has_cycle());
    }

    #[test]
    fn test_just_one_is_deterministic() {
        let t = diamond();
        let start = nth_named(&t, "a", 0);
        let g = DataFlowGraph::new(&t, start, &Deadline::unlimited()).unwrap();
        let d = Deadline::unlimited();
        let one = g.flows(FlowStrategy::JustOne, &d).unwrap();
        assert_eq!(one.len(), 1);
        let again = g.flows(FlowStrategy::JustOne, &d).unwrap();
        assert_eq!(one, again);
    }

    #[test]
    fn test_deadline_aborts_enumeration() {
        let t = diamond();
        let start = nth_named(&t, "a", 0);
        let g = DataFlowGraph::new(&t, start, &Deadline::unlimited()).unwrap();
        let expired = Deadline::after_secs(0);
        assert!(g.flows(FlowStrategy::All, &expired).is_err());
    }
}
