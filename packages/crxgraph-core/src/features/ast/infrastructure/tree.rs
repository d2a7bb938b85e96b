/*
 * Arena-backed AST/PDG tree.
 *
 * Nodes live in a Vec indexed by NodeId (assigned in pre-order at load
 * time). Children are owned id vectors, parent ids are non-owning, so the
 * data-flow edges added later may form arbitrary directed graphs without
 * ownership cycles.
 *
 * Identifier nodes carry lazily generated data-flow adjacency behind
 * Cell/RefCell: one analysis is strictly single-threaded, mutation is
 * monotone (edge additions only) and idempotent (duplicate inserts are
 * no-ops). The tree as a whole is Send but never shared across workers.
 */

use std::cell::{Cell, RefCell};

use crate::errors::{CrxError, Result};
use crate::shared::models::{JsVal, NodeId, Span};

use super::super::domain::{Attrs, ControlLabel, NodeKind};

/// Which lazy data-flow layer a flag refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LazyLayer {
    Basic,
    CallExprParents,
    CallExprChildren,
    ReturnParents,
    ReturnChildren,
}

/// Per-identifier data-flow state.
#[derive(Debug, Default)]
pub struct IdentState {
    dd_parents: RefCell<Vec<NodeId>>,
    dd_children: RefCell<Vec<NodeId>>,
    basic_done: Cell<bool>,
    call_parents_done: Cell<bool>,
    call_children_done: Cell<bool>,
    return_parents_done: Cell<bool>,
    return_children_done: Cell<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeTag {
    Control,
    Data,
    Statement,
}

/// A materialized edge view (adjacency is stored compactly; this struct
/// is what edge-listing queries hand out).
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub tag: EdgeTag,
    pub label: String,
    pub nearest_statement: Option<NodeId>,
}

#[derive(Debug)]
pub struct NodeData {
    pub kind: NodeKind,
    pub role: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub span: Span,
    pub attrs: Attrs,
    pub height: u32,
    control: Vec<(NodeId, ControlLabel)>,
    ident: Option<IdentState>,
}

#[derive(Debug)]
pub struct Tree {
    nodes: Vec<NodeData>,
    filename: String,
    lines: Vec<String>,
}

impl Tree {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            nodes: Vec::new(),
            filename: filename.into(),
            lines: Vec::new(),
        }
    }

    /// Append a node; the id returned is its pre-order position.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        role: impl Into<String>,
        parent: Option<NodeId>,
        span: Span,
        attrs: Attrs,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            role: role.into(),
            parent,
            children: Vec::new(),
            span,
            attrs,
            height: 1,
            control: Vec::new(),
            ident: (kind == NodeKind::Identifier).then(IdentState::default),
        });
        if let Some(p) = parent {
            self.nodes[p.index()].children.push(id);
        }
        id
    }

    /// Finalize after loading: source lines, synthetic spans when the
    /// document carried no positions, subtree heights, control edges.
    pub fn finish(&mut self, source: Option<&str>) {
        if let Some(src) = source {
            self.lines = src.lines().map(|l| l.to_string()).collect();
        }
        if !self.nodes.is_empty() && self.nodes.iter().all(|n| n.span == Span::zero()) {
            self.assign_synthetic_spans();
        }
        self.compute_heights();
        self.annotate_control_flow();
    }

    /// Pre-order positions double as line numbers so that occurs-before
    /// and span-containment queries stay meaningful for documents built
    /// without locations.
    fn assign_synthetic_spans(&mut self) {
        for i in 0..self.nodes.len() {
            let line = i as u32 + 1;
            self.nodes[i].span = Span::new(line, 0, line, 1);
        }
        // Parent spans must cover their subtrees; ids are pre-order, so
        // the subtree of i is a contiguous id range and a reverse sweep
        // suffices.
        for i in (0..self.nodes.len()).rev() {
            let max_end = self.nodes[i]
                .children
                .iter()
                .map(|c| self.nodes[c.index()].span.end())
                .max();
            if let Some(end) = max_end {
                self.nodes[i].span.end_line = end.line;
                self.nodes[i].span.end_col = end.column;
            }
        }
    }

    fn compute_heights(&mut self) {
        for i in (0..self.nodes.len()).rev() {
            let h = self.nodes[i]
                .children
                .iter()
                .map(|c| self.nodes[c.index()].height)
                .max()
                .map(|m| m + 1)
                .unwrap_or(1);
            self.nodes[i].height = h;
        }
    }

    /// Statement-level control edges ("True"/"False" on if-branches and
    /// loop bodies, "e" otherwise).
    fn annotate_control_flow(&mut self) {
        let mut edges: Vec<(NodeId, NodeId, ControlLabel)> = Vec::new();
        for id in self.preorder(self.root()) {
            let kind = self.kind(id);
            match kind {
                NodeKind::Program | NodeKind::BlockStatement => {
                    for &c in self.children(id) {
                        if self.kind(c).is_statement() {
                            edges.push((id, c, ControlLabel::Epsilon));
                        }
                    }
                }
                NodeKind::IfStatement => {
                    if let Some(cons) = self.get_one(id, "consequent") {
                        edges.push((id, cons, ControlLabel::True));
                    }
                    if let Some(alt) = self.get_one(id, "alternate") {
                        edges.push((id, alt, ControlLabel::False));
                    }
                }
                NodeKind::WhileStatement
                | NodeKind::DoWhileStatement
                | NodeKind::ForStatement
                | NodeKind::ForInStatement
                | NodeKind::ForOfStatement => {
                    if let Some(body) = self.get_one(id, "body") {
                        edges.push((id, body, ControlLabel::True));
                    }
                }
                NodeKind::SwitchStatement => {
                    for &case in self.children(id) {
                        if self.kind(case) == NodeKind::SwitchCase {
                            for c in self.get(case, "consequent") {
                                edges.push((id, c, ControlLabel::Epsilon));
                            }
                        }
                    }
                }
                NodeKind::TryStatement | NodeKind::LabeledStatement | NodeKind::WithStatement => {
                    for &c in self.children(id) {
                        let target = if self.kind(c) == NodeKind::CatchClause {
                            self.get_one(c, "body")
                        } else {
                            Some(c)
                        };
                        if let Some(t) = target {
                            if self.kind(t).is_statement() {
                                edges.push((id, t, ControlLabel::Epsilon));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        for (from, to, label) in edges {
            self.nodes[from.index()].control.push((to, label));
        }
    }

    // ── basic accessors ────────────────────────────────────────────────

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Lines of source text (0 for documents loaded without source).
    pub fn source_line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.index()].kind
    }

    pub fn role(&self, id: NodeId) -> &str {
        &self.nodes[id.index()].role
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    pub fn attrs(&self, id: NodeId) -> &Attrs {
        &self.nodes[id.index()].attrs
    }

    pub fn height(&self, id: NodeId) -> u32 {
        self.nodes[id.index()].height
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.index()].attrs.name.as_deref()
    }

    pub fn is_identifier(&self, id: NodeId) -> bool {
        self.kind(id) == NodeKind::Identifier
    }

    pub fn is_identifier_named(&self, id: NodeId, name: &str) -> bool {
        self.is_identifier(id) && self.name(id) == Some(name)
    }

    pub fn literal_value(&self, id: NodeId) -> Option<&JsVal> {
        self.nodes[id.index()].attrs.value.as_ref()
    }

    pub fn operator(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.index()].attrs.operator.as_deref()
    }

    /// The whole parse failed: the document consists of a ParsingError
    /// marker (spec: treat the script as crashed).
    pub fn is_parsing_error(&self) -> bool {
        !self.nodes.is_empty() && self.kind(self.root()) == NodeKind::ParsingError
    }

    // ── traversal ──────────────────────────────────────────────────────

    /// Pre-order traversal with an explicit stack (scripts nest deeply).
    pub fn preorder(&self, from: NodeId) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: vec![from],
        }
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len())
            .map(|i| NodeId(i as u32))
            .filter(move |id| self.kind(*id) == kind)
    }

    pub fn descendants_of_kind(&self, from: NodeId, kind: NodeKind) -> Vec<NodeId> {
        self.preorder(from)
            .filter(|id| self.kind(*id) == kind)
            .collect()
    }

    pub fn identifiers_in(&self, from: NodeId) -> Vec<NodeId> {
        self.descendants_of_kind(from, NodeKind::Identifier)
    }

    pub fn has_descendant_of_kinds(&self, from: NodeId, kinds: &[NodeKind]) -> bool {
        self.preorder(from)
            .skip(1)
            .any(|id| kinds.contains(&self.kind(id)))
    }

    // ── ancestry ───────────────────────────────────────────────────────

    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            current: self.parent(id),
        }
    }

    pub fn grandparent(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).and_then(|p| self.parent(p))
    }

    pub fn get_ancestor(&self, id: NodeId, kinds: &[NodeKind]) -> Option<NodeId> {
        self.ancestors(id).find(|a| kinds.contains(&self.kind(*a)))
    }

    pub fn get_ancestor_or_self(&self, id: NodeId, kinds: &[NodeKind]) -> Option<NodeId> {
        if kinds.contains(&self.kind(id)) {
            Some(id)
        } else {
            self.get_ancestor(id, kinds)
        }
    }

    /// All matching ancestors, nearest first.
    pub fn all_ancestors_of_kinds(&self, id: NodeId, kinds: &[NodeKind]) -> Vec<NodeId> {
        self.ancestors(id)
            .filter(|a| kinds.contains(&self.kind(*a)))
            .collect()
    }

    /// Strict descendant test.
    pub fn is_inside(&self, id: NodeId, outer: NodeId) -> bool {
        self.ancestors(id).any(|a| a == outer)
    }

    pub fn is_inside_or_is(&self, id: NodeId, outer: NodeId) -> bool {
        id == outer || self.is_inside(id, outer)
    }

    /// The node itself if it is a statement, else its nearest statement
    /// ancestor.
    pub fn nearest_statement(&self, id: NodeId) -> Option<NodeId> {
        if self.kind(id).is_statement() {
            Some(id)
        } else {
            self.ancestors(id).find(|a| self.kind(*a).is_statement())
        }
    }

    /// The innermost enclosing function carrier, if any.
    pub fn enclosing_function(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|a| self.kind(*a).is_function())
    }

    // ── role access and siblings ───────────────────────────────────────

    /// All children filling `role` (array-valued roles keep source order).
    pub fn get(&self, id: NodeId, role: &str) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.role(*c) == role)
            .collect()
    }

    pub fn get_one(&self, id: NodeId, role: &str) -> Option<NodeId> {
        self.children(id).iter().copied().find(|c| self.role(*c) == role)
    }

    pub fn lhs(&self, id: NodeId) -> Result<NodeId> {
        self.children(id)
            .first()
            .copied()
            .ok_or_else(|| CrxError::Lhs(format!("{} {}", self.kind(id), id)))
    }

    pub fn rhs(&self, id: NodeId) -> Result<NodeId> {
        self.children(id)
            .get(1)
            .copied()
            .ok_or_else(|| CrxError::Rhs(format!("{} {}", self.kind(id), id)))
    }

    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        let p = self.parent(id)?;
        self.children(p).iter().position(|c| *c == id)
    }

    pub fn is_nth_child(&self, id: NodeId, n: usize) -> bool {
        self.child_index(id) == Some(n)
    }

    pub fn sibling(&self, id: NodeId, n: usize) -> Option<NodeId> {
        let p = self.parent(id)?;
        self.children(p).get(n).copied()
    }

    pub fn sibling_relative(&self, id: NodeId, offset: isize) -> Option<NodeId> {
        let idx = self.child_index(id)? as isize + offset;
        if idx < 0 {
            return None;
        }
        self.sibling(id, idx as usize)
    }

    pub fn sibling_by_kind(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        let p = self.parent(id)?;
        self.children(p)
            .iter()
            .copied()
            .find(|c| *c != id && self.kind(*c) == kind)
    }

    /// First child if this node is `kind`-childed; convenience used all
    /// over the pattern code.
    pub fn child_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.children(id).iter().copied().find(|c| self.kind(*c) == kind)
    }

    // ── positional queries ─────────────────────────────────────────────

    pub fn occurs_before(&self, a: NodeId, b: NodeId) -> bool {
        let (sa, sb) = (self.span(a), self.span(b));
        if sa.start() == sb.start() {
            a < b
        } else {
            sa.starts_before(&sb)
        }
    }

    pub fn occurs_after(&self, a: NodeId, b: NodeId) -> bool {
        self.occurs_before(b, a)
    }

    pub fn lies_within_piece_of_code(&self, id: NodeId, piece: &Span) -> bool {
        self.span(id).lies_within(piece)
    }

    pub fn location_string(&self, id: NodeId) -> String {
        self.span(id).location_string()
    }

    pub fn line_number(&self, id: NodeId) -> u32 {
        self.span(id).start_line
    }

    /// The whole source line the node starts on ("" for builder documents
    /// without source text).
    pub fn line_of_code(&self, id: NodeId) -> String {
        let line = self.span(id).start_line;
        if line == 0 {
            return String::new();
        }
        self.lines
            .get(line as usize - 1)
            .cloned()
            .unwrap_or_default()
    }

    // ── data-flow state (raw; lazy generation lives in data_flow) ──────

    fn ident_state(&self, id: NodeId) -> Option<&IdentState> {
        self.nodes[id.index()].ident.as_ref()
    }

    pub fn dd_parents_raw(&self, id: NodeId) -> Vec<NodeId> {
        self.ident_state(id)
            .map(|s| s.dd_parents.borrow().clone())
            .unwrap_or_default()
    }

    pub fn dd_children_raw(&self, id: NodeId) -> Vec<NodeId> {
        self.ident_state(id)
            .map(|s| s.dd_children.borrow().clone())
            .unwrap_or_default()
    }

    /// Insert `from --data--> to`. Both endpoints must be identifiers.
    /// Duplicates are no-ops; the reverse direction is kept in sync.
    /// Returns whether a new edge was added.
    pub fn add_data_edge(&self, from: NodeId, to: NodeId) -> bool {
        debug_assert!(self.is_identifier(from) && self.is_identifier(to));
        let (Some(fs), Some(ts)) = (self.ident_state(from), self.ident_state(to)) else {
            return false;
        };
        if fs.dd_children.borrow().contains(&to) {
            return false;
        }
        fs.dd_children.borrow_mut().push(to);
        ts.dd_parents.borrow_mut().push(from);
        true
    }

    /// Remove `from --data--> to` in both directions; returns the number
    /// of removed child entries. Only legal before the lazy flags have
    /// been examined for analysis.
    pub fn remove_data_edge(&self, from: NodeId, to: NodeId) -> usize {
        let (Some(fs), Some(ts)) = (self.ident_state(from), self.ident_state(to)) else {
            return 0;
        };
        let before = fs.dd_children.borrow().len();
        fs.dd_children.borrow_mut().retain(|c| *c != to);
        ts.dd_parents.borrow_mut().retain(|p| *p != from);
        before - fs.dd_children.borrow().len()
    }

    pub fn lazy_done(&self, id: NodeId, layer: LazyLayer) -> bool {
        self.ident_state(id)
            .map(|s| match layer {
                LazyLayer::Basic => s.basic_done.get(),
                LazyLayer::CallExprParents => s.call_parents_done.get(),
                LazyLayer::CallExprChildren => s.call_children_done.get(),
                LazyLayer::ReturnParents => s.return_parents_done.get(),
                LazyLayer::ReturnChildren => s.return_children_done.get(),
            })
            .unwrap_or(true)
    }

    /// Latch a lazy flag. Set before running the generator so re-entrant
    /// queries during generation see it as done.
    pub fn set_lazy_done(&self, id: NodeId, layer: LazyLayer) {
        if let Some(s) = self.ident_state(id) {
            match layer {
                LazyLayer::Basic => s.basic_done.set(true),
                LazyLayer::CallExprParents => s.call_parents_done.set(true),
                LazyLayer::CallExprChildren => s.call_children_done.set(true),
                LazyLayer::ReturnParents => s.return_parents_done.set(true),
                LazyLayer::ReturnChildren => s.return_children_done.set(true),
            }
        }
    }

    /// Every data-flow edge currently materialized, as tagged edge views.
    pub fn all_data_edges(&self) -> Vec<Edge> {
        let mut result = Vec::new();
        for i in 0..self.nodes.len() {
            let from = NodeId(i as u32);
            if let Some(s) = self.ident_state(from) {
                for &to in s.dd_children.borrow().iter() {
                    result.push(Edge {
                        from,
                        to,
                        tag: EdgeTag::Data,
                        label: "data".to_string(),
                        nearest_statement: self.nearest_statement(to),
                    });
                }
            }
        }
        result
    }

    pub fn data_edge_count(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(|n| n.ident.as_ref())
            .map(|s| s.dd_children.borrow().len())
            .sum()
    }

    // ── control edges ──────────────────────────────────────────────────

    pub fn control_children(&self, id: NodeId) -> &[(NodeId, ControlLabel)] {
        &self.nodes[id.index()].control
    }

    pub fn control_edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.control.len()).sum()
    }

    // ── code statistics ────────────────────────────────────────────────

    pub fn average_identifier_length(&self) -> f64 {
        let lengths: Vec<usize> = self
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Identifier)
            .filter_map(|n| n.attrs.name.as_ref().map(|s| s.chars().count()))
            .collect();
        if lengths.is_empty() {
            return 0.0;
        }
        lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
    }

    pub fn one_character_identifier_percentage(&self) -> u32 {
        let mut total = 0usize;
        let mut one_char = 0usize;
        for n in &self.nodes {
            if n.kind == NodeKind::Identifier {
                if let Some(name) = &n.attrs.name {
                    total += 1;
                    if name.chars().count() == 1 {
                        one_char += 1;
                    }
                }
            }
        }
        if total == 0 {
            0
        } else {
            (one_char * 100 / total) as u32
        }
    }

    // ── debug dump ─────────────────────────────────────────────────────

    /// Indented tree rendering for diagnostics and test failure output.
    pub fn dump(&self, from: NodeId) -> String {
        let mut out = String::new();
        self.dump_into(from, 0, &mut out);
        out
    }

    fn dump_into(&self, id: NodeId, indent: usize, out: &mut String) {
        use std::fmt::Write;
        let attrs = self.attrs(id);
        let extra = attrs
            .name
            .clone()
            .or_else(|| attrs.raw.clone())
            .map(|s| format!(":\"{}\"", s))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{}{} [{}{}] ({} children)",
            "\t".repeat(indent),
            id,
            self.kind(id),
            extra,
            self.children(id).len()
        );
        for &c in self.children(id) {
            self.dump_into(c, indent + 1, out);
        }
    }
}

pub struct Preorder<'t> {
    tree: &'t Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        for &c in self.tree.children(id).iter().rev() {
            self.stack.push(c);
        }
        Some(id)
    }
}

pub struct Ancestors<'t> {
    tree: &'t Tree,
    current: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.tree.parent(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ast::builder as b;
    use crate::features::ast::estree;

    fn small_tree() -> Tree {
        // let x = foo(); bar(x);
        let doc = b::program(vec![
            b::var_decl("let", vec![b::declarator(b::ident("x"), Some(b::call(b::ident("foo"), vec![])))]),
            b::expr_stmt(b::call(b::ident("bar"), vec![b::ident("x")])),
        ]);
        estree::load_document(&doc, "test.js", None).unwrap()
    }

    #[test]
    fn test_preorder_matches_id_order() {
        let t = small_tree();
        let order: Vec<NodeId> = t.preorder(t.root()).collect();
        let expected: Vec<NodeId> = (0..t.len() as u32).map(NodeId).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_parent_child_symmetry() {
        let t = small_tree();
        for id in t.preorder(t.root()) {
            for &c in t.children(id) {
                assert_eq!(t.parent(c), Some(id));
            }
        }
        assert_eq!(t.parent(t.root()), None);
    }

    #[test]
    fn test_synthetic_spans_nest() {
        let t = small_tree();
        for id in t.preorder(t.root()) {
            for &c in t.children(id) {
                assert!(t.span(c).lies_within(&t.span(id)));
                assert!(t.occurs_before(id, c));
            }
        }
    }

    #[test]
    fn test_data_edges_are_symmetric_and_deduped() {
        let t = small_tree();
        let idents = t.identifiers_in(t.root());
        let (a, b2) = (idents[0], idents[1]);
        assert!(t.add_data_edge(a, b2));
        assert!(!t.add_data_edge(a, b2)); // duplicate is a no-op
        assert_eq!(t.dd_children_raw(a), vec![b2]);
        assert_eq!(t.dd_parents_raw(b2), vec![a]);
        assert_eq!(t.remove_data_edge(a, b2), 1);
        assert!(t.dd_children_raw(a).is_empty());
        assert!(t.dd_parents_raw(b2).is_empty());
    }

    #[test]
    fn test_control_edges_on_if() {
        let doc = b::program(vec![b::if_stmt(
            b::lit_bool(true),
            b::block(vec![b::expr_stmt(b::ident("a"))]),
            Some(b::block(vec![b::expr_stmt(b::ident("b"))])),
        )]);
        let t = estree::load_document(&doc, "test.js", None).unwrap();
        let if_stmt = t.nodes_of_kind(NodeKind::IfStatement).next().unwrap();
        let labels: Vec<ControlLabel> = t
            .control_children(if_stmt)
            .iter()
            .map(|(_, l)| *l)
            .collect();
        assert_eq!(labels, vec![ControlLabel::True, ControlLabel::False]);
    }

    #[test]
    fn test_lies_within_piece_of_code() {
        let t = small_tree();
        let root_span = t.span(t.root());
        for id in t.preorder(t.root()) {
            assert!(t.lies_within_piece_of_code(id, &root_span));
        }
        let first_stmt = t.children(t.root())[0];
        let second_stmt = t.children(t.root())[1];
        assert!(!t.lies_within_piece_of_code(second_stmt, &t.span(first_stmt)));
    }

    #[test]
    fn test_role_access() {
        let t = small_tree();
        let call = t
            .nodes_of_kind(NodeKind::CallExpression)
            .find(|c| {
                t.get_one(*c, "callee")
                    .map(|callee| t.is_identifier_named(callee, "bar"))
                    .unwrap_or(false)
            })
            .unwrap();
        assert_eq!(t.get(call, "arguments").len(), 1);
    }
}
