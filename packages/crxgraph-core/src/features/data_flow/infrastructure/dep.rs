/*
 * Lazy-layer dispatch.
 *
 * Each flag is latched *before* its generator runs, so re-entrant
 * queries issued during generation (e.g. resolving a callee resolves
 * identifiers, which asks for flow parents again) see the layer as done
 * and return the edges materialized so far. Generation is monotone and
 * idempotent, so this is safe in the single-threaded analysis.
 */

use crate::features::ast::{LazyLayer, Tree};
use crate::shared::models::NodeId;

use super::{basic, call_edges, return_edges};

/// Incoming data-flow edges of an identifier, generating any missing
/// layers first.
pub fn flow_parents(tree: &Tree, id: NodeId) -> Vec<NodeId> {
    if !tree.is_identifier(id) {
        return Vec::new();
    }
    if !tree.lazy_done(id, LazyLayer::Basic) {
        tree.set_lazy_done(id, LazyLayer::Basic);
        basic::add_basic_edges(tree, Some(id));
    }
    if !tree.lazy_done(id, LazyLayer::CallExprParents) {
        tree.set_lazy_done(id, LazyLayer::CallExprParents);
        call_edges::add_call_expression_edges(tree, Some(id), None);
    }
    if !tree.lazy_done(id, LazyLayer::ReturnParents) {
        tree.set_lazy_done(id, LazyLayer::ReturnParents);
        return_edges::add_return_edges(tree, Some(id), None);
    }
    tree.dd_parents_raw(id)
}

/// Outgoing data-flow edges of an identifier, generating any missing
/// layers first.
pub fn flow_children(tree: &Tree, id: NodeId) -> Vec<NodeId> {
    if !tree.is_identifier(id) {
        return Vec::new();
    }
    if !tree.lazy_done(id, LazyLayer::Basic) {
        tree.set_lazy_done(id, LazyLayer::Basic);
        basic::add_basic_edges(tree, Some(id));
    }
    if !tree.lazy_done(id, LazyLayer::CallExprChildren) {
        tree.set_lazy_done(id, LazyLayer::CallExprChildren);
        call_edges::add_call_expression_edges(tree, None, Some(id));
    }
    if !tree.lazy_done(id, LazyLayer::ReturnChildren) {
        tree.set_lazy_done(id, LazyLayer::ReturnChildren);
        return_edges::add_return_edges(tree, None, Some(id));
    }
    tree.dd_children_raw(id)
}

/// Generate every layer for every identifier up front (--eager-df-gen).
pub fn generate_all_edges(tree: &Tree) -> usize {
    let mut added = basic::add_basic_edges(tree, None);
    added += call_edges::add_call_expression_edges(tree, None, None);
    added += return_edges::add_return_edges(tree, None, None);
    for id in tree.preorder(tree.root()).collect::<Vec<_>>() {
        if tree.is_identifier(id) {
            tree.set_lazy_done(id, LazyLayer::Basic);
            tree.set_lazy_done(id, LazyLayer::CallExprParents);
            tree.set_lazy_done(id, LazyLayer::CallExprChildren);
            tree.set_lazy_done(id, LazyLayer::ReturnParents);
            tree.set_lazy_done(id, LazyLayer::ReturnChildren);
        }
    }
    added
}
