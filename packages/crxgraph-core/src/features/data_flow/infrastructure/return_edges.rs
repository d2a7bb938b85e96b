/*
 * Layer 3: return-value edges.
 *
 * For every `return` directly inside a function f and every call site
 * resolving to f, the return argument's value identifiers link to the
 * identifiers receiving the call's result: the LHS of an enclosing `=`,
 * the id of an enclosing VariableDeclarator, or the formal parameter the
 * call fills in an enclosing call. IIFEs resolve to themselves and need
 * no lookup.
 */

use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::features::pdg::func::resolve_call_target;
use crate::features::pdg::scoping::{assignment_accesses_property, pattern_binding_identifiers};
use crate::shared::models::NodeId;

use super::value_flow::value_flow_identifiers;

pub fn add_return_edges(
    tree: &Tree,
    in_interest: Option<NodeId>,
    out_interest: Option<NodeId>,
) -> usize {
    let mut added = 0;
    let wanted = |from: NodeId, to: NodeId| {
        (in_interest.is_none() || in_interest == Some(to))
            && (out_interest.is_none() || out_interest == Some(from))
    };
    let call_sites: Vec<NodeId> = tree.nodes_of_kind(NodeKind::CallExpression).collect();
    for call in call_sites {
        let Some(func) = resolve_call_target(tree, call) else {
            continue;
        };
        let receivers = result_receivers(tree, call);
        if receivers.is_empty() {
            continue;
        }
        for ret in own_return_statements(tree, func.node()) {
            let Some(arg) = tree.get_one(ret, "argument") else {
                continue;
            };
            for source in value_flow_identifiers(tree, arg) {
                for &target in &receivers {
                    if source != target && wanted(source, target) && tree.add_data_edge(source, target)
                    {
                        added += 1;
                    }
                }
            }
        }
    }
    if added > 0 {
        tracing::trace!(added, "return-value data-flow edges");
    }
    added
}

/// ReturnStatements directly owned by `func` (nested functions keep
/// their own returns).
fn own_return_statements(tree: &Tree, func: NodeId) -> Vec<NodeId> {
    let Some(body) = tree.get_one(func, "body") else {
        return Vec::new();
    };
    let mut result = Vec::new();
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        match tree.kind(node) {
            NodeKind::FunctionDeclaration
            | NodeKind::FunctionExpression
            | NodeKind::ArrowFunctionExpression => continue,
            NodeKind::ReturnStatement => result.push(node),
            _ => {}
        }
        for &c in tree.children(node).iter().rev() {
            stack.push(c);
        }
    }
    result
}

/// Identifiers receiving the result of `call`, walking up through pure
/// expression wrappers.
fn result_receivers(tree: &Tree, call: NodeId) -> Vec<NodeId> {
    let mut cur = call;
    loop {
        let Some(parent) = tree.parent(cur) else {
            return Vec::new();
        };
        match tree.kind(parent) {
            NodeKind::BinaryExpression
            | NodeKind::LogicalExpression
            | NodeKind::ConditionalExpression
            | NodeKind::SequenceExpression
            | NodeKind::AwaitExpression
            | NodeKind::UnaryExpression
            | NodeKind::ChainExpression => cur = parent,
            NodeKind::VariableDeclarator => {
                if tree.get_one(parent, "init") != Some(cur) {
                    return Vec::new();
                }
                let Some(&target) = tree.children(parent).first() else {
                    return Vec::new();
                };
                return pattern_binding_identifiers(tree, target);
            }
            NodeKind::AssignmentExpression => {
                if tree.rhs(parent).ok() != Some(cur)
                    || tree.operator(parent) != Some("=")
                    || assignment_accesses_property(tree, parent)
                {
                    return Vec::new();
                }
                let Ok(lhs) = tree.lhs(parent) else {
                    return Vec::new();
                };
                return pattern_binding_identifiers(tree, lhs);
            }
            NodeKind::CallExpression => {
                // the result fills a parameter position of an outer call
                if tree.role(cur) != "arguments" {
                    return Vec::new();
                }
                let index = tree
                    .get(parent, "arguments")
                    .iter()
                    .position(|a| *a == cur);
                let (Some(index), Some(outer)) = (index, resolve_call_target(tree, parent))
                else {
                    return Vec::new();
                };
                let Some(param) = outer.nth_param(tree, index) else {
                    return Vec::new();
                };
                return pattern_binding_identifiers(tree, param);
            }
            _ => return Vec::new(),
        }
    }
}
