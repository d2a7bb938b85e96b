/*
 * Sensitive-source extraction: where does the data produced by a
 * privileged API call become visible to the script?
 *
 *   - callback arguments: chrome.cookies.getAll({}, cookies => ...)
 *   - promise chains:     fetch(u).then(resp => ...)
 *   - handler properties: indexedDB.open(...).onsuccess = e => ...
 *     (also via a receiver variable: let r = indexedDB.open(...);
 *      r.onsuccess = e => ...)
 *
 * The returned nodes are the raw parameter nodes (Identifier or
 * destructuring pattern), ready to start flows at.
 */

use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::features::pdg::calls;
use crate::features::pdg::func::Func;
use crate::features::pdg::scoping;
use crate::shared::models::NodeId;

/// (api, parameter node) pairs for every sensitive API accessed under
/// `root`, in source order.
pub fn sensitive_source_params(tree: &Tree, root: NodeId, apis: &[&str]) -> Vec<(String, NodeId)> {
    let mut out: Vec<(String, NodeId)> = Vec::new();
    for call in tree.preorder(root) {
        if tree.kind(call) != NodeKind::CallExpression {
            continue;
        }
        let full_name = calls::call_full_name(tree, call);
        if full_name.contains("()") {
            continue;
        }
        let Some(api) = apis.iter().find(|api| full_name.starts_with(**api)) else {
            continue;
        };
        let push_params = |func: &Func, out: &mut Vec<(String, NodeId)>| {
            for param in func.params(tree) {
                if !out.iter().any(|(_, p)| *p == param) {
                    out.push((api.to_string(), param));
                }
            }
        };
        // callback arguments
        for arg in calls::call_arguments(tree, call) {
            if let Ok(func) = Func::from_node(tree, arg, true) {
                push_params(&func, &mut out);
            }
        }
        // .then(...) chains
        for then_call in calls::then_chain_calls(tree, call) {
            if let Some(&cb) = calls::call_arguments(tree, then_call).first() {
                if let Ok(func) = Func::from_node(tree, cb, true) {
                    push_params(&func, &mut out);
                }
            }
        }
        // on* handler assignments on the call or its receiver variable
        for func in handler_assignments(tree, root, call) {
            push_params(&func, &mut out);
        }
    }
    out
}

/// Functions assigned to `on*` properties of the call's result.
fn handler_assignments(tree: &Tree, root: NodeId, call: NodeId) -> Vec<Func> {
    // bindings that receive the call result
    let mut receiver_bindings: Vec<NodeId> = Vec::new();
    if let Some(parent) = tree.parent(call) {
        match tree.kind(parent) {
            NodeKind::VariableDeclarator if tree.get_one(parent, "init") == Some(call) => {
                if let Some(&target) = tree.children(parent).first() {
                    receiver_bindings.extend(scoping::pattern_binding_identifiers(tree, target));
                }
            }
            NodeKind::AssignmentExpression
                if tree.rhs(parent).ok() == Some(call) && tree.operator(parent) == Some("=") =>
            {
                if let Ok(lhs) = tree.lhs(parent) {
                    if tree.is_identifier(lhs) {
                        receiver_bindings.push(lhs);
                    }
                }
            }
            _ => {}
        }
    }

    let mut out = Vec::new();
    for member in tree.preorder(root) {
        if tree.kind(member) != NodeKind::MemberExpression || tree.attrs(member).computed {
            continue;
        }
        let Some(object) = tree.get_one(member, "object") else {
            continue;
        };
        let on_receiver = object == call
            || (tree.is_identifier(object)
                && scoping::resolve_identifier(tree, object)
                    .map(|d| receiver_bindings.contains(&d))
                    .unwrap_or(false));
        if !on_receiver {
            continue;
        }
        let Some(property) = tree.get_one(member, "property") else {
            continue;
        };
        let Some(prop_name) = tree.name(property) else {
            continue;
        };
        if !prop_name.starts_with("on") {
            continue;
        }
        // the member must be assigned a handler
        let Some(assignment) = tree.parent(member) else {
            continue;
        };
        if tree.kind(assignment) != NodeKind::AssignmentExpression
            || tree.lhs(assignment).ok() != Some(member)
            || tree.operator(assignment) != Some("=")
        {
            continue;
        }
        if let Ok(rhs) = tree.rhs(assignment) {
            if let Ok(func) = Func::from_node(tree, rhs, true) {
                out.push(func);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ast::builder as b;
    use crate::features::ast::estree;
    use pretty_assertions::assert_eq;

    fn load(doc: serde_json::Value) -> Tree {
        estree::load_document(&doc, "bp.js", None).unwrap()
    }

    #[test]
    fn test_callback_params_are_sources() {
        // chrome.cookies.getAll({}, cookies => {});
        let t = load(b::program(vec![b::expr_stmt(b::call(
            b::member_path(&["chrome", "cookies", "getAll"]),
            vec![b::object(vec![]), b::arrow(vec![b::ident("cookies")], vec![])],
        ))]));
        let sources =
            sensitive_source_params(&t, t.root(), &["chrome.cookies"]);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].0, "chrome.cookies");
        assert_eq!(t.name(sources[0].1), Some("cookies"));
    }

    #[test]
    fn test_then_chain_params_are_sources() {
        // fetch(u).then(resp => {});
        let t = load(b::program(vec![b::expr_stmt(b::call(
            b::member(
                b::call(b::ident("fetch"), vec![b::ident("u")]),
                b::ident("then"),
            ),
            vec![b::arrow(vec![b::ident("resp")], vec![])],
        ))]));
        let sources = sensitive_source_params(&t, t.root(), &["fetch"]);
        assert_eq!(sources.len(), 1);
        assert_eq!(t.name(sources[0].1), Some("resp"));
    }

    #[test]
    fn test_onsuccess_handler_param_is_a_source() {
        // indexedDB.open("db").onsuccess = e => {};
        let t = load(b::program(vec![b::expr_stmt(b::assign(
            "=",
            b::member(
                b::call(b::member_path(&["indexedDB", "open"]), vec![b::lit_str("db")]),
                b::ident("onsuccess"),
            ),
            b::arrow(vec![b::ident("e")], vec![]),
        ))]));
        let sources = sensitive_source_params(&t, t.root(), &["indexedDB"]);
        assert_eq!(sources.len(), 1);
        assert_eq!(t.name(sources[0].1), Some("e"));
    }

    #[test]
    fn test_receiver_variable_handler() {
        // let req = indexedDB.open("db"); req.onsuccess = e => {};
        let t = load(b::program(vec![
            b::let_decl(
                "req",
                b::call(b::member_path(&["indexedDB", "open"]), vec![b::lit_str("db")]),
            ),
            b::expr_stmt(b::assign(
                "=",
                b::member(b::ident("req"), b::ident("onsuccess")),
                b::arrow(vec![b::ident("e")], vec![]),
            )),
        ]));
        let sources = sensitive_source_params(&t, t.root(), &["indexedDB"]);
        assert_eq!(sources.len(), 1);
        assert_eq!(t.name(sources[0].1), Some("e"));
    }
}
