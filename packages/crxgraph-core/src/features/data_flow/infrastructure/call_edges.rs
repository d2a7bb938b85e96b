/*
 * Layer 2: call-expression edges.
 *
 * For every call resolvable to a function (identifier resolution,
 * `.bind(...)`, IIFEs, class-method dispatch), each actual argument's
 * value identifiers link to the corresponding formal parameter's binding
 * identifiers. Unresolvable calls stay unresolved.
 *
 * Standard-library rules live here too: Object.assign,
 * Object.defineProperty, Object.defineProperties.
 */

use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::features::pdg::calls;
use crate::features::pdg::func::resolve_call_target;
use crate::features::pdg::scoping::pattern_binding_identifiers;
use crate::shared::models::NodeId;

use super::value_flow::value_flow_identifiers;

/// Generate call-expression edges. `in_interest`/`out_interest` restrict
/// generation to edges into/out of one identifier (targeted queries);
/// returns the number of edges added.
pub fn add_call_expression_edges(
    tree: &Tree,
    in_interest: Option<NodeId>,
    out_interest: Option<NodeId>,
) -> usize {
    let mut added = 0;
    let wanted = |from: NodeId, to: NodeId| {
        (in_interest.is_none() || in_interest == Some(to))
            && (out_interest.is_none() || out_interest == Some(from))
    };
    let calls_in_tree: Vec<NodeId> = tree
        .nodes_of_kind(NodeKind::CallExpression)
        .collect();
    for call in calls_in_tree {
        let full_name = calls::call_full_name(tree, call);
        match full_name.as_str() {
            "Object.assign" => {
                added += object_assign_edges(tree, call, &wanted);
                continue;
            }
            "Object.defineProperty" => {
                added += define_property_edges(tree, call, &wanted);
                continue;
            }
            "Object.defineProperties" => {
                added += define_properties_edges(tree, call, &wanted);
                continue;
            }
            _ => {}
        }
        let Some(func) = resolve_call_target(tree, call) else {
            continue;
        };
        let params = func.params(tree);
        for (i, arg) in calls::call_arguments(tree, call).into_iter().enumerate() {
            let Some(&param) = params.get(i) else {
                break;
            };
            let targets = pattern_binding_identifiers(tree, param);
            for source in value_flow_identifiers(tree, arg) {
                for &target in &targets {
                    if wanted(source, target) && tree.add_data_edge(source, target) {
                        added += 1;
                    }
                }
            }
        }
    }
    if added > 0 {
        tracing::trace!(added, "call-expression data-flow edges");
    }
    added
}

/// Object.assign(target, ...sources): sources flow into the target.
fn object_assign_edges(
    tree: &Tree,
    call: NodeId,
    wanted: &dyn Fn(NodeId, NodeId) -> bool,
) -> usize {
    let args = calls::call_arguments(tree, call);
    let Some((&target_arg, source_args)) = args.split_first() else {
        return 0;
    };
    let targets = value_flow_identifiers(tree, target_arg);
    let mut added = 0;
    for &source_arg in source_args {
        for source in value_flow_identifiers(tree, source_arg) {
            for &target in &targets {
                if source != target && wanted(source, target) && tree.add_data_edge(source, target)
                {
                    added += 1;
                }
            }
        }
    }
    added
}

/// Object.defineProperty(obj, key, desc): desc.value flows into obj.
fn define_property_edges(
    tree: &Tree,
    call: NodeId,
    wanted: &dyn Fn(NodeId, NodeId) -> bool,
) -> usize {
    let args = calls::call_arguments(tree, call);
    if args.len() < 3 {
        return 0;
    }
    let targets = value_flow_identifiers(tree, args[0]);
    descriptor_value_edges(tree, args[2], &targets, wanted)
}

/// Object.defineProperties(obj, {k: desc, ...}): each desc.value flows
/// into obj.
fn define_properties_edges(
    tree: &Tree,
    call: NodeId,
    wanted: &dyn Fn(NodeId, NodeId) -> bool,
) -> usize {
    let args = calls::call_arguments(tree, call);
    if args.len() < 2 {
        return 0;
    }
    let targets = value_flow_identifiers(tree, args[0]);
    if tree.kind(args[1]) != NodeKind::ObjectExpression {
        return 0;
    }
    let mut added = 0;
    for prop in tree.get(args[1], "properties") {
        if let Some(descriptor) = tree.get_one(prop, "value") {
            added += descriptor_value_edges(tree, descriptor, &targets, wanted);
        }
    }
    added
}

fn descriptor_value_edges(
    tree: &Tree,
    descriptor: NodeId,
    targets: &[NodeId],
    wanted: &dyn Fn(NodeId, NodeId) -> bool,
) -> usize {
    if tree.kind(descriptor) != NodeKind::ObjectExpression {
        return 0;
    }
    let mut added = 0;
    for prop in tree.get(descriptor, "properties") {
        let Some(key) = tree.get_one(prop, "key") else {
            continue;
        };
        if !tree.is_identifier_named(key, "value")
            && tree.literal_value(key) != Some(&crate::shared::models::JsVal::str("value"))
        {
            continue;
        }
        let Some(value) = tree.get_one(prop, "value") else {
            continue;
        };
        for source in value_flow_identifiers(tree, value) {
            for &target in targets {
                if source != target && wanted(source, target) && tree.add_data_edge(source, target)
                {
                    added += 1;
                }
            }
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ast::builder as b;
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

    #[test]
    fn test_argument_flows_to_parameter() {
        // function foo(z) {} let v = 1; foo(v);
        let t = load(b::program(vec![
            b::func_decl("foo", vec![b::ident("z")], vec![]),
            b::let_decl("v", b::lit_int(1)),
            b::expr_stmt(b::call(b::ident("foo"), vec![b::ident("v")])),
        ]));
        super::super::basic::add_basic_edges(&t, None);
        assert_eq!(add_call_expression_edges(&t, None, None), 1);
        let param_z = nth_named(&t, "z", 0);
        let arg_v = nth_named(&t, "v", 1);
        assert!(t.dd_children_raw(arg_v).contains(&param_z));
    }

    #[test]
    fn test_iife_argument_flows() {
        // (function(t) {})(v); with let v = 1;
        let t = load(b::program(vec![
            b::let_decl("v", b::lit_int(1)),
            b::expr_stmt(b::call(
                b::func_expr(None, vec![b::ident("t")], vec![]),
                vec![b::ident("v")],
            )),
        ]));
        assert_eq!(add_call_expression_edges(&t, None, None), 1);
        let param_t = nth_named(&t, "t", 0);
        let arg_v = nth_named(&t, "v", 1);
        assert_eq!(t.dd_parents_raw(param_t), vec![arg_v]);
    }

    #[test]
    fn test_object_assign_rule() {
        // Object.assign(target, source);
        let t = load(b::program(vec![
            b::let_decl("target", b::object(vec![])),
            b::let_decl("source", b::object(vec![])),
            b::expr_stmt(b::call(
                b::member_path(&["Object", "assign"]),
                vec![b::ident("target"), b::ident("source")],
            )),
        ]));
        assert_eq!(add_call_expression_edges(&t, None, None), 1);
        let target_use = nth_named(&t, "target", 1);
        let source_use = nth_named(&t, "source", 1);
        assert!(t.dd_children_raw(source_use).contains(&target_use));
    }

    #[test]
    fn test_define_property_rule() {
        // Object.defineProperty(obj, "k", {value: v});
        let t = load(b::program(vec![
            b::let_decl("obj", b::object(vec![])),
            b::let_decl("v", b::lit_int(1)),
            b::expr_stmt(b::call(
                b::member_path(&["Object", "defineProperty"]),
                vec![
                    b::ident("obj"),
                    b::lit_str("k"),
                    b::object(vec![b::property(b::ident("value"), b::ident("v"))]),
                ],
            )),
        ]));
        assert_eq!(add_call_expression_edges(&t, None, None), 1);
        let obj_use = nth_named(&t, "obj", 1);
        let v_use = nth_named(&t, "v", 1);
        assert!(t.dd_children_raw(v_use).contains(&obj_use));
    }

    #[test]
    fn test_targeted_generation_filters() {
        // function foo(z) {} foo(a); foo(b); with a, b declared
        let t = load(b::program(vec![
            b::func_decl("foo", vec![b::ident("z")], vec![]),
            b::let_decl("a", b::lit_int(1)),
            b::let_decl("b", b::lit_int(2)),
            b::expr_stmt(b::call(b::ident("foo"), vec![b::ident("a")])),
            b::expr_stmt(b::call(b::ident("foo"), vec![b::ident("b")])),
        ]));
        let arg_a = nth_named(&t, "a", 1);
        // only edges *out of* arg_a
        add_call_expression_edges(&t, None, Some(arg_a));
        let param_z = nth_named(&t, "z", 0);
        assert_eq!(t.dd_parents_raw(param_z), vec![arg_a]);
    }
}
