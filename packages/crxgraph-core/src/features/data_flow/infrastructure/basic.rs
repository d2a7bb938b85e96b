/*
 * Layer 1: basic data-flow edges.
 *
 * Two edge families, both within one name or across a single
 * declaration/assignment statement:
 *
 *   - intra-statement: RHS value identifiers -> the LHS binding
 *     identifiers they define (declarators, `=` assignments including
 *     destructuring, pattern defaults);
 *   - def-to-use: a defining occurrence -> every use of the same name it
 *     reaches in scope without an intervening reassignment, honoring
 *     hoisting per declaration kind.
 *
 * With an identifier of interest, only that identifier's name is
 * processed (all of its basic edges involve its own name, or cross names
 * only through a statement the name participates in).
 */

use rustc_hash::FxHashSet;

use crate::features::ast::domain::NodeKind;
use crate::features::ast::{LazyLayer, Tree};
use crate::features::pdg::scoping::{
    self, assignment_accesses_property, pattern_binding_identifiers, Declaration,
};
use crate::shared::models::NodeId;

use super::value_flow::value_flow_identifiers;

/// Generate basic edges; returns the number of edges added.
pub fn add_basic_edges(tree: &Tree, interest: Option<NodeId>) -> usize {
    match interest {
        Some(id) => match tree.name(id) {
            Some(name) => add_basic_edges_for_name(tree, &name.to_string()),
            None => 0,
        },
        None => {
            let mut names: Vec<String> = Vec::new();
            let mut seen = FxHashSet::default();
            for id in tree.nodes_of_kind(NodeKind::Identifier) {
                if let Some(n) = tree.name(id) {
                    if seen.insert(n.to_string()) {
                        names.push(n.to_string());
                    }
                }
            }
            names
                .iter()
                .map(|n| add_basic_edges_for_name(tree, n))
                .sum()
        }
    }
}

fn add_basic_edges_for_name(tree: &Tree, name: &str) -> usize {
    // all of this name's identifiers become final for the basic layer
    let occurrences: Vec<NodeId> = tree
        .nodes_of_kind(NodeKind::Identifier)
        .filter(|i| tree.name(*i) == Some(name))
        .collect();
    for &occ in &occurrences {
        tree.set_lazy_done(occ, LazyLayer::Basic);
    }

    let mut added = 0;
    added += intra_statement_edges(tree, name);
    added += def_to_use_edges(tree, name, &occurrences);
    if added > 0 {
        tracing::trace!(name, added, "basic data-flow edges");
    }
    added
}

/// RHS value identifiers -> LHS binding identifiers, for every
/// declarator, plain/destructuring `=` assignment, and pattern default.
fn intra_statement_edges(tree: &Tree, name: &str) -> usize {
    let mut added = 0;
    let mut link = |tree: &Tree, sources: &[NodeId], targets: &[NodeId]| {
        for &s in sources {
            for &t in targets {
                if s == t {
                    continue;
                }
                if tree.name(s) == Some(name) || tree.name(t) == Some(name) {
                    if tree.add_data_edge(s, t) {
                        added += 1;
                    }
                }
            }
        }
    };
    for node in tree.preorder(tree.root()) {
        match tree.kind(node) {
            NodeKind::VariableDeclarator => {
                let Some(init) = tree.get_one(node, "init") else {
                    continue;
                };
                let Some(&target) = tree.children(node).first() else {
                    continue;
                };
                let bindings = pattern_binding_identifiers(tree, target);
                let sources = value_flow_identifiers(tree, init);
                link(tree, &sources, &bindings);
            }
            NodeKind::AssignmentExpression => {
                if tree.operator(node) != Some("=") || assignment_accesses_property(tree, node) {
                    continue;
                }
                let (Ok(lhs), Ok(rhs)) = (tree.lhs(node), tree.rhs(node)) else {
                    continue;
                };
                let bindings = pattern_binding_identifiers(tree, lhs);
                let sources = value_flow_identifiers(tree, rhs);
                link(tree, &sources, &bindings);
            }
            NodeKind::AssignmentPattern => {
                let (Ok(lhs), Ok(rhs)) = (tree.lhs(node), tree.rhs(node)) else {
                    continue;
                };
                let bindings = pattern_binding_identifiers(tree, lhs);
                let sources = value_flow_identifiers(tree, rhs);
                link(tree, &sources, &bindings);
            }
            _ => {}
        }
    }
    added
}

fn def_to_use_edges(tree: &Tree, name: &str, occurrences: &[NodeId]) -> usize {
    let declarations: Vec<Declaration> = scoping::collect_declarations(tree, None)
        .into_iter()
        .filter(|d| tree.name(d.ident) == Some(name))
        .collect();
    // assignment definitions: LHS binding occurrences of plain `=`
    // assignments (an implicit global's first assignment is both its
    // declaration and a definition; dedup below keeps things sane)
    let assignment_defs: Vec<NodeId> = occurrences
        .iter()
        .copied()
        .filter(|occ| in_assignment_lhs(tree, *occ))
        .collect();
    let uses: Vec<NodeId> = occurrences
        .iter()
        .copied()
        .filter(|occ| is_variable_use(tree, *occ))
        .collect();

    // governing declaration of each assignment definition
    let governing: Vec<(NodeId, Option<usize>)> = assignment_defs
        .iter()
        .map(|&a| (a, visible_declaration(tree, &declarations, a)))
        .collect();

    let mut added = 0;
    for &use_site in &uses {
        let Some(decl_idx) = visible_declaration(tree, &declarations, use_site) else {
            continue;
        };
        let decl = &declarations[decl_idx];
        // candidate providers: the declaration itself plus every
        // reassignment governed by it that happened before the use
        let mut provider: Option<NodeId> = None;
        if decl.is_value_hoisted() || tree.occurs_before(decl.ident, use_site) {
            provider = Some(decl.ident);
        }
        for &(a, gov) in &governing {
            if gov != Some(decl_idx) || a == use_site {
                continue;
            }
            if !tree.occurs_before(a, use_site) {
                continue;
            }
            // `x = x + 1` must not feed its own RHS from its own LHS
            if shares_defining_statement(tree, a, use_site) {
                continue;
            }
            match provider {
                Some(p) if tree.occurs_before(a, p) => {}
                _ => provider = Some(a),
            }
        }
        if let Some(p) = provider {
            if p != use_site
                && !shares_defining_statement(tree, p, use_site)
                && tree.add_data_edge(p, use_site)
            {
                added += 1;
            }
        }
        // a definition later in the same loop reaches this use on the
        // next iteration (this is what makes `x = y; y = x;` in a loop
        // a data-flow cycle)
        for &(a, gov) in &governing {
            if gov != Some(decl_idx) || a == use_site {
                continue;
            }
            if tree.occurs_before(a, use_site) || !in_same_loop(tree, a, use_site) {
                continue;
            }
            if !shares_defining_statement(tree, a, use_site) && tree.add_data_edge(a, use_site) {
                added += 1;
            }
        }
    }
    added
}

const LOOP_KINDS: &[NodeKind] = &[
    NodeKind::WhileStatement,
    NodeKind::DoWhileStatement,
    NodeKind::ForStatement,
    NodeKind::ForInStatement,
    NodeKind::ForOfStatement,
];

fn in_same_loop(tree: &Tree, a: NodeId, b: NodeId) -> bool {
    tree.all_ancestors_of_kinds(a, LOOP_KINDS)
        .into_iter()
        .any(|l| tree.is_inside(b, l))
}

/// Index of the innermost declaration visible at `at` (smallest scope
/// height; non-hoisted declarations must precede `at`).
fn visible_declaration(tree: &Tree, declarations: &[Declaration], at: NodeId) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, d) in declarations.iter().enumerate() {
        if d.ident == at {
            continue;
        }
        if !tree.is_inside_or_is(at, d.scope) {
            continue;
        }
        if !d.is_value_hoisted() && !tree.occurs_before(d.ident, at) {
            continue;
        }
        match best {
            Some(b) if tree.height(declarations[b].scope) <= tree.height(d.scope) => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Whether `def` and `site` belong to the same declarator or assignment
/// (self-feeding would otherwise produce bogus edges).
fn shares_defining_statement(tree: &Tree, def: NodeId, site: NodeId) -> bool {
    let container = tree.get_ancestor_or_self(
        def,
        &[NodeKind::VariableDeclarator, NodeKind::AssignmentExpression],
    );
    match container {
        Some(c) => tree.is_inside(site, c),
        None => false,
    }
}

/// Whether the identifier sits in the (pattern-)LHS of a plain `=`
/// assignment, i.e. acts as a definition.
fn in_assignment_lhs(tree: &Tree, id: NodeId) -> bool {
    let mut cur = id;
    loop {
        let Some(p) = tree.parent(cur) else {
            return false;
        };
        match tree.kind(p) {
            NodeKind::ArrayPattern | NodeKind::RestElement | NodeKind::ObjectPattern => cur = p,
            NodeKind::AssignmentPattern => {
                if tree.lhs(p).ok() == Some(cur) {
                    cur = p;
                } else {
                    return false;
                }
            }
            NodeKind::Property => {
                let Some(gp) = tree.parent(p) else {
                    return false;
                };
                if tree.kind(gp) == NodeKind::ObjectPattern
                    && tree.children(p).get(1) == Some(&cur)
                {
                    cur = gp;
                } else {
                    return false;
                }
            }
            NodeKind::AssignmentExpression => {
                return tree.operator(p) == Some("=")
                    && tree.lhs(p).ok() == Some(cur)
                    && !assignment_accesses_property(tree, p);
            }
            _ => return false,
        }
    }
}

/// Whether the identifier occurrence is a variable *binding* (a
/// declarator id, a function parameter, a function/class name, an
/// assignment target).
pub fn is_binding_position(tree: &Tree, id: NodeId) -> bool {
    let mut cur = id;
    loop {
        let Some(p) = tree.parent(cur) else {
            return false;
        };
        match tree.kind(p) {
            NodeKind::ArrayPattern | NodeKind::RestElement | NodeKind::ObjectPattern => cur = p,
            NodeKind::AssignmentPattern => {
                if tree.lhs(p).ok() == Some(cur) {
                    cur = p;
                } else {
                    return false;
                }
            }
            NodeKind::Property => {
                let Some(gp) = tree.parent(p) else {
                    return false;
                };
                if tree.kind(gp) == NodeKind::ObjectPattern
                    && tree.children(p).get(1) == Some(&cur)
                {
                    cur = gp;
                } else {
                    return false;
                }
            }
            NodeKind::VariableDeclarator => return tree.children(p).first() == Some(&cur),
            NodeKind::FunctionDeclaration
            | NodeKind::FunctionExpression
            | NodeKind::ArrowFunctionExpression => {
                return tree.role(cur) == "params" || tree.role(cur) == "id"
            }
            NodeKind::ClassDeclaration | NodeKind::ClassExpression => {
                return tree.role(cur) == "id"
            }
            NodeKind::CatchClause => return tree.role(cur) == "param",
            NodeKind::AssignmentExpression => {
                return tree.operator(p) == Some("=")
                    && tree.lhs(p).ok() == Some(cur)
                    && !assignment_accesses_property(tree, p);
            }
            _ => return false,
        }
    }
}

/// Whether the identifier occurrence reads a variable (not a binding,
/// not a member property, not an object key, not a label...).
pub fn is_variable_use(tree: &Tree, id: NodeId) -> bool {
    let Some(p) = tree.parent(id) else {
        return false;
    };
    match tree.kind(p) {
        NodeKind::MemberExpression => {
            if tree.role(id) == "property" && !tree.attrs(p).computed {
                return false;
            }
        }
        NodeKind::Property => {
            if tree.role(id) == "key" && !tree.attrs(p).computed {
                return false;
            }
        }
        NodeKind::MethodDefinition | NodeKind::PropertyDefinition => {
            if tree.role(id) == "key" {
                return false;
            }
        }
        NodeKind::LabeledStatement
        | NodeKind::BreakStatement
        | NodeKind::ContinueStatement => return false,
        NodeKind::ImportSpecifier
        | NodeKind::ImportDefaultSpecifier
        | NodeKind::ImportNamespaceSpecifier
        | NodeKind::ExportSpecifier
        | NodeKind::MetaProperty => return false,
        _ => {}
    }
    !is_binding_position(tree, id)
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
    fn test_decl_def_to_use() {
        // let x = foo(); bar(x);
        let t = load(b::program(vec![
            b::let_decl("x", b::call(b::ident("foo"), vec![])),
            b::expr_stmt(b::call(b::ident("bar"), vec![b::ident("x")])),
        ]));
        assert_eq!(add_basic_edges(&t, None), 1);
        let decl_x = nth_named(&t, "x", 0);
        let use_x = nth_named(&t, "x", 1);
        assert_eq!(t.dd_children_raw(decl_x), vec![use_x]);
        assert!(t.dd_children_raw(use_x).is_empty());
    }

    #[test]
    fn test_reassignment_cuts_old_def() {
        // let x = 42; x = foo(); bar(x);
        let t = load(b::program(vec![
            b::let_decl("x", b::lit_int(42)),
            b::expr_stmt(b::assign("=", b::ident("x"), b::call(b::ident("foo"), vec![]))),
            b::expr_stmt(b::call(b::ident("bar"), vec![b::ident("x")])),
        ]));
        assert_eq!(add_basic_edges(&t, None), 1);
        let assign_x = nth_named(&t, "x", 1);
        let use_x = nth_named(&t, "x", 2);
        assert_eq!(t.dd_children_raw(assign_x), vec![use_x]);
        // the stale declaration reaches nothing
        assert!(t.dd_children_raw(nth_named(&t, "x", 0)).is_empty());
    }

    #[test]
    fn test_param_to_use() {
        // function foo(z) { console.log(z); }
        let t = load(b::program(vec![b::func_decl(
            "foo",
            vec![b::ident("z")],
            vec![b::expr_stmt(b::call(
                b::member_path(&["console", "log"]),
                vec![b::ident("z")],
            ))],
        )]));
        assert_eq!(add_basic_edges(&t, None), 1);
        let param = nth_named(&t, "z", 0);
        let use_z = nth_named(&t, "z", 1);
        assert_eq!(t.dd_children_raw(param), vec![use_z]);
        assert!(t.dd_children_raw(use_z).is_empty());
    }

    #[test]
    fn test_object_pattern_param() {
        // function foo({x: a}) { console.log(a); }
        let t = load(b::program(vec![b::func_decl(
            "foo",
            vec![b::obj_pattern(vec![b::pattern_property("x", b::ident("a"))])],
            vec![b::expr_stmt(b::call(
                b::member_path(&["console", "log"]),
                vec![b::ident("a")],
            ))],
        )]));
        assert_eq!(add_basic_edges(&t, None), 1);
        let binding = nth_named(&t, "a", 0);
        let use_a = nth_named(&t, "a", 1);
        assert_eq!(t.dd_children_raw(binding), vec![use_a]);
    }

    #[test]
    fn test_default_param() {
        // function foo(x = 1) { console.log(x); }
        let t = load(b::program(vec![b::func_decl(
            "foo",
            vec![b::assign_pattern(b::ident("x"), b::lit_int(1))],
            vec![b::expr_stmt(b::call(
                b::member_path(&["console", "log"]),
                vec![b::ident("x")],
            ))],
        )]));
        assert_eq!(add_basic_edges(&t, None), 1);
    }

    #[test]
    fn test_shadowing_param_vs_named_funcexpr() {
        // (function(t) { !function t() {}; console.log(t); })(42);
        let t = load(b::program(vec![b::expr_stmt(b::call(
            b::func_expr(
                None,
                vec![b::ident("t")],
                vec![
                    b::expr_stmt(b::unary("!", b::func_expr(Some("t"), vec![], vec![]))),
                    b::expr_stmt(b::call(
                        b::member_path(&["console", "log"]),
                        vec![b::ident("t")],
                    )),
                ],
            ),
            vec![b::lit_int(42)],
        ))]));
        assert_eq!(add_basic_edges(&t, None), 1);
        let param = nth_named(&t, "t", 0);
        let use_t = nth_named(&t, "t", 2);
        assert_eq!(t.dd_children_raw(param), vec![use_t]);
    }

    #[test]
    fn test_declarator_rhs_to_lhs_chain() {
        // let a = "data"; let b = a; let c = b;
        let t = load(b::program(vec![
            b::let_decl("a", b::lit_str("data")),
            b::let_decl("b", b::ident("a")),
            b::let_decl("c", b::ident("b")),
        ]));
        add_basic_edges(&t, None);
        let decl_a = nth_named(&t, "a", 0);
        let use_a = nth_named(&t, "a", 1);
        let decl_b = nth_named(&t, "b", 0);
        let use_b = nth_named(&t, "b", 1);
        let decl_c = nth_named(&t, "c", 0);
        assert_eq!(t.dd_children_raw(decl_a), vec![use_a]);
        assert_eq!(t.dd_children_raw(use_a), vec![decl_b]);
        assert_eq!(t.dd_children_raw(decl_b), vec![use_b]);
        assert_eq!(t.dd_children_raw(use_b), vec![decl_c]);
    }

    #[test]
    fn test_destructuring_assignment() {
        // ({url: u} = sender); use(u);
        let t = load(b::program(vec![
            b::let_decl("sender", b::call(b::ident("get"), vec![])),
            b::expr_stmt(b::assign(
                "=",
                b::obj_pattern(vec![b::pattern_property("url", b::ident("u"))]),
                b::ident("sender"),
            )),
            b::expr_stmt(b::call(b::ident("use"), vec![b::ident("u")])),
        ]));
        add_basic_edges(&t, None);
        let sender_use = nth_named(&t, "sender", 1);
        let u_binding = nth_named(&t, "u", 0);
        let u_use = nth_named(&t, "u", 1);
        assert!(t.dd_children_raw(sender_use).contains(&u_binding));
        assert!(t.dd_children_raw(u_binding).contains(&u_use));
    }

    #[test]
    fn test_self_assignment_reads_previous_def() {
        // let x = 1; x = x + 1; foo(x);
        let t = load(b::program(vec![
            b::let_decl("x", b::lit_int(1)),
            b::expr_stmt(b::assign(
                "=",
                b::ident("x"),
                b::bin("+", b::ident("x"), b::lit_int(1)),
            )),
            b::expr_stmt(b::call(b::ident("foo"), vec![b::ident("x")])),
        ]));
        add_basic_edges(&t, None);
        let decl_x = nth_named(&t, "x", 0);
        let lhs_x = nth_named(&t, "x", 1);
        let rhs_x = nth_named(&t, "x", 2);
        let use_x = nth_named(&t, "x", 3);
        // RHS x reads the declaration, not its own LHS
        assert_eq!(t.dd_parents_raw(rhs_x), vec![decl_x]);
        // the RHS feeds the LHS, which feeds the final use
        assert!(t.dd_children_raw(rhs_x).contains(&lhs_x));
        assert_eq!(t.dd_parents_raw(use_x), vec![lhs_x]);
    }

    #[test]
    fn test_targeted_generation_covers_both_directions() {
        // closure property: children then parents contain each other
        let t = load(b::program(vec![
            b::let_decl("a", b::lit_str("data")),
            b::let_decl("b", b::ident("a")),
        ]));
        let decl_a = nth_named(&t, "a", 0);
        add_basic_edges(&t, Some(decl_a));
        for child in t.dd_children_raw(decl_a) {
            assert!(t.dd_parents_raw(child).contains(&decl_a));
        }
    }

    #[test]
    fn test_function_name_is_hoisted() {
        // foo(); function foo() {}
        let t = load(b::program(vec![
            b::expr_stmt(b::call(b::ident("foo"), vec![])),
            b::func_decl("foo", vec![], vec![]),
        ]));
        add_basic_edges(&t, None);
        let use_foo = nth_named(&t, "foo", 0);
        let decl_foo = nth_named(&t, "foo", 1);
        assert_eq!(t.dd_parents_raw(use_foo), vec![decl_foo]);
    }
}
