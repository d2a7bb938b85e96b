//! Cross-module properties: identifier-resolution soundness, data-flow
//! closure, Dijkstra well-formedness and strategy inclusion over random
//! graphs, and whole-document determinism.

use proptest::prelude::*;
use serde_json::Value;

use crxgraph_core::config::AnalysisConfig;
use crxgraph_core::features::ast::domain::NodeKind;
use crxgraph_core::features::ast::{builder as b, estree, Tree};
use crxgraph_core::features::data_flow;
use crxgraph_core::features::driver::infrastructure::extension::{
    analyze_extension, ExtensionInput,
};
use crxgraph_core::features::flow_graph::{DataFlowGraph, FlowStrategy};
use crxgraph_core::features::pdg::scoping;
use crxgraph_core::shared::deadline::Deadline;
use crxgraph_core::NodeId;

fn load(doc: Value) -> Tree {
    estree::load_document(&doc, "t.js", None).unwrap()
}

fn idents_named(tree: &Tree, name: &str) -> Vec<NodeId> {
    tree.nodes_of_kind(NodeKind::Identifier)
        .filter(|i| tree.name(*i) == Some(name))
        .collect()
}

// ── property 1: identifier resolution soundness ───────────────────────

#[test]
fn resolution_is_unique_and_innermost() {
    // let v = 1; function f(v) { { let v = 2; g(v); } g(v); } g(v);
    let tree = load(b::program(vec![
        b::let_decl("v", b::lit_int(1)),
        b::func_decl(
            "f",
            vec![b::ident("v")],
            vec![
                b::block(vec![
                    b::let_decl("v", b::lit_int(2)),
                    b::expr_stmt(b::call(b::ident("g"), vec![b::ident("v")])),
                ]),
                b::expr_stmt(b::call(b::ident("g"), vec![b::ident("v")])),
            ],
        ),
        b::expr_stmt(b::call(b::ident("g"), vec![b::ident("v")])),
    ]));
    let vs = idents_named(&tree, "v");
    // vs: [outer decl, param, inner decl, inner use, param use, outer use]
    assert_eq!(vs.len(), 6);
    assert_eq!(scoping::resolve_identifier(&tree, vs[3]), Some(vs[2]));
    assert_eq!(scoping::resolve_identifier(&tree, vs[4]), Some(vs[1]));
    assert_eq!(scoping::resolve_identifier(&tree, vs[5]), Some(vs[0]));
    // every resolution lands on a declaration in scope at the use
    for &use_site in &vs[3..] {
        let decl = scoping::resolve_identifier(&tree, use_site).unwrap();
        assert!(scoping::identifier_is_in_scope_at(
            &tree, decl, use_site, true, true, true
        ));
    }
}

// ── property 2: basic data-flow closure ───────────────────────────────

#[test]
fn children_and_parents_are_mutually_closed() {
    let tree = load(b::program(vec![
        b::let_decl("a", b::lit_str("data")),
        b::var_decl(
            "let",
            vec![
                b::declarator(b::ident("x"), Some(b::ident("a"))),
                b::declarator(b::ident("y"), Some(b::ident("a"))),
            ],
        ),
        b::expr_stmt(b::call(b::ident("use"), vec![b::ident("x"), b::ident("y")])),
    ]));
    let a_decl = idents_named(&tree, "a")[0];
    for child in data_flow::flow_children(&tree, a_decl) {
        assert!(data_flow::flow_parents(&tree, child).contains(&a_decl));
    }
    let x_use = *idents_named(&tree, "x").last().unwrap();
    for parent in data_flow::flow_parents(&tree, x_use) {
        assert!(data_flow::flow_children(&tree, parent).contains(&x_use));
    }
}

// ── properties 3+4: Dijkstra well-formedness and strategy inclusion ───

/// A synthetic graph: n identifier nodes (distinct names so the lazy
/// layers stay silent) plus explicit data edges.
fn synthetic_graph(n: usize, edges: &[(usize, usize)]) -> (Tree, Vec<NodeId>) {
    let stmts: Vec<Value> = (0..n)
        .map(|i| b::expr_stmt(b::ident(&format!("n{}", i))))
        .collect();
    let tree = load(b::program(stmts));
    let nodes: Vec<NodeId> = tree.nodes_of_kind(NodeKind::Identifier).collect();
    for &(from, to) in edges {
        if from != to {
            tree.add_data_edge(nodes[from], nodes[to]);
        }
    }
    (tree, nodes)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn dijkstra_tree_is_well_formed(
        edges in proptest::collection::vec((0usize..8, 0usize..8), 0..12)
    ) {
        let (tree, nodes) = synthetic_graph(8, &edges);
        let graph = DataFlowGraph::new(&tree, nodes[0], &Deadline::unlimited()).unwrap();
        for node in graph.nodes() {
            let path = graph.shortest_path_to(node);
            prop_assert_eq!(path[0], nodes[0]);
            prop_assert_eq!(*path.last().unwrap(), node);
            let mut uniq = path.clone();
            uniq.sort();
            uniq.dedup();
            prop_assert_eq!(uniq.len(), path.len(), "path must be simple");
            prop_assert_eq!(path.len() as u32 - 1, graph.distance(node).unwrap());
        }
    }

    #[test]
    fn strategies_are_nested(
        edges in proptest::collection::vec((0usize..8, 0usize..8), 0..12)
    ) {
        let (tree, nodes) = synthetic_graph(8, &edges);
        let graph = DataFlowGraph::new(&tree, nodes[0], &Deadline::unlimited()).unwrap();
        let d = Deadline::unlimited();
        let all = graph.flows(FlowStrategy::All, &d).unwrap();
        let per_node = graph.flows(FlowStrategy::OnePerNodeShortest, &d).unwrap();
        let leaves = graph.flows(FlowStrategy::DijkstraLeaves, &d).unwrap();
        let finals = graph.flows(FlowStrategy::OnePerFinalNodeShortest, &d).unwrap();
        prop_assert!(finals.iter().all(|f| leaves.contains(f)));
        prop_assert!(leaves.iter().all(|f| per_node.contains(f)));
        prop_assert!(per_node.iter().all(|f| all.contains(f)));
        // full node coverage of the shortest-path enumeration
        prop_assert_eq!(per_node.len(), graph.len());
    }

    #[test]
    fn enumeration_is_deterministic(
        edges in proptest::collection::vec((0usize..8, 0usize..8), 0..12)
    ) {
        let (tree, nodes) = synthetic_graph(8, &edges);
        let d = Deadline::unlimited();
        let g1 = DataFlowGraph::new(&tree, nodes[0], &d).unwrap();
        let g2 = DataFlowGraph::new(&tree, nodes[0], &d).unwrap();
        for strategy in [
            FlowStrategy::OnePerNodeShortest,
            FlowStrategy::OnePerFinalNodeShortest,
            FlowStrategy::DijkstraLeaves,
            FlowStrategy::JustOne,
        ] {
            prop_assert_eq!(
                g1.flows(strategy, &d).unwrap(),
                g2.flows(strategy, &d).unwrap()
            );
        }
    }
}

// ── property 8: whole-document determinism ────────────────────────────

fn s1_extension_input() -> ExtensionInput {
    let bp = b::program(vec![b::expr_stmt(b::call(
        b::member_path(&["chrome", "runtime", "onMessage", "addListener"]),
        vec![b::arrow(
            vec![b::ident("msg"), b::ident("sender"), b::ident("sendResponse")],
            vec![
                b::expr_stmt(b::call(
                    b::member_path(&["chrome", "cookies", "getAll"]),
                    vec![
                        b::object(vec![]),
                        b::func_expr(
                            None,
                            vec![b::ident("cookies")],
                            vec![b::expr_stmt(b::call(
                                b::ident("sendResponse"),
                                vec![b::ident("cookies")],
                            ))],
                        ),
                    ],
                )),
                b::ret(Some(b::lit_bool(true))),
            ],
        )],
    ))]);
    let cs = b::program(vec![]);
    ExtensionInput {
        bp_tree: Some(Ok(estree::load_document(&bp, "bp.js", None).unwrap())),
        cs_tree: Some(Ok(estree::load_document(&cs, "cs.js", None).unwrap())),
        manifest: None,
    }
}

#[test]
fn two_runs_produce_identical_findings() {
    let config = AnalysisConfig {
        return_multiple_flow_variants: true,
        ..AnalysisConfig::default()
    };
    let doc1 = analyze_extension(s1_extension_input(), &config);
    let doc2 = analyze_extension(s1_extension_input(), &config);
    // benchmarks and the timestamp are wall-clock-dependent; everything
    // the analysis derived must be identical
    assert_eq!(doc1.bp, doc2.bp);
    assert_eq!(doc1.cs, doc2.cs);
    assert_eq!(doc1.crashes, doc2.crashes);
    assert_eq!(doc1.code_stats, doc2.code_stats);
    assert_eq!(
        serde_json::to_value(&doc1.bp).unwrap(),
        serde_json::to_value(&doc2.bp).unwrap()
    );
}
